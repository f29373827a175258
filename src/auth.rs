//! Session state and the gate that owns it.
//!
//! [`AuthGate`] is the only writer of the session. Everything else reads it
//! through a [`SessionReader`] handed out by the gate.

use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};

use futures_util::lock::Mutex as AsyncMutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::{LoginRequest, RegisterRequest, TokenResponse, User, Validate};
use crate::validation::{validate_login, validate_registration};

/// The one credential artifact the client persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl From<TokenResponse> for Credential {
    fn from(token: TokenResponse) -> Self {
        Self { access_token: token.access_token, refresh_token: token.refresh_token }
    }
}

/// Durable home of the credential (browser storage, or memory in tests).
pub trait CredentialStore {
    fn load(&self) -> Option<Credential>;
    fn save(&self, credential: &Credential) -> Result<(), AppError>;
    fn clear(&self) -> Result<(), AppError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryStore {
    pub fn with(credential: Credential) -> Self {
        Self { slot: Mutex::new(Some(credential)) }
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Option<Credential> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn save(&self, credential: &Credential) -> Result<(), AppError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| AppError::Unexpected(format!("credential slot poisoned: {e}")))?;
        *slot = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AppError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| AppError::Unexpected(format!("credential slot poisoned: {e}")))?;
        *slot = None;
        Ok(())
    }
}

/// The external auth collaborator.
#[allow(async_fn_in_trait)]
pub trait AuthBackend {
    /// Bad credentials must come back as an error carrying the backend's
    /// detail (see [`AppError::credential_rejected`]), not as `Unauthorized`.
    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, AppError>;
    async fn register(&self, request: &RegisterRequest) -> Result<User, AppError>;
    async fn refresh(&self, credential: &Credential) -> Result<TokenResponse, AppError>;
    async fn logout(&self, credential: &Credential) -> Result<(), AppError>;
}

/// Read-only view of the session.
#[derive(Debug, Clone, Default)]
pub struct SessionReader {
    inner: Arc<RwLock<Option<Credential>>>,
}

impl SessionReader {
    pub fn is_authenticated(&self) -> bool {
        self.credential().is_some()
    }

    pub fn credential(&self) -> Option<Credential> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set(&self, credential: Option<Credential>) {
        match self.inner.write() {
            Ok(mut guard) => *guard = credential,
            Err(poisoned) => *poisoned.into_inner() = credential,
        }
    }
}

type ChangeListener = Arc<dyn Fn(bool) + Send + Sync>;
type ExpiryHook = Arc<dyn Fn() + Send + Sync>;

pub struct AuthGate<B, S> {
    backend: Arc<B>,
    store: Arc<S>,
    session: SessionReader,
    // Held for the whole refresh exchange so concurrent 401s share one refresh.
    refreshing: Arc<AsyncMutex<()>>,
    on_change: Option<ChangeListener>,
    on_expired: Option<ExpiryHook>,
}

impl<B, S> Clone for AuthGate<B, S> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            store: Arc::clone(&self.store),
            session: self.session.clone(),
            refreshing: Arc::clone(&self.refreshing),
            on_change: self.on_change.clone(),
            on_expired: self.on_expired.clone(),
        }
    }
}

impl<B, S> AuthGate<B, S>
where
    B: AuthBackend,
    S: CredentialStore,
{
    pub fn new(backend: B, store: S) -> Self {
        Self {
            backend: Arc::new(backend),
            store: Arc::new(store),
            session: SessionReader::default(),
            refreshing: Arc::new(AsyncMutex::new(())),
            on_change: None,
            on_expired: None,
        }
    }

    /// Called with the new authenticated flag after every change.
    pub fn on_change(mut self, listener: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(listener));
        self
    }

    /// Called when the user has to be sent to the login view.
    pub fn on_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_expired = Some(Arc::new(hook));
        self
    }

    pub fn session(&self) -> SessionReader {
        self.session.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Picks up a credential persisted by an earlier visit.
    pub fn restore(&self) -> bool {
        match self.store.load() {
            Some(credential) => {
                debug!("restored persisted credential");
                self.establish(credential);
                true
            }
            None => false,
        }
    }

    /// On failure the session is left exactly as it was.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AppError> {
        validate_login(email, password)?;
        let request = LoginRequest { email: email.trim().to_string(), password: password.to_string() };
        let token = self.backend.login(&request).await?;
        token.validate()?;
        self.establish(Credential::from(token));
        info!("logged in");
        Ok(())
    }

    /// Registration never signs the user in; a login follows.
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AppError> {
        validate_registration(&request.email, &request.username, &request.password)?;
        let user = self.backend.register(&request).await?;
        user.validate()?;
        info!(username = %user.username, "registered");
        Ok(user)
    }

    /// Local state is cleared even when the backend call fails.
    pub async fn logout(&self) {
        if let Some(credential) = self.session.credential() {
            if let Err(e) = self.backend.logout(&credential).await {
                warn!("backend logout failed: {e}");
            }
        }
        self.discard();
        info!("logged out");
    }

    /// Guard in front of generation and chat.
    pub fn require_authenticated(&self) -> Result<Credential, AppError> {
        match self.session.credential() {
            Some(credential) => Ok(credential),
            None => {
                self.redirect_to_login();
                Err(AppError::Unauthorized)
            }
        }
    }

    /// Runs `request` with the current credential.
    ///
    /// An `Unauthorized` answer triggers one silent refresh and one retry.
    /// When the refresh fails, or the retry is still unauthorized, the session
    /// is discarded, the login redirect fires and `SessionExpired` is returned.
    /// Concurrent callers that fail together share a single refresh.
    pub async fn authorized<T, F, Fut>(&self, mut request: F) -> Result<T, AppError>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let credential = self.require_authenticated()?;
        match request(credential.clone()).await {
            Err(AppError::Unauthorized) => {}
            other => return other,
        }

        debug!("request unauthorized; refreshing credential");
        let fresh = match self.refresh(&credential).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("credential refresh failed: {e}");
                if !self.is_authenticated() {
                    return Err(AppError::SessionExpired);
                }
                return Err(self.expire());
            }
        };
        match request(fresh).await {
            Err(AppError::Unauthorized) => {
                warn!("request still unauthorized after refresh");
                Err(self.expire())
            }
            other => other,
        }
    }

    async fn refresh(&self, stale: &Credential) -> Result<Credential, AppError> {
        let _flight = self.refreshing.lock().await;
        match self.session.credential() {
            Some(current) if current != *stale => {
                debug!("credential already refreshed by a concurrent request");
                return Ok(current);
            }
            Some(_) => {}
            None => return Err(AppError::SessionExpired),
        }
        let token = self.backend.refresh(stale).await?;
        token.validate()?;
        let mut fresh = Credential::from(token);
        if fresh.refresh_token.is_none() {
            fresh.refresh_token = stale.refresh_token.clone();
        }
        self.establish(fresh.clone());
        info!("credential refreshed");
        Ok(fresh)
    }

    fn establish(&self, credential: Credential) {
        if let Err(e) = self.store.save(&credential) {
            warn!("could not persist credential: {e}");
        }
        self.session.set(Some(credential));
        self.notify(true);
    }

    fn discard(&self) {
        if let Err(e) = self.store.clear() {
            warn!("could not clear persisted credential: {e}");
        }
        self.session.set(None);
        self.notify(false);
    }

    fn expire(&self) -> AppError {
        self.discard();
        self.redirect_to_login();
        AppError::SessionExpired
    }

    fn notify(&self, authenticated: bool) {
        if let Some(listener) = &self.on_change {
            listener(authenticated);
        }
    }

    fn redirect_to_login(&self) {
        if let Some(hook) = &self.on_expired {
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeBackend {
        refresh_ok: bool,
        refreshes: AtomicUsize,
        logins: AtomicUsize,
        registrations: AtomicUsize,
    }

    fn token(access: &str) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            token_type: "bearer".to_string(),
            refresh_token: None,
        }
    }

    impl AuthBackend for FakeBackend {
        async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, AppError> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            if request.password == "right" {
                Ok(token("t1"))
            } else {
                Err(AppError::credential_rejected(401, r#"{"detail":"Incorrect email or password"}"#))
            }
        }

        async fn register(&self, request: &RegisterRequest) -> Result<User, AppError> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            if request.email == "taken@b.c" {
                return Err(AppError::credential_rejected(400, r#"{"detail":"Email already registered"}"#));
            }
            Ok(User { email: request.email.clone(), username: request.username.clone(), full_name: None })
        }

        async fn refresh(&self, _credential: &Credential) -> Result<TokenResponse, AppError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.refresh_ok {
                Ok(token("t2"))
            } else {
                Err(AppError::Unauthorized)
            }
        }

        async fn logout(&self, _credential: &Credential) -> Result<(), AppError> {
            Err(AppError::transport("offline"))
        }
    }

    fn signed_in(refresh_ok: bool) -> AuthGate<FakeBackend, MemoryStore> {
        let stored = Credential { access_token: "t0".into(), refresh_token: Some("r0".into()) };
        let gate = AuthGate::new(FakeBackend { refresh_ok, ..Default::default() }, MemoryStore::with(stored));
        assert!(gate.restore());
        gate
    }

    #[tokio::test]
    async fn failed_login_surfaces_detail_and_keeps_state() {
        let gate = AuthGate::new(FakeBackend::default(), MemoryStore::default());
        let err = gate.login("a@b.c", "wrong").await.unwrap_err();
        assert_eq!(err.user_message(), "Incorrect email or password");
        assert!(!gate.is_authenticated());

        gate.login("a@b.c", "right").await.unwrap();
        assert!(gate.is_authenticated());
        assert_eq!(gate.session().credential().unwrap().access_token, "t1");
    }

    #[tokio::test]
    async fn register_does_not_sign_in() {
        let gate = AuthGate::new(FakeBackend::default(), MemoryStore::default());
        let user = gate
            .register(RegisterRequest {
                email: "a@b.c".into(),
                username: "ann".into(),
                password: "pw".into(),
                full_name: None,
            })
            .await
            .unwrap();
        assert_eq!(user.username, "ann");
        assert!(!gate.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_even_when_backend_fails() {
        let flips = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&flips);
        let gate = signed_in(true).on_change(move |auth| seen.lock().unwrap().push(auth));
        gate.logout().await;
        assert!(!gate.is_authenticated());
        assert!(gate.store.load().is_none());
        assert_eq!(*flips.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn refresh_keeps_previous_refresh_token() {
        let gate = signed_in(true);
        let attempts = AtomicUsize::new(0);
        let used = gate
            .authorized(|cred| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(AppError::Unauthorized)
                    } else {
                        Ok(cred)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(used.access_token, "t2");
        assert_eq!(used.refresh_token.as_deref(), Some("r0"));
        assert_eq!(gate.store.load(), Some(used));
    }

    #[tokio::test]
    async fn non_auth_errors_are_not_retried() {
        let gate = signed_in(true);
        let attempts = AtomicUsize::new(0);
        let err = gate
            .authorized(|_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(AppError::QuotaExceeded { detail: "limit".into() }) }
            })
            .await
            .unwrap_err();
        assert!(err.is_quota());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(gate.backend.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unauthenticated_guard_redirects() {
        let redirects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&redirects);
        let gate = AuthGate::new(FakeBackend::default(), MemoryStore::default())
            .on_expired(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        assert_eq!(gate.require_authenticated(), Err(AppError::Unauthorized));
        assert_eq!(redirects.load(Ordering::SeqCst), 1);
    }

    fn registration(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            username: "ann".into(),
            password: password.into(),
            full_name: None,
        }
    }

    #[tokio::test]
    async fn failed_register_surfaces_detail_and_keeps_state() {
        let gate = AuthGate::new(FakeBackend::default(), MemoryStore::default());
        let err = gate.register(registration("taken@b.c", "pw")).await.unwrap_err();
        assert_eq!(err.user_message(), "Email already registered");
        assert!(!gate.is_authenticated());

        let gate = signed_in(true);
        let err = gate.register(registration("taken@b.c", "pw")).await.unwrap_err();
        assert_eq!(err.user_message(), "Email already registered");
        assert!(gate.is_authenticated());
        assert_eq!(gate.session().credential().unwrap().access_token, "t0");
    }

    #[tokio::test]
    async fn empty_fields_never_reach_the_backend() {
        let gate = AuthGate::new(FakeBackend::default(), MemoryStore::default());
        assert!(gate.login("", "right").await.unwrap_err().is_validation());
        assert!(gate.login("a@b.c", "").await.unwrap_err().is_validation());
        assert!(gate.register(registration("  ", "pw")).await.unwrap_err().is_validation());
        assert!(gate.register(registration("a@b.c", "")).await.unwrap_err().is_validation());
        assert_eq!(gate.backend.logins.load(Ordering::SeqCst), 0);
        assert_eq!(gate.backend.registrations.load(Ordering::SeqCst), 0);
        assert!(!gate.is_authenticated());
    }

    /// Accepts each refresh token once and hands out a new one.
    struct RotatingBackend {
        current: Mutex<String>,
        refreshes: AtomicUsize,
    }

    impl AuthBackend for RotatingBackend {
        async fn login(&self, _request: &LoginRequest) -> Result<TokenResponse, AppError> {
            Err(AppError::Unauthorized)
        }

        async fn register(&self, _request: &RegisterRequest) -> Result<User, AppError> {
            Err(AppError::Unauthorized)
        }

        async fn refresh(&self, credential: &Credential) -> Result<TokenResponse, AppError> {
            tokio::task::yield_now().await;
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            let mut current = self.current.lock().unwrap();
            if credential.refresh_token.as_deref() != Some(current.as_str()) {
                return Err(AppError::Unauthorized);
            }
            *current = format!("r{n}");
            Ok(TokenResponse {
                access_token: format!("t{n}"),
                token_type: "bearer".into(),
                refresh_token: Some(format!("r{n}")),
            })
        }

        async fn logout(&self, _credential: &Credential) -> Result<(), AppError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_unauthorized_calls_share_one_refresh() {
        let redirects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&redirects);
        let stored = Credential { access_token: "t0".into(), refresh_token: Some("r0".into()) };
        let backend = RotatingBackend { current: Mutex::new("r0".into()), refreshes: AtomicUsize::new(0) };
        let gate = AuthGate::new(backend, MemoryStore::with(stored)).on_expired(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(gate.restore());

        let call = |cred: Credential| async move {
            tokio::task::yield_now().await;
            if cred.access_token == "t0" {
                Err(AppError::Unauthorized)
            } else {
                Ok(cred.access_token)
            }
        };
        let (a, b) = tokio::join!(gate.authorized(call), gate.authorized(call));

        assert_eq!(a, Ok("t1".to_string()));
        assert_eq!(b, Ok("t1".to_string()));
        assert_eq!(gate.backend.refreshes.load(Ordering::SeqCst), 1);
        assert!(gate.is_authenticated());
        assert_eq!(redirects.load(Ordering::SeqCst), 0);
        assert_eq!(gate.store.load().unwrap().refresh_token.as_deref(), Some("r1"));
    }
}
