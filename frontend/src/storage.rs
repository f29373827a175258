use web_sys::Storage;

use notesbuddy::{AppError, Credential, CredentialStore};

const CREDENTIAL_KEY: &str = "notesbuddy_credential";

fn local_storage() -> Result<Storage, AppError> {
    web_sys::window()
        .ok_or_else(|| AppError::Unexpected("no window".to_string()))?
        .local_storage()
        .map_err(|e| AppError::Unexpected(format!("localStorage unavailable: {e:?}")))?
        .ok_or_else(|| AppError::Unexpected("localStorage unavailable".to_string()))
}

/// Keeps the credential in `localStorage` as one JSON value.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStorageStore;

impl CredentialStore for LocalStorageStore {
    fn load(&self) -> Option<Credential> {
        let raw = local_storage().ok()?.get_item(CREDENTIAL_KEY).ok()??;
        match serde_json::from_str(&raw) {
            Ok(credential) => Some(credential),
            Err(e) => {
                log::warn!("Discarding malformed stored credential: {e}");
                let _ = self.clear();
                None
            }
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), AppError> {
        let raw = serde_json::to_string(credential)
            .map_err(|e| AppError::Unexpected(format!("Serialize error: {e}")))?;
        local_storage()?
            .set_item(CREDENTIAL_KEY, &raw)
            .map_err(|e| AppError::Unexpected(format!("localStorage write failed: {e:?}")))
    }

    fn clear(&self) -> Result<(), AppError> {
        local_storage()?
            .remove_item(CREDENTIAL_KEY)
            .map_err(|e| AppError::Unexpected(format!("localStorage write failed: {e:?}")))
    }
}
