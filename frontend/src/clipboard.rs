use wasm_bindgen_futures::JsFuture;

use notesbuddy::AppError;

/// Writes `text` to the system clipboard.
pub async fn copy_text(text: &str) -> Result<(), AppError> {
    let window = web_sys::window().ok_or_else(|| AppError::Unexpected("no window".to_string()))?;
    let promise = window.navigator().clipboard().write_text(text);
    JsFuture::from(promise)
        .await
        .map(|_| ())
        .map_err(|e| AppError::Unexpected(format!("Clipboard write failed: {e:?}")))
}
