use js_sys::{Array, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

use notesbuddy::AppError;
use notesbuddy::export::ExportFile;

fn fail(what: &str) -> impl FnOnce(JsValue) -> AppError + '_ {
    move |e| AppError::Unexpected(format!("{what}: {e:?}"))
}

/// Hands `file` to the browser as a download.
pub fn download(file: &ExportFile) -> Result<(), AppError> {
    let parts = Array::new();
    parts.push(&Uint8Array::from(file.bytes.as_slice()));
    let options = BlobPropertyBag::new();
    options.set_type(file.mime);
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)
        .map_err(fail("Blob creation failed"))?;
    let url = Url::create_object_url_with_blob(&blob).map_err(fail("Object URL failed"))?;

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| AppError::Unexpected("no document".to_string()))?;
    let anchor: HtmlAnchorElement = document
        .create_element("a")
        .map_err(fail("Anchor creation failed"))?
        .unchecked_into();
    anchor.set_href(&url);
    anchor.set_download(&file.file_name);
    anchor.click();

    Url::revoke_object_url(&url).map_err(fail("Object URL revoke failed"))
}
