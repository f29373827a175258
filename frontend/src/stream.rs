use futures_util::Stream;
use futures_util::stream;
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{ReadableStream, ReadableStreamDefaultReader};

use notesbuddy::AppError;

fn js_error(context: &str, err: JsValue) -> AppError {
    AppError::transport(format!("{context}: {err:?}"))
}

/// Reads one chunk; `None` once the stream reports `done`.
async fn read_chunk(reader: &ReadableStreamDefaultReader) -> Result<Option<Vec<u8>>, AppError> {
    let result = JsFuture::from(reader.read())
        .await
        .map_err(|e| js_error("Stream read failed", e))?;
    let done = Reflect::get(&result, &JsValue::from_str("done"))
        .map_err(|e| js_error("Malformed read result", e))?
        .as_bool()
        .unwrap_or(false);
    if done {
        return Ok(None);
    }
    let value = Reflect::get(&result, &JsValue::from_str("value"))
        .map_err(|e| js_error("Malformed read result", e))?;
    Ok(Some(Uint8Array::new(&value).to_vec()))
}

/// Adapts a fetch response body into a stream of byte chunks.
///
/// Dropping the stream stops reading; the fetch itself is left to finish.
pub fn body_chunks(body: ReadableStream) -> impl Stream<Item = Result<Vec<u8>, AppError>> {
    let reader: ReadableStreamDefaultReader = body.get_reader().unchecked_into();
    stream::unfold(Some(reader), |reader| async move {
        let reader = reader?;
        match read_chunk(&reader).await {
            Ok(Some(bytes)) => Some((Ok(bytes), Some(reader))),
            Ok(None) => None,
            Err(err) => {
                log::error!("{err}");
                Some((Err(err), None))
            }
        }
    })
}
