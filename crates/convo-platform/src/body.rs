//! `ReadableStream` → [`ByteStream`] bridge.

use futures::stream;
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{ReadableStream, ReadableStreamDefaultReader};

use convo_core::ports::ByteStream;
use convo_types::{ClientError, Result};

/// Read `body` lazily, one `Uint8Array` chunk per item. A failed read ends
/// the stream after yielding the error.
pub fn byte_stream(body: ReadableStream) -> ByteStream {
    let reader: ReadableStreamDefaultReader = body.get_reader().unchecked_into();
    Box::pin(stream::unfold(Some(reader), |state| async move {
        let reader = state?;
        match read_chunk(&reader).await {
            Ok(Some(bytes)) => Some((Ok(bytes), Some(reader))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    }))
}

/// A response without a body still yields a (finished) stream.
pub fn empty() -> ByteStream {
    Box::pin(stream::empty())
}

async fn read_chunk(reader: &ReadableStreamDefaultReader) -> Result<Option<Vec<u8>>> {
    let result = JsFuture::from(reader.read())
        .await
        .map_err(|e| ClientError::Network(format!("body read failed: {}", js_message(&e))))?;

    let done = Reflect::get(&result, &JsValue::from_str("done"))
        .map_err(|e| ClientError::JsInterop(js_message(&e)))?;
    if done.as_bool().unwrap_or(false) {
        return Ok(None);
    }

    let value = Reflect::get(&result, &JsValue::from_str("value"))
        .map_err(|e| ClientError::JsInterop(js_message(&e)))?;
    Ok(Some(Uint8Array::new(&value).to_vec()))
}

fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}
