//! Browser adapters (wasm32 only)
//!
//! - `dom.rs` - WebDom: `Dom` over the live `web_sys` document
//! - `storage.rs` - JsKeyValueStore: `KeyValueStore` over a host storage object
//! - `engine.rs` - LabelEngine: `#[wasm_bindgen]` facade wiring the
//!   conductor to a MutationObserver and a single timer

pub mod dom;
pub mod storage;
pub mod engine;

pub use dom::*;
pub use storage::*;
pub use engine::*;

use wasm_bindgen::JsValue;

/// Best-effort message from a thrown JS value
pub(crate) fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(value, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", value))
}
