//! JsKeyValueStore: durable storage supplied by the host page or extension
//!
//! The host passes any object exposing three methods, each returning a value
//! or a Promise:
//! ```javascript,ignore
//! {
//!   get(key)        // -> string | null
//!   set(key, value) // -> void
//!   remove(key)     // -> boolean (key existed)
//! }
//! ```

use js_sys::{Array, Function, Promise, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use super::js_message;
use crate::error::{Error, Result};
use crate::labels::KeyValueStore;

const METHODS: [&str; 3] = ["get", "set", "remove"];

pub struct JsKeyValueStore {
    target: JsValue,
}

impl JsKeyValueStore {
    pub fn new(target: JsValue) -> Result<Self> {
        for name in METHODS {
            let method = Reflect::get(&target, &JsValue::from_str(name)).unwrap_or(JsValue::UNDEFINED);
            if !method.is_function() {
                return Err(Error::Config(format!("storage object has no {name}() method")));
            }
        }
        Ok(Self { target })
    }

    async fn call(&self, operation: &'static str, method: &str, args: &[JsValue]) -> Result<JsValue> {
        let function: Function = Reflect::get(&self.target, &JsValue::from_str(method))
            .map_err(|e| Error::storage(operation, js_message(&e)))?
            .dyn_into()
            .map_err(|_| Error::storage(operation, format!("{method} is not a function")))?;
        let argv: Array = args.iter().collect();
        let returned = function
            .apply(&self.target, &argv)
            .map_err(|e| Error::storage(operation, js_message(&e)))?;
        JsFuture::from(Promise::resolve(&returned))
            .await
            .map_err(|e| Error::storage(operation, js_message(&e)))
    }
}

impl KeyValueStore for JsKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.call("get", "get", &[JsValue::from_str(key)]).await?;
        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }
        value
            .as_string()
            .map(Some)
            .ok_or_else(|| Error::storage("get", "stored value is not a string"))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.call("set", "set", &[JsValue::from_str(key), JsValue::from_str(&value)])
            .await
            .map(|_| ())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let existed = self.call("delete", "remove", &[JsValue::from_str(key)]).await?;
        Ok(existed.as_bool().unwrap_or(false))
    }
}
