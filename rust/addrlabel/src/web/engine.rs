//! LabelEngine: browser entry point
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { LabelEngine } from 'addrlabel';
//!
//! await init();
//! const engine = new LabelEngine(storage, { domains_enabled: ['solscan.io'] });
//!
//! // Call once the page has loaded; returns false on a disabled host
//! engine.start();
//!
//! await engine.saveLabel(id, 'Treasury', ['ops'], 'ff8800');
//! console.log(engine.lastReport());
//! engine.dispose();
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::{MutationObserver, MutationObserverInit, MutationRecord, Node};

use super::dom::WebDom;
use super::storage::JsKeyValueStore;
use crate::conductor::{Conductor, PassReport};
use crate::config::EngineConfig;
use crate::dom::Dom;
use crate::error::Error;
use crate::labels::{ImportMode, LabelFilter, LabelInput, LabelStore};
use crate::scheduler::{Directive, ScanRequest};

type ObserverCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

/// Plain objects rather than ES `Map`s for label mappings
fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Serialization failed: {}", e)))
}

// =============================================================================
// Inner
// =============================================================================

struct Inner {
    conductor: Conductor<JsKeyValueStore, Node>,
    window: web_sys::Window,
    timer: Cell<Option<i32>>,
    timer_callback: RefCell<Option<Closure<dyn FnMut()>>>,
    observer: RefCell<Option<(MutationObserver, ObserverCallback)>>,
    last_report: RefCell<Option<PassReport>>,
}

impl Inner {
    fn dispatch(self: &Rc<Self>, directive: Directive<Node>) {
        match directive {
            Directive::Wait => {}
            Directive::ArmTimer { deadline } => self.arm_timer(deadline),
            Directive::Scan(request) => self.spawn_scan(request),
            Directive::Shutdown => self.shutdown(),
        }
    }

    fn arm_timer(self: &Rc<Self>, deadline: u64) {
        self.clear_timer();
        if self.timer_callback.borrow().is_none() {
            let weak: Weak<Inner> = Rc::downgrade(self);
            let callback = Closure::<dyn FnMut()>::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.timer.set(None);
                    let directive = inner.conductor.timer_fired(now_ms());
                    inner.dispatch(directive);
                }
            });
            *self.timer_callback.borrow_mut() = Some(callback);
        }
        let delay = deadline.saturating_sub(now_ms()).min(i32::MAX as u64) as i32;
        let handle = self.timer_callback.borrow().as_ref().and_then(|cb| {
            self.window
                .set_timeout_with_callback_and_timeout_and_arguments_0(cb.as_ref().unchecked_ref(), delay)
                .ok()
        });
        if handle.is_none() {
            log::warn!("[LabelEngine] could not arm timer");
        }
        self.timer.set(handle);
    }

    fn clear_timer(&self) {
        if let Some(handle) = self.timer.take() {
            self.window.clear_timeout_with_handle(handle);
        }
    }

    fn spawn_scan(self: &Rc<Self>, request: ScanRequest<Node>) {
        let inner = Rc::clone(self);
        spawn_local(async move {
            match inner.window.document().ok_or(Error::Detached).and_then(WebDom::new) {
                Ok(mut dom) => {
                    let report = inner.conductor.execute(&mut dom, &request).await;
                    inner.drop_own_records();
                    *inner.last_report.borrow_mut() = Some(report);
                    if request.initial {
                        inner.observe(dom.root());
                    }
                }
                Err(e) => log::warn!("[LabelEngine] scan skipped: {}", e),
            }
            let directive = inner.conductor.scan_finished(now_ms());
            inner.dispatch(directive);
        });
    }

    /// Discard records queued by the pass that just ran; it writes
    /// synchronously after its last await
    fn drop_own_records(&self) {
        if let Some((observer, _)) = self.observer.borrow().as_ref() {
            let dropped = observer.take_records().length();
            if dropped > 0 {
                log::debug!("[LabelEngine] dropped {} self-inflicted mutation records", dropped);
            }
        }
    }

    fn observe(self: &Rc<Self>, root: Node) {
        if self.observer.borrow().is_some() || self.conductor.is_disposed() {
            return;
        }
        let weak: Weak<Inner> = Rc::downgrade(self);
        let callback: ObserverCallback = Closure::new(move |records: js_sys::Array, _: MutationObserver| {
            let Some(inner) = weak.upgrade() else { return };
            let Some(dom) = inner.window.document().and_then(|d| WebDom::new(d).ok()) else {
                return;
            };
            for record in records.iter() {
                let Ok(record) = record.dyn_into::<MutationRecord>() else { continue };
                if let Some(target) = record.target() {
                    let directive = inner.conductor.mutation(&dom, &target, now_ms());
                    inner.dispatch(directive);
                }
            }
        });

        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_character_data(true);
        let observer = match MutationObserver::new(callback.as_ref().unchecked_ref::<Function>()) {
            Ok(o) => o,
            Err(e) => {
                log::warn!("[LabelEngine] MutationObserver unavailable: {}", super::js_message(&e));
                return;
            }
        };
        if let Err(e) = observer.observe_with_options(&root, &init) {
            log::warn!("[LabelEngine] observe failed: {}", super::js_message(&e));
            return;
        }
        *self.observer.borrow_mut() = Some((observer, callback));
    }

    fn shutdown(&self) {
        self.clear_timer();
        if let Some((observer, _callback)) = self.observer.borrow_mut().take() {
            observer.disconnect();
        }
        self.timer_callback.borrow_mut().take();
        log::info!("[LabelEngine] disposed");
    }
}

// =============================================================================
// LabelEngine
// =============================================================================

#[wasm_bindgen]
pub struct LabelEngine {
    inner: Rc<Inner>,
}

#[wasm_bindgen]
impl LabelEngine {
    /// `storage`: object with get/set/remove. `config`: optional
    /// `EngineConfig` fields.
    #[wasm_bindgen(constructor)]
    pub fn new(storage: JsValue, config: JsValue) -> Result<LabelEngine, JsValue> {
        let config: EngineConfig = if config.is_undefined() || config.is_null() {
            EngineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from(Error::Config(e.to_string())))?
        };
        crate::logging::init(config.log_level());
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let store = Rc::new(LabelStore::new(JsKeyValueStore::new(storage)?));
        let conductor = Conductor::new(store, config)?;
        Ok(Self {
            inner: Rc::new(Inner {
                conductor,
                window,
                timer: Cell::new(None),
                timer_callback: RefCell::new(None),
                observer: RefCell::new(None),
                last_report: RefCell::new(None),
            }),
        })
    }

    /// Begin the initial-scan countdown. Call after the page has loaded.
    /// Returns false when the current host is not enabled.
    pub fn start(&self) -> bool {
        let host = self.inner.window.location().hostname().unwrap_or_default();
        if !self.inner.conductor.is_enabled_for(&host) {
            log::info!("[LabelEngine] host {} not enabled", host);
            return false;
        }
        let directive = self.inner.conductor.document_loaded(now_ms());
        self.inner.dispatch(directive);
        true
    }

    /// Labels changed outside this engine (another tab, a sync): drop the
    /// cached snapshot and re-scan
    #[wasm_bindgen(js_name = "labelsChanged")]
    pub fn labels_changed(&self) {
        self.inner.conductor.store().invalidate();
        let directive = self.inner.conductor.labels_changed();
        self.inner.dispatch(directive);
    }

    /// Forced full re-scan
    pub fn rescan(&self) {
        let directive = self.inner.conductor.labels_changed();
        self.inner.dispatch(directive);
    }

    #[wasm_bindgen(js_name = "saveLabel")]
    pub fn save_label(&self, id: String, name: String, tags: JsValue, color: Option<String>) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let tags: Vec<String> = if tags.is_undefined() || tags.is_null() {
                Vec::new()
            } else {
                serde_wasm_bindgen::from_value(tags)
                    .map_err(|e| JsValue::from(Error::InvalidLabel(e.to_string())))?
            };
            let mut input = LabelInput::new(name).with_tags(tags);
            if let Some(color) = color {
                input = input.with_color(color);
            }
            let (record, directive) = inner.conductor.save_label(&id, input).await?;
            inner.dispatch(directive);
            to_js(&record)
        })
    }

    #[wasm_bindgen(js_name = "deleteLabel")]
    pub fn delete_label(&self, id: String) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let (existed, directive) = inner.conductor.delete_label(&id).await?;
            inner.dispatch(directive);
            Ok(JsValue::from_bool(existed))
        })
    }

    #[wasm_bindgen(js_name = "getLabel")]
    pub fn get_label(&self, id: String) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let record = inner.conductor.store().get(&id).await?;
            to_js(&record)
        })
    }

    #[wasm_bindgen(js_name = "getAll")]
    pub fn get_all(&self) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move { to_js(&inner.conductor.store().get_all().await?) })
    }

    pub fn search(&self, query: String) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move { to_js(&inner.conductor.store().search(&query).await?) })
    }

    /// `filter`: `{ tags?: string[], color?: string }`
    pub fn filter(&self, filter: JsValue) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let filter: LabelFilter = serde_wasm_bindgen::from_value(filter)
                .map_err(|e| JsValue::from(Error::InvalidLabel(e.to_string())))?;
            to_js(&inner.conductor.store().filter(&filter).await?)
        })
    }

    #[wasm_bindgen(js_name = "allTags")]
    pub fn all_tags(&self) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move { to_js(&inner.conductor.store().all_tags().await?) })
    }

    pub fn count(&self) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let n = inner.conductor.store().count().await?;
            Ok(JsValue::from_f64(n as f64))
        })
    }

    #[wasm_bindgen(js_name = "exportLabels")]
    pub fn export_labels(&self) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let json = inner.conductor.store().export().await?;
            Ok(JsValue::from_str(&json))
        })
    }

    /// Resolves to the number of imported labels
    #[wasm_bindgen(js_name = "importLabels")]
    pub fn import_labels(&self, json: String, merge: bool) -> Promise {
        let inner = Rc::clone(&self.inner);
        let mode = if merge { ImportMode::Merge } else { ImportMode::Replace };
        future_to_promise(async move {
            let (count, directive) = inner.conductor.import_labels(&json, mode).await?;
            inner.dispatch(directive);
            Ok(JsValue::from_f64(count as f64))
        })
    }

    #[wasm_bindgen(js_name = "clearLabels")]
    pub fn clear_labels(&self) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let directive = inner.conductor.clear_labels().await?;
            inner.dispatch(directive);
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Report of the most recent pass, or `undefined`
    #[wasm_bindgen(js_name = "lastReport")]
    pub fn last_report(&self) -> Result<JsValue, JsValue> {
        match self.inner.last_report.borrow().as_ref() {
            Some(report) => to_js(report),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    #[wasm_bindgen(js_name = "stateName")]
    pub fn state_name(&self) -> String {
        self.inner.conductor.state_name().to_string()
    }

    /// Stop observing and cancel pending work. Further calls are no-ops.
    pub fn dispose(&self) {
        let directive = self.inner.conductor.dispose();
        self.inner.dispatch(directive);
    }
}
