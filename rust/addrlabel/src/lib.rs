//! AddrLabel: on-page address detection and label annotation
//!
//! A Rust/WASM implementation of the address labelling pipeline: find base58
//! public keys on a page, look up user-assigned labels, and rewrite each
//! occurrence in place.
//!
//! # Architecture
//!
//! ## Pipeline
//! - `identifier.rs` - Identifier: 32-44 char base58 validation + elision
//! - `scanner/link.rs` - LinkScanner: identifiers in `a[href]` targets
//! - `scanner/text.rs` - TextScanner: full and `prefix...suffix` forms in text
//! - `annotator.rs` - Annotator: in-place rewrite, reverse-offset text splits
//! - `scheduler.rs` - ChangeScheduler: debounced re-scan state machine
//! - `conductor.rs` - Conductor: runs scan → resolve → annotate passes
//!
//! ## Storage
//! - `labels/store.rs` - LabelStore: cached mapping, invalidate-on-write
//! - `labels/backend.rs` - KeyValueStore seam + MemoryStore
//!
//! ## Host
//! - `dom/` - `Dom` trait, arena `Document`, container denylist
//! - `web/` - WebDom, JsKeyValueStore, LabelEngine (wasm32 only)
//!
//! # Usage (native)
//! ```rust,ignore
//! use addrlabel::{Conductor, Document, Dom, EngineConfig, LabelInput, LabelStore, MemoryStore};
//!
//! let store = Rc::new(LabelStore::new(MemoryStore::new()));
//! let conductor: Conductor<_, NodeId> = Conductor::new(store, EngineConfig::default())?;
//! conductor.save_label(id, LabelInput::new("Treasury")).await?;
//! let report = conductor.rescan_all(&mut doc).await;
//! ```

pub mod identifier;
pub mod error;
pub mod config;
pub mod logging;
pub mod dom;
pub mod labels;
pub mod scanner;
pub mod annotator;
pub mod scheduler;
pub mod conductor;

#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(test)]
mod tests;

// Public exports
pub use identifier::*;
pub use error::{Error, Result};
pub use config::*;
pub use dom::*;
pub use labels::*;
pub use scanner::*;
pub use annotator::*;
pub use scheduler::*;
pub use conductor::*;

#[cfg(target_arch = "wasm32")]
pub use web::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("addrlabel v{}", env!("CARGO_PKG_VERSION"))
}
