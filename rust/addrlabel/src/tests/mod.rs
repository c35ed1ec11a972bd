//! End-to-end scenarios over the arena document and in-memory storage


use std::rc::Rc;

use crate::conductor::Conductor;
use crate::config::EngineConfig;
use crate::dom::NodeId;
use crate::labels::{LabelStore, MemoryStore};

pub(crate) const ID_A: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
pub(crate) const ID_B: &str = "So11111111111111111111111111111111111111112";
/// Shares its first and last five characters with `ID_A`
pub(crate) const ID_A_TWIN: &str = "9WzDXzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzztAWWM";

/// Conductor whose clock advances one millisecond per read
pub(crate) fn conductor() -> Conductor<MemoryStore, NodeId> {
    let clock = std::cell::Cell::new(0i64);
    let store = LabelStore::with_clock(MemoryStore::new(), move || {
        clock.set(clock.get() + 1);
        1_700_000_000_000 + clock.get()
    });
    Conductor::new(Rc::new(store), EngineConfig::default()).unwrap()
}
