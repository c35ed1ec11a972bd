//! Label storage: records, the durable key-value seam and the cached store

pub mod record;
pub mod backend;
pub mod store;

pub use record::*;
pub use backend::*;
pub use store::*;
