//! Scanners: locate identifier occurrences in a document subtree
//!
//! - `link.rs` - LinkScanner: identifiers in `a[href]` targets
//! - `text.rs` - TextScanner: full and elided identifiers in plain text
//! - `matches.rs` - ScanMatch: what both scanners hand to the annotator
//!
//! Both scanners are read-only over the document.

pub mod matches;
pub mod link;
pub mod text;

pub use matches::*;
pub use link::*;
pub use text::*;
