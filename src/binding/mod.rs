//! Binding map management.
//!
//! Holds the persisted symmetric path map plus the scanner that populates the
//! alias directory from extraction outputs.

pub mod scan;
pub mod store;

pub use scan::{bind_extraction_outputs, extraction_dirs, ScanReport};
pub use store::{BindingStore, BINDINGS_VERSION};
