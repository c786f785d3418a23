//! Soft-delete retention: the vault holding trashed files and the ledger that
//! indexes them.

pub mod ledger;
pub mod vault;

pub use ledger::{DeletionEvent, DeletionLedger, LEDGER_VERSION};
pub use vault::{PruneReport, TrashVault, TrashedFile};
