//! Reconciliation of certified articles with the external spreadsheet.
//!
//! Delivery is at-least-once. Rows are keyed by fingerprint so a re-pushed
//! batch overwrites rather than duplicates.

pub mod engine;
pub mod error;
pub mod export;
pub mod sink;

pub use engine::{SyncConfig, SyncEngine, SyncOutcome};
pub use error::{ExportError, SinkError};
pub use export::{ExportRecord, LocalExport};
pub use sink::{HttpSheetSink, SheetRow, SheetSink};
