//! Transaction-scoped services: status publication, the dependency-read
//! table, the undo log, and the RCT table (spec §4.4–§4.6).

pub mod dependency;
pub mod rct;
pub mod status;
pub mod undo_log;

pub use dependency::DependencyReadTable;
pub use rct::RctTable;
pub use status::{LocalStatusService, Status, TransactionStatusService};
pub use undo_log::{MvccRef, MvccSlab, UndoEntry, UndoKind, UndoLog, VersionedChain};
