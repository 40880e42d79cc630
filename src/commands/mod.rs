//! Command implementations for annorecon.

pub mod extract;
pub mod merge;
pub mod reconcile;
pub mod renumber;
pub mod restore;
pub mod split;
pub mod xml_merge;

pub use extract::{ExtractCommand, ExtractStats};
pub use merge::{MergeCommand, MergeStats};
pub use reconcile::{ReconcileCommand, ReconcileMode, ReconcileStats};
pub use renumber::{RenumberCommand, RenumberStats};
pub use restore::{RestoreCommand, RestoreStats, RestoreTarget};
pub use split::{SplitCommand, SplitStats};
pub use xml_merge::{XmlMergeCommand, XmlMergeStats, DEFAULT_ITERATION_STRIDE};
