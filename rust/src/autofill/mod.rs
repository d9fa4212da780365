//! Auto-fill: keeps a group's part list in sync with a set of externally
//! discovered resources.

mod part_id;
mod reconcile;
mod rule;

pub use part_id::{autofill_part_id, stable_hash};
pub use reconcile::{reconcile, AutoFillReconciler, ReconcileOutcome, ReconciliationConflict};
pub use rule::find_autofill_resources;
