//! Region reconciler
//!
//! Keeps the engine's live regions consistent with a declarative
//! id → descriptor mapping, issuing only the creates, updates and removes
//! needed to close the gap.

mod layer;
mod reconcile;

pub use layer::RegionLayer;
pub use reconcile::{reconcile, ReconcileReport};
