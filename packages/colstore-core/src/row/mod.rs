//! Row handles, their per-table registry, and handover between contexts.

mod accessor;
mod handle;
mod handover;
mod registry;

pub use accessor::{ConstRow, Row, RowRead};
pub use handle::RowHandle;
pub use handover::HandoverPatch;
pub(crate) use registry::{RowRegistry, SlotKey};
