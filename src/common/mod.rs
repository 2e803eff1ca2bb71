// Common definitions shared by the planner modules

pub mod relids;
pub mod types;

pub use relids::Relids;
pub use types::{AttrNumber, Cost, EcId, RelId, RelIndex, TUPLES_PER_PAGE};
