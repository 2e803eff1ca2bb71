use std::fmt;

/// Base relation identifier (range table index)
pub type RelId = u32;

/// Attribute number within a relation
pub type AttrNumber = i16;

/// Equivalence class identifier
pub type EcId = u32;

/// Estimated cost, in abstract planner units
pub type Cost = f64;

/// Handle of a relation inside the planner's relation arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelIndex(pub usize);

impl fmt::Display for RelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Default estimate for the number of tuples on one page
pub const TUPLES_PER_PAGE: f64 = 100.0;
