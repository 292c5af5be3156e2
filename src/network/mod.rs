//! Topology and hierarchy stores plus the bulk passes that run over them.

pub mod capacity;
pub mod hierarchy;
pub mod load;
pub mod physical;
pub mod unsupplied;

pub use capacity::{CapacityPlanner, CapacityRules};
pub use hierarchy::HierarchyIndex;
pub use load::LoadAggregator;
pub use physical::PhysicalGraph;
pub use unsupplied::UnsuppliedSet;
