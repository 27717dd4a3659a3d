mod error;
mod flat;
mod force;
mod hierarchical;
pub mod sizing;
pub mod solver;
pub mod tree;
pub(crate) mod types;
mod viewport;

pub use error::{LayoutError, Result};
pub use flat::{FlatLayeredOptions, layout_flat_layered, layout_flat_layered_with};
pub use force::{ForceOptions, LinkDistance, XorShift64Star, layout_force_directed};
pub use hierarchical::{
    DEFAULT_CHILD_SIZE, HierarchicalOptions, layout_hierarchical, layout_hierarchical_with,
};
pub use sizing::{FLAT_DEFAULT_SIZE, collect_size, resolve_size};
pub use solver::{DagreSolver, LayoutSolver, SolverError, SolverGraph};
pub use types::*;
pub use viewport::{Placed, fit_to_viewport};
