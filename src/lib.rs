#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod decoration;
pub mod handles;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod manifest;
pub mod render;
pub mod scan;
pub mod state;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use decoration::{EdgeDecoration, GraphTopology, IamDisplay, decorate_edge};
pub use handles::assign_closest_handles;
pub use ir::{Direction, Graph, GraphEdge, GraphNode, Position, Size};
pub use state::{ViewState, layout_for_topology};
