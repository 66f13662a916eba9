pub mod config;
pub mod error;
pub mod db;
pub mod graph;
pub mod feedback;
pub mod server;
pub mod watch;

pub use config::Config;
pub use error::{BrainError, Result};
pub use graph::{Edge, GraphDocument, Node, RelationKind};
pub use graph::store::GraphStore;
pub use feedback::updater::LinkUpdater;
