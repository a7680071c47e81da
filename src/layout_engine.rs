pub mod grid;
pub mod repository;
pub mod resolver;

pub use grid::GeometryError;
pub use repository::{LayoutRepository, RepositoryError};
pub use resolver::{Assignment, Resolution, ResolveError, resolve_layout};
