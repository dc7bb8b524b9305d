pub mod project;

pub use project::ProjectWithCount;
