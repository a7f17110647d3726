pub mod item;
pub mod status;

pub use item::{normalize_tags, Comment, DependencyEdge, WorkItem};
pub use status::{ParsePriorityError, ParseStatusError, Priority, Status};
