pub mod counters;
pub mod repository;
pub mod sources;

pub use counters::*;
pub use repository::*;
pub use sources::*;
