//! Domain primitives shared by the services.

pub mod ids;

pub use ids::{EntryId, UserId};
