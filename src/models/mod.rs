pub mod auth;
pub mod entry;
pub mod profile;

pub use auth::{AdminUserAttributes, AuthResponse, Session, User, UserAttributes};
pub use entry::{Entry, EntryFilters, EntryPatch, MethodHours, MethodTotals, NewEntry};
pub use profile::{NewProfile, Profile, ProfilePatch};
