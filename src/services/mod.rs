pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, is_admin};
pub use auth_service_impl::RemoteAuthService;

pub mod entry_service;
pub mod entry_service_impl;
pub use entry_service::{EntryError, EntryService, aggregate_totals};
pub use entry_service_impl::RemoteEntryService;

pub mod user_service;
pub mod user_service_impl;
pub use user_service::{UserError, UserService};
pub use user_service_impl::RemoteUserService;
