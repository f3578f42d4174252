pub mod backend;
pub mod memory;
pub mod session;
pub mod supabase;

pub use backend::{ApiError, AuthBackend, BackendError, Direction, Filter, Query, TableBackend};
pub use memory::MemoryBackend;
pub use session::SessionStore;
pub use supabase::SupabaseClient;
