pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
pub use store::{Document, DocumentStore, StoreError};

/// Fixed system collections; dynamic page collections exist alongside these.
pub const PAGES_COLLECTION: &str = "pages";
pub const ROLES_COLLECTION: &str = "roles";
pub const USERS_COLLECTION: &str = "users";
