pub mod document;
pub mod error;
pub mod memory;
pub mod path;
pub mod postgres;
pub mod store;

pub use document::{Document, Version, WriteIntent, WriteOp};
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use path::StorePath;
pub use postgres::PostgresDocumentStore;
pub use store::{DocumentStore, DocumentStoreExt};
