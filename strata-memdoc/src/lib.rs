//! Embedded in-memory document backend with a query-document native API.

mod backend;
mod matcher;
mod query_doc;
mod read;
mod store;
mod transaction;
mod write;

pub use backend::MemdocBackend;
pub use matcher::Pattern;
pub use query_doc::{CompareOp, QueryDoc, translate};
pub use store::{Document, MemoryStore};
pub use transaction::MemdocTransaction;
