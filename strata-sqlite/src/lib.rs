//! Relational backend executing actions as parameterized SQL on SQLite.

mod backend;
mod convert;
mod read;
mod session;
mod sql_writer;
mod transaction;
mod write;

pub use backend::SqliteBackend;
pub use session::SqliteSession;
pub use sql_writer::{SqlStatement, SqliteSqlWriter};
pub use transaction::SqliteTransaction;
