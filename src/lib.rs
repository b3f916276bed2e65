//! One action layer over heterogeneous storage engines.
//!
//! Actions are described once, against the backend-neutral model in
//! `strata-core`, and execute unchanged on the relational backend
//! (`strata-sqlite`) or the document backend (`strata-memdoc`), with the
//! table's record security applied on every call.

pub use strata_core::*;
pub use strata_memdoc::{MemdocBackend, MemdocTransaction};
pub use strata_sqlite::{SqliteBackend, SqliteTransaction};
