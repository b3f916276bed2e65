use crate::{
    convert::{from_native, to_native},
    sql_writer::SqlStatement,
};
use anyhow::{Context, Result, anyhow};
use flume::Receiver;
use rusqlite::{Connection, InterruptHandle, OpenFlags, params_from_iter};
use std::sync::{Arc, Mutex, MutexGuard};
use strata_core::{CancelSignal, TimeoutCanceller, Value, excerpt};
use tokio::task::spawn_blocking;

/// Rows a streaming query hands back before coercion to declared types.
pub type RawRow = Vec<Value>;

/// One SQLite connection, shareable across tasks. The native handle only
/// runs one statement at a time, so it sits behind a mutex and all work
/// happens on the blocking pool.
#[derive(Clone)]
pub struct SqliteSession {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSession {
    pub fn open(target: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(target, flags)
            .with_context(|| format!("opening sqlite database {}", target))?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| anyhow!("sqlite connection mutex poisoned"))
    }

    /// Handle that can abort whatever statement the connection is running,
    /// safe to use from another thread. This is the timeout hook.
    pub fn interrupt_handle(&self) -> Result<InterruptHandle> {
        Ok(self.lock()?.get_interrupt_handle())
    }

    /// Run a statement that returns no rows. Resolves to the number of
    /// affected rows.
    pub async fn execute(&self, statement: SqlStatement) -> Result<usize> {
        let session = self.clone();
        spawn_blocking(move || {
            let connection = session.lock()?;
            let params = native_params(&statement.params)?;
            let affected = connection
                .prepare(&statement.sql)?
                .execute(params_from_iter(params))
                .with_context(|| format!("executing `{}`", excerpt(&statement.sql)))?;
            Ok(affected)
        })
        .await?
    }

    /// Run a statement and collect every row. Used for small result sets
    /// such as counts, aggregates and RETURNING clauses.
    pub async fn query_all(&self, statement: SqlStatement) -> Result<Vec<RawRow>> {
        let session = self.clone();
        spawn_blocking(move || {
            let connection = session.lock()?;
            let mut prepared = connection.prepare(&statement.sql)?;
            let params = native_params(&statement.params)?;
            let mut rows = prepared
                .query(params_from_iter(params))
                .with_context(|| format!("executing `{}`", excerpt(&statement.sql)))?;
            let mut result = Vec::new();
            while let Some(row) = rows.next()? {
                result.push(read_row(row));
            }
            Ok(result)
        })
        .await?
    }

    /// Run a statement and stream rows through a channel, checking the
    /// cancel signal between rows so a caller can stop mid-result.
    ///
    /// The canceller is disarmed here, when row iteration ends; an armed
    /// watchdog outliving its statement would interrupt whatever runs on
    /// this connection next.
    pub fn query_stream(
        &self,
        statement: SqlStatement,
        cancel: Option<CancelSignal>,
        canceller: TimeoutCanceller,
    ) -> Receiver<Result<RawRow>> {
        let (sender, receiver) = flume::unbounded();
        let session = self.clone();
        spawn_blocking(move || {
            let produce = || -> Result<()> {
                let connection = session.lock()?;
                let mut prepared = connection.prepare(&statement.sql)?;
                let params = native_params(&statement.params)?;
                let mut rows = prepared
                    .query(params_from_iter(params))
                    .with_context(|| format!("executing `{}`", excerpt(&statement.sql)))?;
                while let Some(row) = rows.next()? {
                    if cancel.as_ref().is_some_and(|cancel| cancel.is_requested()) {
                        break;
                    }
                    if sender.send(Ok(read_row(row))).is_err() {
                        // Receiver dropped, nobody wants the rest.
                        break;
                    }
                }
                Ok(())
            };
            let outcome = produce();
            canceller.disarm();
            if let Err(error) = outcome {
                let _ = sender.send(Err(error));
            }
        });
        receiver
    }
}

fn native_params(params: &[Value]) -> Result<Vec<rusqlite::types::Value>> {
    params.iter().map(|v| Ok(to_native(v)?)).collect()
}

fn read_row(row: &rusqlite::Row<'_>) -> RawRow {
    let count = row.as_ref().column_count();
    (0..count)
        .map(|i| match row.get_ref(i) {
            Ok(value) => from_native(value),
            Err(_) => Value::Null,
        })
        .collect()
}

/// Whether an execution failure is the connection being interrupted, which
/// is how a timeout abort surfaces from the native library.
pub fn is_interrupted(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<rusqlite::Error>())
        .any(|error| {
            matches!(
                error.sqlite_error_code(),
                Some(rusqlite::ErrorCode::OperationInterrupted)
            )
        })
}
