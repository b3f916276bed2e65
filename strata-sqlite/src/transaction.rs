use crate::{session::SqliteSession, sql_writer::SqlStatement};
use log::warn;
use std::time::{Duration, Instant};
use strata_core::{Error, Result, Transaction};

/// A native SQLite transaction on a dedicated session.
///
/// The session stays inside an explicit transaction for its whole life:
/// `BEGIN` runs on creation and again right after every commit or rollback,
/// so statements routed here are always transactional. `close` commits
/// nothing, it only releases the session.
pub struct SqliteTransaction {
    session: Option<SqliteSession>,
    started: Instant,
    slow_threshold: Duration,
}

impl SqliteTransaction {
    pub(crate) async fn begin(
        session: SqliteSession,
        slow_threshold: Duration,
    ) -> Result<Self> {
        run(&session, "BEGIN").await?;
        Ok(Self {
            session: Some(session),
            started: Instant::now(),
            slow_threshold,
        })
    }

    /// Session to route statements through, or an error when the
    /// transaction was already closed.
    pub(crate) fn session(&self) -> Result<&SqliteSession> {
        self.session
            .as_ref()
            .ok_or(Error::ClosedTransaction("sqlite"))
    }

    async fn end_and_restart(&mut self, terminator: &'static str) -> Result<()> {
        let session = self.session()?.clone();
        run(&session, terminator).await?;
        let elapsed = self.started.elapsed();
        if terminator == "COMMIT" && elapsed > self.slow_threshold {
            warn!("slow sqlite transaction: committed after {:?}", elapsed);
        }
        run(&session, "BEGIN").await?;
        self.started = Instant::now();
        Ok(())
    }
}

impl Transaction for SqliteTransaction {
    async fn commit(&mut self) -> Result<()> {
        self.end_and_restart("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.end_and_restart("ROLLBACK").await
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            // Abandon whatever the open transaction holds.
            run(&session, "ROLLBACK").await?;
        }
        Ok(())
    }
}

async fn run(session: &SqliteSession, sql: &str) -> Result<()> {
    session
        .execute(SqlStatement {
            sql: sql.into(),
            params: Vec::new(),
        })
        .await
        .map_err(|source| Error::execution("transaction", "sqlite", source))?;
    Ok(())
}
