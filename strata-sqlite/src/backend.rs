use crate::{read, session::SqliteSession, transaction::SqliteTransaction, write};
use strata_core::{
    AggregateAction, Backend, BackendConfig, CountAction, CountResult, DeleteAction, DeleteResult,
    Error, InsertAction, Leased, QueryAction, Record, RecordStream, Result, Session, UpdateAction,
};
use uuid::Uuid;

/// The relational backend: actions execute as parameterized SQL against a
/// SQLite database.
///
/// Each executor call leases a session: a fresh connection when running
/// standalone, the transaction's own session when one is passed in.
pub struct SqliteBackend {
    target: String,
    pub(crate) config: BackendConfig,
    /// For in-memory databases, a connection that pins the shared-cache
    /// database for the backend's lifetime; without it the data would
    /// vanish between leases.
    _anchor: Option<SqliteSession>,
}

impl SqliteBackend {
    /// Open against a database file, created if absent.
    pub fn open(path: impl Into<String>) -> Result<Self> {
        Self::open_with_config(path, BackendConfig::default())
    }

    pub fn open_with_config(path: impl Into<String>, config: BackendConfig) -> Result<Self> {
        let target = path.into();
        // Fail early on an unusable target.
        connect(&target)?;
        Ok(Self {
            target,
            config,
            _anchor: None,
        })
    }

    /// Open a private in-memory database, visible to every session this
    /// backend leases and to nobody else.
    pub fn in_memory() -> Result<Self> {
        Self::in_memory_with_config(BackendConfig::default())
    }

    pub fn in_memory_with_config(config: BackendConfig) -> Result<Self> {
        let target = format!("file:strata-{}?mode=memory&cache=shared", Uuid::new_v4());
        let anchor = connect(&target)?;
        Ok(Self {
            target,
            config,
            _anchor: Some(anchor),
        })
    }

    /// Run a raw statement outside the action path, for schema setup.
    pub async fn execute_raw(&self, sql: &str) -> Result<usize> {
        let session = connect(&self.target)?;
        session
            .execute(crate::sql_writer::SqlStatement {
                sql: sql.into(),
                params: Vec::new(),
            })
            .await
            .map_err(|source| Error::execution("statement", "sqlite", source))
    }

    pub(crate) async fn lease(
        &self,
        transaction: Option<&SqliteTransaction>,
    ) -> Result<Leased<SqliteSession>> {
        match transaction {
            Some(transaction) => Ok(Leased::borrowed(transaction.session()?.clone())),
            None => Ok(Leased::owned(connect(&self.target)?)),
        }
    }
}

fn connect(target: &str) -> Result<SqliteSession> {
    SqliteSession::open(target).map_err(|source| Error::execution("connect", "sqlite", source))
}

impl Backend for SqliteBackend {
    type Transaction = SqliteTransaction;

    async fn begin(&self) -> Result<SqliteTransaction> {
        SqliteTransaction::begin(connect(&self.target)?, self.config.slow_transaction_threshold)
            .await
    }

    async fn query(
        &self,
        action: QueryAction,
        session: &Session,
        transaction: Option<&SqliteTransaction>,
    ) -> Result<RecordStream> {
        read::query(self, action, session, transaction).await
    }

    async fn count(
        &self,
        action: CountAction,
        session: &Session,
        transaction: Option<&SqliteTransaction>,
    ) -> Result<CountResult> {
        read::count(self, action, session, transaction).await
    }

    async fn aggregate(
        &self,
        action: AggregateAction,
        session: &Session,
        transaction: Option<&SqliteTransaction>,
    ) -> Result<Vec<Record>> {
        read::aggregate(self, action, session, transaction).await
    }

    async fn insert(
        &self,
        action: InsertAction,
        session: &Session,
        transaction: Option<&SqliteTransaction>,
    ) -> Result<Vec<Record>> {
        write::insert(self, action, session, transaction).await
    }

    async fn update(
        &self,
        action: UpdateAction,
        session: &Session,
        transaction: Option<&SqliteTransaction>,
    ) -> Result<Vec<Record>> {
        write::update(self, action, session, transaction).await
    }

    async fn delete(
        &self,
        action: DeleteAction,
        session: &Session,
        transaction: Option<&SqliteTransaction>,
    ) -> Result<DeleteResult> {
        write::delete(self, action, session, transaction).await
    }
}
