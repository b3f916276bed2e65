use crate::{read, store::MemoryStore, transaction::MemdocTransaction, write};
use std::sync::Arc;
use strata_core::{
    AggregateAction, Backend, BackendConfig, CountAction, CountResult, DeleteAction, DeleteResult,
    InsertAction, Leased, QueryAction, Record, RecordStream, Result, Session, UpdateAction,
};

/// The document backend: actions execute against the embedded in-memory
/// store through its native query-document API.
pub struct MemdocBackend {
    store: Arc<MemoryStore>,
    pub(crate) config: BackendConfig,
}

impl MemdocBackend {
    pub fn new() -> Self {
        Self::with_config(BackendConfig::default())
    }

    pub fn with_config(config: BackendConfig) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            config,
        }
    }

    pub(crate) fn lease(
        &self,
        transaction: Option<&MemdocTransaction>,
    ) -> Result<Leased<Arc<MemoryStore>>> {
        match transaction {
            Some(transaction) => Ok(Leased::borrowed(Arc::clone(transaction.store()?))),
            None => Ok(Leased::owned(Arc::clone(&self.store))),
        }
    }
}

impl Default for MemdocBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemdocBackend {
    type Transaction = MemdocTransaction;

    async fn begin(&self) -> Result<MemdocTransaction> {
        MemdocTransaction::begin(Arc::clone(&self.store), self.config.slow_transaction_threshold)
    }

    async fn query(
        &self,
        action: QueryAction,
        session: &Session,
        transaction: Option<&MemdocTransaction>,
    ) -> Result<RecordStream> {
        read::query(self, action, session, transaction).await
    }

    async fn count(
        &self,
        action: CountAction,
        session: &Session,
        transaction: Option<&MemdocTransaction>,
    ) -> Result<CountResult> {
        read::count(self, action, session, transaction).await
    }

    async fn aggregate(
        &self,
        action: AggregateAction,
        session: &Session,
        transaction: Option<&MemdocTransaction>,
    ) -> Result<Vec<Record>> {
        read::aggregate(self, action, session, transaction).await
    }

    async fn insert(
        &self,
        action: InsertAction,
        session: &Session,
        transaction: Option<&MemdocTransaction>,
    ) -> Result<Vec<Record>> {
        write::insert(self, action, session, transaction).await
    }

    async fn update(
        &self,
        action: UpdateAction,
        session: &Session,
        transaction: Option<&MemdocTransaction>,
    ) -> Result<Vec<Record>> {
        write::update(self, action, session, transaction).await
    }

    async fn delete(
        &self,
        action: DeleteAction,
        session: &Session,
        transaction: Option<&MemdocTransaction>,
    ) -> Result<DeleteResult> {
        write::delete(self, action, session, transaction).await
    }
}
