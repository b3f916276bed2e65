use crate::store::{MemoryStore, Snapshot};
use log::warn;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_core::{Error, Result, Transaction};

/// Snapshot-scoped unit of work on the document store.
///
/// Begin snapshots the whole store; rollback restores that snapshot and
/// commit replaces it with the current state, so the transaction stays
/// usable afterwards. Close discards anything after the last commit point
/// and releases the store handle.
pub struct MemdocTransaction {
    store: Option<Arc<MemoryStore>>,
    snapshot: Snapshot,
    started: Instant,
    slow_threshold: Duration,
}

impl MemdocTransaction {
    pub(crate) fn begin(store: Arc<MemoryStore>, slow_threshold: Duration) -> Result<Self> {
        let snapshot = store.snapshot().map_err(transaction_error)?;
        Ok(Self {
            store: Some(store),
            snapshot,
            started: Instant::now(),
            slow_threshold,
        })
    }

    pub(crate) fn store(&self) -> Result<&Arc<MemoryStore>> {
        self.store
            .as_ref()
            .ok_or(Error::ClosedTransaction("memdoc"))
    }
}

impl Transaction for MemdocTransaction {
    async fn commit(&mut self) -> Result<()> {
        let store = self.store()?;
        self.snapshot = store.snapshot().map_err(transaction_error)?;
        let elapsed = self.started.elapsed();
        if elapsed > self.slow_threshold {
            warn!("slow memdoc transaction: committed after {:?}", elapsed);
        }
        self.started = Instant::now();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let store = self.store()?;
        store
            .restore(self.snapshot.clone())
            .map_err(transaction_error)?;
        self.started = Instant::now();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(store) = self.store.take() {
            store
                .restore(std::mem::take(&mut self.snapshot))
                .map_err(transaction_error)?;
        }
        Ok(())
    }
}

fn transaction_error(source: anyhow::Error) -> Error {
    Error::execution("transaction", "memdoc", source)
}
