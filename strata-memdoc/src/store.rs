use crate::query_doc::QueryDoc;
use anyhow::{Result, anyhow, bail};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};
use strata_core::Value;
use uuid::Uuid;

/// One stored document: native field names to values. A field a document
/// never received is simply absent.
pub type Document = HashMap<String, Value>;

pub(crate) type Snapshot = HashMap<String, BTreeMap<Uuid, Document>>;

/// The embedded document engine: named collections of documents keyed by
/// their generated id.
///
/// Collections spring into existence on first write. Scans honor an
/// interrupt flag (the timeout canceller's target) checked between
/// documents, and transactions work on whole-store snapshots.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>> {
        self.collections
            .lock()
            .map_err(|_| anyhow!("document store mutex poisoned"))
    }

    /// Find matching documents, sorted and paged. `order` pairs a native
    /// field name with ascending-ness; missing fields sort first, like
    /// nulls.
    pub fn find(
        &self,
        collection: &str,
        query: &QueryDoc,
        order: &[(String, bool)],
        skip: Option<u64>,
        limit: Option<u64>,
        interrupt: &AtomicBool,
    ) -> Result<Vec<Document>> {
        let collections = self.lock()?;
        let mut matched = Vec::new();
        for (_, document) in collections.get(collection).into_iter().flatten() {
            if interrupt.load(AtomicOrdering::SeqCst) {
                bail!("collection scan interrupted");
            }
            if query.matches(document) {
                matched.push(document.clone());
            }
        }
        drop(collections);
        if !order.is_empty() {
            matched.sort_by(|left, right| {
                for (field, ascending) in order {
                    let null = Value::Null;
                    let l = left.get(field).unwrap_or(&null);
                    let r = right.get(field).unwrap_or(&null);
                    let ordering = if *ascending {
                        l.compare(r)
                    } else {
                        r.compare(l)
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }
        let skip = skip.unwrap_or(0) as usize;
        let mut paged: Vec<Document> = matched.into_iter().skip(skip).collect();
        if let Some(limit) = limit {
            paged.truncate(limit as usize);
        }
        Ok(paged)
    }

    pub fn count(&self, collection: &str, query: &QueryDoc, interrupt: &AtomicBool) -> Result<u64> {
        let collections = self.lock()?;
        let mut count = 0;
        for (_, document) in collections.get(collection).into_iter().flatten() {
            if interrupt.load(AtomicOrdering::SeqCst) {
                bail!("collection scan interrupted");
            }
            if query.matches(document) {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn insert(&self, collection: &str, id: Uuid, document: Document) -> Result<()> {
        let mut collections = self.lock()?;
        let collection = collections.entry(collection.to_string()).or_default();
        if collection.contains_key(&id) {
            bail!("duplicate document id {}", id);
        }
        collection.insert(id, document);
        Ok(())
    }

    /// Apply field changes to one document. Resolves to false when no
    /// document carries the id.
    pub fn update(&self, collection: &str, id: Uuid, changes: &[(String, Value)]) -> Result<bool> {
        let mut collections = self.lock()?;
        let Some(document) = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(&id))
        else {
            return Ok(false);
        };
        for (field, value) in changes {
            document.insert(field.clone(), value.clone());
        }
        Ok(true)
    }

    /// Remove documents by id; resolves to the number actually removed.
    pub fn delete_ids(&self, collection: &str, ids: &[Uuid]) -> Result<u64> {
        let mut collections = self.lock()?;
        let Some(collection) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut removed = 0;
        for id in ids {
            if collection.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn delete_matching(&self, collection: &str, query: &QueryDoc) -> Result<u64> {
        let mut collections = self.lock()?;
        let Some(collection) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = collection.len();
        collection.retain(|_, document| !query.matches(document));
        Ok((before - collection.len()) as u64)
    }

    pub(crate) fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.lock()?.clone())
    }

    pub(crate) fn restore(&self, snapshot: Snapshot) -> Result<()> {
        *self.lock()? = snapshot;
        Ok(())
    }
}
