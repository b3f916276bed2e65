use crate::{Aggregate, CancelSignal, Filter, Record, TableDescriptor, Value};
use std::sync::Arc;
use std::time::Duration;

/// Read a stream of records matching a filter, with ordering and paging.
#[derive(Debug, Clone)]
pub struct QueryAction {
    pub table: Arc<TableDescriptor>,
    pub filter: Filter,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelSignal>,
}

impl QueryAction {
    pub fn new(table: Arc<TableDescriptor>) -> Self {
        Self {
            table,
            filter: Filter::new(),
            timeout: None,
            cancel: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Count matching records, optionally also counting distinct primary keys
/// for callers whose filters may multiply rows through a to-many relation.
#[derive(Debug, Clone)]
pub struct CountAction {
    pub table: Arc<TableDescriptor>,
    pub filter: Filter,
    pub include_distinct: bool,
    pub timeout: Option<Duration>,
}

impl CountAction {
    pub fn new(table: Arc<TableDescriptor>) -> Self {
        Self {
            table,
            filter: Filter::new(),
            include_distinct: false,
            timeout: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn include_distinct(mut self) -> Self {
        self.include_distinct = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountResult {
    pub count: u64,
    pub distinct_count: Option<u64>,
}

/// Group matching records and compute named aggregates per group.
#[derive(Debug, Clone)]
pub struct AggregateAction {
    pub table: Arc<TableDescriptor>,
    pub filter: Filter,
    pub group_by: Vec<String>,
    pub aggregates: Vec<Aggregate>,
    pub timeout: Option<Duration>,
}

impl AggregateAction {
    pub fn new(table: Arc<TableDescriptor>) -> Self {
        Self {
            table,
            filter: Filter::new(),
            group_by: Vec::new(),
            aggregates: Vec::new(),
            timeout: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by.push(field.into());
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
pub struct InsertAction {
    pub table: Arc<TableDescriptor>,
    pub records: Vec<Record>,
}

impl InsertAction {
    pub fn new(table: Arc<TableDescriptor>, records: Vec<Record>) -> Self {
        Self { table, records }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateAction {
    pub table: Arc<TableDescriptor>,
    pub records: Vec<Record>,
}

impl UpdateAction {
    pub fn new(table: Arc<TableDescriptor>, records: Vec<Record>) -> Self {
        Self { table, records }
    }
}

/// What a delete targets: an explicit key list or everything matching a
/// filter.
#[derive(Debug, Clone)]
pub enum DeleteTarget {
    Keys(Vec<Value>),
    Matching(Filter),
}

#[derive(Debug, Clone)]
pub struct DeleteAction {
    pub table: Arc<TableDescriptor>,
    pub target: DeleteTarget,
}

impl DeleteAction {
    pub fn by_keys(table: Arc<TableDescriptor>, keys: Vec<Value>) -> Self {
        Self {
            table,
            target: DeleteTarget::Keys(keys),
        }
    }

    pub fn matching(table: Arc<TableDescriptor>, filter: Filter) -> Self {
        Self {
            table,
            target: DeleteTarget::Matching(filter),
        }
    }
}

/// Outcome of a delete: total rows removed plus per-key failures, reported
/// as records carrying their error.
#[derive(Debug, Default)]
pub struct DeleteResult {
    pub deleted: u64,
    pub failed: Vec<Record>,
}
