use crate::{BooleanOperator, Criterion, Filter, Operator, TableDescriptor, Value};
use std::collections::{HashMap, HashSet};
use std::mem;

/// What a record security lock does when the locked field holds no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullBehavior {
    /// A session without key values may still see rows where the field is
    /// null; sessions with values additionally see the null rows.
    Allow,
    /// Rows are only visible when the field matches one of the session's
    /// key values; a session without values sees nothing.
    Deny,
}

/// A mandatory, caller-inexpressible predicate derived from the session's
/// authorization scope.
#[derive(Debug, Clone)]
pub struct SecurityLock {
    /// Security key type this lock is keyed by, e.g. `"store_id"`.
    pub key_type: String,
    /// Field on the table holding the key value. A dotted join chain is
    /// rejected at translation time by both shipped backends.
    pub field: String,
    pub null_behavior: NullBehavior,
}

impl SecurityLock {
    pub fn new(
        key_type: impl Into<String>,
        field: impl Into<String>,
        null_behavior: NullBehavior,
    ) -> Self {
        Self {
            key_type: key_type.into(),
            field: field.into(),
            null_behavior,
        }
    }
}

/// The caller's identity and authorization scope, passed explicitly into
/// every executor call.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user: Option<String>,
    keys: HashMap<String, Vec<Value>>,
    all_access: HashSet<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_key(mut self, key_type: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keys.entry(key_type.into()).or_default().push(value.into());
        self
    }

    /// Grant unrestricted access for one key type; locks keyed by it stop
    /// contributing predicates for this session.
    pub fn with_all_access(mut self, key_type: impl Into<String>) -> Self {
        self.all_access.insert(key_type.into());
        self
    }

    pub fn key_values(&self, key_type: &str) -> &[Value] {
        self.keys.get(key_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_all_access(&self, key_type: &str) -> bool {
        self.all_access.contains(key_type)
    }
}

/// Expand the table's security locks for this session and AND them with the
/// caller's filter.
///
/// The combination is structural: the caller's filter becomes one sub-filter
/// of a fresh AND wrapper, so a top-level OR in the caller's filter cannot
/// weaken a lock. Ordering and paging move onto the wrapper, which is what
/// the executor reads them from.
pub fn secured_filter(mut filter: Filter, table: &TableDescriptor, session: &Session) -> Filter {
    let mut locks = Vec::new();
    for lock in &table.locks {
        if session.has_all_access(&lock.key_type) {
            continue;
        }
        let values = session.key_values(&lock.key_type);
        let criterion = match (values.is_empty(), lock.null_behavior) {
            (true, NullBehavior::Allow) => {
                Criterion::new(&lock.field, Operator::IsBlank, [])
            }
            // No keys and no null grant: a predicate that can never match.
            (true, NullBehavior::Deny) => Criterion::new(&lock.field, Operator::In, []),
            (false, NullBehavior::Allow) => {
                Criterion::new(&lock.field, Operator::IsNullOrIn, values.to_vec())
            }
            (false, NullBehavior::Deny) => {
                Criterion::new(&lock.field, Operator::In, values.to_vec())
            }
        };
        locks.push(criterion);
    }
    if locks.is_empty() {
        return filter;
    }
    Filter {
        operator: BooleanOperator::And,
        criteria: locks,
        order_by: mem::take(&mut filter.order_by),
        skip: filter.skip.take(),
        limit: filter.limit.take(),
        subfilters: vec![filter],
    }
}
