use crate::{
    backend::MemdocBackend,
    query_doc,
    store::{Document, MemoryStore},
    transaction::MemdocTransaction,
};
use futures::stream;
use log::debug;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use strata_core::{
    Aggregate, AggregateAction, AggregateFunction, CountAction, CountResult, Error, Filter,
    QueryAction, Record, RecordStream, Result, Session, TableDescriptor, TimeoutCanceller, Value,
    secured_filter,
};
use tokio::task::spawn_blocking;

/// Interrupt flag wired to the timeout canceller; the store checks it
/// between documents.
fn armed_interrupt(timeout: Option<std::time::Duration>) -> (Arc<AtomicBool>, TimeoutCanceller) {
    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    let canceller = TimeoutCanceller::arm(timeout, move || {
        flag.store(true, AtomicOrdering::SeqCst);
    });
    (interrupt, canceller)
}

/// Collection scans hold the store mutex and walk every document, so they
/// run on the blocking pool like the relational driver's native calls.
async fn scan<T, F>(task: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    spawn_blocking(task).await?
}

fn interpret(error: anyhow::Error, canceller: &TimeoutCanceller, op: &'static str, table: &TableDescriptor) -> Error {
    match canceller.deadline() {
        Some(deadline) if canceller.timed_out() => Error::Timeout(deadline),
        _ => Error::execution(op, table.name.clone(), error),
    }
}

fn order_columns(filter: &Filter, table: &TableDescriptor) -> Result<Vec<(String, bool)>> {
    filter
        .order_by
        .iter()
        .map(|order| Ok((table.field(&order.field)?.column.clone(), order.ascending)))
        .collect()
}

fn materialize(table: &TableDescriptor, document: &Document) -> Record {
    let mut record = Record::new(table.name.clone());
    for field in &table.fields {
        let value = document.get(&field.column).cloned().unwrap_or(Value::Null);
        match field.field_type.coerce(value) {
            Ok(value) => record.put(field.name.clone(), value),
            Err(error) => {
                record.put(field.name.clone(), Value::Null);
                record.add_error(error.to_string());
            }
        }
    }
    record
}

pub(crate) async fn query(
    backend: &MemdocBackend,
    action: QueryAction,
    session: &Session,
    transaction: Option<&MemdocTransaction>,
) -> Result<RecordStream> {
    let table = action.table;
    let filter = secured_filter(action.filter, &table, session);
    let query = query_doc::translate(&filter, &table)?;
    let order = order_columns(&filter, &table)?;
    debug!("query `{}`: {:?}", table.name, query);
    let lease = backend.lease(transaction)?;
    let (interrupt, canceller) = armed_interrupt(action.timeout);
    let store = Arc::clone(lease.session());
    let collection = table.store_name.clone();
    let (skip, limit) = (filter.skip, filter.limit);
    let found = scan(move || store.find(&collection, &query, &order, skip, limit, &interrupt))
        .await
        .map_err(|error| interpret(error, &canceller, "query", &table));
    canceller.disarm();
    let mut records = Vec::new();
    for document in found? {
        if action.cancel.as_ref().is_some_and(|c| c.is_requested()) {
            break;
        }
        records.push(Ok(materialize(&table, &document)));
    }
    Ok(Box::pin(stream::iter(records)))
}

pub(crate) async fn count(
    backend: &MemdocBackend,
    action: CountAction,
    session: &Session,
    transaction: Option<&MemdocTransaction>,
) -> Result<CountResult> {
    let table = action.table;
    let filter = secured_filter(action.filter, &table, session);
    let query = query_doc::translate(&filter, &table)?;
    debug!("count `{}`: {:?}", table.name, query);
    let lease = backend.lease(transaction)?;
    let (interrupt, canceller) = armed_interrupt(action.timeout);
    let store = Arc::clone(lease.session());
    let collection = table.store_name.clone();
    let count = scan(move || store.count(&collection, &query, &interrupt))
        .await
        .map_err(|error| interpret(error, &canceller, "count", &table));
    canceller.disarm();
    let count = count?;
    Ok(CountResult {
        count,
        // Documents are keyed by id, so every match is already distinct.
        distinct_count: action.include_distinct.then_some(count),
    })
}

pub(crate) async fn aggregate(
    backend: &MemdocBackend,
    action: AggregateAction,
    session: &Session,
    transaction: Option<&MemdocTransaction>,
) -> Result<Vec<Record>> {
    let table = action.table;
    let filter = secured_filter(action.filter, &table, session);
    let query = query_doc::translate(&filter, &table)?;
    let group_columns: Vec<(String, strata_core::FieldType)> = action
        .group_by
        .iter()
        .map(|field| {
            let descriptor = table.field(field)?;
            Ok((descriptor.column.clone(), descriptor.field_type))
        })
        .collect::<Result<_>>()?;
    // Validate aggregate fields before scanning.
    for aggregate in &action.aggregates {
        table.field(&aggregate.field)?;
    }
    debug!("aggregate `{}`: {:?}", table.name, query);
    let lease = backend.lease(transaction)?;
    let (interrupt, canceller) = armed_interrupt(action.timeout);
    let store = Arc::clone(lease.session());
    let collection = table.store_name.clone();
    let found = scan(move || store.find(&collection, &query, &[], None, None, &interrupt))
        .await
        .map_err(|error| interpret(error, &canceller, "aggregate", &table));
    canceller.disarm();
    let found = found?;

    // Group documents by their group-field values.
    let mut groups: Vec<(Vec<Value>, Vec<&Document>)> = Vec::new();
    for document in &found {
        let key: Vec<Value> = group_columns
            .iter()
            .map(|(column, _)| document.get(column).cloned().unwrap_or(Value::Null))
            .collect();
        match groups.iter_mut().find(|(existing, _)| {
            existing.iter().zip(&key).all(|(l, r)| l.matches(r))
        }) {
            Some((_, members)) => members.push(document),
            None => groups.push((key, vec![document])),
        }
    }
    groups.sort_by(|(left, _), (right, _)| {
        left.iter()
            .zip(right)
            .map(|(l, r)| l.compare(r))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    let mut records = Vec::new();
    for (key, members) in groups {
        let mut record = Record::new(table.name.clone());
        for ((column, field_type), value) in group_columns.iter().zip(key) {
            let name = table
                .fields
                .iter()
                .find(|f| &f.column == column)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| column.clone());
            match field_type.coerce(value) {
                Ok(value) => record.put(name, value),
                Err(error) => {
                    record.put(name, Value::Null);
                    record.add_error(error.to_string());
                }
            }
        }
        for aggregate in &action.aggregates {
            let descriptor = table.field(&aggregate.field)?;
            let value = compute(aggregate, &descriptor.column, &members);
            match aggregate.result_type(descriptor.field_type).coerce(value) {
                Ok(value) => record.put(aggregate.alias.clone(), value),
                Err(error) => {
                    record.put(aggregate.alias.clone(), Value::Null);
                    record.add_error(error.to_string());
                }
            }
        }
        records.push(record);
    }
    Ok(records)
}

/// Compute one aggregate over a group, skipping missing and null fields the
/// way SQL aggregates skip nulls.
fn compute(aggregate: &Aggregate, column: &str, members: &[&Document]) -> Value {
    let values = || {
        members
            .iter()
            .filter_map(|d| d.get(column))
            .filter(|v| !v.is_null())
    };
    match aggregate.function {
        AggregateFunction::Count => Value::Int64(values().count() as i64),
        AggregateFunction::CountDistinct => {
            let mut distinct: Vec<&Value> = Vec::new();
            for value in values() {
                if !distinct.iter().any(|seen| seen.matches(value)) {
                    distinct.push(value);
                }
            }
            Value::Int64(distinct.len() as i64)
        }
        AggregateFunction::Sum => match sum(values()) {
            Some((sum, _)) => Value::Decimal(sum),
            None => Value::Null,
        },
        AggregateFunction::Avg => match sum(values()) {
            Some((sum, count)) => Value::Decimal(sum / Decimal::from(count)),
            None => Value::Null,
        },
        AggregateFunction::Min => values()
            .min_by(|l, r| l.compare(r))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateFunction::Max => values()
            .max_by(|l, r| l.compare(r))
            .cloned()
            .unwrap_or(Value::Null),
    }
}

fn sum<'a>(values: impl Iterator<Item = &'a Value>) -> Option<(Decimal, i64)> {
    let mut total = Decimal::ZERO;
    let mut count = 0;
    for value in values {
        total += value.to_decimal()?;
        count += 1;
    }
    (count > 0).then_some((total, count))
}
