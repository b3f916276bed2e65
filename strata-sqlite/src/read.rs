use crate::{
    backend::SqliteBackend,
    session::{self, SqliteSession},
    sql_writer::SqliteSqlWriter,
};
use futures::StreamExt;
use log::debug;
use std::sync::Arc;
use strata_core::{
    AggregateAction, CountAction, CountResult, Error, FieldType, QueryAction, Record, RecordStream,
    Result, Session, TableDescriptor, TimeoutCanceller, Value, excerpt, secured_filter,
};

/// Map a native failure back into the taxonomy: an interrupted statement
/// after the canceller fired is a timeout, anything else an execution
/// error.
fn interpret(
    error: anyhow::Error,
    canceller: &TimeoutCanceller,
    op: &'static str,
    table: &TableDescriptor,
) -> Error {
    match canceller.deadline() {
        Some(deadline) if canceller.timed_out() && session::is_interrupted(&error) => {
            Error::Timeout(deadline)
        }
        _ => Error::execution(op, table.name.clone(), error),
    }
}

/// Arm the watchdog against this session's native handle.
fn arm(
    session: &SqliteSession,
    timeout: Option<std::time::Duration>,
    table: &TableDescriptor,
) -> Result<TimeoutCanceller> {
    if timeout.is_none() {
        return Ok(TimeoutCanceller::inert());
    }
    let handle = session
        .interrupt_handle()
        .map_err(|source| Error::execution("timeout", table.name.clone(), source))?;
    Ok(TimeoutCanceller::arm(timeout, move || handle.interrupt()))
}

pub(crate) async fn query(
    backend: &SqliteBackend,
    action: QueryAction,
    session: &Session,
    transaction: Option<&crate::SqliteTransaction>,
) -> Result<RecordStream> {
    let table = action.table;
    let filter = secured_filter(action.filter, &table, session);
    let statement = SqliteSqlWriter.select(&table, &filter)?;
    debug!("query `{}`: {}", table.name, excerpt(&statement.sql));
    let lease = backend.lease(transaction).await?;
    let canceller = arm(lease.session(), action.timeout, &table)?;
    // The producer disarms the canceller once the statement finishes, so an
    // empty or abandoned result set cannot leave a live watchdog behind.
    let receiver = lease
        .session()
        .query_stream(statement, action.cancel, canceller.clone());
    let names: Arc<[String]> = table.fields.iter().map(|f| f.name.clone()).collect();
    let types: Arc<[FieldType]> = table.fields.iter().map(|f| f.field_type).collect();
    let stream = receiver.into_stream().map(move |row| {
        row.map(|raw| materialize(&table, &names, &types, raw))
            .map_err(|error| interpret(error, &canceller, "query", &table))
    });
    Ok(stream.boxed())
}

/// Build one record from a raw row; a value that cannot be read as its
/// declared type becomes null with the problem noted on the record.
fn materialize(table: &TableDescriptor, names: &[String], types: &[FieldType], raw: Vec<Value>) -> Record {
    let mut record = Record::new(table.name.clone());
    for ((name, field_type), value) in names.iter().zip(types).zip(raw) {
        match field_type.coerce(value) {
            Ok(value) => record.put(name.clone(), value),
            Err(error) => {
                record.put(name.clone(), Value::Null);
                record.add_error(error.to_string());
            }
        }
    }
    record
}

pub(crate) async fn count(
    backend: &SqliteBackend,
    action: CountAction,
    session: &Session,
    transaction: Option<&crate::SqliteTransaction>,
) -> Result<CountResult> {
    let table = action.table;
    let mut filter = secured_filter(action.filter, &table, session);
    // A count has no use for ordering or paging.
    filter.order_by.clear();
    filter.skip = None;
    filter.limit = None;
    let statement = SqliteSqlWriter.count(&table, &filter, action.include_distinct)?;
    debug!("count `{}`: {}", table.name, excerpt(&statement.sql));
    let lease = backend.lease(transaction).await?;
    let canceller = arm(lease.session(), action.timeout, &table)?;
    let rows = lease
        .session()
        .query_all(statement)
        .await
        .map_err(|error| interpret(error, &canceller, "count", &table));
    canceller.disarm();
    let rows = rows?;
    let row = rows.first().ok_or_else(|| {
        Error::execution("count", table.name.clone(), anyhow::anyhow!("no row returned"))
    })?;
    Ok(CountResult {
        count: as_u64(row.first()),
        distinct_count: action.include_distinct.then(|| as_u64(row.get(1))),
    })
}

fn as_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Int64(v)) => u64::try_from(*v).unwrap_or(0),
        _ => 0,
    }
}

pub(crate) async fn aggregate(
    backend: &SqliteBackend,
    action: AggregateAction,
    session: &Session,
    transaction: Option<&crate::SqliteTransaction>,
) -> Result<Vec<Record>> {
    let table = action.table;
    let filter = secured_filter(action.filter, &table, session);
    let statement =
        SqliteSqlWriter.aggregate(&table, &filter, &action.group_by, &action.aggregates)?;
    debug!("aggregate `{}`: {}", table.name, excerpt(&statement.sql));

    // Result column layout: group fields first, then one column per
    // aggregate. Compute each column's declared type up front.
    let mut names = Vec::new();
    let mut types = Vec::new();
    for field in &action.group_by {
        let descriptor = table.field(field)?;
        names.push(descriptor.name.clone());
        types.push(descriptor.field_type);
    }
    for aggregate in &action.aggregates {
        let descriptor = table.field(&aggregate.field)?;
        names.push(aggregate.alias.clone());
        types.push(aggregate.result_type(descriptor.field_type));
    }

    let lease = backend.lease(transaction).await?;
    let canceller = arm(lease.session(), action.timeout, &table)?;
    let rows = lease
        .session()
        .query_all(statement)
        .await
        .map_err(|error| interpret(error, &canceller, "aggregate", &table));
    canceller.disarm();
    Ok(rows?
        .into_iter()
        .map(|raw| materialize(&table, &names, &types, raw))
        .collect())
}
