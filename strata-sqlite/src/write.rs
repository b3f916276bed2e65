use crate::{
    backend::SqliteBackend,
    session::SqliteSession,
    sql_writer::SqliteSqlWriter,
};
use log::debug;
use std::slice;
use strata_core::{
    DeleteAction, DeleteResult, DeleteTarget, Error, FieldType, InsertAction, Record, Result,
    Session, TableDescriptor, UpdateAction, Value, group_updates, merge_in_order, pages,
    partition_errored, secured_filter,
};

pub(crate) async fn insert(
    backend: &SqliteBackend,
    action: InsertAction,
    _session: &Session,
    transaction: Option<&crate::SqliteTransaction>,
) -> Result<Vec<Record>> {
    let table = action.table;
    let pk_type = table.primary_key_field()?.field_type;
    let columns: Vec<&str> = table
        .fields
        .iter()
        .filter(|f| f.name != table.primary_key)
        .map(|f| f.name.as_str())
        .collect();
    let mut batch = partition_errored(action.records);
    for (_, record) in &mut batch.ok {
        let unknown: Vec<String> = record
            .field_names()
            .iter()
            .filter(|name| table.fields.iter().all(|f| &f.name != *name))
            .cloned()
            .collect();
        for name in unknown {
            record.add_warning(format!("unknown field `{}` ignored", name));
        }
    }
    let lease = backend.lease(transaction).await?;
    let native = lease.session();
    for page in batch.ok.chunks_mut(backend.config.insert_page_size.max(1)) {
        let statement = {
            let refs: Vec<&Record> = page.iter().map(|(_, r)| r).collect();
            SqliteSqlWriter.insert_page(&table, &columns, &refs)?
        };
        debug!(
            "insert `{}`: {} record(s)",
            table.name,
            page.len()
        );
        match native.query_all(statement).await {
            Ok(keys) => assign_keys(page, &table.primary_key, pk_type, keys),
            Err(error) if page.len() == 1 => page[0].1.add_error(format!("{:#}", error)),
            Err(error) => {
                // One bad record must not sink its page: retry singly and
                // pin failures to the records that caused them.
                debug!(
                    "insert page on `{}` failed ({:#}), retrying record by record",
                    table.name, error
                );
                for entry in page.iter_mut() {
                    let statement =
                        SqliteSqlWriter.insert_page(&table, &columns, &[&entry.1])?;
                    match native.query_all(statement).await {
                        Ok(keys) => {
                            assign_keys(slice::from_mut(entry), &table.primary_key, pk_type, keys)
                        }
                        Err(error) => entry.1.add_error(format!("{:#}", error)),
                    }
                }
            }
        }
    }
    Ok(merge_in_order(batch.ok.into_iter().chain(batch.errored)))
}

/// Assign generated primary keys back onto the page's records, in page
/// order.
fn assign_keys(
    page: &mut [(usize, Record)],
    primary_key: &str,
    pk_type: FieldType,
    rows: Vec<Vec<Value>>,
) {
    for ((_, record), row) in page.iter_mut().zip(rows) {
        let raw = row.into_iter().next().unwrap_or(Value::Null);
        match pk_type.coerce(raw) {
            Ok(key) => record.put(primary_key, key),
            Err(error) => record.add_error(error.to_string()),
        }
    }
}

pub(crate) async fn update(
    backend: &SqliteBackend,
    action: UpdateAction,
    _session: &Session,
    transaction: Option<&crate::SqliteTransaction>,
) -> Result<Vec<Record>> {
    let table = action.table;
    let pk = table.primary_key.clone();
    let batch = partition_errored(action.records);
    let mut errored = batch.errored;
    let mut keyed: Vec<(usize, Record)> = Vec::new();
    for (index, mut record) in batch.ok {
        if record.get(&pk).is_some_and(|key| !key.is_null()) {
            keyed.push((index, record));
        } else {
            record.add_error(format!("missing `{}` value, record not updated", pk));
            errored.push((index, record));
        }
    }
    let mut groups = group_updates(&keyed, &pk);
    for group in &mut groups {
        let (known, unknown): (Vec<String>, Vec<String>) = group
            .fields
            .drain(..)
            .partition(|field| table.field(field).is_ok());
        for name in unknown {
            for &member in &group.members {
                keyed[member]
                    .1
                    .add_warning(format!("unknown field `{}` ignored", name));
            }
        }
        group.fields = known;
    }
    let lease = backend.lease(transaction).await?;
    let native = lease.session();
    for group in groups {
        if group.fields.is_empty() {
            for &member in &group.members {
                keyed[member].1.add_warning("no fields to change");
            }
            continue;
        }
        if group.uniform && group.members.len() > 1 {
            let template = keyed[group.members[0]].1.clone();
            for chunk in group.members.chunks(backend.config.in_list_page_size.max(1)) {
                let keys: Vec<Value> = chunk
                    .iter()
                    .map(|&m| keyed[m].1.get(&pk).cloned().unwrap_or(Value::Null))
                    .collect();
                let statement =
                    SqliteSqlWriter.update_batched(&table, &group.fields, &template, &keys)?;
                debug!(
                    "update `{}`: {} field(s) across {} record(s)",
                    table.name,
                    group.fields.len(),
                    chunk.len()
                );
                if let Err(error) = native.execute(statement).await {
                    debug!(
                        "batched update on `{}` failed ({:#}), retrying record by record",
                        table.name, error
                    );
                    for &member in chunk {
                        update_single(native, &table, &group.fields, &mut keyed[member].1).await?;
                    }
                }
            }
        } else {
            for &member in &group.members {
                update_single(native, &table, &group.fields, &mut keyed[member].1).await?;
            }
        }
    }
    Ok(merge_in_order(keyed.into_iter().chain(errored)))
}

async fn update_single(
    native: &SqliteSession,
    table: &TableDescriptor,
    fields: &[String],
    record: &mut Record,
) -> Result<()> {
    let statement = SqliteSqlWriter.update_single(table, fields, record)?;
    if let Err(error) = native.execute(statement).await {
        record.add_error(format!("{:#}", error));
    }
    Ok(())
}

pub(crate) async fn delete(
    backend: &SqliteBackend,
    action: DeleteAction,
    session: &Session,
    transaction: Option<&crate::SqliteTransaction>,
) -> Result<DeleteResult> {
    let table = action.table;
    let lease = backend.lease(transaction).await?;
    let native = lease.session();
    let mut result = DeleteResult::default();
    match action.target {
        DeleteTarget::Keys(keys) => {
            delete_keys(backend, native, &table, &keys, &mut result).await?;
        }
        DeleteTarget::Matching(filter) => {
            let filter = secured_filter(filter, &table, session);
            let statement = SqliteSqlWriter.delete_matching(&table, &filter)?;
            debug!("delete `{}` by predicate", table.name);
            match native.execute(statement).await {
                Ok(affected) => result.deleted += affected as u64,
                Err(error) => {
                    debug!(
                        "bulk delete on `{}` failed ({:#}), degrading to key list",
                        table.name, error
                    );
                    let statement = SqliteSqlWriter.select_keys(&table, &filter)?;
                    let keys: Vec<Value> = native
                        .query_all(statement)
                        .await
                        .map_err(|source| Error::execution("delete", table.name.clone(), source))?
                        .into_iter()
                        .filter_map(|row| row.into_iter().next())
                        .collect();
                    delete_keys(backend, native, &table, &keys, &mut result).await?;
                }
            }
        }
    }
    Ok(result)
}

async fn delete_keys(
    backend: &SqliteBackend,
    native: &SqliteSession,
    table: &TableDescriptor,
    keys: &[Value],
    result: &mut DeleteResult,
) -> Result<()> {
    for page in pages(keys, backend.config.in_list_page_size) {
        let statement = SqliteSqlWriter.delete_by_keys(table, page)?;
        match native.execute(statement).await {
            Ok(affected) => result.deleted += affected as u64,
            Err(error) if page.len() == 1 => {
                result.failed.push(failed_record(table, &page[0], error));
            }
            Err(error) => {
                debug!(
                    "paged delete on `{}` failed ({:#}), deleting singly",
                    table.name, error
                );
                for key in page {
                    let statement = SqliteSqlWriter.delete_by_keys(table, slice::from_ref(key))?;
                    match native.execute(statement).await {
                        Ok(affected) => result.deleted += affected as u64,
                        Err(error) => result.failed.push(failed_record(table, key, error)),
                    }
                }
            }
        }
    }
    Ok(())
}

fn failed_record(table: &TableDescriptor, key: &Value, error: anyhow::Error) -> Record {
    let mut record = Record::new(table.name.clone()).set(table.primary_key.clone(), key.clone());
    record.add_error(format!("{:#}", error));
    record
}
