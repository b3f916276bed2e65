use crate::{
    backend::MemdocBackend,
    query_doc::{self, key_value},
    store::Document,
    transaction::MemdocTransaction,
};
use log::debug;
use strata_core::{
    DeleteAction, DeleteResult, DeleteTarget, Error, InsertAction, Record, Result, Session,
    UpdateAction, Value, merge_in_order, partition_errored, secured_filter,
};
use uuid::Uuid;

pub(crate) async fn insert(
    backend: &MemdocBackend,
    action: InsertAction,
    _session: &Session,
    transaction: Option<&MemdocTransaction>,
) -> Result<Vec<Record>> {
    let table = action.table;
    let pk = table.primary_key_field()?;
    let pk_name = pk.name.clone();
    let pk_column = pk.column.clone();
    let pk_type = pk.field_type;
    let mut batch = partition_errored(action.records);
    let lease = backend.lease(transaction)?;
    let store = lease.session();
    debug!("insert `{}`: {} record(s)", table.name, batch.ok.len());
    for (_, record) in &mut batch.ok {
        let mut document = Document::new();
        for name in record.field_names().to_vec() {
            if name == pk_name {
                continue;
            }
            match table.fields.iter().find(|f| f.name == name) {
                Some(field) => {
                    if let Some(value) = record.get(&name) {
                        document.insert(field.column.clone(), value.clone());
                    }
                }
                None => record.add_warning(format!("unknown field `{}` ignored", name)),
            }
        }
        let id = Uuid::new_v4();
        document.insert(pk_column.clone(), Value::Uuid(id));
        match store.insert(&table.store_name, id, document) {
            Ok(()) => match pk_type.coerce(Value::Uuid(id)) {
                Ok(key) => record.put(pk_name.clone(), key),
                Err(error) => record.add_error(error.to_string()),
            },
            Err(error) => record.add_error(format!("{:#}", error)),
        }
    }
    Ok(merge_in_order(batch.ok.into_iter().chain(batch.errored)))
}

pub(crate) async fn update(
    backend: &MemdocBackend,
    action: UpdateAction,
    _session: &Session,
    transaction: Option<&MemdocTransaction>,
) -> Result<Vec<Record>> {
    let table = action.table;
    let pk = table.primary_key.clone();
    let batch = partition_errored(action.records);
    let mut errored = batch.errored;
    let mut ok = Vec::new();
    for (index, mut record) in batch.ok {
        let parsed = record.get(&pk).filter(|v| !v.is_null()).map(key_value);
        match parsed {
            Some(Ok(Value::Uuid(id))) => ok.push((index, record, id)),
            Some(Ok(..)) | Some(Err(..)) => {
                record.add_error(format!("`{}` is not a valid document id", pk));
                errored.push((index, record));
            }
            None => {
                record.add_error(format!("missing `{}` value, record not updated", pk));
                errored.push((index, record));
            }
        }
    }
    let lease = backend.lease(transaction)?;
    let store = lease.session();
    debug!("update `{}`: {} record(s)", table.name, ok.len());
    for (_, record, id) in &mut ok {
        let mut changes: Vec<(String, Value)> = Vec::new();
        for name in record.field_names().to_vec() {
            if name == pk {
                continue;
            }
            match table.fields.iter().find(|f| f.name == name) {
                Some(field) => {
                    if let Some(value) = record.get(&name) {
                        changes.push((field.column.clone(), value.clone()));
                    }
                }
                None => record.add_warning(format!("unknown field `{}` ignored", name)),
            }
        }
        if changes.is_empty() {
            record.add_warning("no fields to change");
            continue;
        }
        if let Err(error) = store.update(&table.store_name, *id, &changes) {
            record.add_error(format!("{:#}", error));
        }
    }
    Ok(merge_in_order(
        ok.into_iter().map(|(i, r, _)| (i, r)).chain(errored),
    ))
}

pub(crate) async fn delete(
    backend: &MemdocBackend,
    action: DeleteAction,
    session: &Session,
    transaction: Option<&MemdocTransaction>,
) -> Result<DeleteResult> {
    let table = action.table;
    let lease = backend.lease(transaction)?;
    let store = lease.session();
    let mut result = DeleteResult::default();
    match action.target {
        DeleteTarget::Keys(keys) => {
            let mut ids = Vec::new();
            for key in keys {
                match key_value(&key) {
                    Ok(Value::Uuid(id)) => ids.push(id),
                    Ok(..) | Err(..) => {
                        let mut failed =
                            Record::new(table.name.clone()).set(table.primary_key.clone(), key);
                        failed.add_error("not a valid document id");
                        result.failed.push(failed);
                    }
                }
            }
            debug!("delete `{}`: {} id(s)", table.name, ids.len());
            result.deleted += store
                .delete_ids(&table.store_name, &ids)
                .map_err(|source| Error::execution("delete", table.name.clone(), source))?;
        }
        DeleteTarget::Matching(filter) => {
            let filter = secured_filter(filter, &table, session);
            let query = query_doc::translate(&filter, &table)?;
            debug!("delete `{}` by predicate", table.name);
            result.deleted += store
                .delete_matching(&table.store_name, &query)
                .map_err(|source| Error::execution("delete", table.name.clone(), source))?;
        }
    }
    Ok(result)
}
