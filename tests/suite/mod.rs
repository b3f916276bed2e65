//! Behavioural suite run against every backend.
//!
//! Each function drives one slice of the action layer through the
//! `Backend` trait only, so the relational and document backends must
//! agree on everything asserted here.

use futures::StreamExt;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use strata::{
    Aggregate, AggregateAction, AggregateFunction, Backend, CancelSignal, CountAction,
    DeleteAction, Error, FieldDescriptor, FieldType, Filter, InsertAction, NullBehavior, Operator,
    OrderBy, QueryAction, Record, RecordStream, SecurityLock, Session, TableDescriptor,
    Transaction, UpdateAction, Value,
};

/// The orders table both backends are exercised with. The primary-key
/// declared type differs per backend: integers for the relational store,
/// text ids for the document store.
pub fn orders(pk_type: FieldType) -> Arc<TableDescriptor> {
    Arc::new(TableDescriptor::new(
        "order",
        "orders",
        "id",
        vec![
            FieldDescriptor::new("id", "id", pk_type),
            FieldDescriptor::new("status", "status", FieldType::Text),
            FieldDescriptor::new("region", "region", FieldType::Text),
            FieldDescriptor::new("total", "total", FieldType::Integer),
            FieldDescriptor::new("amount", "amount", FieldType::Decimal),
        ],
    ))
}

/// Same table with region-keyed record security.
pub fn locked_orders(pk_type: FieldType, null_behavior: NullBehavior) -> Arc<TableDescriptor> {
    let mut table = Arc::unwrap_or_clone(orders(pk_type));
    table = table.lock(SecurityLock::new("region", "region", null_behavior));
    Arc::new(table)
}

fn dec(units: i64, scale: u32) -> Decimal {
    Decimal::new(units, scale)
}

/// Six orders: three east, two west, one with no region.
pub async fn seed<B: Backend>(backend: &B, table: &Arc<TableDescriptor>) -> Vec<Record> {
    let rows: [(&str, Option<&str>, i64, Decimal); 6] = [
        ("OPEN", Some("east"), 10, dec(15, 1)),
        ("OPEN", Some("east"), 30, dec(25, 1)),
        ("OPEN", Some("west"), 20, dec(35, 1)),
        ("CLOSED", Some("west"), 40, dec(45, 1)),
        ("CLOSED", Some("east"), 50, dec(55, 1)),
        ("HELD", None, 60, dec(65, 1)),
    ];
    let records = rows
        .iter()
        .map(|(status, region, total, amount)| {
            Record::new("order")
                .set("status", *status)
                .set("region", region.map(str::to_string))
                .set("total", *total)
                .set("amount", *amount)
        })
        .collect();
    let inserted = backend
        .insert(InsertAction::new(Arc::clone(table), records), &Session::new(), None)
        .await
        .expect("seed insert");
    for record in &inserted {
        assert!(!record.has_errors(), "seed record errored: {:?}", record.errors);
        assert!(record.get("id").is_some_and(|id| !id.is_null()));
    }
    inserted
}

pub async fn drain(stream: RecordStream) -> Vec<Record> {
    stream
        .map(|record| record.expect("stream record"))
        .collect()
        .await
}

async fn run_query<B: Backend>(
    backend: &B,
    table: &Arc<TableDescriptor>,
    session: &Session,
    filter: Filter,
) -> Vec<Record> {
    let stream = backend
        .query(QueryAction::new(Arc::clone(table)).filter(filter), session, None)
        .await
        .expect("query");
    drain(stream).await
}

fn totals(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .map(|r| match r.get("total") {
            Some(Value::Int64(v)) => *v,
            other => panic!("unexpected total {:?}", other),
        })
        .collect()
}

pub async fn inserts_assign_generated_keys<B: Backend>(backend: &B, table: Arc<TableDescriptor>) {
    let inserted = seed(backend, &table).await;
    assert_eq!(inserted.len(), 6);
    // Keys are distinct and typed per the descriptor.
    for pair in inserted.windows(2) {
        assert_ne!(pair[0].get("id"), pair[1].get("id"));
    }
}

pub async fn insert_skips_errored_and_warns_unknown_fields<B: Backend>(
    backend: &B,
    table: Arc<TableDescriptor>,
) {
    let mut poisoned = Record::new("order").set("status", "OPEN");
    poisoned.add_error("rejected upstream");
    let odd = Record::new("order")
        .set("status", "OPEN")
        .set("flavor", "grape");
    let out = backend
        .insert(
            InsertAction::new(Arc::clone(&table), vec![poisoned, odd]),
            &Session::new(),
            None,
        )
        .await
        .expect("insert");
    assert_eq!(out.len(), 2);
    // The errored record is echoed unchanged, no key assigned.
    assert!(out[0].has_errors());
    assert!(out[0].get("id").is_none());
    // The unknown field is skipped with a warning, the record still lands.
    assert!(!out[1].has_errors());
    assert!(out[1].get("id").is_some());
    assert!(out[1].warnings.iter().any(|w| w.contains("flavor")));
    let all = run_query(backend, &table, &Session::new(), Filter::new()).await;
    assert_eq!(all.len(), 1);
}

pub async fn query_filters_orders_and_pages<B: Backend>(backend: &B, table: Arc<TableDescriptor>) {
    seed(backend, &table).await;
    let session = Session::new();

    let open = Filter::new()
        .equals("status", "OPEN")
        .order_by(OrderBy::desc("total"));
    let records = run_query(backend, &table, &session, open.clone()).await;
    assert_eq!(totals(&records), [30, 20, 10]);
    assert_eq!(
        records[0].get("status"),
        Some(&Value::Varchar("OPEN".into()))
    );

    let paged = run_query(backend, &table, &session, open.skip(1).limit(1)).await;
    assert_eq!(totals(&paged), [20]);

    let either = Filter::new().subfilter(
        Filter::or()
            .equals("total", 10)
            .criterion("total", Operator::GreaterThanOrEquals, [Value::Int64(60)]),
    );
    let records = run_query(backend, &table, &session, either).await;
    assert_eq!(records.len(), 2);

    let none = Filter::new().criterion("status", Operator::In, []);
    assert!(run_query(backend, &table, &session, none).await.is_empty());

    let blank_region = Filter::new().criterion("region", Operator::IsBlank, []);
    let records = run_query(backend, &table, &session, blank_region).await;
    assert_eq!(totals(&records), [60]);

    let contains = Filter::new().criterion(
        "status",
        Operator::Contains,
        [Value::Varchar("PE".into())],
    );
    assert_eq!(run_query(backend, &table, &session, contains).await.len(), 3);
}

pub async fn count_matches_and_reports_distinct<B: Backend>(
    backend: &B,
    table: Arc<TableDescriptor>,
) {
    seed(backend, &table).await;
    let session = Session::new();
    let result = backend
        .count(
            CountAction::new(Arc::clone(&table))
                .filter(Filter::new().equals("status", "CLOSED")),
            &session,
            None,
        )
        .await
        .expect("count");
    assert_eq!(result.count, 2);
    assert_eq!(result.distinct_count, None);

    let result = backend
        .count(
            CountAction::new(Arc::clone(&table)).include_distinct(),
            &session,
            None,
        )
        .await
        .expect("count distinct");
    assert_eq!(result.count, 6);
    assert_eq!(result.distinct_count, Some(6));
}

pub async fn aggregates_group_and_compute<B: Backend>(backend: &B, table: Arc<TableDescriptor>) {
    seed(backend, &table).await;
    let action = AggregateAction::new(Arc::clone(&table))
        .group_by("region")
        .aggregate(Aggregate::new("total", AggregateFunction::Count, "n"))
        .aggregate(Aggregate::new("total", AggregateFunction::Sum, "total_sum"))
        .aggregate(Aggregate::new("total", AggregateFunction::Avg, "avg_total"))
        .aggregate(Aggregate::new("amount", AggregateFunction::Min, "min_amount"))
        .aggregate(Aggregate::new("amount", AggregateFunction::Max, "max_amount"));
    let records = backend
        .aggregate(action, &Session::new(), None)
        .await
        .expect("aggregate");
    assert_eq!(records.len(), 3);
    let group = |region: &Value| {
        records
            .iter()
            .find(|r| r.get("region") == Some(region))
            .unwrap_or_else(|| panic!("missing group {}", region))
    };

    let east = group(&Value::Varchar("east".into()));
    assert_eq!(east.get("n"), Some(&Value::Int64(3)));
    assert_eq!(east.get("total_sum"), Some(&Value::Int64(90)));
    assert_eq!(east.get("avg_total"), Some(&Value::Decimal(dec(30, 0))));
    assert_eq!(east.get("min_amount"), Some(&Value::Decimal(dec(15, 1))));
    assert_eq!(east.get("max_amount"), Some(&Value::Decimal(dec(55, 1))));

    let west = group(&Value::Varchar("west".into()));
    assert_eq!(west.get("n"), Some(&Value::Int64(2)));
    assert_eq!(west.get("avg_total"), Some(&Value::Decimal(dec(30, 0))));

    let blank = group(&Value::Null);
    assert_eq!(blank.get("n"), Some(&Value::Int64(1)));
    assert_eq!(blank.get("total_sum"), Some(&Value::Int64(60)));
}

pub async fn deny_lock_without_keys_hides_everything<B: Backend>(
    backend: &B,
    table: Arc<TableDescriptor>,
    locked: Arc<TableDescriptor>,
) {
    seed(backend, &table).await;
    let session = Session::new();
    // Even a match-all filter yields nothing.
    assert!(run_query(backend, &locked, &session, Filter::new()).await.is_empty());
    let count = backend
        .count(CountAction::new(Arc::clone(&locked)), &session, None)
        .await
        .expect("count");
    assert_eq!(count.count, 0);
}

pub async fn locks_scope_rows_to_session_keys<B: Backend>(
    backend: &B,
    table: Arc<TableDescriptor>,
    deny: Arc<TableDescriptor>,
    allow: Arc<TableDescriptor>,
) {
    seed(backend, &table).await;

    let east = Session::new().with_key("region", "east");
    assert_eq!(run_query(backend, &deny, &east, Filter::new()).await.len(), 3);

    // ALLOW additionally admits rows where the locked field is blank.
    assert_eq!(run_query(backend, &allow, &east, Filter::new()).await.len(), 4);
    let keyless = Session::new();
    let records = run_query(backend, &allow, &keyless, Filter::new()).await;
    assert_eq!(totals(&records), [60]);

    let unrestricted = Session::new().with_all_access("region");
    assert_eq!(
        run_query(backend, &deny, &unrestricted, Filter::new()).await.len(),
        6
    );
}

pub async fn caller_or_cannot_bypass_lock<B: Backend>(
    backend: &B,
    table: Arc<TableDescriptor>,
    locked: Arc<TableDescriptor>,
) {
    seed(backend, &table).await;
    let east = Session::new().with_key("region", "east");
    // A top-level OR in the caller's filter still runs inside the lock.
    let wide = Filter::or().equals("status", "OPEN").equals("status", "HELD");
    let records = run_query(backend, &locked, &east, wide).await;
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.get("region"), Some(&Value::Varchar("east".into())));
    }
}

pub async fn updates_apply_by_group<B: Backend>(backend: &B, table: Arc<TableDescriptor>) {
    let inserted = seed(backend, &table).await;
    let key = |i: usize| inserted[i].get("id").cloned().expect("seeded key");

    // Three records changing the same field to the same value, one
    // changing a different field set.
    let updates = vec![
        Record::new("order").set("id", key(0)).set("status", "ARCHIVED"),
        Record::new("order").set("id", key(1)).set("status", "ARCHIVED"),
        Record::new("order").set("id", key(4)).set("status", "ARCHIVED"),
        Record::new("order").set("id", key(5)).set("amount", dec(99, 1)),
    ];
    let out = backend
        .update(UpdateAction::new(Arc::clone(&table), updates), &Session::new(), None)
        .await
        .expect("update");
    assert_eq!(out.len(), 4);
    assert!(out.iter().all(|r| !r.has_errors()));

    let session = Session::new();
    let archived = run_query(
        backend,
        &table,
        &session,
        Filter::new().equals("status", "ARCHIVED"),
    )
    .await;
    assert_eq!(archived.len(), 3);
    let held = run_query(
        backend,
        &table,
        &session,
        Filter::new().equals("status", "HELD"),
    )
    .await;
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].get("amount"), Some(&Value::Decimal(dec(99, 1))));
}

pub async fn update_without_key_errors_record<B: Backend>(
    backend: &B,
    table: Arc<TableDescriptor>,
) {
    let inserted = seed(backend, &table).await;
    let updates = vec![
        Record::new("order").set("status", "LOST"),
        Record::new("order")
            .set("id", inserted[0].get("id").cloned().expect("key"))
            .set("status", "FOUND"),
    ];
    let out = backend
        .update(UpdateAction::new(Arc::clone(&table), updates), &Session::new(), None)
        .await
        .expect("update");
    // Input order is preserved; only the keyless record fails.
    assert!(out[0].has_errors());
    assert!(!out[1].has_errors());
    let found = run_query(
        backend,
        &table,
        &Session::new(),
        Filter::new().equals("status", "FOUND"),
    )
    .await;
    assert_eq!(found.len(), 1);
}

pub async fn delete_by_keys_and_by_filter<B: Backend>(backend: &B, table: Arc<TableDescriptor>) {
    let inserted = seed(backend, &table).await;
    let keys = vec![
        inserted[0].get("id").cloned().expect("key"),
        inserted[1].get("id").cloned().expect("key"),
    ];
    let result = backend
        .delete(DeleteAction::by_keys(Arc::clone(&table), keys), &Session::new(), None)
        .await
        .expect("delete by keys");
    assert_eq!(result.deleted, 2);
    assert!(result.failed.is_empty());

    let result = backend
        .delete(
            DeleteAction::matching(Arc::clone(&table), Filter::new().equals("status", "CLOSED")),
            &Session::new(),
            None,
        )
        .await
        .expect("delete matching");
    assert_eq!(result.deleted, 2);

    let rest = run_query(backend, &table, &Session::new(), Filter::new()).await;
    assert_eq!(rest.len(), 2);
}

pub async fn delete_respects_locks<B: Backend>(
    backend: &B,
    table: Arc<TableDescriptor>,
    locked: Arc<TableDescriptor>,
) {
    seed(backend, &table).await;
    let east = Session::new().with_key("region", "east");
    let result = backend
        .delete(
            DeleteAction::matching(Arc::clone(&locked), Filter::new()),
            &east,
            None,
        )
        .await
        .expect("delete");
    assert_eq!(result.deleted, 3);
    let rest = run_query(backend, &table, &Session::new(), Filter::new()).await;
    assert_eq!(rest.len(), 3);
    assert!(rest.iter().all(|r| {
        r.get("region") != Some(&Value::Varchar("east".into()))
    }));
}

pub async fn transaction_rollback_and_commit<B: Backend>(
    backend: &B,
    table: Arc<TableDescriptor>,
) {
    let record = || vec![Record::new("order").set("status", "OPEN").set("total", 1)];
    let mut tx = backend.begin().await.expect("begin");

    let out = backend
        .insert(InsertAction::new(Arc::clone(&table), record()), &Session::new(), Some(&tx))
        .await
        .expect("insert in transaction");
    assert!(!out[0].has_errors());
    let seen = backend
        .count(CountAction::new(Arc::clone(&table)), &Session::new(), Some(&tx))
        .await
        .expect("count in transaction");
    assert_eq!(seen.count, 1);

    tx.rollback().await.expect("rollback");
    let seen = backend
        .count(CountAction::new(Arc::clone(&table)), &Session::new(), Some(&tx))
        .await
        .expect("count after rollback");
    assert_eq!(seen.count, 0);

    // The transaction stays usable after rollback and commit.
    backend
        .insert(InsertAction::new(Arc::clone(&table), record()), &Session::new(), Some(&tx))
        .await
        .expect("insert after rollback");
    tx.commit().await.expect("commit");
    tx.close().await.expect("close");
    tx.close().await.expect("second close is a no-op");
    assert!(matches!(
        tx.commit().await,
        Err(Error::ClosedTransaction(..))
    ));

    let committed = backend
        .count(CountAction::new(Arc::clone(&table)), &Session::new(), None)
        .await
        .expect("count after close");
    assert_eq!(committed.count, 1);
}

pub async fn cancel_returns_partial_results<B: Backend>(backend: &B, table: Arc<TableDescriptor>) {
    seed(backend, &table).await;
    let cancel = CancelSignal::new();
    cancel.request();
    let stream = backend
        .query(
            QueryAction::new(Arc::clone(&table)).cancel(cancel),
            &Session::new(),
            None,
        )
        .await
        .expect("query");
    // Cancellation is not an error; the stream just ends early.
    assert!(drain(stream).await.is_empty());
}

/// A scan that comfortably outlives a short deadline must surface as a
/// timeout, not as rows or a generic execution failure. The volume and the
/// pattern-plus-sort filter keep the scan well past the deadline on any
/// reasonable machine.
pub async fn timeouts_surface_as_timeout_errors<B: Backend>(
    backend: &B,
    table: Arc<TableDescriptor>,
) {
    let page: Vec<Record> = (0..1000i64)
        .map(|i| {
            Record::new("order")
                .set("status", format!("PENDING-SETTLEMENT-{:07}", i))
                .set("region", "east")
                .set("total", i)
                .set("amount", dec(i * 10 + 5, 1))
        })
        .collect();
    for _ in 0..200 {
        let out = backend
            .insert(
                InsertAction::new(Arc::clone(&table), page.clone()),
                &Session::new(),
                None,
            )
            .await
            .expect("bulk insert");
        assert!(out.iter().all(|r| !r.has_errors()));
    }

    let heavy = Filter::new()
        .criterion(
            "status",
            Operator::Contains,
            [Value::Varchar("SETTLEMENT".into())],
        )
        .order_by(OrderBy::asc("status"));
    let outcome = backend
        .query(
            QueryAction::new(Arc::clone(&table))
                .filter(heavy)
                .timeout(Duration::from_millis(20)),
            &Session::new(),
            None,
        )
        .await;
    let error = match outcome {
        Err(error) => error,
        Ok(mut stream) => loop {
            match stream.next().await {
                Some(Err(error)) => break error,
                Some(Ok(..)) => continue,
                None => panic!("scan finished despite the deadline"),
            }
        },
    };
    assert!(error.is_timeout(), "expected a timeout, got {}", error);
}

pub async fn generous_timeout_is_harmless<B: Backend>(backend: &B, table: Arc<TableDescriptor>) {
    seed(backend, &table).await;
    let stream = backend
        .query(
            QueryAction::new(Arc::clone(&table)).timeout(Duration::from_secs(30)),
            &Session::new(),
            None,
        )
        .await
        .expect("query");
    assert_eq!(drain(stream).await.len(), 6);
    let count = backend
        .count(
            CountAction::new(Arc::clone(&table)).timeout(Duration::from_secs(30)),
            &Session::new(),
            None,
        )
        .await
        .expect("count");
    assert_eq!(count.count, 6);
}
