//! Shared batching policy for mutate operations.
//!
//! Both backends run the same record-level rules: records already carrying
//! errors never reach a native statement, inserts go out in fixed-size
//! pages, and updates are grouped by the set of fields being changed.

use crate::Record;

/// Mutate inputs split by pre-existing errors, each keeping its input
/// position so outputs can be reassembled in order.
#[derive(Debug)]
pub struct MutationBatch {
    pub ok: Vec<(usize, Record)>,
    pub errored: Vec<(usize, Record)>,
}

pub fn partition_errored(records: Vec<Record>) -> MutationBatch {
    let (errored, ok): (Vec<_>, Vec<_>) = records
        .into_iter()
        .enumerate()
        .partition(|(_, r)| r.has_errors());
    MutationBatch { ok, errored }
}

/// Reassemble indexed outputs into input order. Every input index must
/// appear exactly once across the parts.
pub fn merge_in_order(parts: impl IntoIterator<Item = (usize, Record)>) -> Vec<Record> {
    let mut parts: Vec<_> = parts.into_iter().collect();
    parts.sort_by_key(|(i, _)| *i);
    parts.into_iter().map(|(_, r)| r).collect()
}

/// Fixed-size pages over a batch; each page becomes one native statement.
pub fn pages<T>(items: &[T], page_size: usize) -> impl Iterator<Item = &[T]> {
    items.chunks(page_size.max(1))
}

/// Records changing the same set of fields, processed as one unit.
#[derive(Debug)]
pub struct UpdateGroup {
    /// Sorted logical names of the fields being changed (primary key
    /// excluded).
    pub fields: Vec<String>,
    /// Positions into the ok-partition, in input order.
    pub members: Vec<usize>,
    /// True when every member sets the identical value for every changed
    /// field, allowing one batched `SET .. WHERE pk IN (..)` statement.
    pub uniform: bool,
}

/// Group update records by their changed-field-set. Distinct field sets get
/// distinct statements; group order follows first appearance so execution
/// stays left-to-right.
pub fn group_updates(records: &[(usize, Record)], primary_key: &str) -> Vec<UpdateGroup> {
    let mut groups: Vec<UpdateGroup> = Vec::new();
    for (position, (_, record)) in records.iter().enumerate() {
        let mut fields: Vec<String> = record
            .field_names()
            .iter()
            .filter(|n| *n != primary_key)
            .cloned()
            .collect();
        fields.sort();
        match groups.iter_mut().find(|g| g.fields == fields) {
            Some(group) => {
                let first = &records[group.members[0]].1;
                if group.uniform {
                    group.uniform = group
                        .fields
                        .iter()
                        .all(|f| first.get(f) == record.get(f));
                }
                group.members.push(position);
            }
            None => groups.push(UpdateGroup {
                fields,
                members: vec![position],
                uniform: true,
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    fn record(pairs: &[(&str, Value)]) -> Record {
        let mut record = Record::new("order");
        for (name, value) in pairs {
            record.put(*name, value.clone());
        }
        record
    }

    #[test]
    fn errored_records_are_partitioned_in_order() {
        let mut bad = record(&[("id", Value::Int64(2))]);
        bad.add_error("pre-existing");
        let batch = partition_errored(vec![
            record(&[("id", Value::Int64(1))]),
            bad,
            record(&[("id", Value::Int64(3))]),
        ]);
        assert_eq!(batch.ok.iter().map(|(i, _)| *i).collect::<Vec<_>>(), [0, 2]);
        assert_eq!(batch.errored[0].0, 1);
        let merged = merge_in_order(batch.ok.into_iter().chain(batch.errored));
        assert_eq!(merged[1].errors.len(), 1);
        assert_eq!(merged[2].get("id"), Some(&Value::Int64(3)));
    }

    #[test]
    fn pages_never_divide_by_zero() {
        let items = [1, 2, 3];
        assert_eq!(pages(&items, 0).count(), 3);
        assert_eq!(pages(&items, 2).count(), 2);
    }

    #[test]
    fn same_values_collapse_to_one_uniform_group() {
        let records: Vec<(usize, Record)> = (0..4)
            .map(|i| {
                (
                    i,
                    record(&[
                        ("id", Value::Int64(i as i64)),
                        ("status", Value::Varchar("CLOSED".into())),
                    ]),
                )
            })
            .collect();
        let groups = group_updates(&records, "id");
        assert_eq!(groups.len(), 1);
        assert!(groups[0].uniform);
        assert_eq!(groups[0].members, [0, 1, 2, 3]);
        assert_eq!(groups[0].fields, ["status"]);
    }

    #[test]
    fn distinct_values_break_uniformity_not_grouping() {
        let records: Vec<(usize, Record)> = (0..4)
            .map(|i| {
                (
                    i,
                    record(&[
                        ("id", Value::Int64(i as i64)),
                        ("status", Value::Varchar(format!("S{}", i))),
                    ]),
                )
            })
            .collect();
        let groups = group_updates(&records, "id");
        assert_eq!(groups.len(), 1);
        assert!(!groups[0].uniform);
    }

    #[test]
    fn distinct_field_sets_get_distinct_groups() {
        let records = vec![
            (0, record(&[("id", Value::Int64(1)), ("a", Value::Int64(1))])),
            (1, record(&[("id", Value::Int64(2)), ("b", Value::Int64(2))])),
            (2, record(&[("id", Value::Int64(3)), ("a", Value::Int64(1))])),
        ];
        let groups = group_updates(&records, "id");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, [0, 2]);
        assert_eq!(groups[1].members, [1]);
    }
}
