use strata_core::{
    Aggregate, AggregateFunction, BooleanOperator, Criterion, Filter, Operator, Record, Result,
    TableDescriptor, Value, separated_by,
};

/// A parameterized statement: SQL text with `?` placeholders and the
/// ordered values to bind.
#[derive(Debug)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Pure translator from the canonical predicate model to SQLite SQL.
///
/// Values are always bound, never written into the statement text, so the
/// writer only ever emits identifiers, keywords and placeholders.
pub struct SqliteSqlWriter;

impl SqliteSqlWriter {
    pub fn write_identifier(&self, out: &mut String, name: &str) {
        out.push('"');
        for c in name.chars() {
            if c == '"' {
                out.push_str("\"\"");
            } else {
                out.push(c);
            }
        }
        out.push('"');
    }

    fn write_column(&self, out: &mut String, table: &TableDescriptor, field: &str) -> Result<()> {
        let field = table.field(field)?;
        self.write_identifier(out, &field.column);
        Ok(())
    }

    fn write_placeholders(&self, out: &mut String, count: usize) {
        separated_by(out, 0..count, |out, _| out.push('?'), ", ");
    }

    /// Translate one filter level. Returns false when the filter carries no
    /// predicate at all (matches everything), in which case nothing is
    /// written.
    pub fn write_filter(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        table: &TableDescriptor,
        filter: &Filter,
    ) -> Result<bool> {
        let mut parts: Vec<String> = Vec::new();
        for criterion in &filter.criteria {
            let mut part = String::new();
            self.write_criterion(&mut part, params, table, criterion)?;
            parts.push(part);
        }
        for sub in &filter.subfilters {
            if sub.is_empty() {
                // An empty branch of an OR matches everything, so the whole
                // level does; inside an AND it is the identity.
                if filter.operator == BooleanOperator::Or {
                    parts.push("1 = 1".into());
                }
                continue;
            }
            let mut part = String::from("(");
            self.write_filter(&mut part, params, table, sub)?;
            part.push(')');
            parts.push(part);
        }
        if parts.is_empty() {
            return Ok(false);
        }
        let separator = match filter.operator {
            BooleanOperator::And => " AND ",
            BooleanOperator::Or => " OR ",
        };
        out.push_str(&parts.join(separator));
        Ok(true)
    }

    fn write_criterion(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        table: &TableDescriptor,
        criterion: &Criterion,
    ) -> Result<()> {
        let Criterion {
            field,
            operator,
            values,
        } = criterion;
        operator.check_arity(field, values.len())?;
        let descriptor = table.field(field)?;
        let is_text = descriptor.field_type == strata_core::FieldType::Text;
        let column = {
            let mut column = String::new();
            self.write_identifier(&mut column, &descriptor.column);
            column
        };
        match operator {
            Operator::Equals => {
                out.push_str(&column);
                out.push_str(" = ?");
                params.push(values[0].clone());
            }
            Operator::NotEquals => {
                out.push_str(&column);
                out.push_str(" <> ?");
                params.push(values[0].clone());
            }
            Operator::NotEqualsOrIsNull => {
                out.push('(');
                out.push_str(&column);
                out.push_str(" <> ? OR ");
                out.push_str(&column);
                out.push_str(" IS NULL)");
                params.push(values[0].clone());
            }
            Operator::In => {
                if values.is_empty() {
                    out.push_str("1 = 0");
                } else {
                    out.push_str(&column);
                    out.push_str(" IN (");
                    self.write_placeholders(out, values.len());
                    out.push(')');
                    params.extend(values.iter().cloned());
                }
            }
            Operator::NotIn => {
                if values.is_empty() {
                    out.push_str("1 = 1");
                } else {
                    out.push_str(&column);
                    out.push_str(" NOT IN (");
                    self.write_placeholders(out, values.len());
                    out.push(')');
                    params.extend(values.iter().cloned());
                }
            }
            Operator::IsNullOrIn => {
                if values.is_empty() {
                    out.push_str(&column);
                    out.push_str(" IS NULL");
                } else {
                    out.push('(');
                    out.push_str(&column);
                    out.push_str(" IS NULL OR ");
                    out.push_str(&column);
                    out.push_str(" IN (");
                    self.write_placeholders(out, values.len());
                    out.push_str("))");
                    params.extend(values.iter().cloned());
                }
            }
            Operator::Like | Operator::NotLike => {
                out.push_str(&column);
                if *operator == Operator::NotLike {
                    out.push_str(" NOT");
                }
                out.push_str(" LIKE ?");
                params.push(Value::Varchar(values[0].as_text()));
            }
            Operator::StartsWith
            | Operator::NotStartsWith
            | Operator::EndsWith
            | Operator::NotEndsWith
            | Operator::Contains
            | Operator::NotContains => {
                let negated = matches!(
                    operator,
                    Operator::NotStartsWith | Operator::NotEndsWith | Operator::NotContains
                );
                let literal = escape_like(&values[0].as_text());
                let pattern = match operator {
                    Operator::StartsWith | Operator::NotStartsWith => format!("{}%", literal),
                    Operator::EndsWith | Operator::NotEndsWith => format!("%{}", literal),
                    _ => format!("%{}%", literal),
                };
                out.push_str(&column);
                if negated {
                    out.push_str(" NOT");
                }
                out.push_str(" LIKE ? ESCAPE '\\'");
                params.push(Value::Varchar(pattern));
            }
            Operator::LessThan => {
                out.push_str(&column);
                out.push_str(" < ?");
                params.push(values[0].clone());
            }
            Operator::LessThanOrEquals => {
                out.push_str(&column);
                out.push_str(" <= ?");
                params.push(values[0].clone());
            }
            Operator::GreaterThan => {
                out.push_str(&column);
                out.push_str(" > ?");
                params.push(values[0].clone());
            }
            Operator::GreaterThanOrEquals => {
                out.push_str(&column);
                out.push_str(" >= ?");
                params.push(values[0].clone());
            }
            Operator::IsBlank => {
                if is_text {
                    out.push('(');
                    out.push_str(&column);
                    out.push_str(" IS NULL OR ");
                    out.push_str(&column);
                    out.push_str(" = '')");
                } else {
                    out.push_str(&column);
                    out.push_str(" IS NULL");
                }
            }
            Operator::IsNotBlank => {
                if is_text {
                    out.push('(');
                    out.push_str(&column);
                    out.push_str(" IS NOT NULL AND ");
                    out.push_str(&column);
                    out.push_str(" <> '')");
                } else {
                    out.push_str(&column);
                    out.push_str(" IS NOT NULL");
                }
            }
            Operator::Between | Operator::NotBetween => {
                out.push_str(&column);
                if *operator == Operator::NotBetween {
                    out.push_str(" NOT");
                }
                out.push_str(" BETWEEN ? AND ?");
                params.push(values[0].clone());
                params.push(values[1].clone());
            }
        }
        Ok(())
    }

    fn write_where(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        table: &TableDescriptor,
        filter: &Filter,
    ) -> Result<()> {
        let mut predicate = String::new();
        if self.write_filter(&mut predicate, params, table, filter)? {
            out.push_str(" WHERE ");
            out.push_str(&predicate);
        }
        Ok(())
    }

    fn write_order_and_paging(
        &self,
        out: &mut String,
        table: &TableDescriptor,
        filter: &Filter,
    ) -> Result<()> {
        if !filter.order_by.is_empty() {
            out.push_str(" ORDER BY ");
            let mut first = true;
            for order in &filter.order_by {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                self.write_column(out, table, &order.field)?;
                out.push_str(if order.ascending { " ASC" } else { " DESC" });
            }
        }
        if filter.limit.is_some() || filter.skip.is_some() {
            // SQLite needs a LIMIT clause to accept OFFSET; -1 means
            // unbounded.
            out.push_str(" LIMIT ");
            match filter.limit {
                Some(limit) => out.push_str(&limit.to_string()),
                None => out.push_str("-1"),
            }
            if let Some(skip) = filter.skip {
                out.push_str(" OFFSET ");
                out.push_str(&skip.to_string());
            }
        }
        Ok(())
    }

    pub fn select(&self, table: &TableDescriptor, filter: &Filter) -> Result<SqlStatement> {
        let mut sql = String::from("SELECT ");
        separated_by(
            &mut sql,
            &table.fields,
            |out, f| self.write_identifier(out, &f.column),
            ", ",
        );
        sql.push_str(" FROM ");
        self.write_identifier(&mut sql, &table.store_name);
        let mut params = Vec::new();
        self.write_where(&mut sql, &mut params, table, filter)?;
        self.write_order_and_paging(&mut sql, table, filter)?;
        Ok(SqlStatement { sql, params })
    }

    pub fn select_keys(&self, table: &TableDescriptor, filter: &Filter) -> Result<SqlStatement> {
        let mut sql = String::from("SELECT ");
        self.write_column(&mut sql, table, &table.primary_key)?;
        sql.push_str(" FROM ");
        self.write_identifier(&mut sql, &table.store_name);
        let mut params = Vec::new();
        self.write_where(&mut sql, &mut params, table, filter)?;
        Ok(SqlStatement { sql, params })
    }

    pub fn count(
        &self,
        table: &TableDescriptor,
        filter: &Filter,
        include_distinct: bool,
    ) -> Result<SqlStatement> {
        let mut sql = String::from("SELECT COUNT(*)");
        if include_distinct {
            sql.push_str(", COUNT(DISTINCT ");
            self.write_column(&mut sql, table, &table.primary_key)?;
            sql.push(')');
        }
        sql.push_str(" FROM ");
        self.write_identifier(&mut sql, &table.store_name);
        let mut params = Vec::new();
        self.write_where(&mut sql, &mut params, table, filter)?;
        Ok(SqlStatement { sql, params })
    }

    pub fn aggregate(
        &self,
        table: &TableDescriptor,
        filter: &Filter,
        group_by: &[String],
        aggregates: &[Aggregate],
    ) -> Result<SqlStatement> {
        let mut sql = String::from("SELECT ");
        let mut first = true;
        for field in group_by {
            if !first {
                sql.push_str(", ");
            }
            first = false;
            self.write_column(&mut sql, table, field)?;
        }
        for aggregate in aggregates {
            if !first {
                sql.push_str(", ");
            }
            first = false;
            sql.push_str(match aggregate.function {
                AggregateFunction::Count => "COUNT(",
                AggregateFunction::CountDistinct => "COUNT(DISTINCT ",
                AggregateFunction::Sum => "SUM(",
                AggregateFunction::Min => "MIN(",
                AggregateFunction::Max => "MAX(",
                AggregateFunction::Avg => "AVG(",
            });
            self.write_column(&mut sql, table, &aggregate.field)?;
            sql.push(')');
        }
        sql.push_str(" FROM ");
        self.write_identifier(&mut sql, &table.store_name);
        let mut params = Vec::new();
        self.write_where(&mut sql, &mut params, table, filter)?;
        if !group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            let mut first = true;
            for field in group_by {
                if !first {
                    sql.push_str(", ");
                }
                first = false;
                self.write_column(&mut sql, table, field)?;
            }
        }
        self.write_order_and_paging(&mut sql, table, filter)?;
        Ok(SqlStatement { sql, params })
    }

    /// One multi-row insert page; generated keys come back through
    /// `RETURNING` in row order.
    pub fn insert_page(
        &self,
        table: &TableDescriptor,
        columns: &[&str],
        records: &[&Record],
    ) -> Result<SqlStatement> {
        let mut sql = String::from("INSERT INTO ");
        self.write_identifier(&mut sql, &table.store_name);
        sql.push_str(" (");
        {
            let mut first = true;
            for column in columns {
                if !first {
                    sql.push_str(", ");
                }
                first = false;
                self.write_column(&mut sql, table, column)?;
            }
        }
        sql.push_str(") VALUES ");
        let mut params = Vec::new();
        let mut first = true;
        for record in records {
            if !first {
                sql.push_str(", ");
            }
            first = false;
            sql.push('(');
            self.write_placeholders(&mut sql, columns.len());
            sql.push(')');
            for column in columns {
                params.push(record.get(column).cloned().unwrap_or(Value::Null));
            }
        }
        sql.push_str(" RETURNING ");
        self.write_column(&mut sql, table, &table.primary_key)?;
        Ok(SqlStatement { sql, params })
    }

    /// Batched update for a uniform group: every key gets the same values.
    pub fn update_batched(
        &self,
        table: &TableDescriptor,
        fields: &[String],
        template: &Record,
        keys: &[Value],
    ) -> Result<SqlStatement> {
        let mut sql = String::from("UPDATE ");
        self.write_identifier(&mut sql, &table.store_name);
        sql.push_str(" SET ");
        let mut params = Vec::new();
        let mut first = true;
        for field in fields {
            if !first {
                sql.push_str(", ");
            }
            first = false;
            self.write_column(&mut sql, table, field)?;
            sql.push_str(" = ?");
            params.push(template.get(field).cloned().unwrap_or(Value::Null));
        }
        sql.push_str(" WHERE ");
        self.write_column(&mut sql, table, &table.primary_key)?;
        sql.push_str(" IN (");
        self.write_placeholders(&mut sql, keys.len());
        sql.push(')');
        params.extend(keys.iter().cloned());
        Ok(SqlStatement { sql, params })
    }

    pub fn update_single(
        &self,
        table: &TableDescriptor,
        fields: &[String],
        record: &Record,
    ) -> Result<SqlStatement> {
        let mut sql = String::from("UPDATE ");
        self.write_identifier(&mut sql, &table.store_name);
        sql.push_str(" SET ");
        let mut params = Vec::new();
        let mut first = true;
        for field in fields {
            if !first {
                sql.push_str(", ");
            }
            first = false;
            self.write_column(&mut sql, table, field)?;
            sql.push_str(" = ?");
            params.push(record.get(field).cloned().unwrap_or(Value::Null));
        }
        sql.push_str(" WHERE ");
        self.write_column(&mut sql, table, &table.primary_key)?;
        sql.push_str(" = ?");
        params.push(record.get(&table.primary_key).cloned().unwrap_or(Value::Null));
        Ok(SqlStatement { sql, params })
    }

    pub fn delete_by_keys(&self, table: &TableDescriptor, keys: &[Value]) -> Result<SqlStatement> {
        let mut sql = String::from("DELETE FROM ");
        self.write_identifier(&mut sql, &table.store_name);
        sql.push_str(" WHERE ");
        self.write_column(&mut sql, table, &table.primary_key)?;
        sql.push_str(" IN (");
        self.write_placeholders(&mut sql, keys.len());
        sql.push(')');
        Ok(SqlStatement {
            sql,
            params: keys.to_vec(),
        })
    }

    pub fn delete_matching(&self, table: &TableDescriptor, filter: &Filter) -> Result<SqlStatement> {
        let mut sql = String::from("DELETE FROM ");
        self.write_identifier(&mut sql, &table.store_name);
        let mut params = Vec::new();
        self.write_where(&mut sql, &mut params, table, filter)?;
        Ok(SqlStatement { sql, params })
    }
}

/// Escape `%`, `_` and the escape character itself so a user value becomes
/// a literal inside a LIKE pattern.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{FieldDescriptor, FieldType, OrderBy};

    fn table() -> TableDescriptor {
        TableDescriptor::new(
            "order",
            "orders",
            "id",
            vec![
                FieldDescriptor::new("id", "id", FieldType::Integer),
                FieldDescriptor::new("status", "order_status", FieldType::Text),
                FieldDescriptor::new("total", "total", FieldType::Decimal),
            ],
        )
    }

    #[test]
    fn select_translates_criteria_and_subfilters() {
        let filter = Filter::new()
            .equals("status", "ACTIVE")
            .criterion("total", Operator::GreaterThan, [Value::Int64(10)])
            .subfilter(
                Filter::or()
                    .criterion("id", Operator::In, [Value::Int64(1), Value::Int64(2)])
                    .criterion("status", Operator::IsBlank, []),
            );
        let statement = SqliteSqlWriter.select(&table(), &filter).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT \"id\", \"order_status\", \"total\" FROM \"orders\" \
             WHERE \"order_status\" = ? AND \"total\" > ? AND \
             (\"id\" IN (?, ?) OR (\"order_status\" IS NULL OR \"order_status\" = ''))"
        );
        assert_eq!(statement.params.len(), 4);
    }

    #[test]
    fn predicate_count_matches_filter_shape() {
        // N criteria + M sub-filters, combined with the declared operator.
        let filter = Filter::or()
            .equals("id", 1)
            .equals("id", 2)
            .subfilter(Filter::new().equals("status", "A"))
            .subfilter(Filter::new().equals("status", "B"));
        let mut sql = String::new();
        let mut params = Vec::new();
        SqliteSqlWriter
            .write_filter(&mut sql, &mut params, &table(), &filter)
            .unwrap();
        assert_eq!(sql.matches(" OR ").count(), 3);
        assert_eq!(sql.matches('?').count(), 4);
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn arity_violations_fail_translation() {
        for (operator, values) in [
            (Operator::Equals, vec![]),
            (Operator::Equals, vec![Value::Int64(1), Value::Int64(2)]),
            (Operator::Between, vec![Value::Int64(1)]),
            (
                Operator::NotBetween,
                vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)],
            ),
            (Operator::IsBlank, vec![Value::Int64(1)]),
        ] {
            let filter = Filter::new().criterion("id", operator, values);
            assert!(
                SqliteSqlWriter.select(&table(), &filter).is_err(),
                "{} should have failed",
                operator
            );
        }
    }

    #[test]
    fn empty_in_never_matches_and_empty_not_in_always_matches() {
        let mut sql = String::new();
        let mut params = Vec::new();
        let filter = Filter::new()
            .criterion("id", Operator::In, [])
            .criterion("id", Operator::NotIn, [])
            .criterion("id", Operator::IsNullOrIn, []);
        SqliteSqlWriter
            .write_filter(&mut sql, &mut params, &table(), &filter)
            .unwrap();
        assert_eq!(sql, "1 = 0 AND 1 = 1 AND \"id\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn like_family_escapes_wildcards() {
        let mut sql = String::new();
        let mut params = Vec::new();
        let filter = Filter::new().criterion(
            "status",
            Operator::Contains,
            [Value::Varchar("50%_off".into())],
        );
        SqliteSqlWriter
            .write_filter(&mut sql, &mut params, &table(), &filter)
            .unwrap();
        assert_eq!(sql, "\"order_status\" LIKE ? ESCAPE '\\'");
        assert_eq!(params, vec![Value::Varchar("%50\\%\\_off%".into())]);
    }

    #[test]
    fn raw_like_passes_pattern_through() {
        let mut sql = String::new();
        let mut params = Vec::new();
        let filter =
            Filter::new().criterion("status", Operator::Like, [Value::Varchar("A%".into())]);
        SqliteSqlWriter
            .write_filter(&mut sql, &mut params, &table(), &filter)
            .unwrap();
        assert_eq!(sql, "\"order_status\" LIKE ?");
        assert_eq!(params, vec![Value::Varchar("A%".into())]);
    }

    #[test]
    fn order_and_paging_are_written_from_the_top_level() {
        let filter = Filter::new()
            .order_by(OrderBy::desc("total"))
            .order_by(OrderBy::asc("id"))
            .skip(20)
            .limit(10);
        let statement = SqliteSqlWriter.select(&table(), &filter).unwrap();
        assert!(statement.sql.ends_with(
            " ORDER BY \"total\" DESC, \"id\" ASC LIMIT 10 OFFSET 20"
        ));
        let skip_only = Filter::new().skip(5);
        let statement = SqliteSqlWriter.select(&table(), &skip_only).unwrap();
        assert!(statement.sql.ends_with(" LIMIT -1 OFFSET 5"));
    }

    #[test]
    fn unknown_fields_and_join_chains_fail_translation() {
        let filter = Filter::new().equals("missing", 1);
        assert!(SqliteSqlWriter.select(&table(), &filter).is_err());
        let filter = Filter::new().equals("customer.region", 1);
        assert!(SqliteSqlWriter.select(&table(), &filter).is_err());
    }

    #[test]
    fn insert_page_returns_generated_keys() {
        let records = [
            Record::new("order").set("status", "A"),
            Record::new("order").set("status", "B").set("total", 5),
        ];
        let refs: Vec<&Record> = records.iter().collect();
        let statement = SqliteSqlWriter
            .insert_page(&table(), &["status", "total"], &refs)
            .unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO \"orders\" (\"order_status\", \"total\") \
             VALUES (?, ?), (?, ?) RETURNING \"id\""
        );
        assert_eq!(statement.params[1], Value::Null);
        assert_eq!(statement.params[3], Value::Int64(5));
    }

    #[test]
    fn batched_update_uses_one_in_list() {
        let template = Record::new("order").set("status", "CLOSED");
        let keys: Vec<Value> = (1..=4).map(Value::Int64).collect();
        let statement = SqliteSqlWriter
            .update_batched(&table(), &["status".into()], &template, &keys)
            .unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE \"orders\" SET \"order_status\" = ? WHERE \"id\" IN (?, ?, ?, ?)"
        );
        assert_eq!(statement.params.len(), 5);
    }

    #[test]
    fn count_with_distinct_adds_primary_key_count() {
        let statement = SqliteSqlWriter
            .count(&table(), &Filter::new(), true)
            .unwrap();
        assert_eq!(
            statement.sql,
            "SELECT COUNT(*), COUNT(DISTINCT \"id\") FROM \"orders\""
        );
    }

    #[test]
    fn aggregate_groups_and_computes() {
        let statement = SqliteSqlWriter
            .aggregate(
                &table(),
                &Filter::new(),
                &["status".into()],
                &[
                    Aggregate::new("id", AggregateFunction::Count, "n"),
                    Aggregate::new("total", AggregateFunction::Avg, "avg_total"),
                ],
            )
            .unwrap();
        assert_eq!(
            statement.sql,
            "SELECT \"order_status\", COUNT(\"id\"), AVG(\"total\") \
             FROM \"orders\" GROUP BY \"order_status\""
        );
    }
}
