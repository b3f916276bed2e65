use crate::{BooleanOperator, Operator, Value};

/// One field / operator / values predicate.
///
/// The field name is logical and table scoped; translators remap it to the
/// native name through the table descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub field: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl Criterion {
    pub fn new(
        field: impl Into<String>,
        operator: Operator,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            values: values.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }
}

/// A boolean-combined tree of criteria and nested filters, plus ordering
/// and paging. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub operator: BooleanOperator,
    pub criteria: Vec<Criterion>,
    pub subfilters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn or() -> Self {
        Self {
            operator: BooleanOperator::Or,
            ..Default::default()
        }
    }

    pub fn criterion(
        mut self,
        field: impl Into<String>,
        operator: Operator,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.criteria.push(Criterion::new(field, operator, values));
        self
    }

    pub fn equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.criterion(field, Operator::Equals, [value.into()])
    }

    pub fn subfilter(mut self, filter: Filter) -> Self {
        self.subfilters.push(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True when the filter carries no predicates at any depth, meaning it
    /// matches all records.
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty() && self.subfilters.iter().all(Filter::is_empty)
    }
}
