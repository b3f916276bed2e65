use crate::FieldType;

/// Aggregation function computed per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    CountDistinct,
    Sum,
    Min,
    Max,
    Avg,
}

/// One named aggregate of an [`AggregateAction`](crate::AggregateAction).
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub field: String,
    pub function: AggregateFunction,
    /// Field name the computed value appears under in result records.
    pub alias: String,
}

impl Aggregate {
    pub fn new(
        field: impl Into<String>,
        function: AggregateFunction,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            function,
            alias: alias.into(),
        }
    }

    /// Declared type of the computed value. AVG widens integers to decimal;
    /// counts are integers; everything else keeps the field's type.
    pub fn result_type(&self, field_type: FieldType) -> FieldType {
        match self.function {
            AggregateFunction::Count | AggregateFunction::CountDistinct => FieldType::Integer,
            AggregateFunction::Avg => FieldType::Decimal,
            AggregateFunction::Sum | AggregateFunction::Min | AggregateFunction::Max => field_type,
        }
    }
}
