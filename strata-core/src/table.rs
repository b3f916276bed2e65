use crate::{Error, FieldType, Result, SecurityLock};

/// Declarative metadata for one field: logical name, native column or
/// document-key name, and the declared type used for value coercion.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub column: String,
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, column: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            field_type,
        }
    }
}

/// Read-only description of a table the action layer operates on.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    /// Logical table name, used in errors and records.
    pub name: String,
    /// Native table / collection name.
    pub store_name: String,
    /// Logical name of the primary key field. Must appear in `fields`.
    pub primary_key: String,
    /// Ordered field list; order drives statement column order and record
    /// field order.
    pub fields: Vec<FieldDescriptor>,
    pub locks: Vec<SecurityLock>,
}

impl TableDescriptor {
    pub fn new(
        name: impl Into<String>,
        store_name: impl Into<String>,
        primary_key: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            name: name.into(),
            store_name: store_name.into(),
            primary_key: primary_key.into(),
            fields,
            locks: Vec::new(),
        }
    }

    pub fn lock(mut self, lock: SecurityLock) -> Self {
        self.locks.push(lock);
        self
    }

    /// Resolve a logical field name. Dotted names are association chains
    /// into related tables, which neither shipped translator follows, so
    /// they fail here rather than silently dropping a predicate.
    pub fn field(&self, name: &str) -> Result<&FieldDescriptor> {
        if name.contains('.') {
            return Err(Error::translation(format!(
                "join-chain field `{}` is not supported by this backend",
                name
            )));
        }
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| {
                Error::translation(format!("unknown field `{}` on table `{}`", name, self.name))
            })
    }

    pub fn primary_key_field(&self) -> Result<&FieldDescriptor> {
        self.field(&self.primary_key)
    }
}
