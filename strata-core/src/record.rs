use crate::Value;

/// One record travelling through an action: an ordered set of field values
/// plus the issues that have accumulated on it.
///
/// A record carrying at least one error is never submitted to a backend
/// mutate statement; it passes through to the output unchanged and without
/// a generated key, while sibling records continue normally.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub table: String,
    names: Vec<String>,
    values: Vec<Value>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Record {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Set a field, replacing any previous value while keeping its position.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(name, value);
        self
    }

    pub fn put(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        match self.names.iter().position(|n| *n == name) {
            Some(i) => self.values[i] = value.into(),
            None => {
                self.names.push(name);
                self.values.push(value.into());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.values[i])
    }

    pub fn field_names(&self) -> &[String] {
        &self.names
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}
