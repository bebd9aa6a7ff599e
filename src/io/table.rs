use crate::data::model::Meta;

// ---------------------------------------------------------------------------
// Column – a named, optionally unit-tagged array
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Float(_) | ColumnData::Int(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Unit string exactly as written in the file.
    pub unit: Option<String>,
    pub description: Option<String>,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Column {
            name: name.into(),
            unit: None,
            description: None,
            data,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Numeric view of the column. Booleans map to 0/1; strings have none.
    pub fn as_f64(&self) -> Option<Vec<f64>> {
        match &self.data {
            ColumnData::Float(v) => Some(v.clone()),
            ColumnData::Int(v) => Some(v.iter().map(|&i| i as f64).collect()),
            ColumnData::Bool(v) => Some(v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()),
            ColumnData::Str(_) => None,
        }
    }

    /// Boolean view: numeric columns are `true` where non-zero.
    pub fn as_bool(&self) -> Option<Vec<bool>> {
        match &self.data {
            ColumnData::Bool(v) => Some(v.clone()),
            ColumnData::Int(v) => Some(v.iter().map(|&i| i != 0).collect()),
            ColumnData::Float(v) => Some(v.iter().map(|&f| f != 0.0).collect()),
            ColumnData::Str(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Columns in file order plus table-level metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub meta: Meta,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Table {
            columns,
            meta: Meta::default(),
        }
    }

    /// First column with this exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Row count, taken from the first column.
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }
}
