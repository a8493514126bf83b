use indexmap::IndexMap;

use super::statement::{ColumnMetadata, Field, StatementOutput};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Null,
}

impl Value {
    /// Probes string, then numeric, and falls back to null.
    pub fn from_field(field: &Field) -> Self {
        match field {
            Field::StringValue(text) => Value::Text(text.clone()),
            Field::DoubleValue(number) => Value::Number(*number),
            Field::LongValue(number) => Value::Number(*number as f64),
            Field::BooleanValue(_) | Field::IsNull => Value::Null,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            Value::Text(text) => text.trim().parse().ok(),
            Value::Null => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Text(text) => write!(f, "{}", text),
            Value::Number(number) => write!(f, "{}", number),
            Value::Null => Ok(()),
        }
    }
}

/// Column label to value, in select-list order.
pub type Row = IndexMap<String, Value>;

pub fn column_labels(metadata: Option<&[ColumnMetadata]>) -> Vec<String> {
    metadata
        .unwrap_or_default()
        .iter()
        .map(|column| match &column.label {
            Some(label) if !label.is_empty() => label.clone(),
            _ => column.name.clone(),
        })
        .collect()
}

/// Zips every positional record against the column labels. Cells without
/// a label are dropped, so missing metadata yields empty rows.
pub fn reconstruct_rows(output: &StatementOutput) -> Vec<Row> {
    let labels = column_labels(output.column_metadata.as_deref());

    output
        .records
        .iter()
        .map(|record| {
            labels
                .iter()
                .zip(record.iter())
                .filter(|(label, _)| !label.is_empty())
                .map(|(label, field)| (label.clone(), Value::from_field(field)))
                .collect::<Row>()
        })
        .collect()
}
