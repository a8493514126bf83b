use async_trait::async_trait;

/// A scalar cell or parameter value. Only these shapes can be bound or
/// returned, which is why embeddings travel as vector literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    StringValue(String),
    DoubleValue(f64),
    LongValue(i64),
    BooleanValue(bool),
    IsNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    pub name: String,
    pub value: Field,
}

impl SqlParameter {
    pub fn string(name: &str, value: impl Into<String>) -> Self {
        SqlParameter {
            name: name.to_string(),
            value: Field::StringValue(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnMetadata {
    pub name: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExecuteStatement {
    pub resource_arn: String,
    pub secret_arn: String,
    pub database: String,
    pub sql: String,
    pub parameters: Vec<SqlParameter>,
    pub include_result_metadata: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementOutput {
    pub column_metadata: Option<Vec<ColumnMetadata>>,
    pub records: Vec<Vec<Field>>,
    pub number_of_records_updated: u64,
}

#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(&self, statement: ExecuteStatement) -> Result<StatementOutput, anyhow::Error>;
}
