use std::str::FromStr;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow},
    query::Query,
    Column, PgPool, Postgres, Row, TypeInfo,
};
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::models::statement::{
    ColumnMetadata, ExecuteStatement, Field, SqlParameter, StatementExecutor, StatementOutput,
};
use crate::vector_literal::to_vector_literal;

// Statements run one at a time; a second connection only helps reconnects.
const MAX_CONNECTIONS: u32 = 2;

pub async fn create_connection_pool(config: &Config) -> Result<PgPool, anyhow::Error> {
    let options = PgConnectOptions::from_str(&config.database_url)
        .context("DATABASE_URL is not a valid PostgreSQL url")?
        .database(&config.database);

    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .with_context(|| format!("Cannot connect to database [{}]", config.database))?;

    info!(
        region = %config.region,
        cluster = %config.cluster_arn,
        database = %config.database,
        "Connected to database successfully."
    );

    Ok(pool)
}

/// Runs data-API shaped statements against a PostgreSQL pool.
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        PgExecutor { pool }
    }
}

#[async_trait]
impl StatementExecutor for PgExecutor {
    #[instrument(
        name = "execute_statement",
        skip_all,
        fields(
            resource_arn = %statement.resource_arn,
            secret_arn = %statement.secret_arn,
            database = %statement.database,
        )
    )]
    async fn execute(&self, statement: ExecuteStatement) -> Result<StatementOutput, anyhow::Error> {
        let (sql, values) = to_positional(&statement.sql, &statement.parameters)?;
        debug!(sql = %sql, parameters = values.len(), "Executing statement");

        let query = values
            .into_iter()
            .fold(sqlx::query(&sql), |query, value| bind_field(query, value));

        if !statement.include_result_metadata {
            let done = query.execute(&self.pool).await?;
            return Ok(StatementOutput {
                column_metadata: None,
                records: Vec::new(),
                number_of_records_updated: done.rows_affected(),
            });
        }

        let rows = query.fetch_all(&self.pool).await?;

        let column_metadata: Vec<ColumnMetadata> = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|column| ColumnMetadata {
                        name: column.name().to_string(),
                        label: Some(column.name().to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let records: Vec<Vec<Field>> = rows
            .iter()
            .map(|row| (0..row.len()).map(|index| decode_cell(row, index)).collect())
            .collect();

        Ok(StatementOutput {
            column_metadata: Some(column_metadata),
            records,
            number_of_records_updated: 0,
        })
    }
}

fn bind_field<'q>(
    query: Query<'q, Postgres, PgArguments>,
    field: &Field,
) -> Query<'q, Postgres, PgArguments> {
    match field {
        Field::StringValue(text) => query.bind(text.clone()),
        Field::DoubleValue(number) => query.bind(*number),
        Field::LongValue(number) => query.bind(*number),
        Field::BooleanValue(flag) => query.bind(*flag),
        Field::IsNull => query.bind(None::<String>),
    }
}

fn decode_cell(row: &PgRow, index: usize) -> Field {
    let type_name = row.columns()[index].type_info().name().to_ascii_uppercase();

    let decoded: Result<Field, sqlx::Error> = match type_name.as_str() {
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .map(|value| value.map_or(Field::IsNull, Field::DoubleValue)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map(|value| value.map_or(Field::IsNull, |v| Field::DoubleValue(v as f64))),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map(|value| value.map_or(Field::IsNull, |v| Field::LongValue(v as i64))),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .map(|value| value.map_or(Field::IsNull, |v| Field::LongValue(v as i64))),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .map(|value| value.map_or(Field::IsNull, Field::LongValue)),
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map(|value| value.map_or(Field::IsNull, Field::BooleanValue)),
        "VECTOR" => row
            .try_get::<Option<pgvector::Vector>, _>(index)
            .map(|value| {
                value.map_or(Field::IsNull, |v| {
                    Field::StringValue(to_vector_literal(v.as_slice()))
                })
            }),
        _ => row
            .try_get::<Option<String>, _>(index)
            .map(|value| value.map_or(Field::IsNull, Field::StringValue)),
    };

    decoded.unwrap_or_else(|err| {
        debug!(column = index, type_name = %type_name, "Cannot decode cell [{}]", err);
        Field::IsNull
    })
}

/// Rewrites `:name` placeholders into `$n` positions and returns the
/// values in binding order. Repeated names share one position; `::type`
/// casts and quoted text are copied as is.
pub fn to_positional<'a>(
    sql: &str,
    parameters: &'a [SqlParameter],
) -> Result<(String, Vec<&'a Field>), anyhow::Error> {
    let chars: Vec<char> = sql.chars().collect();
    let mut rewritten = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut values: Vec<&'a Field> = Vec::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(open) = quote {
            rewritten.push(c);
            if c == open {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                rewritten.push(c);
                i += 1;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                rewritten.push_str("::");
                i += 2;
            }
            ':' if chars
                .get(i + 1)
                .is_some_and(|next| next.is_ascii_alphabetic() || *next == '_') =>
            {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();

                let position = match names.iter().position(|seen| *seen == name) {
                    Some(existing) => existing + 1,
                    None => {
                        let parameter = parameters
                            .iter()
                            .find(|parameter| parameter.name == name)
                            .ok_or_else(|| anyhow!("No value supplied for parameter [:{}]", name))?;
                        names.push(name);
                        values.push(&parameter.value);
                        names.len()
                    }
                };

                rewritten.push('$');
                rewritten.push_str(&position.to_string());
                i = end;
            }
            _ => {
                rewritten.push(c);
                i += 1;
            }
        }
    }

    Ok((rewritten, values))
}
