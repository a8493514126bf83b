use std::io::Write;

use tracing::info;

use crate::config::Config;
use crate::models::row::{reconstruct_rows, Row, Value};
use crate::models::statement::{ExecuteStatement, SqlParameter, StatementExecutor};
use crate::vector_literal::to_vector_literal;

pub const DEFAULT_LIMIT: u32 = 3;

/// The distance projection and the ordering use the same parameter and
/// cast so both rank rows identically.
pub fn similarity_sql(table: &str, limit: u32) -> String {
    format!(
        "SELECT id, title, embedding <=> :embedding::vector AS distance \
         FROM {} \
         ORDER BY embedding <=> :embedding::vector \
         LIMIT {}",
        table, limit
    )
}

pub async fn search_similar(
    executor: &dyn StatementExecutor,
    config: &Config,
    embedding: &[f32],
    limit: u32,
) -> Result<Vec<Row>, anyhow::Error> {
    let table = config.table()?;

    let statement = ExecuteStatement {
        resource_arn: config.cluster_arn.clone(),
        secret_arn: config.secret_arn.clone(),
        database: config.database.clone(),
        sql: similarity_sql(table, limit),
        parameters: vec![SqlParameter::string(
            "embedding",
            to_vector_literal(embedding),
        )],
        include_result_metadata: true,
    };

    let output = executor.execute(statement).await?;
    let rows = reconstruct_rows(&output);

    info!(table, rows = rows.len(), "Similarity search finished");

    Ok(rows)
}

pub fn print_rows(rows: &[Row], out: &mut impl Write) -> std::io::Result<()> {
    for row in rows {
        let field = |name: &str| row.get(name).map(Value::to_string).unwrap_or_default();
        let distance = row
            .get("distance")
            .and_then(Value::as_number)
            .unwrap_or(f64::NAN);

        writeln!(out, "ID: {}", field("id"))?;
        writeln!(out, "Title: {}", field("title"))?;
        writeln!(out, "Distance: {:.4}", distance)?;
        writeln!(out, "----")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::statement::{ColumnMetadata, Field, StatementOutput};
    use crate::testing::{config, RecordingExecutor};

    fn column(name: &str) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            label: Some(name.to_string()),
        }
    }

    fn ranked_output(metadata: Option<Vec<ColumnMetadata>>) -> StatementOutput {
        let record = |id: &str, title: &str, distance: f64| {
            vec![
                Field::StringValue(id.to_string()),
                Field::StringValue(title.to_string()),
                Field::DoubleValue(distance),
            ]
        };

        StatementOutput {
            column_metadata: metadata,
            records: vec![
                record("5", "Cherry blossoms", 0.123456),
                record("2", "First snow", 0.2),
                record("9", "Harbor lights", 0.75),
            ],
            number_of_records_updated: 0,
        }
    }

    #[test]
    fn sql_uses_identical_distance_expressions() {
        let sql = similarity_sql("articles", 3);

        assert_eq!(sql.matches("embedding <=> :embedding::vector").count(), 2);
        assert!(sql.contains("FROM articles"));
        assert!(sql.ends_with("LIMIT 3"));
    }

    #[tokio::test]
    async fn binds_literal_as_single_parameter() {
        let executor = RecordingExecutor::default();

        search_similar(&executor, &config(Some("articles")), &[0.5, 1.0], DEFAULT_LIMIT)
            .await
            .unwrap();

        let statements = executor.recorded();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].include_result_metadata);
        assert!(!statements[0].sql.contains("[0.5,1]"));
        assert_eq!(
            statements[0].parameters,
            vec![SqlParameter::string("embedding", "[0.5,1]")]
        );
    }

    #[tokio::test]
    async fn returns_rows_nearest_first() {
        let executor = RecordingExecutor::replying(ranked_output(Some(vec![
            column("id"),
            column("title"),
            column("distance"),
        ])));

        let rows = search_similar(&executor, &config(Some("articles")), &[0.1], DEFAULT_LIMIT)
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.len() == 3));
        let distances: Vec<f64> = rows
            .iter()
            .map(|row| row["distance"].as_number().unwrap())
            .collect();
        assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test]
    async fn missing_metadata_is_not_an_error() {
        let executor = RecordingExecutor::replying(ranked_output(None));

        let rows = search_similar(&executor, &config(Some("articles")), &[0.1], DEFAULT_LIMIT)
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.is_empty()));
    }

    #[tokio::test]
    async fn requires_a_table_name() {
        let executor = RecordingExecutor::default();

        let result = search_similar(&executor, &config(None), &[0.1], DEFAULT_LIMIT).await;

        assert!(result.is_err());
        assert!(executor.recorded().is_empty());
    }

    #[test]
    fn prints_rows_with_four_decimals() {
        let rows = reconstruct_rows(&ranked_output(Some(vec![
            column("id"),
            column("title"),
            column("distance"),
        ])));

        let mut out = Vec::new();
        print_rows(&rows[..1], &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ID: 5\nTitle: Cherry blossoms\nDistance: 0.1235\n----\n"
        );
    }

    #[test]
    fn prints_empty_rows_without_failing() {
        let rows = reconstruct_rows(&ranked_output(None));

        let mut out = Vec::new();
        print_rows(&rows, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("----").count(), 3);
        assert!(text.contains("Distance: NaN"));
    }
}
