use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::article::{Article, ArticleDocument, DocumentError, EXPECTED_DIMENSION};
use crate::models::statement::{ExecuteStatement, SqlParameter, StatementExecutor};
use crate::vector_literal::to_vector_literal;

const UPSERT_SQL: &str = r"INSERT INTO articles (id, author, title, summary, url, embedding)
VALUES (:id, :author, :title, :summary, :url, :embedding::vector)
ON CONFLICT (id) DO UPDATE
SET author = EXCLUDED.author,
    title = EXCLUDED.title,
    summary = EXCLUDED.summary,
    url = EXCLUDED.url,
    embedding = EXCLUDED.embedding";

/// What to do when a single upsert fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failed write; earlier writes stay committed.
    Abort,
    /// Record the failed identifier and carry on with the next document.
    KeepGoing,
}

#[derive(Debug, Default, PartialEq)]
pub struct LoadReport {
    /// Documents that passed validation and were sent to the database.
    pub attempted: usize,
    /// File names rejected before any write.
    pub skipped: Vec<String>,
    /// Identifiers whose write failed under `FailurePolicy::KeepGoing`.
    pub failed: Vec<String>,
}

impl LoadReport {
    /// Rejections were already warned about one by one, so the summary
    /// stays at info. Any failed write turns the run into an error.
    pub fn finish(&self) -> Result<(), anyhow::Error> {
        if !self.skipped.is_empty() {
            info!(skipped = ?self.skipped, "Rejected documents");
        }

        if !self.failed.is_empty() {
            return Err(anyhow::anyhow!(
                "{} of {} upserts failed: {:?}",
                self.failed.len(),
                self.attempted,
                self.failed
            ));
        }

        Ok(())
    }
}

pub fn list_documents(data_dir: &Path) -> Result<Vec<PathBuf>, anyhow::Error> {
    let mut paths = Vec::new();

    for entry in std::fs::read_dir(data_dir)
        .with_context(|| format!("Cannot read data directory [{}]", data_dir.display()))?
    {
        let path = entry?.path();
        let is_json = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(".json"));

        if is_json && path.is_file() {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

/// I/O failures are fatal; anything wrong with the bytes themselves
/// rejects just this document.
fn read_article(path: &Path) -> Result<Result<Article, DocumentError>, anyhow::Error> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Cannot read document [{}]", path.display()))?;

    Ok(String::from_utf8(bytes)
        .map_err(|err| DocumentError::Malformed(err.to_string()))
        .and_then(|raw| ArticleDocument::parse(&raw))
        .and_then(|document| document.validate(EXPECTED_DIMENSION)))
}

pub fn upsert_statement(config: &Config, article: &Article) -> ExecuteStatement {
    ExecuteStatement {
        resource_arn: config.cluster_arn.clone(),
        secret_arn: config.secret_arn.clone(),
        database: config.database.clone(),
        sql: UPSERT_SQL.to_string(),
        parameters: vec![
            SqlParameter::string("id", article.id.as_str()),
            SqlParameter::string("author", article.author.as_str()),
            SqlParameter::string("title", article.title.as_str()),
            SqlParameter::string("summary", article.summary.as_str()),
            SqlParameter::string("url", article.url.as_str()),
            SqlParameter::string("embedding", to_vector_literal(&article.embedding)),
        ],
        include_result_metadata: false,
    }
}

/// Upserts every valid `*.json` document in `data_dir`, one write at a
/// time, in file-name order.
pub async fn load_articles(
    executor: &dyn StatementExecutor,
    config: &Config,
    data_dir: &Path,
    policy: FailurePolicy,
) -> Result<LoadReport, anyhow::Error> {
    let mut report = LoadReport::default();

    for path in list_documents(data_dir)? {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let article = match read_article(&path)? {
            Ok(article) => article,
            Err(err) => {
                warn!(file = %file_name, "Skipping invalid document: {}", err);
                report.skipped.push(file_name);
                continue;
            }
        };

        report.attempted += 1;

        match executor.execute(upsert_statement(config, &article)).await {
            Ok(output) => {
                info!(
                    id = %article.id,
                    file = %file_name,
                    rows = output.number_of_records_updated,
                    "inserted/updated"
                );
            }
            Err(err) if policy == FailurePolicy::KeepGoing => {
                warn!(id = %article.id, file = %file_name, "Upsert failed: {:#}", err);
                report.failed.push(article.id);
            }
            Err(err) => {
                return Err(err.context(format!(
                    "Cannot upsert article [{}] from [{}]",
                    article.id, file_name
                )));
            }
        }
    }

    info!("Done. inserted {} docs.", report.attempted);

    Ok(report)
}
