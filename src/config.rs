use std::env;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable [{0}]")]
    Missing(&'static str),

    #[error("Invalid table name [{0}]")]
    InvalidTableName(String),
}

/// Connection settings shared by the load and query runs.
///
/// Built once at start-up and handed to the pipelines by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub region: String,
    pub cluster_arn: String,
    pub secret_arn: String,
    pub database: String,
    pub database_url: String,
    /// Only the query run reads a configurable table.
    pub table_name: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Config {
    pub fn from_env(require_table: bool) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok(), require_table)
    }

    pub fn from_lookup<F>(lookup: F, require_table: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let region = required("REGION")?;
        let cluster_arn = required("DB_CLUSTER_ARN")?;
        let secret_arn = required("SECRET_ARN")?;
        let database = required("DB_NAME")?;
        let database_url = required("DATABASE_URL")?;

        let table_name = if require_table {
            let table = required("TABLE_NAME")?;
            validate_table_name(&table)?;
            Some(table)
        } else {
            None
        };

        Ok(Config {
            region,
            cluster_arn,
            secret_arn,
            database,
            database_url,
            table_name,
            openai_api_key: lookup("OPENAI_API_KEY").filter(|key| !key.is_empty()),
        })
    }

    pub fn table(&self) -> Result<&str, ConfigError> {
        self.table_name
            .as_deref()
            .ok_or(ConfigError::Missing("TABLE_NAME"))
    }
}

/// Table names end up in SQL text, so only plain (optionally schema
/// qualified) identifiers are accepted.
fn validate_table_name(name: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = name.split('.').collect();
    let is_identifier = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    if parts.len() <= 2 && parts.iter().all(|part| is_identifier(part)) {
        Ok(())
    } else {
        Err(ConfigError::InvalidTableName(name.to_string()))
    }
}
