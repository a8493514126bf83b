use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Width of the `embedding vector(3072)` column (text-embedding-3-large).
pub const EXPECTED_DIMENSION: usize = 3072;

#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("not a valid article document: {0}")]
    Malformed(String),

    #[error("embedding is missing")]
    MissingEmbedding,

    #[error("embedding is not an array")]
    NotAnArray,

    #[error("embedding contains a non-numeric value at position {0}")]
    NonNumeric(usize),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    WrongDimension { actual: usize, expected: usize },

    #[error("document has no index or id")]
    MissingIdentifier,
}

#[derive(Debug, Deserialize)]
pub struct ArticleDocument {
    #[serde(alias = "id")]
    pub index: Option<Value>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub embedding: Option<Value>,
}

/// A document that passed validation and is ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: String,
    pub author: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub embedding: Vec<f32>,
}

impl ArticleDocument {
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(raw).map_err(|err| DocumentError::Malformed(err.to_string()))
    }

    pub fn validate(self, expected_dimension: usize) -> Result<Article, DocumentError> {
        let embedding = match self.embedding {
            None | Some(Value::Null) => return Err(DocumentError::MissingEmbedding),
            Some(Value::Array(values)) => values
                .iter()
                .enumerate()
                .map(|(position, value)| {
                    value
                        .as_f64()
                        .map(|number| number as f32)
                        .ok_or(DocumentError::NonNumeric(position))
                })
                .collect::<Result<Vec<f32>, DocumentError>>()?,
            Some(_) => return Err(DocumentError::NotAnArray),
        };

        if embedding.len() != expected_dimension {
            return Err(DocumentError::WrongDimension {
                actual: embedding.len(),
                expected: expected_dimension,
            });
        }

        let id = identifier_text(self.index.as_ref()).ok_or(DocumentError::MissingIdentifier)?;

        Ok(Article {
            id,
            author: self.author.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            summary: self.summary.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
            embedding,
        })
    }
}

/// The `id` column is TEXT, so numeric identifiers are stored as their
/// decimal text. `7`, `7.0` and `7e0` all map to `"7"`.
fn identifier_text(index: Option<&Value>) -> Option<String> {
    let text = match index? {
        Value::Null => return None,
        Value::String(text) => text.clone(),
        Value::Number(number) => match (number.as_i64(), number.as_u64(), number.as_f64()) {
            (Some(signed), _, _) => signed.to_string(),
            (None, Some(unsigned), _) => unsigned.to_string(),
            (None, None, Some(float)) => float.to_string(),
            (None, None, None) => number.to_string(),
        },
        other => other.to_string(),
    };

    (!text.trim().is_empty()).then_some(text)
}
