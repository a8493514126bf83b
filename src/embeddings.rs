use std::path::Path;

use anyhow::{anyhow, Context};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const EMBEDDING_MODEL: &str = "text-embedding-3-large";

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// A `(text, embedding)` pair prepared ahead of time, so a query can run
/// without calling the embeddings API.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Catalog { entries }
    }

    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read catalog [{}]", path.display()))?;
        let entries: Vec<CatalogEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("Cannot parse catalog [{}]", path.display()))?;

        Ok(Catalog::new(entries))
    }

    pub fn get(&self, index: usize) -> Result<&CatalogEntry, anyhow::Error> {
        self.entries.get(index).ok_or_else(|| {
            anyhow!(
                "Catalog entry [{}] does not exist ({} entries)",
                index,
                self.entries.len()
            )
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
}

impl OpenAiEmbedding {
    pub fn new(api_key: impl Into<String>) -> Self {
        OpenAiEmbedding {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, anyhow::Error> {
        let request = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: vec![text],
        };

        let response = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Embedding request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI embedding error [{}]: {}", status, body));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .context("Cannot parse embedding response")?;

        result
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| anyhow!("No embedding returned"))
    }
}

/// Where the query vector comes from for one run.
pub enum QueryEmbedding {
    Precomputed { catalog: Catalog, index: usize },
    Generated { client: OpenAiEmbedding, text: String },
}

impl QueryEmbedding {
    pub async fn resolve(&self) -> Result<Vec<f32>, anyhow::Error> {
        match self {
            QueryEmbedding::Precomputed { catalog, index } => {
                let entry = catalog.get(*index)?;
                info!(index, text = %entry.text, "Using precomputed embedding");
                Ok(entry.embedding.clone())
            }
            QueryEmbedding::Generated { client, text } => {
                info!(model = EMBEDDING_MODEL, "Generating query embedding");
                client.embed(text).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn catalog() -> Catalog {
        Catalog::new(vec![
            CatalogEntry {
                text: "a gentle love story".to_string(),
                embedding: vec![0.1, 0.2],
            },
            CatalogEntry {
                text: "a thrilling mystery".to_string(),
                embedding: vec![0.3, 0.4],
            },
        ])
    }

    #[tokio::test]
    async fn precomputed_lookup_by_index() {
        let source = QueryEmbedding::Precomputed {
            catalog: catalog(),
            index: 1,
        };

        assert_eq!(source.resolve().await.unwrap(), vec![0.3, 0.4]);
    }

    #[tokio::test]
    async fn out_of_range_index_fails() {
        let source = QueryEmbedding::Precomputed {
            catalog: catalog(),
            index: 5,
        };

        let err = source.resolve().await.unwrap_err();
        assert!(err.to_string().contains("[5]"));
    }

    #[test]
    fn catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"text": "calm", "embedding": [1.0, -0.5]}}]"#).unwrap();

        let catalog = Catalog::from_file(file.path()).unwrap();

        assert_eq!(catalog.get(0).unwrap().text, "calm");
        assert_eq!(catalog.get(0).unwrap().embedding, vec![1.0, -0.5]);
        assert!(catalog.get(1).is_err());
    }

    #[test]
    fn request_body_shape() {
        let request = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: vec!["hello"],
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"model": "text-embedding-3-large", "input": ["hello"]})
        );
    }
}
