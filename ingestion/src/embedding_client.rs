use newsloom_core::config::EmbeddingConfig;
use newsloom_core::error::{Classify, ErrorClass};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("embedding response vector count does not match input count")]
    CountMismatch,
}

impl Classify for EmbeddingError {
    fn class(&self) -> ErrorClass {
        match self {
            EmbeddingError::Network(_) => ErrorClass::TransientIo,
            EmbeddingError::CountMismatch => ErrorClass::PermanentIo,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP client for the embedding API of §6: `POST {model, input: [...]}` returning
/// `{embeddings: [[...]]}`. One request per sub-batch of at most `config.batch_size`
/// texts; the embedding service is responsible for grouping and dimension validation.
pub struct EmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    config: EmbeddingConfig,
}

impl EmbeddingClient {
    pub fn new(client: reqwest::Client, base_url: String, config: EmbeddingConfig) -> Self {
        Self {
            client,
            base_url,
            config,
        }
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };
        let response: EmbeddingResponse = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if response.embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch);
        }
        Ok(response.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EmbeddingConfig {
        EmbeddingConfig {
            model: "test-embed".to_string(),
            dim: 8,
            batch_size: 64,
        }
    }

    #[tokio::test]
    async fn empty_batch_returns_empty_without_a_request() {
        let client = EmbeddingClient::new(
            crate::http::build_client(),
            "http://127.0.0.1:1".to_string(),
            test_config(),
        );
        let result = client.embed_batch(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
