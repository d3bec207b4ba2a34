//! OpenAI embeddings provider using the `/v1/embeddings` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::providers::openai::OpenAiClient;
use crate::semantic::embeddings::{check_batch, EmbeddingError, EmbeddingProvider};

pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_DIMENSIONS: usize = 1536;

pub struct OpenAiEmbeddings {
    client: OpenAiClient,
    model: String,
    dims: usize,
}

impl OpenAiEmbeddings {
    pub fn new(client: OpenAiClient) -> Self {
        Self {
            client,
            model: DEFAULT_MODEL.to_string(),
            dims: DEFAULT_DIMENSIONS,
        }
    }

    pub fn with_model(mut self, model: String, dims: usize) -> Self {
        self.model = model;
        self.dims = dims;
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Order by the `index` field when the server provides one.
fn into_ordered(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    data.into_iter().map(|d| d.embedding).collect()
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let req = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let resp = self
            .client
            .post("embeddings")
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json::<EmbeddingResponse>()
            .await?;

        check_batch(texts.len(), into_ordered(resp.data))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_reordered_by_index() {
        let body = r#"{"data":[
            {"index":1,"embedding":[0.0,1.0]},
            {"index":0,"embedding":[1.0,0.0]}
        ]}"#;
        let resp: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(into_ordered(resp.data), vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_response_without_index_keeps_order() {
        let body = r#"{"data":[{"embedding":[0.5]},{"embedding":[0.25]}]}"#;
        let resp: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(into_ordered(resp.data), vec![vec![0.5], vec![0.25]]);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        // unroutable base url: any request would fail
        let client = OpenAiClient::new("key".into(), Some("http://127.0.0.1:9"));
        let provider = OpenAiEmbeddings::new(client);
        assert!(provider.embed_batch(&[]).await.unwrap().is_empty());
        assert_eq!(provider.dimensions(), 1536);
    }
}
