use async_trait::async_trait;
use qfs_common::{QfsError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::llm_trait::LlmClient;
use crate::types::{EmbedRequest, EmbedResponse, GenerateRequest, GenerateResponse};

/// Ollama API client
///
/// Every call is a single attempt; retry policy belongs to the caller.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: Client,
}

impl OllamaClient {
    /// Create new Ollama client
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| QfsError::network(format!("Failed to create HTTP client: {}", e)))?;

        info!("Ollama client initialized: {}", base_url);
        Ok(Self { base_url, client })
    }

    async fn try_generate(&self, request: &GenerateRequest) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        debug!(
            "Sending generate request to Ollama - Model: {}, Prompt length: {}",
            request.model,
            request.prompt.len()
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| QfsError::network(format!("Failed to send request: {}", e)))?
            .error_for_status()
            .map_err(|e| QfsError::llm(format!("Ollama API error: {}", e)))?;

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| QfsError::llm(format!("Failed to parse response: {}", e)))?;

        if result.response.trim().is_empty() {
            return Err(QfsError::llm(format!("Empty response from {}", result.model)));
        }

        debug!(
            "Received response from Ollama - Length: {}, Done: {}",
            result.response.len(),
            result.done
        );

        Ok(result.response)
    }

    async fn try_embed(&self, request: &EmbedRequest) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| QfsError::network(format!("Failed to send embedding request: {}", e)))?
            .error_for_status()
            .map_err(|e| QfsError::llm(format!("Ollama embedding API error: {}", e)))?;

        let result: EmbedResponse = response
            .json()
            .await
            .map_err(|e| QfsError::llm(format!("Failed to parse embedding response: {}", e)))?;

        if result.embedding.is_empty() {
            return Err(QfsError::llm("Empty embedding from Ollama"));
        }

        Ok(result.embedding)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String> {
        self.try_generate(&request).await
    }

    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding - Model: {}, Text length: {}", model, text.len());

        let request = EmbedRequest {
            model: model.to_string(),
            prompt: text.to_string(),
        };
        self.try_embed(&request).await
    }

    async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QfsError::network(format!("Failed to connect to Ollama: {}", e)))?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenerateOptions;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OllamaClient {
        OllamaClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_response_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({"model": "llama3.2", "format": "json"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "response": "{\"questions\": []}",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = GenerateRequest::json("llama3.2", "ask", GenerateOptions::default());
        let text = client_for(&server).generate(request).await.unwrap();
        assert_eq!(text, "{\"questions\": []}");
    }

    #[tokio::test]
    async fn test_generate_empty_response_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "response": "  ",
                "done": true
            })))
            .mount(&server)
            .await;

        let request = GenerateRequest::text("llama3.2", "hi", GenerateOptions::default());
        let err = client_for(&server).generate(request).await.unwrap_err();
        assert!(matches!(err, QfsError::Llm(_)));
    }

    #[tokio::test]
    async fn test_generate_server_error_is_llm_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let request = GenerateRequest::text("llama3.2", "hi", GenerateOptions::default());
        let err = client_for(&server).generate(request).await.unwrap_err();
        assert!(matches!(err, QfsError::Llm(_)));
    }

    #[tokio::test]
    async fn test_embed_returns_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(json!({"model": "nomic-embed-text", "prompt": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embedding": [0.25, 0.5, 1.0]
            })))
            .mount(&server)
            .await;

        let embedding = client_for(&server)
            .embed("nomic-embed-text", "hello")
            .await
            .unwrap();
        assert_eq!(embedding, vec![0.25, 0.5, 1.0]);
    }

    #[tokio::test]
    async fn test_connection_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
            .mount(&server)
            .await;

        assert!(client_for(&server).test_connection().await.unwrap());
    }

    #[tokio::test]
    async fn test_trailing_slash_trimmed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
            .mount(&server)
            .await;

        let client =
            OllamaClient::new(format!("{}/", server.uri()), Duration::from_secs(1)).unwrap();
        assert!(client.test_connection().await.unwrap());
    }
}
