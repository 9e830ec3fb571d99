use crate::error::GatewayError;
use crate::models::StorageLocation;
use crate::traits::{OcrGateway, OcrOutput};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
struct OcrRequest {
    content_base64: String,
    blob_url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    text: Option<String>,
    #[serde(default)]
    page_count: Option<u32>,
    #[serde(default)]
    processing_time_seconds: Option<f64>,
}

/// OCR over a JSON extraction endpoint.
pub struct HttpOcrGateway {
    client: Arc<Client>,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpOcrGateway {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl OcrGateway for HttpOcrGateway {
    async fn extract_text(
        &self,
        location: &StorageLocation,
        content: &[u8],
    ) -> Result<OcrOutput, GatewayError> {
        let payload = OcrRequest {
            content_base64: STANDARD.encode(content),
            blob_url: location.blob_url.clone(),
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::Backend {
                service: "ocr".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: OcrResponse = response.json().await?;
        payload_to_output(payload, &location.blob_name)
    }
}

fn payload_to_output(payload: OcrResponse, blob_name: &str) -> Result<OcrOutput, GatewayError> {
    let text = payload
        .text
        .map(|value| value.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(GatewayError::InvalidResponse {
            service: "ocr".to_string(),
            details: format!("response carried no readable text for {blob_name}"),
        });
    }

    Ok(OcrOutput {
        text,
        page_count: payload.page_count.unwrap_or(1),
        processing_time_seconds: payload.processing_time_seconds.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::{payload_to_output, OcrResponse};

    #[test]
    fn response_with_text_converts() {
        let output = payload_to_output(
            OcrResponse {
                text: Some("  HISTORIA CLINICA \n".to_string()),
                page_count: Some(3),
                processing_time_seconds: Some(0.42),
            },
            "blob.pdf",
        )
        .unwrap();

        assert_eq!(output.text, "HISTORIA CLINICA");
        assert_eq!(output.page_count, 3);
        assert_eq!(output.processing_time_seconds, 0.42);
    }

    #[test]
    fn empty_text_is_an_error() {
        let result = payload_to_output(
            OcrResponse {
                text: Some("   ".to_string()),
                page_count: None,
                processing_time_seconds: None,
            },
            "blob.pdf",
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_page_count_defaults_to_one() {
        let output = payload_to_output(
            OcrResponse {
                text: Some("texto".to_string()),
                page_count: None,
                processing_time_seconds: None,
            },
            "blob.pdf",
        )
        .unwrap();
        assert_eq!(output.page_count, 1);
    }
}
