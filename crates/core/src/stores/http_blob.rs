use crate::error::GatewayError;
use crate::models::StorageLocation;
use crate::traits::StorageGateway;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use url::Url;

/// Blob storage over a plain HTTP object endpoint.
///
/// Objects live at `{endpoint}/{container}/{blob_name}`. A failed upload is
/// compensated with a best-effort delete so no partial object survives a
/// reported failure.
pub struct HttpBlobStore {
    client: Arc<Client>,
    endpoint: String,
    container: String,
    api_key: Option<String>,
}

impl HttpBlobStore {
    pub fn new(
        endpoint: impl Into<String>,
        container: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, GatewayError> {
        let endpoint = endpoint.into();
        // Fail fast on an unusable endpoint instead of per request.
        Url::parse(&endpoint)?;

        Ok(Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            container: container.into(),
            api_key,
        })
    }

    fn blob_url(&self, blob_name: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.container, blob_name)
    }
}

#[async_trait]
impl StorageGateway for HttpBlobStore {
    async fn put(
        &self,
        content: &[u8],
        suggested_name: &str,
        content_type: &str,
    ) -> Result<StorageLocation, GatewayError> {
        let blob_url = self.blob_url(suggested_name);

        let mut request = self
            .client
            .put(&blob_url)
            .header("content-type", content_type.to_string())
            .body(content.to_vec());
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            // The backend may have kept a partial object; make sure it did not.
            let _ = self.delete(suggested_name).await;
            return Err(GatewayError::Backend {
                service: "blob-storage".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(StorageLocation {
            blob_name: suggested_name.to_string(),
            blob_url,
            container_name: self.container.clone(),
        })
    }

    async fn delete(&self, blob_name: &str) -> Result<bool, GatewayError> {
        let mut request = self.client.delete(self.blob_url(blob_name));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(GatewayError::Backend {
                service: "blob-storage".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(true)
    }
}
