use crate::api::models::{AnonJsonResponse, PresignedUrlResponse, TaskResponse};
use crate::error::ApiError;
use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("anv-cli/", env!("CARGO_PKG_VERSION"));

/// Client for the anonymization result API. Every request carries the
/// session credential plus the user-identity header when set.
#[derive(Debug, Clone)]
pub struct AnonApiClient {
    client: Client,
    pub base_url: String,
    pub session_token: Option<String>,
    pub user_id: Option<String>,
}

impl AnonApiClient {
    pub fn new(base_url: String) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Http {
                status: 0,
                endpoint: "client_init".to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(AnonApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_token: None,
            user_id: None,
        })
    }

    pub fn with_auth(
        base_url: String,
        session_token: String,
        user_id: Option<String>,
    ) -> Result<Self, ApiError> {
        let mut client = AnonApiClient::new(base_url)?;
        client.session_token = Some(session_token);
        client.user_id = user_id;
        Ok(client)
    }

    pub fn set_session_token(&mut self, token: String) {
        self.session_token = Some(token);
    }

    pub fn set_user_id(&mut self, user_id: String) {
        self.user_id = Some(user_id);
    }

    pub fn is_authenticated(&self) -> bool {
        self.session_token.is_some()
    }

    pub fn build_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, url);

        if let Some(token) = &self.session_token {
            request = request.header("X-Session-Token", token);
        }
        if let Some(user_id) = &self.user_id {
            request = request.header("X-User-Id", user_id);
        }

        request
    }

    async fn handle_response<T>(&self, response: Response, endpoint: &str) -> Result<T, ApiError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();

        if status.is_success() {
            response.json::<T>().await.map_err(|e| ApiError::Http {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            Err(self.status_error(status.as_u16(), endpoint, response).await)
        }
    }

    async fn status_error(&self, status: u16, endpoint: &str, response: Response) -> ApiError {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match status {
            401 | 403 => ApiError::Unauthorized {
                status,
                endpoint: endpoint.to_string(),
                server_message: error_text,
            },
            408 | 504 => ApiError::Timeout {
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                endpoint: endpoint.to_string(),
            },
            _ => ApiError::Http {
                status,
                endpoint: endpoint.to_string(),
                message: error_text,
            },
        }
    }

    fn send_error(&self, endpoint: &str, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout {
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                endpoint: endpoint.to_string(),
            }
        } else {
            ApiError::Http {
                status: 0,
                endpoint: endpoint.to_string(),
                message: format!("Request failed: {}", err),
            }
        }
    }

    /// Fetch task metadata: the page list with image storage keys.
    pub async fn get_task(&self, task_id: &str) -> Result<TaskResponse, ApiError> {
        let endpoint = format!("/tasks/{}", task_id);
        let response = self
            .build_request(Method::GET, &endpoint)
            .send()
            .await
            .map_err(|e| self.send_error(&endpoint, e))?;
        self.handle_response(response, &endpoint).await
    }

    /// Fetch the full cross-page anonymization record set.
    pub async fn get_aggregated_records(
        &self,
        task_id: &str,
    ) -> Result<AnonJsonResponse, ApiError> {
        let endpoint = format!("/tasks/{}/anon-json", task_id);
        let response = self
            .build_request(Method::GET, &endpoint)
            .query(&[("aggregated", "true")])
            .send()
            .await
            .map_err(|e| self.send_error(&endpoint, e))?;
        self.handle_response(response, &endpoint).await
    }

    /// Fetch the record set scoped to a single page.
    pub async fn get_page_records(
        &self,
        task_id: &str,
        page_number: u32,
    ) -> Result<AnonJsonResponse, ApiError> {
        let endpoint = format!("/tasks/{}/anon-json", task_id);
        let response = self
            .build_request(Method::GET, &endpoint)
            .query(&[("page", page_number.to_string())])
            .send()
            .await
            .map_err(|e| self.send_error(&endpoint, e))?;
        self.handle_response(response, &endpoint).await
    }

    /// Exchange a stable image storage key for a short-lived display URL.
    /// The result expires server-side, so callers must not cache it.
    pub async fn get_presigned_url(&self, image_ref: &str) -> Result<String, ApiError> {
        let endpoint = "/s3/presigned-url";
        let response = self
            .build_request(Method::GET, endpoint)
            .query(&[("key", image_ref)])
            .send()
            .await
            .map_err(|e| self.send_error(endpoint, e))?;
        let presigned: PresignedUrlResponse = self.handle_response(response, endpoint).await?;
        Ok(presigned.url)
    }

    /// Download the mapping artifact, whole-document when `page` is None.
    pub async fn download_mapping(
        &self,
        task_id: &str,
        page: Option<u32>,
    ) -> Result<Vec<u8>, ApiError> {
        let endpoint = format!("/tasks/{}/anon-mapping", task_id);
        let mut request = self.build_request(Method::GET, &endpoint);
        if let Some(page_number) = page {
            request = request.query(&[("page", page_number.to_string())]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| self.send_error(&endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.status_error(status.as_u16(), &endpoint, response).await);
        }

        let bytes = response.bytes().await.map_err(|e| ApiError::Http {
            status: status.as_u16(),
            endpoint: endpoint.clone(),
            message: format!("Failed to read mapping payload: {}", e),
        })?;
        Ok(bytes.to_vec())
    }
}
