use crate::api::client::AnonApiClient;
use crate::api::models::{AnonRecord, PageRef};
use crate::error::ApiError;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Outcome of a per-page fetch, shaped for fan-out: every waiter on a
/// coalesced request receives the same cheaply-cloned resolution.
pub type PageFetchResult = Result<Arc<Vec<AnonRecord>>, Arc<ApiError>>;

type PageFetch = Shared<BoxFuture<'static, PageFetchResult>>;

/// Fetches task metadata, aggregated records, and per-page records on
/// demand. Per-page requests are coalesced: while a fetch for a given
/// `(task_id, page_number)` is in flight, further calls attach to it instead
/// of issuing a second network request. The resolved-value cache itself
/// lives in `ResultSession`; this layer only prevents duplicate fetches.
pub struct RecordLoader {
    client: AnonApiClient,
    in_flight: Mutex<HashMap<(String, u32), PageFetch>>,
}

impl RecordLoader {
    pub fn new(client: AnonApiClient) -> Self {
        Self {
            client,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the page list for a task, filtered to the anonymized rendition.
    pub async fn fetch_task_pages(&self, task_id: &str) -> Result<Vec<PageRef>, ApiError> {
        let task = self.client.get_task(task_id).await?;
        Ok(task.anon_pages())
    }

    /// Fetch the full cross-page record set plus the server's page count.
    pub async fn fetch_aggregated(
        &self,
        task_id: &str,
    ) -> Result<(Vec<AnonRecord>, Option<u32>), ApiError> {
        let response = self.client.get_aggregated_records(task_id).await?;
        Ok((response.items, response.page_count))
    }

    /// Fetch one page's record set, coalescing concurrent identical requests
    /// into a single network operation.
    pub async fn fetch_page(&self, task_id: &str, page_number: u32) -> PageFetchResult {
        let key = (task_id.to_string(), page_number);
        let fetch = {
            let mut in_flight = self.in_flight.lock().expect("in-flight map poisoned");
            if let Some(existing) = in_flight.get(&key) {
                existing.clone()
            } else {
                let client = self.client.clone();
                let task_id = key.0.clone();
                let fetch: PageFetch = async move {
                    client
                        .get_page_records(&task_id, page_number)
                        .await
                        .map(|response| Arc::new(response.items))
                        .map_err(Arc::new)
                }
                .boxed()
                .shared();
                in_flight.insert(key.clone(), fetch.clone());
                fetch
            }
        };

        let result = fetch.await;
        self.in_flight
            .lock()
            .expect("in-flight map poisoned")
            .remove(&key);
        result
    }

    /// Exchange an image reference for a short-lived preview URL. Never
    /// cached: the presigned link expires and must be re-requested per view.
    pub async fn fetch_preview_url(&self, image_ref: &str) -> Result<String, ApiError> {
        self.client.get_presigned_url(image_ref).await
    }

    /// Download the mapping artifact, whole-document when `page` is None.
    pub async fn fetch_mapping(
        &self,
        task_id: &str,
        page: Option<u32>,
    ) -> Result<Vec<u8>, ApiError> {
        self.client.download_mapping(task_id, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn loader_for(server: &MockServer) -> RecordLoader {
        let client = AnonApiClient::with_auth(
            server.uri(),
            "session-abc".to_string(),
            Some("user-1".to_string()),
        )
        .expect("client creation failed");
        RecordLoader::new(client)
    }

    #[tokio::test]
    async fn test_concurrent_page_fetches_coalesce_to_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/task-1/anon-json"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(50))
                    .set_body_json(serde_json::json!({
                        "items": [{"key": "NAME", "value": "Alice", "anonymized_value": "P_1"}]
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let loader = loader_for(&server);
        let (first, second) =
            tokio::join!(loader.fetch_page("task-1", 2), loader.fetch_page("task-1", 2));

        let first = first.unwrap();
        let second = second.unwrap();
        assert_eq!(first.len(), 1);
        // Both callers observe the same resolved record set.
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_distinct_pages_fetch_independently() {
        let server = MockServer::start().await;
        for page in ["1", "2"] {
            Mock::given(method("GET"))
                .and(path("/tasks/task-1/anon-json"))
                .and(query_param("page", page))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})),
                )
                .expect(1)
                .mount(&server)
                .await;
        }

        let loader = loader_for(&server);
        let (first, second) =
            tokio::join!(loader.fetch_page("task-1", 1), loader.fetch_page("task-1", 2));
        assert!(first.is_ok());
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_sequential_fetches_after_resolution_refetch() {
        // The loader itself does not cache resolved values; that is the
        // session's job. A second call after resolution issues a new request.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/task-1/anon-json"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .expect(2)
            .mount(&server)
            .await;

        let loader = loader_for(&server);
        loader.fetch_page("task-1", 1).await.unwrap();
        loader.fetch_page("task-1", 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_page_fetch_fans_out_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/task-1/anon-json"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_delay(Duration::from_millis(50))
                    .set_body_string("boom"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let loader = loader_for(&server);
        let (first, second) =
            tokio::join!(loader.fetch_page("task-1", 3), loader.fetch_page("task-1", 3));
        assert!(first.is_err());
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_fetch_task_pages_filters_to_anon() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/task-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"pages": [
                    {"page_number": 2, "page_image_s3_key": "k2", "format_type": "anon"},
                    {"page_number": 1, "page_image_s3_key": "k1", "format_type": "anon"},
                    {"page_number": 1, "page_image_s3_key": "o1", "format_type": "original"}
                ]}
            })))
            .mount(&server)
            .await;

        let loader = loader_for(&server);
        let pages = loader.fetch_task_pages("task-1").await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
    }

    #[tokio::test]
    async fn test_fetch_aggregated_returns_items_and_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/task-1/anon-json"))
            .and(query_param("aggregated", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"key": "NAME", "value": "Alice", "anonymized_value": "P_1", "page_number": 1},
                    {"key": "NAME", "value": "Bob", "page_number": 2}
                ],
                "page_count": 3
            })))
            .mount(&server)
            .await;

        let loader = loader_for(&server);
        let (items, page_count) = loader.fetch_aggregated("task-1").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(page_count, Some(3));
    }
}
