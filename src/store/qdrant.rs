//! Qdrant-backed [`VectorStore`] speaking the Qdrant HTTP API.

use super::filters::{owner_filter, source_file_filter};
use super::payload::{build_payload, current_timestamp_rfc3339, generate_point_id};
use super::scroller::stream_payloads;
use super::types::{
    ChunkInsert, ChunkPayload, DocumentSummary, ListingRow, ScoredChunk, StoreError,
    summarize_documents,
};
use super::VectorStore;
use async_trait::async_trait;
use futures_util::{pin_mut, stream::StreamExt};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Lightweight HTTP client bound to one Qdrant collection.
pub struct QdrantStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    pub(crate) collection: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
struct QueryPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

impl QdrantStore {
    /// Build a client for `collection` without touching the server.
    pub fn with_client(
        base_url: &str,
        api_key: Option<String>,
        collection: &str,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().user_agent("rusty-rag/0.1").build()?;
        let base_url = normalize_base_url(base_url).map_err(StoreError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
            collection: collection.to_string(),
        })
    }

    /// Build a client and make sure the collection and its payload indexes exist.
    pub async fn connect(
        base_url: &str,
        api_key: Option<String>,
        collection: &str,
        vector_size: usize,
    ) -> Result<Self, StoreError> {
        let store = Self::with_client(base_url, api_key, collection)?;
        store.create_collection_if_not_exists(vector_size).await?;
        store.ensure_payload_indexes().await?;
        Ok(store)
    }

    /// Create the collection (cosine distance) only when it is missing.
    pub async fn create_collection_if_not_exists(&self, vector_size: usize) -> Result<(), StoreError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        tracing::info!(collection = %self.collection, vector_size, "Creating collection");
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });
        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))
            .json(&body)
            .send()
            .await?;
        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, "Collection created");
        })
        .await
    }

    /// Ensure keyword indexes on the fields used by owner and file filters.
    pub async fn ensure_payload_indexes(&self) -> Result<(), StoreError> {
        for field in ["owner_id", "source_file"] {
            let body = json!({
                "field_name": field,
                "field_schema": "keyword",
            });
            let response = self
                .request(Method::PUT, &format!("collections/{}/index", self.collection))
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() || response.status() == StatusCode::CONFLICT {
                tracing::debug!(collection = %self.collection, field, "Payload index ensured");
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = StoreError::UnexpectedStatus { status, body };
                tracing::warn!(collection = %self.collection, field, error = %error, "Failed to ensure payload index");
            }
        }
        Ok(())
    }

    async fn collection_exists(&self) -> Result<bool, StoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = StoreError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    async fn count_matching(&self, filter: &Value) -> Result<usize, StoreError> {
        let response = self
            .request(Method::POST, &format!("collections/{}/points/count", self.collection))
            .json(&json!({ "filter": filter, "exact": true }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant count failed");
            return Err(error);
        }
        let CountResponse { result } = response.json().await?;
        Ok(result.count)
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), StoreError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn insert(&self, chunk: ChunkInsert) -> Result<String, StoreError> {
        let id = generate_point_id();
        let payload = build_payload(&chunk, &current_timestamp_rfc3339());
        let response = self
            .request(Method::PUT, &format!("collections/{}/points", self.collection))
            .query(&[("wait", true)])
            .json(&json!({
                "points": [{
                    "id": id,
                    "vector": chunk.vector,
                    "payload": payload,
                }]
            }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::trace!(
                collection = %self.collection,
                source_file = %chunk.source_file,
                chunk_index = chunk.chunk_index,
                "Point indexed"
            );
        })
        .await?;
        Ok(id)
    }

    async fn query_nearest(
        &self,
        owner_id: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "filter": owner_filter(owner_id),
        });
        let response = self
            .request(Method::POST, &format!("collections/{}/points/query", self.collection))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        let mut results = Vec::with_capacity(points.len());
        for point in points {
            let Some(map) = point.payload else {
                tracing::warn!(collection = %self.collection, "Skipping search hit without payload");
                continue;
            };
            let stored: ChunkPayload = serde_json::from_value(Value::Object(map))
                .map_err(|error| StoreError::InvalidPayload(error.to_string()))?;
            results.push(stored.into_scored(stringify_point_id(point.id), point.score));
        }
        results.sort_by(|left, right| left.distance.total_cmp(&right.distance));
        results.truncate(limit);
        Ok(results)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<DocumentSummary>, StoreError> {
        let stream = stream_payloads(
            self,
            json!(["source_file", "heading", "chunk_index", "created_at"]),
            owner_filter(owner_id),
        );
        pin_mut!(stream);
        let mut rows = Vec::new();
        while let Some(payload) = stream.next().await {
            let row: ListingRow = serde_json::from_value(Value::Object(payload?))
                .map_err(|error| StoreError::InvalidPayload(error.to_string()))?;
            rows.push(row);
        }
        Ok(summarize_documents(rows))
    }

    async fn delete_by_source_file(
        &self,
        owner_id: &str,
        source_file: &str,
    ) -> Result<usize, StoreError> {
        let filter = source_file_filter(owner_id, source_file);
        let matching = self.count_matching(&filter).await?;
        if matching == 0 {
            return Ok(0);
        }

        let response = self
            .request(Method::POST, &format!("collections/{}/points/delete", self.collection))
            .query(&[("wait", true)])
            .json(&json!({ "filter": filter }))
            .send()
            .await?;
        self.ensure_success(response, || {
            tracing::debug!(
                collection = %self.collection,
                source_file,
                deleted = matching,
                "Deleted points by source file"
            );
        })
        .await?;
        Ok(matching)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };

    fn hit(id: &str, score: f32, source_file: &str, index: usize) -> Value {
        json!({
            "id": id,
            "score": score,
            "payload": {
                "owner_id": "user-1",
                "heading": "Results",
                "content": format!("chunk {index}"),
                "source_file": source_file,
                "chunk_index": index,
                "total_chunks": 3,
                "chunk_hash": "abc",
                "created_at": "2025-01-01T00:00:00Z"
            }
        })
    }

    #[tokio::test]
    async fn query_nearest_scopes_by_owner_and_orders_by_distance() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/demo/points/query")
                    .json_body_partial(
                        r#"{"limit":3,"filter":{"must":[{"key":"owner_id","match":{"value":"user-1"}}]}}"#,
                    );
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "points": [
                            hit("p-2", 0.5, "a.txt", 1),
                            hit("p-1", 0.9, "a.txt", 0)
                        ]
                    }
                }));
            })
            .await;
        let store = QdrantStore::with_client(&server.base_url(), None, "demo").expect("store");

        let results = store
            .query_nearest("user-1", &[0.1, 0.2], 3)
            .await
            .expect("search");

        mock.assert();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "p-1");
        assert!(results[0].distance < results[1].distance);
        assert_eq!(results[0].heading.as_deref(), Some("Results"));
    }

    #[tokio::test]
    async fn insert_sends_payload_with_api_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/demo/points")
                    .query_param("wait", "true")
                    .header("api-key", "secret")
                    .body_contains("\"source_file\":\"notes.txt\"")
                    .body_contains("\"chunk_hash\"");
                then.status(200).json_body(json!({ "status": "ok", "result": {} }));
            })
            .await;
        let store = QdrantStore::with_client(&server.base_url(), Some("secret".into()), "demo")
            .expect("store");

        let id = store
            .insert(ChunkInsert {
                owner_id: "user-1".into(),
                heading: None,
                content: "hello".into(),
                vector: vec![0.1, 0.2],
                source_file: "notes.txt".into(),
                chunk_index: 0,
                total_chunks: 1,
            })
            .await
            .expect("insert");

        mock.assert();
        assert_eq!(id.len(), 36);
    }

    #[tokio::test]
    async fn delete_counts_then_deletes() {
        let server = MockServer::start_async().await;
        let count = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/demo/points/count")
                    .body_contains("\"report.md\"");
                then.status(200).json_body(json!({ "result": { "count": 4 } }));
            })
            .await;
        let delete = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/demo/points/delete")
                    .body_contains("\"report.md\"");
                then.status(200).json_body(json!({ "result": { "status": "completed" } }));
            })
            .await;
        let store = QdrantStore::with_client(&server.base_url(), None, "demo").expect("store");

        let deleted = store
            .delete_by_source_file("user-1", "report.md")
            .await
            .expect("delete");

        count.assert();
        delete.assert();
        assert_eq!(deleted, 4);
    }

    #[tokio::test]
    async fn delete_of_missing_file_skips_delete_call() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/demo/points/count");
                then.status(200).json_body(json!({ "result": { "count": 0 } }));
            })
            .await;
        let delete = server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/demo/points/delete");
                then.status(200).json_body(json!({ "result": {} }));
            })
            .await;
        let store = QdrantStore::with_client(&server.base_url(), None, "demo").expect("store");

        let deleted = store
            .delete_by_source_file("user-1", "missing.md")
            .await
            .expect("delete");

        assert_eq!(deleted, 0);
        assert_eq!(delete.hits(), 0);
    }

    #[tokio::test]
    async fn connect_creates_missing_collection_and_indexes() {
        let server = MockServer::start_async().await;
        let exists = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/demo");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/demo")
                    .json_body(json!({ "vectors": { "size": 8, "distance": "Cosine" } }));
                then.status(200).json_body(json!({ "result": true }));
            })
            .await;
        let index = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/demo/index");
                then.status(200).json_body(json!({ "result": {} }));
            })
            .await;

        QdrantStore::connect(&server.base_url(), None, "demo", 8)
            .await
            .expect("connect");

        exists.assert();
        create.assert();
        assert_eq!(index.hits(), 2);
    }

    #[tokio::test]
    async fn list_by_owner_groups_scrolled_rows() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/demo/points/scroll");
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            { "id": "1", "payload": { "source_file": "a.txt", "heading": "Intro", "chunk_index": 0, "created_at": "2025-01-01T00:00:00Z" } },
                            { "id": "2", "payload": { "source_file": "a.txt", "chunk_index": 1, "created_at": "2025-01-01T00:00:01Z" } }
                        ],
                        "next_page_offset": null
                    }
                }));
            })
            .await;
        let store = QdrantStore::with_client(&server.base_url(), None, "demo").expect("store");

        let documents = store.list_by_owner("user-1").await.expect("list");

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].title, "a.txt › Intro");
        assert_eq!(documents[0].chunk_count, 2);
    }
}
