//! Streaming helper for iterating the Qdrant scroll endpoint without manual loops.

use async_stream::try_stream;
use futures_core::Stream;
use reqwest::Method;
use serde_json::{Map, Value, json};

use super::qdrant::QdrantStore;
use super::types::StoreError;

const DEFAULT_SCROLL_LIMIT: usize = 512;

#[derive(serde::Deserialize)]
struct ScrollResponse {
    result: ScrollResult,
}

#[derive(serde::Deserialize)]
struct ScrollResult {
    #[serde(default)]
    points: Vec<ScrollPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(serde::Deserialize)]
struct ScrollPoint {
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

/// Stream payloads of the store's collection that match `filter`, page by page.
pub fn stream_payloads<'a>(
    store: &'a QdrantStore,
    with_payload: Value,
    filter: Value,
) -> impl Stream<Item = Result<Map<String, Value>, StoreError>> + 'a {
    try_stream! {
        let mut offset: Option<Value> = None;

        loop {
            let body = json!({
                "with_payload": with_payload.clone(),
                "with_vector": false,
                "limit": DEFAULT_SCROLL_LIMIT,
                "filter": filter.clone(),
                "offset": offset.clone().unwrap_or(Value::Null),
            });

            let response = store
                .request(Method::POST, &format!("collections/{}/points/scroll", store.collection))
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let ScrollResponse { result } = response.json().await?;
                for point in result.points {
                    if let Some(payload) = point.payload {
                        yield payload;
                    }
                }

                match result.next_page_offset {
                    Some(Value::Null) | None => break,
                    Some(next) => offset = Some(next),
                }
            } else {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(collection = %store.collection, status = %status, "Failed to scroll payloads");
                Err(StoreError::UnexpectedStatus { status, body })?;
            }
        }
    }
}
