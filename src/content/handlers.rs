//! Locally handled routes.
//!
//! # Responsibilities
//! - Register the local routes, in priority order
//! - Validate path and query parameters before touching the store
//! - Shape content-store documents into the API envelopes
//!
//! # Design Decisions
//! - Handlers return `Result<LocalResponse, HandlerError>`; validation
//!   failures are values, not panics or early exits
//! - `/api/v2/mods/trending` is registered before `/api/v2/mods/{mod_id}`

use axum::body::Bytes;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::future::try_join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::content::store::{ContentError, ContentStore};
use crate::content::types::{ModListing, ModSummary, Pagination};
use crate::http::response::detail_response;
use crate::routing::{PathParams, PatternError, RouteDescriptor, RouteTable};

const DEFAULT_LIMIT: i64 = 20;
const DEFAULT_OFFSET: i64 = 0;

/// Every locally handled endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalRoute {
    Root,
    ModList,
    TrendingMods,
    ModDetail,
    ModDownload,
    NewsList,
    NewsItem,
}

impl LocalRoute {
    pub fn name(&self) -> &'static str {
        match self {
            LocalRoute::Root => "root",
            LocalRoute::ModList => "mod_list",
            LocalRoute::TrendingMods => "trending_mods",
            LocalRoute::ModDetail => "mod_detail",
            LocalRoute::ModDownload => "mod_download",
            LocalRoute::NewsList => "news_list",
            LocalRoute::NewsItem => "news_item",
        }
    }
}

/// The local route table, in registration (priority) order.
pub fn route_table() -> Result<RouteTable<LocalRoute>, PatternError> {
    let routes = [
        ("/", LocalRoute::Root),
        ("/api/v2/mods", LocalRoute::ModList),
        ("/api/v2/mods/trending", LocalRoute::TrendingMods),
        ("/api/v2/mods/{mod_id}", LocalRoute::ModDetail),
        (
            "/api/v2/mods/{mod_id}/versions/{version}/download",
            LocalRoute::ModDownload,
        ),
        ("/api/v2/news", LocalRoute::NewsList),
        ("/api/v2/news/{news_id}", LocalRoute::NewsItem),
    ];

    let descriptors = routes
        .into_iter()
        .map(|(pattern, route)| RouteDescriptor::new(Method::GET, pattern, route))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RouteTable::new(descriptors))
}

/// Explicit failure outcomes of a local handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Content(#[from] ContentError),
}

impl HandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HandlerError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
            HandlerError::Content(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            HandlerError::Content(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        detail_response(self.status_code(), self.to_string())
    }
}

/// Successful handler payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalResponse {
    Json(Value),
    Binary { file_name: String, bytes: Bytes },
}

impl IntoResponse for LocalResponse {
    fn into_response(self) -> Response {
        match self {
            LocalResponse::Json(value) => Json(value).into_response(),
            LocalResponse::Binary { file_name, bytes } => (
                [
                    (CONTENT_TYPE, "application/octet-stream".to_string()),
                    (
                        CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{file_name}\""),
                    ),
                ],
                bytes,
            )
                .into_response(),
        }
    }
}

/// Validated pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    /// Parse `limit` and `offset` from a raw query string. The last
    /// occurrence of a key wins.
    pub fn from_query(query: Option<&str>) -> Result<Self, HandlerError> {
        let mut limit = DEFAULT_LIMIT;
        let mut offset = DEFAULT_OFFSET;

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
            match key.as_ref() {
                "limit" => limit = parse_integer("limit", &value)?,
                "offset" => offset = parse_integer("offset", &value)?,
                _ => {}
            }
        }

        if offset < 0 || limit < 0 {
            return Err(HandlerError::BadRequest(
                "Offset and limit must be non-negative".to_string(),
            ));
        }

        Ok(Self {
            offset: offset as u64,
            limit: limit as u64,
        })
    }

    /// The window as a slice of `items`; empty when it starts past the end.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.offset).unwrap_or(usize::MAX).min(items.len());
        let len = usize::try_from(self.limit).unwrap_or(usize::MAX);
        let end = start.saturating_add(len).min(items.len());
        &items[start..end]
    }
}

fn parse_integer(name: &str, value: &str) -> Result<i64, HandlerError> {
    value.trim().parse::<i64>().map_err(|_| {
        HandlerError::Unprocessable(format!("Query parameter '{name}' must be an integer, got '{value}'"))
    })
}

/// Path parameter that is safe to splice into a store path.
fn segment<'a>(params: &'a PathParams, name: &str) -> Result<&'a str, HandlerError> {
    let value = params
        .get(name)
        .ok_or_else(|| HandlerError::BadRequest(format!("Missing path parameter '{name}'")))?;
    let normalized = value.to_ascii_lowercase().replace("%2e", ".");
    if normalized == "." || normalized == ".." || value.contains('\\') {
        return Err(HandlerError::BadRequest(format!(
            "Invalid path parameter '{name}'"
        )));
    }
    Ok(value)
}

/// Text form of an id as listed in the index.
fn id_text(id: &Value) -> Result<String, HandlerError> {
    match id {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ContentError::Decode {
            location: "mods.json".to_string(),
            cause: format!("unexpected mod id {other}"),
        }
        .into()),
    }
}

/// The local handler set, sharing one content store.
#[derive(Clone)]
pub struct LocalHandlers {
    store: Arc<dyn ContentStore>,
}

impl LocalHandlers {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Run the handler for `route`.
    pub async fn handle(
        &self,
        route: LocalRoute,
        params: &PathParams,
        query: Option<&str>,
    ) -> Result<LocalResponse, HandlerError> {
        match route {
            LocalRoute::Root => Ok(LocalResponse::Json(json!({ "Hello": "World" }))),
            LocalRoute::ModList => {
                let page = Page::from_query(query)?;
                let listing = self.list_mods(page).await?;
                Ok(LocalResponse::Json(to_value(&listing)?))
            }
            LocalRoute::TrendingMods => {
                let trending = self.trending_mods().await?;
                Ok(LocalResponse::Json(to_value(&trending)?))
            }
            LocalRoute::ModDetail => {
                let mod_id = segment(params, "mod_id")?;
                let document = self.store.fetch_json(&format!("mods/{mod_id}/mod.json")).await?;
                Ok(LocalResponse::Json(document))
            }
            LocalRoute::ModDownload => {
                let mod_id = segment(params, "mod_id")?;
                let version = segment(params, "version")?;
                let bytes = self
                    .store
                    .fetch_bytes(&format!("mods/{mod_id}/version/{version}/mod.dll"))
                    .await?;
                Ok(LocalResponse::Binary {
                    file_name: "mod.dll".to_string(),
                    bytes,
                })
            }
            LocalRoute::NewsList => Ok(LocalResponse::Json(self.store.fetch_json("news.json").await?)),
            LocalRoute::NewsItem => {
                let raw = segment(params, "news_id")?;
                let news_id = raw.parse::<i64>().map_err(|_| {
                    HandlerError::Unprocessable(format!("News id must be an integer, got '{raw}'"))
                })?;
                Ok(LocalResponse::Json(self.news_item(news_id).await?))
            }
        }
    }

    async fn mod_index(&self) -> Result<Value, HandlerError> {
        Ok(self.store.fetch_json("mods.json").await?)
    }

    async fn summaries(&self, ids: &[Value]) -> Result<Vec<ModSummary>, HandlerError> {
        try_join_all(ids.iter().map(|id| async move {
            let text = id_text(id)?;
            let document = self.store.fetch_json(&format!("mods/{text}/mod.json")).await?;
            Ok::<_, HandlerError>(ModSummary::new(id.clone(), &text, &document))
        }))
        .await
    }

    /// Paginated listing of every mod in the index.
    pub async fn list_mods(&self, page: Page) -> Result<ModListing, HandlerError> {
        let index = self.mod_index().await?;
        let all = array_field(&index, "mods");
        let mods = self.summaries(page.slice(all)).await?;

        Ok(ModListing {
            mods,
            pagination: Pagination {
                offset: page.offset,
                limit: page.limit,
                total: all.len(),
            },
        })
    }

    /// Summaries for the ids the index marks as trending.
    pub async fn trending_mods(&self) -> Result<Vec<ModSummary>, HandlerError> {
        let index = self.mod_index().await?;
        self.summaries(array_field(&index, "trending")).await
    }

    /// A news entry with its markdown body attached as `content`.
    pub async fn news_item(&self, news_id: i64) -> Result<Value, HandlerError> {
        let meta_path = format!("news/{news_id}/new.json");
        let body_path = format!("news/{news_id}/new.md");
        let (mut entry, content) = futures_util::try_join!(
            self.store.fetch_json(&meta_path),
            self.store.fetch_text(&body_path),
        )?;

        match entry.as_object_mut() {
            Some(fields) => {
                fields.insert("content".to_string(), Value::String(content));
                Ok(entry)
            }
            None => Err(ContentError::Decode {
                location: meta_path,
                cause: "expected a JSON object".to_string(),
            }
            .into()),
        }
    }
}

fn array_field<'a>(document: &'a Value, key: &str) -> &'a [Value] {
    document
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn to_value<T: serde::Serialize>(payload: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(payload).map_err(|e| {
        HandlerError::Content(ContentError::Decode {
            location: "response".to_string(),
            cause: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::store::MemoryContentStore;
    use crate::routing::Resolution;

    fn store() -> Arc<MemoryContentStore> {
        Arc::new(
            MemoryContentStore::new()
                .with_json(
                    "mods.json",
                    json!({"mods": ["alpha", "beta", 7], "trending": ["beta"]}),
                )
                .with_json(
                    "mods/alpha/mod.json",
                    json!({"title": "Alpha", "author": "ann", "created": "2024-01-01"}),
                )
                .with_json(
                    "mods/beta/mod.json",
                    json!({"title": "Beta", "author": "bob", "created": "2024-02-02"}),
                )
                .with_json("mods/7/mod.json", json!({"title": "Seven"}))
                .with_json("news.json", json!([{"id": 1}]))
                .with_json("news/1/new.json", json!({"title": "Launch"}))
                .with_text("news/1/new.md", "# Launched")
                .with_bytes("mods/alpha/version/1.0/mod.dll", vec![0u8, 159, 146, 150, 255]),
        )
    }

    async fn run(
        store: Arc<MemoryContentStore>,
        path: &str,
        query: Option<&str>,
    ) -> Result<LocalResponse, HandlerError> {
        let table = route_table().unwrap();
        let handlers = LocalHandlers::new(store);
        match table.resolve(&Method::GET, path) {
            Resolution::Matched(m) => handlers.handle(*m.target, &m.params, query).await,
            Resolution::Unmatched => panic!("{path} is not a local route"),
        }
    }

    fn json_of(response: LocalResponse) -> Value {
        match response {
            LocalResponse::Json(v) => v,
            other => panic!("expected JSON, got {other:?}"),
        }
    }

    #[test]
    fn page_parsing() {
        assert_eq!(Page::from_query(None).unwrap(), Page { offset: 0, limit: 20 });
        assert_eq!(
            Page::from_query(Some("limit=5&offset=2")).unwrap(),
            Page { offset: 2, limit: 5 }
        );
        assert_eq!(
            Page::from_query(Some("limit=5&limit=6")).unwrap(),
            Page { offset: 0, limit: 6 }
        );
        assert!(matches!(
            Page::from_query(Some("limit=-1")),
            Err(HandlerError::BadRequest(_))
        ));
        assert!(matches!(
            Page::from_query(Some("offset=-3")),
            Err(HandlerError::BadRequest(_))
        ));
        assert!(matches!(
            Page::from_query(Some("limit=ten")),
            Err(HandlerError::Unprocessable(_))
        ));
    }

    #[test]
    fn page_slicing() {
        let items = [1, 2, 3, 4, 5];
        assert_eq!(Page { offset: 1, limit: 2 }.slice(&items), &[2, 3]);
        assert_eq!(Page { offset: 4, limit: 20 }.slice(&items), &[5]);
        assert!(Page { offset: 9, limit: 2 }.slice(&items).is_empty());
        assert!(Page { offset: 0, limit: 0 }.slice(&items).is_empty());
        assert_eq!(Page { offset: 0, limit: u64::MAX }.slice(&items).len(), 5);
    }

    #[tokio::test]
    async fn root_greets() {
        let body = json_of(run(store(), "/", None).await.unwrap());
        assert_eq!(body, json!({"Hello": "World"}));
    }

    #[tokio::test]
    async fn mod_listing_envelope() {
        let body = json_of(run(store(), "/api/v2/mods", Some("limit=2&offset=1")).await.unwrap());

        assert_eq!(body["pagination"], json!({"offset": 1, "limit": 2, "total": 3}));
        let mods = body["mods"].as_array().unwrap();
        assert_eq!(mods.len(), 2);
        assert_eq!(
            mods[0],
            json!({
                "self": "/api/v1/mods/beta",
                "mod_id": "beta",
                "mod_name": "Beta",
                "author": "bob",
                "downloads": 10_000_000,
                "thumbnail": "/api/v1/mods/beta/thumbnail",
                "created_at": "2024-02-02",
            })
        );
        assert_eq!(mods[1]["mod_id"], 7);
        assert_eq!(mods[1]["self"], "/api/v1/mods/7");
        assert_eq!(mods[1]["author"], Value::Null);
    }

    #[tokio::test]
    async fn negative_pagination_never_touches_the_store() {
        let store = store();
        let err = run(store.clone(), "/api/v2/mods", Some("limit=-1")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn trending_resolves_before_detail() {
        let body = json_of(run(store(), "/api/v2/mods/trending", None).await.unwrap());
        let mods = body.as_array().unwrap();
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0]["mod_name"], "Beta");
    }

    #[tokio::test]
    async fn mod_detail_and_missing_mod() {
        let body = json_of(run(store(), "/api/v2/mods/alpha", None).await.unwrap());
        assert_eq!(body["title"], "Alpha");

        let err = run(store(), "/api/v2/mods/ghost", None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn download_is_byte_exact() {
        let response = run(store(), "/api/v2/mods/alpha/versions/1.0/download", None)
            .await
            .unwrap();
        match response {
            LocalResponse::Binary { bytes, file_name } => {
                assert_eq!(bytes.as_ref(), &[0u8, 159, 146, 150, 255]);
                assert_eq!(file_name, "mod.dll");
            }
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn traversal_in_params_is_rejected() {
        let err = run(store(), "/api/v2/mods/%2e%2e", None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn news_item_merges_markdown() {
        let body = json_of(run(store(), "/api/v2/news/1", None).await.unwrap());
        assert_eq!(body, json!({"title": "Launch", "content": "# Launched"}));

        let list = json_of(run(store(), "/api/v2/news", None).await.unwrap());
        assert_eq!(list, json!([{"id": 1}]));

        let err = run(store(), "/api/v2/news/latest", None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn broken_index_is_500() {
        let store = Arc::new(MemoryContentStore::new().with_text("mods.json", "<html>"));
        let err = run(store, "/api/v2/mods/trending", None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("mods.json"));
    }
}
