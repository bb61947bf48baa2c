//! API Handlers
//!
//! HTTP request handlers shared by every entity collection. Reads go through
//! the query cache; writes go through the transactional writer.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::cache::QueryCache;
use crate::config::Config;
use crate::error::{ApiError, Result, StoreError};
use crate::models::{Entity, EntityRequest, HealthResponse, StatsResponse, StatusResponse};
use crate::query::QuerySpec;
use crate::store::DocumentStore;
use crate::writer::{Mutation, TransactionalWriter};

/// Upper bound on documents returned by a list request.
pub const LIST_LIMIT: u64 = 10_000;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub cache: QueryCache,
    pub writer: TransactionalWriter,
}

impl AppState {
    /// Wires the writer to the same store and cache the readers use.
    pub fn new(store: Arc<dyn DocumentStore>, cache: QueryCache) -> Self {
        let writer = TransactionalWriter::new(store.clone(), cache.clone());
        Self {
            store,
            cache,
            writer,
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        backend: Arc<dyn crate::cache::CacheBackend>,
    ) -> Self {
        Self::new(store, QueryCache::new(backend, config.query_cache()))
    }
}

async fn fetch_many<E: Entity>(
    store: &dyn DocumentStore,
    spec: &QuerySpec,
) -> std::result::Result<Vec<E>, StoreError> {
    store
        .find(spec.collection(), spec.filter(), spec.options())
        .await?
        .into_iter()
        .map(E::from_document)
        .collect()
}

async fn fetch_one<E: Entity>(
    store: &dyn DocumentStore,
    spec: &QuerySpec,
) -> std::result::Result<Option<E>, StoreError> {
    store
        .find_one(spec.collection(), spec.filter())
        .await?
        .map(E::from_document)
        .transpose()
}

/// Handler for GET /api/{collection}
///
/// Lists the collection ordered by year.
pub async fn list_handler<E: Entity>(State(state): State<AppState>) -> Result<Json<Vec<E>>> {
    let spec = QuerySpec::find(E::COLLECTION, json!({}))
        .sort("year")
        .limit(LIST_LIMIT);

    let items = state
        .cache
        .execute(&spec, || fetch_many::<E>(state.store.as_ref(), &spec))
        .await?;

    Ok(Json(items))
}

/// Handler for GET /api/{collection}/:id
pub async fn get_handler<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<E>> {
    let spec = QuerySpec::find_by_id(E::COLLECTION, &id);

    let item = state
        .cache
        .execute(&spec, || fetch_one::<E>(state.store.as_ref(), &spec))
        .await?;

    item.map(Json).ok_or_else(|| {
        ApiError::NotFound(format!("{} '{}' not found", E::COLLECTION, id))
    })
}

/// Handler for POST /api/{collection}
pub async fn create_handler<E: Entity>(
    State(state): State<AppState>,
    Json(req): Json<EntityRequest>,
) -> Result<(StatusCode, Json<E>)> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let document = state
        .writer
        .mutate(E::COLLECTION, Mutation::Insert(req.to_document()))
        .await?;

    Ok((StatusCode::CREATED, Json(E::from_document(document)?)))
}

/// Handler for PATCH /api/{collection}/:id
pub async fn update_handler<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EntityRequest>,
) -> Result<Json<StatusResponse>> {
    if let Some(error_msg) = req.validate_patch() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    state
        .writer
        .mutate(
            E::COLLECTION,
            Mutation::Update {
                id,
                patch: req.to_document(),
            },
        )
        .await?;

    Ok(Json(StatusResponse::success()))
}

/// Handler for DELETE /api/{collection}/:id
pub async fn delete_handler<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>> {
    state
        .writer
        .mutate(E::COLLECTION, Mutation::Delete { id })
        .await?;

    Ok(Json(StatusResponse::success()))
}

/// Handler for GET /stats
///
/// Returns current query cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.cache.stats()))
}

/// Handler for GET /health
///
/// The server stays healthy when the cache is down; reads just get slower.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::new(state.cache.ping().await.is_ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryBackend, Population, QueryCacheConfig};
    use crate::models::Student;
    use crate::store::MemoryDocumentStore;

    fn test_state() -> AppState {
        let cache = QueryCache::new(
            Arc::new(MemoryBackend::new()),
            QueryCacheConfig {
                populate: Population::Inline,
                ..QueryCacheConfig::default()
            },
        );
        AppState::new(Arc::new(MemoryDocumentStore::new()), cache)
    }

    fn request(year: i64, standard: i64) -> EntityRequest {
        EntityRequest {
            year: Some(year),
            standard: Some(standard),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_handler() {
        let state = test_state();

        let (status, Json(created)) =
            create_handler::<Student>(State(state.clone()), Json(request(1, 2)))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(fetched) =
            get_handler::<Student>(State(state.clone()), Path(created.id.to_string()))
                .await
                .unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_year() {
        let state = test_state();
        for year in [3, 1, 2] {
            create_handler::<Student>(State(state.clone()), Json(request(year, 0)))
                .await
                .unwrap();
        }

        let Json(students) = list_handler::<Student>(State(state)).await.unwrap();
        let years: Vec<_> = students.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![Some(1), Some(2), Some(3)]);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let state = test_state();

        let result = get_handler::<Student>(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_handler_refreshes_list() {
        let state = test_state();
        let (_, Json(created)) =
            create_handler::<Student>(State(state.clone()), Json(request(1, 2)))
                .await
                .unwrap();
        list_handler::<Student>(State(state.clone())).await.unwrap();

        update_handler::<Student>(
            State(state.clone()),
            Path(created.id.to_string()),
            Json(EntityRequest {
                year: Some(5),
                standard: None,
            }),
        )
        .await
        .unwrap();

        let Json(students) = list_handler::<Student>(State(state)).await.unwrap();
        assert_eq!(students[0].year, Some(5));
        assert_eq!(students[0].standard, Some(2));
    }

    #[tokio::test]
    async fn test_delete_nonexistent() {
        let state = test_state();

        let result = delete_handler::<Student>(State(state), Path("nope".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_invalid_request() {
        let state = test_state();

        let result = create_handler::<Student>(State(state), Json(request(-1, 0))).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_malformed_stored_document_is_server_error() {
        use axum::response::IntoResponse;

        let store = Arc::new(MemoryDocumentStore::new());
        let tx = store.begin_transaction().await.unwrap();
        let bad = json!({"_id": "not-a-uuid", "year": 1})
            .as_object()
            .cloned()
            .unwrap();
        store.insert(tx, "student", bad).await.unwrap();
        store.commit(tx).await.unwrap();

        let cache = QueryCache::new(Arc::new(MemoryBackend::new()), QueryCacheConfig::default());
        let state = AppState::new(store, cache);

        let err = list_handler::<Student>(State(state)).await.unwrap_err();
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();
        list_handler::<Student>(State(state.clone())).await.unwrap();
        list_handler::<Student>(State(state.clone())).await.unwrap();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.stats.hits, 1);
        assert_eq!(response.stats.misses, 1);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler(State(test_state())).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.cache, "up");
    }
}
