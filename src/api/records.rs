//! Generic CRUD endpoints, mounted once per record collection.
//!
//! Each collection gets its own sub-router whose state is that collection's
//! record service, so the handlers below stay generic over the record type.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde_json::Value;
use std::sync::Arc;

use super::validation::validate_record_id;
use super::{ApiError, ApiResponse, AppState, DeleteResult};
use crate::db::Rule;
use crate::domain::Record;
use crate::services::{ModelError, RecordService};

type Service<R> = Arc<dyn RecordService<R>>;

/// `GET/POST /{collection}`, `GET/PUT/DELETE /{collection}/{id}`,
/// `POST /{collection}/search` and `POST /{collection}/refresh`.
pub fn routes<R: Record>(service: Service<R>) -> Router<Arc<AppState>> {
    let base = format!("/{}", R::COLLECTION);

    Router::new()
        .route(&base, get(list::<R>).post(create::<R>))
        .route(&format!("{base}/search"), post(search::<R>))
        .route(&format!("{base}/refresh"), post(refresh::<R>))
        .route(
            &format!("{base}/{{id}}"),
            get(get_one::<R>).put(update::<R>).delete(remove::<R>),
        )
        .with_state(service)
}

async fn list<R: Record>(
    State(service): State<Service<R>>,
) -> Result<Json<ApiResponse<Vec<R>>>, ApiError> {
    let records = service.get_all().await?;
    Ok(Json(ApiResponse::success(records)))
}

async fn get_one<R: Record>(
    State(service): State<Service<R>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<R>>, ApiError> {
    let id = validate_record_id(&id)?;
    let record = service
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(R::COLLECTION, &id))?;

    Ok(Json(ApiResponse::success(record)))
}

async fn search<R: Record>(
    State(service): State<Service<R>>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<Vec<R>>>, ApiError> {
    let rule = Rule::try_from(body).map_err(ModelError::from)?;
    let records = service.get_all_by_rule(&rule).await?;
    Ok(Json(ApiResponse::success(records)))
}

async fn create<R: Record>(
    State(service): State<Service<R>>,
    Json(record): Json<R>,
) -> Result<Json<ApiResponse<R>>, ApiError> {
    let created = service.create(record).await?;
    Ok(Json(ApiResponse::success(created)))
}

async fn update<R: Record>(
    State(service): State<Service<R>>,
    Path(id): Path<String>,
    Json(record): Json<R>,
) -> Result<Json<ApiResponse<R>>, ApiError> {
    let id = validate_record_id(&id)?;
    let updated = service.update(&id, record).await?;
    Ok(Json(ApiResponse::success(updated)))
}

async fn remove<R: Record>(
    State(service): State<Service<R>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeleteResult>>, ApiError> {
    let id = validate_record_id(&id)?;
    let deleted = service.delete(&id).await?;
    Ok(Json(ApiResponse::success(DeleteResult { deleted })))
}

async fn refresh<R: Record>(
    State(service): State<Service<R>>,
) -> Result<Json<ApiResponse<Vec<R>>>, ApiError> {
    let records = service.refresh().await?;
    Ok(Json(ApiResponse::success(records)))
}
