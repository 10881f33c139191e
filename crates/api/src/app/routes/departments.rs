use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};

use orgdir_core::EntityId;
use orgdir_directory::DepartmentDto;

use crate::app::errors::domain_error_to_response;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(find).put(update).delete(remove))
}

async fn list(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.departments.find_all().await {
        Ok(dtos) => Json(dtos).into_response(),
        Err(e) => domain_error_to_response(e),
    }
}

async fn find(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let id: EntityId = match id.parse() {
        Ok(v) => v,
        Err(e) => return domain_error_to_response(e),
    };
    match services.departments.find_by_id(id).await {
        Ok(dto) => Json(dto).into_response(),
        Err(e) => domain_error_to_response(e),
    }
}

async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<DepartmentDto>,
) -> Response {
    match services.departments.insert(body).await {
        Ok(dto) => super::created("/departments", dto.id, dto),
        Err(e) => domain_error_to_response(e),
    }
}

async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<DepartmentDto>,
) -> Response {
    let id: EntityId = match id.parse() {
        Ok(v) => v,
        Err(e) => return domain_error_to_response(e),
    };
    match services.departments.update(id, body).await {
        Ok(dto) => Json(dto).into_response(),
        Err(e) => domain_error_to_response(e),
    }
}

async fn remove(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let id: EntityId = match id.parse() {
        Ok(v) => v,
        Err(e) => return domain_error_to_response(e),
    };
    match services.departments.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => domain_error_to_response(e),
    }
}
