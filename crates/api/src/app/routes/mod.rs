//! HTTP route modules, one per entity collection.
//!
//! Handlers parse path identifiers, call the matching service operation, and
//! map the outcome: domain errors go through
//! [`domain_error_to_response`](crate::app::errors::domain_error_to_response),
//! creations answer `201 Created` with a `Location` header, deletions answer
//! `204 No Content`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use orgdir_core::EntityId;

pub mod departments;
pub mod employees;
pub mod enterprises;
pub mod system;
pub mod users;

/// `201 Created` with a `Location` header pointing at the new resource.
pub(crate) fn created(base: &str, id: Option<EntityId>, body: impl Serialize) -> Response {
    let mut response = (StatusCode::CREATED, Json(body)).into_response();
    if let Some(id) = id {
        if let Ok(value) = HeaderValue::from_str(&format!("{base}/{id}")) {
            response.headers_mut().insert(header::LOCATION, value);
        }
    }
    response
}
