//! Application assembly: store wiring, role seeding, router construction.

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use orgdir_store::{DirectoryStore, InMemoryDirectoryStore};

use crate::app::services::AppServices;

pub mod errors;
pub mod routes;
pub mod services;

/// Build the application with an in-memory store (dev/tests).
pub async fn build_app() -> Router {
    let store: Arc<dyn DirectoryStore> = Arc::new(InMemoryDirectoryStore::new());
    build_app_with_store(store).await
}

/// Build the application router on top of the given store.
pub async fn build_app_with_store(store: Arc<dyn DirectoryStore>) -> Router {
    let services = Arc::new(AppServices::new(store));

    if let Err(err) = services.seed_default_roles().await {
        tracing::warn!(%err, "failed to seed default roles");
    }

    Router::new()
        .nest("/enterprises", routes::enterprises::router())
        .nest("/departments", routes::departments::router())
        .nest("/employees", routes::employees::router())
        .nest("/users", routes::users::router())
        .route("/health", get(routes::system::health))
        .layer(ServiceBuilder::new())
        .layer(Extension(services))
}
