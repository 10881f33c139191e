use std::sync::Arc;

use orgdir_store::{DirectoryStore, InMemoryDirectoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    orgdir_observability::init();

    let store = select_store().await?;
    let app = orgdir_api::app::build_app_with_store(store).await;

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(feature = "postgres")]
async fn select_store() -> anyhow::Result<Arc<dyn DirectoryStore>> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = sqlx::PgPool::connect(&url).await?;
            orgdir_store::run_migrations(&pool).await?;
            tracing::info!("using postgres store");
            Ok(Arc::new(orgdir_store::PostgresDirectoryStore::new(pool)))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; falling back to in-memory store");
            Ok(Arc::new(InMemoryDirectoryStore::new()))
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn select_store() -> anyhow::Result<Arc<dyn DirectoryStore>> {
    tracing::info!("using in-memory store");
    Ok(Arc::new(InMemoryDirectoryStore::new()))
}
