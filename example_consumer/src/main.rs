//! Example consumer: a blog API generated from `apps/blog/models.json`.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Without `DATABASE_URL` the API runs on the in-memory store.

use model_rest::hooks::Hook;
use model_rest::{
    apply_migrations, common_routes, init_tracing, load_apps_from_dir, resolve, ApiBuilder, ApiError, AppState,
    Controller, InstalledApp, MemoryStore, ModelRegistry, PgStore, Record, Settings, Store,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Controller module of the blog app.
fn blog_controllers(registry: &ModelRegistry) {
    registry.register(
        "BlogPost",
        Controller::new()
            .with_before_create(Hook::sync(|_ctx, mut payload: Record, _schema| {
                if payload.get("published") == Some(&json!(true)) && !payload.contains_key("published_at") {
                    return Err(ApiError::Validation("published_at: required when published".into()));
                }
                payload.entry("views").or_insert(json!(0));
                Ok(payload)
            }))
            .with_before_delete(Hook::sync(|ctx, row: Record, _| {
                if row.get("published") == Some(&json!(true)) && ctx.header("x-force").is_none() {
                    return Err(ApiError::PermissionDenied("published posts need x-force to delete".into()));
                }
                Ok(row)
            })),
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    settings.apply();
    init_tracing("model_rest=info,example_consumer=info");

    let apps_path = settings
        .apps_path
        .clone()
        .unwrap_or_else(|| concat!(env!("CARGO_MANIFEST_DIR"), "/apps").into());
    let apps = load_apps_from_dir(&apps_path).await?;
    let models = Arc::new(resolve(&apps)?);

    let store: Arc<dyn Store> = match &settings.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;
            apply_migrations(&pool, &models).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let api = ApiBuilder::new(Arc::clone(&store), Arc::clone(&models), ModelRegistry::global())
        .settings(&settings)
        .installed_apps(vec![InstalledApp::new("blog", vec![blog_controllers])])
        .title("Blog API", env!("CARGO_PKG_VERSION"))
        .build();
    let app = api.merge(common_routes(AppState::new(store, models)));

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
