//! model-rest: CRUD REST endpoints generated from model definitions.
//!
//! Models are declared as data ([`config::AppConfig`]), resolved into [`config::ModelSet`], and
//! exposed through axum routes built by [`routes::ApiBuilder`]. Behaviour is customized per model
//! with [`controller::Controller`] hooks registered in a [`registry::ModelRegistry`].

pub mod case;
pub mod config;
pub mod controller;
pub mod error;
pub mod hooks;
pub mod middleware;
pub mod migration;
pub mod openapi;
pub mod query;
pub mod registry;
pub mod response;
pub mod routes;
pub mod schema;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;
pub mod upload;

pub use config::{load_apps_from_dir, parse_model_id, resolve, AppConfig, FieldConfig, FieldKind, ModelConfig, ModelMeta, ModelSet};
pub use controller::{Controller, HookName};
pub use error::{ApiError, ConfigError};
pub use hooks::{Hook, RequestContext, ResponseData};
pub use migration::apply_migrations;
pub use query::PaginationStrategy;
pub use registry::{InstalledApp, ModelRegistry};
pub use routes::{common_routes, register_model_routes, ApiBuilder, ExclusionConfig, RouteOptions};
pub use schema::{generate_schema, Record, Schema};
pub use settings::{init_tracing, Settings};
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Store};
pub use upload::{FileFieldDetector, FileStorage, FileUploadConfig};
