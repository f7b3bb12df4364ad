//! HTTP routes: per-model CRUD, the API builder, and service endpoints.

mod builder;
mod common;
mod model;

pub use builder::{ApiBuilder, ExclusionConfig, ExclusionRule, SYSTEM_APPS};
pub use common::common_routes;
pub use model::{register_model_routes, RouteOptions};
