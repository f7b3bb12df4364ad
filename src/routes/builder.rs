//! Mount routes for every model of a [`ModelSet`] under one prefix.

use crate::config::{ModelMeta, ModelSet};
use crate::middleware::{catch_panic_layer, not_found_fallback};
use crate::openapi::{build_openapi, openapi_route, RegisteredModel};
use crate::query::{PageLimits, PaginationStrategy};
use crate::registry::{InstalledApp, ModelRegistry};
use crate::routes::{register_model_routes, RouteOptions};
use crate::settings::{Settings, DEFAULT_BODY_LIMIT};
use crate::store::Store;
use crate::upload::{FileStorage, FileUploadConfig, UploadFields, Uploads};
use axum::{extract::DefaultBodyLimit, Router};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// App labels that never get routes.
pub const SYSTEM_APPS: [&str; 4] = ["admin", "auth", "contenttypes", "sessions"];

/// `true` excludes a whole app; a list excludes only the named models.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExclusionRule {
    App(bool),
    Models(Vec<String>),
}

/// Per-app exclusion rules, e.g. `{"billing": true, "blog": ["Draft"]}`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct ExclusionConfig {
    rules: HashMap<String, ExclusionRule>,
}

impl ExclusionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_app(mut self, label: impl Into<String>) -> Self {
        self.rules.insert(label.into(), ExclusionRule::App(true));
        self
    }

    pub fn exclude_models<I, S>(mut self, label: impl Into<String>, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules
            .insert(label.into(), ExclusionRule::Models(models.into_iter().map(Into::into).collect()));
        self
    }

    pub fn is_excluded(&self, model: &ModelMeta) -> bool {
        if SYSTEM_APPS.contains(&model.app_label.as_str()) {
            return true;
        }
        match self.rules.get(&model.app_label) {
            Some(ExclusionRule::App(all)) => *all,
            Some(ExclusionRule::Models(names)) => names.iter().any(|n| n == &model.name),
            None => false,
        }
    }
}

/// Builds the complete API router: model routes, `{prefix}/openapi.json`, error layers and body limit.
pub struct ApiBuilder<'a> {
    store: Arc<dyn Store>,
    models: Arc<ModelSet>,
    registry: &'a ModelRegistry,
    prefix: String,
    exclusions: ExclusionConfig,
    installed_apps: Vec<InstalledApp>,
    overrides: HashMap<String, RouteOptions>,
    pagination: PaginationStrategy,
    page_limits: PageLimits,
    body_limit: usize,
    file_uploads: FileUploadConfig,
    media: Arc<FileStorage>,
    title: String,
    version: String,
}

impl<'a> ApiBuilder<'a> {
    pub fn new(store: Arc<dyn Store>, models: Arc<ModelSet>, registry: &'a ModelRegistry) -> Self {
        ApiBuilder {
            store,
            models,
            registry,
            prefix: "/api".into(),
            exclusions: ExclusionConfig::default(),
            installed_apps: Vec::new(),
            overrides: HashMap::new(),
            pagination: PaginationStrategy::default(),
            page_limits: PageLimits::default(),
            body_limit: DEFAULT_BODY_LIMIT,
            file_uploads: FileUploadConfig::default(),
            media: Arc::default(),
            title: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    /// Take pagination, page sizes, body limit and media root from settings.
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.pagination = settings.pagination;
        self.page_limits = PageLimits {
            default_size: settings.page_size,
            max_size: settings.max_page_size,
        };
        self.body_limit = settings.body_limit;
        self.media = Arc::new(FileStorage::new(settings.media_root.clone()));
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    pub fn exclude(mut self, exclusions: ExclusionConfig) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Apps whose controller modules run before routes are registered.
    pub fn installed_apps(mut self, apps: Vec<InstalledApp>) -> Self {
        self.installed_apps = apps;
        self
    }

    /// Replace the generated options for one model. `base_url` stays relative to the prefix;
    /// uploads use the options' own storage.
    pub fn route_options(mut self, model_name: impl Into<String>, options: RouteOptions) -> Self {
        self.overrides.insert(model_name.into(), options);
        self
    }

    pub fn pagination(mut self, strategy: PaginationStrategy) -> Self {
        self.pagination = strategy;
        self
    }

    pub fn page_limits(mut self, limits: PageLimits) -> Self {
        self.page_limits = limits;
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Explicit file fields; models it does not list keep their detected `file`/`files` fields.
    pub fn file_uploads(mut self, config: FileUploadConfig) -> Self {
        self.file_uploads = config;
        self
    }

    pub fn media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.media = Arc::new(FileStorage::new(root));
        self
    }

    pub fn title(mut self, title: impl Into<String>, version: impl Into<String>) -> Self {
        self.title = title.into();
        self.version = version.into();
        self
    }

    fn options_for(&self, model: &ModelMeta) -> RouteOptions {
        let options = match self.overrides.get(&model.name) {
            Some(o) => o.clone(),
            None => RouteOptions::for_model(model)
                .page_limits(self.page_limits)
                .uploads(Uploads::new(
                    UploadFields::resolve(model, Some(&self.file_uploads)),
                    Arc::clone(&self.media),
                )),
        };
        let base = format!("{}{}", self.prefix, options.base_url);
        let mut options = options.base_url(base);
        if options.pagination.is_none() {
            options.pagination = Some(self.pagination);
        }
        options
    }

    pub fn build(self) -> Router {
        self.registry.discover_controllers(&self.installed_apps);

        let mut router = Router::new();
        let mut registered = Vec::new();
        for model in self.models.iter() {
            if self.exclusions.is_excluded(model) {
                tracing::debug!(model = %model.name, app = %model.app_label, "model excluded");
                continue;
            }
            let options = self.options_for(model);
            router = register_model_routes(
                router,
                Arc::clone(&self.store),
                self.registry,
                Arc::clone(model),
                options.clone(),
            );
            registered.push(RegisteredModel {
                model: Arc::clone(model),
                options,
            });
        }

        let doc = build_openapi(&self.title, &self.version, &registered);
        let openapi_path = format!("{}/openapi.json", self.prefix);
        tracing::info!(models = registered.len(), prefix = %self.prefix, openapi = %openapi_path, "api built");

        router
            .merge(openapi_route(&openapi_path, doc))
            .fallback(not_found_fallback)
            .layer(DefaultBodyLimit::max(self.body_limit))
            .layer(catch_panic_layer())
    }
}
