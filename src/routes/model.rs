//! CRUD routes for one model: list, detail, create, partial update and delete.

use crate::case::base_path_for_model;
use crate::config::{parse_model_id, ModelMeta};
use crate::controller::Controller;
use crate::error::ApiError;
use crate::hooks::{handle_response, RequestContext, ResponseData};
use crate::query::{apply_filters, PageLimits, PaginationStrategy};
use crate::registry::{resolve_controller, ModelRegistry};
use crate::response::{DeleteBody, PageBody};
use crate::schema::{ModelSchemas, Record, Schema};
use crate::store::Store;
use crate::upload::{Payload, PendingFile, UploadFields, Uploads};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// How a model's routes are exposed.
#[derive(Clone, Debug)]
pub struct RouteOptions {
    /// Path of the collection, e.g. `/api/test-models`.
    pub base_url: String,
    pub list_schema: Arc<Schema>,
    pub detail_schema: Arc<Schema>,
    /// `POST` is registered only when set.
    pub create_schema: Option<Arc<Schema>>,
    /// `PATCH` is registered only when set.
    pub update_schema: Option<Arc<Schema>>,
    /// Field matched by a free-text `q`.
    pub search_field: Option<String>,
    /// `None` uses [`PaginationStrategy::default`].
    pub pagination: Option<PaginationStrategy>,
    pub page_limits: PageLimits,
    /// File fields accepted in multipart bodies, and where their files go.
    pub uploads: Uploads,
}

impl RouteOptions {
    /// All four schemas generated from metadata, base path from the model name, search on `name`,
    /// file fields detected from field kinds.
    pub fn for_model(model: &ModelMeta) -> Self {
        let schemas = ModelSchemas::for_model(model);
        RouteOptions {
            base_url: base_path_for_model(&model.name),
            list_schema: Arc::new(schemas.list),
            detail_schema: Arc::new(schemas.detail),
            create_schema: Some(Arc::new(schemas.create)),
            update_schema: Some(Arc::new(schemas.update)),
            search_field: Some("name".into()),
            pagination: None,
            page_limits: PageLimits::default(),
            uploads: Uploads::new(UploadFields::resolve(model, None), Arc::default()),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn read_only(mut self) -> Self {
        self.create_schema = None;
        self.update_schema = None;
        self
    }

    pub fn search_field(mut self, field: Option<&str>) -> Self {
        self.search_field = field.map(str::to_string);
        self
    }

    pub fn pagination(mut self, strategy: PaginationStrategy) -> Self {
        self.pagination = Some(strategy);
        self
    }

    pub fn page_limits(mut self, limits: PageLimits) -> Self {
        self.page_limits = limits;
        self
    }

    pub fn uploads(mut self, uploads: Uploads) -> Self {
        self.uploads = uploads;
        self
    }
}

struct ModelRoutes {
    model: Arc<ModelMeta>,
    store: Arc<dyn Store>,
    controller: Arc<Controller>,
    options: RouteOptions,
}

impl ModelRoutes {
    fn not_found(&self) -> ApiError {
        ApiError::NotFound(format!("No {} matches the given query.", self.model.name))
    }

    /// Load by raw path id. Ids that cannot match the key type are simply not found.
    async fn fetch(&self, raw_id: &str) -> Result<(Value, Record), ApiError> {
        let id = parse_model_id(&self.model, raw_id);
        if !self.model.pk_accepts(&id) {
            return Err(self.not_found());
        }
        match self.store.get(&self.model, &id).await? {
            Some(row) => Ok((id, row)),
            None => Err(self.not_found()),
        }
    }

    fn respond(&self, ctx: &RequestContext, data: ResponseData, schema: &Schema) -> Value {
        handle_response(ctx, data, schema, self.controller.custom_response.as_ref())
    }

    /// Write staged files, run `write`, and remove the files again if it fails.
    async fn with_files<T, F>(&self, files: &[PendingFile], write: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let storage = &self.options.uploads.storage;
        storage.save_all(files).await?;
        let result = write.await;
        if result.is_err() {
            storage.discard(files).await;
        }
        result
    }
}

async fn list_items(
    State(r): State<Arc<ModelRoutes>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<PageBody>, ApiError> {
    let Query(params) = params?;
    let ctx = RequestContext::new(method, uri, headers);

    let query = apply_filters(&r.model, r.options.search_field.as_deref(), &params)?;
    let query = r.controller.pre_list.execute(&ctx, query, ()).await?;
    let window = r
        .options
        .pagination
        .unwrap_or_default()
        .window(&params, r.options.page_limits)?;
    tracing::debug!(model = %r.model.name, query = ?query, window = ?window, "list");

    let page = r.store.list(&r.model, &query, window).await?;
    let rows = r.controller.post_list.execute(&ctx, page.rows, ()).await?;
    let items = r.respond(&ctx, ResponseData::Many(rows), &r.options.list_schema);
    Ok(Json(PageBody {
        count: page.count,
        items,
    }))
}

async fn get_item(
    State(r): State<Arc<ModelRoutes>>,
    Path(raw_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let ctx = RequestContext::new(method, uri, headers);
    let (_, row) = r.fetch(&raw_id).await?;
    Ok(Json(r.respond(&ctx, ResponseData::One(row), &r.options.detail_schema)))
}

async fn create_item(
    State(r): State<Arc<ModelRoutes>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    payload: Result<Payload, ApiError>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let schema = r
        .options
        .create_schema
        .clone()
        .ok_or_else(|| ApiError::http(StatusCode::METHOD_NOT_ALLOWED, "create is not enabled"))?;
    let (body, files) = r.options.uploads.stage(&r.model, payload?)?;
    let ctx = RequestContext::new(method, uri, headers);

    let data = schema.validate(body)?;
    let data = r.controller.before_create.execute(&ctx, data, Arc::clone(&schema)).await?;
    let row = r.with_files(&files, r.store.create(&r.model, &data)).await?;
    let created_id = row.get(&r.model.pk).cloned().unwrap_or_default();
    tracing::debug!(model = %r.model.name, id = %created_id, "created");
    let row = r.controller.after_create.execute(&ctx, row, ()).await?;
    Ok((
        StatusCode::CREATED,
        Json(r.respond(&ctx, ResponseData::One(row), &r.options.detail_schema)),
    ))
}

async fn update_item(
    State(r): State<Arc<ModelRoutes>>,
    Path(raw_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    payload: Result<Payload, ApiError>,
) -> Result<Json<Value>, ApiError> {
    let schema = r
        .options
        .update_schema
        .clone()
        .ok_or_else(|| ApiError::http(StatusCode::METHOD_NOT_ALLOWED, "update is not enabled"))?;
    let ctx = RequestContext::new(method, uri, headers);
    let (id, instance) = r.fetch(&raw_id).await?;
    let (body, files) = r.options.uploads.stage(&r.model, payload?)?;

    let data = schema.validate_partial(body)?;
    let data = r
        .controller
        .before_update
        .execute(&ctx, data, (instance, Arc::clone(&schema)))
        .await?;
    let row = r
        .with_files(&files, async {
            r.store.update(&r.model, &id, &data).await?.ok_or_else(|| r.not_found())
        })
        .await?;
    let row = r.controller.after_update.execute(&ctx, row, ()).await?;
    Ok(Json(r.respond(&ctx, ResponseData::One(row), &r.options.detail_schema)))
}

async fn delete_item(
    State(r): State<Arc<ModelRoutes>>,
    Path(raw_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<DeleteBody>, ApiError> {
    let ctx = RequestContext::new(method, uri, headers);
    let (id, instance) = r.fetch(&raw_id).await?;
    let instance = r.controller.before_delete.execute(&ctx, instance, ()).await?;
    if !r.store.delete(&r.model, &id).await? {
        return Err(r.not_found());
    }
    r.controller.after_delete.execute(&ctx, instance, ()).await?;
    Ok(Json(DeleteBody::deleted(&r.model.name, &id)))
}

/// Add CRUD routes for `model` to `router`. The model's controller is looked up in `registry` now;
/// a model without one gets default hooks.
pub fn register_model_routes(
    router: Router,
    store: Arc<dyn Store>,
    registry: &ModelRegistry,
    model: Arc<ModelMeta>,
    options: RouteOptions,
) -> Router {
    let base = options.base_url.trim_end_matches('/').to_string();
    let controller = resolve_controller(registry, &model.name);
    tracing::info!(
        model = %model.name,
        base = %base,
        create = options.create_schema.is_some(),
        update = options.update_schema.is_some(),
        hooks = ?controller.overridden_hooks(),
        "registering model routes"
    );

    let mut collection = get(list_items);
    if options.create_schema.is_some() {
        collection = collection.post(create_item);
    }
    let mut item = get(get_item).delete(delete_item);
    if options.update_schema.is_some() {
        item = item.patch(update_item);
    }

    let state = Arc::new(ModelRoutes {
        model,
        store,
        controller,
        options,
    });
    let routes = Router::new()
        .route(&base, collection.clone())
        .route(&format!("{}/", base), collection)
        .route(&format!("{}/:id", base), item)
        .with_state(state);
    router.merge(routes)
}
