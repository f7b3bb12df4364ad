//! OpenAPI document for the registered model routes.

use crate::config::ModelMeta;
use crate::routes::RouteOptions;
use crate::schema::{PrimitiveType, Schema as ModelSchema};
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use utoipa::openapi::path::{HttpMethod, Operation, OperationBuilder, ParameterBuilder, ParameterIn};
use utoipa::openapi::request_body::RequestBodyBuilder;
use utoipa::openapi::schema::{Array, ObjectBuilder, Schema, Type};
use utoipa::openapi::{
    ComponentsBuilder, ContentBuilder, InfoBuilder, OpenApi, OpenApiBuilder, PathItem, PathsBuilder, Ref,
    RefOr, Required, ResponseBuilder,
};

/// A model together with the options its routes were registered with.
#[derive(Clone, Debug)]
pub struct RegisteredModel {
    pub model: Arc<ModelMeta>,
    pub options: RouteOptions,
}

fn primitive(ty: PrimitiveType) -> Type {
    match ty {
        PrimitiveType::Integer => Type::Integer,
        PrimitiveType::String => Type::String,
        PrimitiveType::Boolean => Type::Boolean,
        PrimitiveType::Array => Type::Array,
    }
}

fn typed(ty: Type) -> RefOr<Schema> {
    RefOr::T(Schema::Object(ObjectBuilder::new().schema_type(ty).build()))
}

fn object_schema(schema: &ModelSchema) -> RefOr<Schema> {
    let mut obj = ObjectBuilder::new();
    for f in &schema.fields {
        let prop = match f.ty {
            PrimitiveType::Array => Schema::Array(Array::new(typed(Type::String))),
            ty => Schema::Object(
                ObjectBuilder::new()
                    .schema_type(primitive(ty))
                    .max_length(f.max_length.map(|n| n as usize))
                    .build(),
            ),
        };
        obj = obj.property(&f.name, RefOr::T(prop));
        if f.required {
            obj = obj.required(&f.name);
        }
    }
    RefOr::T(Schema::Object(obj.build()))
}

fn error_schema() -> RefOr<Schema> {
    let detail = ObjectBuilder::new()
        .property("type", typed(Type::String))
        .property("message", typed(Type::String))
        .required("type")
        .required("message");
    RefOr::T(Schema::Object(
        ObjectBuilder::new()
            .property("error", RefOr::T(Schema::Object(detail.build())))
            .required("error")
            .build(),
    ))
}

fn json_response(description: &str, schema: RefOr<Schema>) -> utoipa::openapi::Response {
    ResponseBuilder::new()
        .description(description)
        .content("application/json", ContentBuilder::new().schema(Some(schema)).build())
        .build()
}

fn schema_ref(schema: &ModelSchema) -> RefOr<Schema> {
    RefOr::Ref(Ref::from_schema_name(schema.name.clone()))
}

fn error_ref() -> RefOr<Schema> {
    RefOr::Ref(Ref::from_schema_name("ErrorBody"))
}

fn query_param(name: &str, ty: Type) -> utoipa::openapi::path::Parameter {
    ParameterBuilder::new()
        .name(name)
        .parameter_in(ParameterIn::Query)
        .required(Required::False)
        .schema(Some(typed(ty)))
        .build()
}

fn id_param() -> utoipa::openapi::path::Parameter {
    ParameterBuilder::new()
        .name("id")
        .parameter_in(ParameterIn::Path)
        .required(Required::True)
        .schema(Some(typed(Type::String)))
        .build()
}

fn operation(id: String, tag: &str) -> OperationBuilder {
    OperationBuilder::new().operation_id(Some(id)).tag(tag)
}

fn list_operation(entry: &RegisteredModel, lower: &str) -> Operation {
    let opts = &entry.options;
    let page = ObjectBuilder::new()
        .property("count", typed(Type::Integer))
        .property("items", RefOr::T(Schema::Array(Array::new(schema_ref(&opts.list_schema)))))
        .required("count")
        .required("items");
    let mut op = operation(format!("list_{}", lower), &entry.model.name)
        .parameter(query_param("q", Type::String))
        .parameter(query_param("sort", Type::String))
        .parameter(query_param("order", Type::String));
    for p in opts.pagination.unwrap_or_default().params() {
        op = op.parameter(query_param(p, Type::Integer));
    }
    op.response("200", json_response("Page of items", RefOr::T(Schema::Object(page.build()))))
        .response("400", json_response("Invalid query", error_ref()))
        .build()
}

/// JSON body, plus `multipart/form-data` when the model takes file uploads.
fn body_operation(id: String, entry: &RegisteredModel, schema: &ModelSchema, status: &str) -> OperationBuilder {
    let mut body = RequestBodyBuilder::new()
        .content(
            "application/json",
            ContentBuilder::new().schema(Some(schema_ref(schema))).build(),
        )
        .required(Some(Required::True));
    if !entry.options.uploads.fields.is_empty() {
        body = body.content(
            "multipart/form-data",
            ContentBuilder::new().schema(Some(schema_ref(schema))).build(),
        );
    }
    let body = body.build();
    operation(id, &entry.model.name)
        .request_body(Some(body))
        .response(status, json_response("Item", schema_ref(&entry.options.detail_schema)))
        .response("400", json_response("Validation failed", error_ref()))
}

/// Build the document: one component per generated schema, operations tagged by model name.
pub fn build_openapi(title: &str, version: &str, models: &[RegisteredModel]) -> OpenApi {
    let mut paths = PathsBuilder::new();
    let mut components = ComponentsBuilder::new().schema("ErrorBody", error_schema());

    for entry in models {
        let opts = &entry.options;
        let lower = entry.model.name.to_lowercase();
        let base = opts.base_url.trim_end_matches('/');

        let mut schemas = vec![&opts.list_schema, &opts.detail_schema];
        schemas.extend(opts.create_schema.iter());
        schemas.extend(opts.update_schema.iter());
        for s in schemas {
            components = components.schema(s.name.clone(), object_schema(s));
        }

        let mut collection = PathItem::new(HttpMethod::Get, list_operation(entry, &lower));
        if let Some(create) = &opts.create_schema {
            collection.post = Some(body_operation(format!("create_{}", lower), entry, create, "201").build());
        }
        paths = paths.path(format!("{}/", base), collection);

        let not_found = || json_response("Not found", error_ref());
        let mut item = PathItem::new(
            HttpMethod::Get,
            operation(format!("get_{}", lower), &entry.model.name)
                .parameter(id_param())
                .response("200", json_response("Item", schema_ref(&opts.detail_schema)))
                .response("404", not_found())
                .build(),
        );
        if let Some(update) = &opts.update_schema {
            item.patch = Some(
                body_operation(format!("update_{}", lower), entry, update, "200")
                    .parameter(id_param())
                    .response("404", not_found())
                    .build(),
            );
        }
        let deleted = ObjectBuilder::new()
            .property("message", typed(Type::String))
            .required("message");
        item.delete = Some(
            operation(format!("delete_{}", lower), &entry.model.name)
                .parameter(id_param())
                .response("200", json_response("Deleted", RefOr::T(Schema::Object(deleted.build()))))
                .response("404", not_found())
                .build(),
        );
        paths = paths.path(format!("{}/{{id}}", base), item);
    }

    OpenApiBuilder::new()
        .info(InfoBuilder::new().title(title).version(version).build())
        .paths(paths.build())
        .components(Some(components.build()))
        .build()
}

/// Serve `doc` as JSON at `path`.
pub fn openapi_route(path: &str, doc: OpenApi) -> Router {
    let doc = Arc::new(doc);
    Router::new().route(
        path,
        get(move || {
            let doc = Arc::clone(&doc);
            async move { Json(doc.as_ref().clone()) }
        }),
    )
}
