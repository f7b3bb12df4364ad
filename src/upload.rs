//! File uploads: which model fields take files, where uploaded files are written, and
//! request bodies that may be either JSON or `multipart/form-data`.
//!
//! A multipart create or update is staged first: every file part gets its stored name and the
//! name is placed in the payload, so the payload validates like a JSON body. Files are written
//! only after validation and hooks succeed, and removed again if the store write fails.

use crate::case::to_snake_case;
use crate::config::{FieldKind, ModelMeta};
use crate::error::ApiError;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_MEDIA_ROOT: &str = "media";

/// Explicit file fields per model name. Models not listed here fall back to [`FileFieldDetector`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FileUploadConfig {
    #[serde(default)]
    pub file_fields: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub multiple_file_fields: HashMap<String, Vec<String>>,
}

impl FileUploadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_fields<I, S>(mut self, model: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_fields
            .insert(model.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn multiple_file_fields<I, S>(mut self, model: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.multiple_file_fields
            .insert(model.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn get_model_file_fields(&self, model: &str) -> &[String] {
        self.file_fields.get(model).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_model_multiple_file_fields(&self, model: &str) -> &[String] {
        self.multiple_file_fields.get(model).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_multiple_file_field(&self, model: &str, field: &str) -> bool {
        self.get_model_multiple_file_fields(model).iter().any(|f| f == field)
    }

    fn mentions(&self, model: &str) -> bool {
        self.file_fields.contains_key(model) || self.multiple_file_fields.contains_key(model)
    }
}

/// Finds file fields from field kinds: `file` is a single file, `files` a list.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileFieldDetector;

impl FileFieldDetector {
    pub fn detect_file_fields(&self, model: &ModelMeta) -> (Vec<String>, Vec<String>) {
        let named = |kind: FieldKind| -> Vec<String> {
            model
                .fields
                .iter()
                .filter(|f| f.kind == kind)
                .map(|f| f.name.clone())
                .collect()
        };
        (named(FieldKind::File), named(FieldKind::Files))
    }
}

/// Resolved file fields of one model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadFields {
    pub single: Vec<String>,
    pub multiple: Vec<String>,
}

impl UploadFields {
    /// Fields from `config` when it lists the model, detected fields otherwise.
    /// Configured names must be existing fields of the matching kind; others are skipped.
    pub fn resolve(model: &ModelMeta, config: Option<&FileUploadConfig>) -> Self {
        let Some(config) = config.filter(|c| c.mentions(&model.name)) else {
            let (single, multiple) = FileFieldDetector.detect_file_fields(model);
            return UploadFields { single, multiple };
        };
        let checked = |names: &[String], kind: FieldKind| -> Vec<String> {
            names
                .iter()
                .filter(|name| match model.get_field(name) {
                    Some(f) if f.kind == kind => true,
                    _ => {
                        tracing::warn!(model = %model.name, field = %name, expected = ?kind, "ignoring file upload field");
                        false
                    }
                })
                .cloned()
                .collect()
        };
        UploadFields {
            single: checked(config.get_model_file_fields(&model.name), FieldKind::File),
            multiple: checked(config.get_model_multiple_file_fields(&model.name), FieldKind::Files),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.single.is_empty() && self.multiple.is_empty()
    }
}

/// A file accepted from a request, not yet written.
#[derive(Clone, Debug)]
pub struct PendingFile {
    /// Stored name, relative to the media root.
    pub name: String,
    pub data: Bytes,
}

/// Local directory holding uploaded files.
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl Default for FileStorage {
    fn default() -> Self {
        FileStorage::new(DEFAULT_MEDIA_ROOT)
    }
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<app>/<model>/<random>_<file name>`; the client's name is reduced to its last path segment.
    pub fn stored_name(&self, model: &ModelMeta, original: &str) -> String {
        format!(
            "{}/{}/{}_{}",
            model.app_label,
            to_snake_case(&model.name),
            uuid::Uuid::new_v4().simple(),
            clean_file_name(original)
        )
    }

    /// Write every file, removing the ones already written if any write fails.
    pub async fn save_all(&self, files: &[PendingFile]) -> Result<(), ApiError> {
        for (i, file) in files.iter().enumerate() {
            if let Err(e) = self.save(file).await {
                self.discard(&files[..i]).await;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn save(&self, file: &PendingFile) -> Result<(), ApiError> {
        let path = self.root.join(&file.name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(storage_error)?;
        }
        tokio::fs::write(&path, &file.data).await.map_err(storage_error)?;
        tracing::info!(path = %path.display(), bytes = file.data.len(), "stored upload");
        Ok(())
    }

    pub async fn discard(&self, files: &[PendingFile]) {
        for file in files {
            let path = self.root.join(&file.name);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "could not remove upload");
            }
        }
    }
}

fn storage_error(e: std::io::Error) -> ApiError {
    ApiError::Internal(format!("failed to store upload: {}", e))
}

fn clean_file_name(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".into()
    } else {
        cleaned.to_string()
    }
}

/// One file part of a multipart body.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Create/update request body.
#[derive(Clone, Debug)]
pub enum Payload {
    Json(Value),
    /// Text parts become string values; file parts are kept aside.
    Form {
        fields: Map<String, Value>,
        files: Vec<UploadedFile>,
    },
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

#[async_trait]
impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Json(body) = Json::<Value>::from_request(req, state).await?;
            return Ok(Payload::Json(body));
        }
        let mut multipart = Multipart::from_request(req, state).await?;
        let mut fields = Map::new();
        let mut files = Vec::new();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?;
                    files.push(UploadedFile {
                        field: name,
                        file_name,
                        content_type,
                        data,
                    });
                }
                None => {
                    let text = field.text().await?;
                    fields.insert(name, Value::String(text));
                }
            }
        }
        Ok(Payload::Form { fields, files })
    }
}

/// File fields and storage used by one model's routes.
#[derive(Clone, Debug, Default)]
pub struct Uploads {
    pub fields: UploadFields,
    pub storage: Arc<FileStorage>,
}

impl Uploads {
    pub fn new(fields: UploadFields, storage: Arc<FileStorage>) -> Self {
        Uploads { fields, storage }
    }

    /// Turn a request body into a JSON payload plus the files to write once it is accepted.
    /// A `files` field collects every part sent under its name; a `file` field takes one part.
    pub fn stage(&self, model: &ModelMeta, payload: Payload) -> Result<(Value, Vec<PendingFile>), ApiError> {
        let (mut body, files) = match payload {
            Payload::Json(v) => return Ok((v, Vec::new())),
            Payload::Form { fields, files } => (fields, files),
        };
        let mut pending = Vec::with_capacity(files.len());
        let mut seen = HashSet::new();
        let mut errors = Vec::new();
        for file in files {
            if self.fields.multiple.contains(&file.field) {
                let name = self.storage.stored_name(model, &file.file_name);
                let stored = Value::String(name.clone());
                // Form text sent under the same name is replaced by the uploaded list.
                if seen.insert(file.field.clone()) {
                    body.insert(file.field.clone(), Value::Array(vec![stored]));
                } else if let Some(Value::Array(items)) = body.get_mut(&file.field) {
                    items.push(stored);
                }
                pending.push(PendingFile { name, data: file.data });
            } else if self.fields.single.contains(&file.field) {
                if !seen.insert(file.field.clone()) {
                    errors.push(format!("{}: expected a single file", file.field));
                    continue;
                }
                let name = self.storage.stored_name(model, &file.file_name);
                body.insert(file.field.clone(), Value::String(name.clone()));
                pending.push(PendingFile { name, data: file.data });
            } else {
                errors.push(format!("{}: not a file field", file.field));
            }
        }
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors.join("; ")));
        }
        tracing::debug!(model = %model.name, files = pending.len(), "staged multipart payload");
        Ok((Value::Object(body), pending))
    }
}
