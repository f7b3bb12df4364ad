//! Hook values and execution helpers.
//!
//! A [`Hook`] is either the default no-op or a user callback in one of three forms:
//! inline synchronous, synchronous on the blocking pool, or async. Executing the default
//! hook hands its input back unchanged.

use crate::error::ApiError;
use crate::schema::{Record, Schema};
use axum::http::{HeaderMap, Method, Uri};
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Request data visible to hooks and response formatters.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        RequestContext { method, uri, headers }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub type HookFuture<T> = BoxFuture<'static, Result<T, ApiError>>;
type HookFn<T, X> = dyn Fn(RequestContext, T, X) -> HookFuture<T> + Send + Sync;

/// How a user hook is run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Executor {
    Inline,
    Blocking,
    Async,
}

/// A lifecycle callback taking the current value `T` plus read-only `extra` input, returning the new value.
pub struct Hook<T, X = ()> {
    func: Option<Arc<HookFn<T, X>>>,
    executor: Option<Executor>,
}

impl<T, X> Clone for Hook<T, X> {
    fn clone(&self) -> Self {
        Hook {
            func: self.func.clone(),
            executor: self.executor,
        }
    }
}

impl<T, X> Default for Hook<T, X> {
    fn default() -> Self {
        Hook {
            func: None,
            executor: None,
        }
    }
}

impl<T, X> fmt::Debug for Hook<T, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.executor {
            None => f.write_str("Hook(default)"),
            Some(e) => write!(f, "Hook({:?})", e),
        }
    }
}

impl<T, X> Hook<T, X>
where
    T: Send + 'static,
    X: Send + 'static,
{
    /// Run `f` inline on the request task.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(RequestContext, T, X) -> Result<T, ApiError> + Send + Sync + 'static,
    {
        let func: Arc<HookFn<T, X>> = Arc::new(move |ctx: RequestContext, value: T, extra: X| -> HookFuture<T> {
            future::ready(f(ctx, value, extra)).boxed()
        });
        Hook {
            func: Some(func),
            executor: Some(Executor::Inline),
        }
    }

    /// Run `f` on the blocking thread pool. Use for hooks doing blocking I/O.
    /// A panic inside `f` surfaces as a `SynchronousOperationError`.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(RequestContext, T, X) -> Result<T, ApiError> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let func: Arc<HookFn<T, X>> = Arc::new(move |ctx: RequestContext, value: T, extra: X| -> HookFuture<T> {
            let f = Arc::clone(&f);
            async move {
                match tokio::task::spawn_blocking(move || f(ctx, value, extra)).await {
                    Ok(result) => result,
                    Err(e) => Err(ApiError::from(e)),
                }
            }
            .boxed()
        });
        Hook {
            func: Some(func),
            executor: Some(Executor::Blocking),
        }
    }

    /// Await the future returned by `f`.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(RequestContext, T, X) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let func: Arc<HookFn<T, X>> = Arc::new(move |ctx: RequestContext, value: T, extra: X| -> HookFuture<T> {
            f(ctx, value, extra).boxed()
        });
        Hook {
            func: Some(func),
            executor: Some(Executor::Async),
        }
    }

    /// Execute the hook, or return `value` unchanged for the default hook.
    pub async fn execute(&self, ctx: &RequestContext, value: T, extra: X) -> Result<T, ApiError> {
        match &self.func {
            Some(f) => f(ctx.clone(), value, extra).await,
            None => Ok(value),
        }
    }
}

impl<T, X> Hook<T, X> {
    /// True for the no-op hook used when no callback was supplied.
    pub fn is_default(&self) -> bool {
        self.func.is_none()
    }

    pub fn executor(&self) -> Option<Executor> {
        self.executor
    }
}

/// One row or a page of rows handed to a custom response formatter.
#[derive(Clone, Debug)]
pub enum ResponseData {
    One(Record),
    Many(Vec<Record>),
}

/// Replaces default schema serialization when set on a controller.
pub type ResponseFormatter = Arc<dyn Fn(&RequestContext, ResponseData) -> Value + Send + Sync>;

/// Format a response: the custom formatter when present, else the schema projection
/// (an array of projections for `Many`).
pub fn handle_response(
    ctx: &RequestContext,
    data: ResponseData,
    schema: &Schema,
    custom_response: Option<&ResponseFormatter>,
) -> Value {
    if let Some(format) = custom_response {
        return format(ctx, data);
    }
    match data {
        ResponseData::One(row) => schema.serialize(&row),
        ResponseData::Many(rows) => Value::Array(rows.iter().map(|r| schema.serialize(r)).collect()),
    }
}
