//! Per-model controllers: bundles of lifecycle hooks around CRUD operations.

use crate::hooks::{Hook, RequestContext, ResponseData, ResponseFormatter};
use crate::query::ListQuery;
use crate::schema::{Record, Schema};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Lifecycle points a controller can hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookName {
    PreList,
    PostList,
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
    CustomResponse,
}

impl HookName {
    pub const ALL: [HookName; 9] = [
        HookName::PreList,
        HookName::PostList,
        HookName::BeforeCreate,
        HookName::AfterCreate,
        HookName::BeforeUpdate,
        HookName::AfterUpdate,
        HookName::BeforeDelete,
        HookName::AfterDelete,
        HookName::CustomResponse,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookName::PreList => "pre_list",
            HookName::PostList => "post_list",
            HookName::BeforeCreate => "before_create",
            HookName::AfterCreate => "after_create",
            HookName::BeforeUpdate => "before_update",
            HookName::AfterUpdate => "after_update",
            HookName::BeforeDelete => "before_delete",
            HookName::AfterDelete => "after_delete",
            HookName::CustomResponse => "custom_response",
        }
    }
}

/// Hooks for one model. Every hook defaults to a no-op.
#[derive(Clone, Default)]
pub struct Controller {
    /// Adjust filters and ordering before the store runs the list query.
    pub pre_list: Hook<ListQuery>,
    /// Adjust the fetched page of rows.
    pub post_list: Hook<Vec<Record>>,
    /// Runs on the validated payload; receives the create schema.
    pub before_create: Hook<Record, Arc<Schema>>,
    pub after_create: Hook<Record>,
    /// Runs on the validated partial payload; receives the current row and the update schema.
    pub before_update: Hook<Record, (Record, Arc<Schema>)>,
    pub after_update: Hook<Record>,
    /// Receives the row about to be deleted; return an error to veto.
    pub before_delete: Hook<Record>,
    pub after_delete: Hook<Record>,
    pub custom_response: Option<ResponseFormatter>,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("overridden", &self.overridden_hooks())
            .finish()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_default(&self, hook: HookName) -> bool {
        match hook {
            HookName::PreList => self.pre_list.is_default(),
            HookName::PostList => self.post_list.is_default(),
            HookName::BeforeCreate => self.before_create.is_default(),
            HookName::AfterCreate => self.after_create.is_default(),
            HookName::BeforeUpdate => self.before_update.is_default(),
            HookName::AfterUpdate => self.after_update.is_default(),
            HookName::BeforeDelete => self.before_delete.is_default(),
            HookName::AfterDelete => self.after_delete.is_default(),
            HookName::CustomResponse => self.custom_response.is_none(),
        }
    }

    /// Hooks with a user-supplied callback.
    pub fn overridden_hooks(&self) -> Vec<HookName> {
        HookName::ALL
            .into_iter()
            .filter(|h| !self.is_default(*h))
            .collect()
    }

    pub fn with_pre_list(mut self, hook: Hook<ListQuery>) -> Self {
        self.pre_list = hook;
        self
    }

    pub fn with_post_list(mut self, hook: Hook<Vec<Record>>) -> Self {
        self.post_list = hook;
        self
    }

    pub fn with_before_create(mut self, hook: Hook<Record, Arc<Schema>>) -> Self {
        self.before_create = hook;
        self
    }

    pub fn with_after_create(mut self, hook: Hook<Record>) -> Self {
        self.after_create = hook;
        self
    }

    pub fn with_before_update(mut self, hook: Hook<Record, (Record, Arc<Schema>)>) -> Self {
        self.before_update = hook;
        self
    }

    pub fn with_after_update(mut self, hook: Hook<Record>) -> Self {
        self.after_update = hook;
        self
    }

    pub fn with_before_delete(mut self, hook: Hook<Record>) -> Self {
        self.before_delete = hook;
        self
    }

    pub fn with_after_delete(mut self, hook: Hook<Record>) -> Self {
        self.after_delete = hook;
        self
    }

    pub fn with_custom_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext, ResponseData) -> Value + Send + Sync + 'static,
    {
        let formatter: ResponseFormatter = Arc::new(f);
        self.custom_response = Some(formatter);
        self
    }
}
