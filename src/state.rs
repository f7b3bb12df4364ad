//! Shared application state for the non-model routes.

use crate::config::ModelSet;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub models: Arc<ModelSet>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, models: Arc<ModelSet>) -> Self {
        AppState { store, models }
    }
}
