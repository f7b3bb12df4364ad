//! Response bodies shared by the model routes.

use serde::Serialize;
use serde_json::Value;

/// List response for both pagination strategies.
#[derive(Serialize, Debug)]
pub struct PageBody {
    pub count: u64,
    pub items: Value,
}

/// Delete response.
#[derive(Serialize, Debug)]
pub struct DeleteBody {
    pub message: String,
}

impl DeleteBody {
    /// `id` is the parsed key, so `/01` on an integer key reports `1`.
    pub fn deleted(model_name: &str, id: &Value) -> Self {
        let id = match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        DeleteBody {
            message: format!("{} with ID {} has been deleted.", model_name, id),
        }
    }
}
