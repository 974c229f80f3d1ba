// Resource endpoints
// Thin wrappers mapping operations to paths on the transport

mod accounts;
mod campaigns;

pub use accounts::Accounts;
pub use campaigns::Campaigns;

use serde_json::Value;

use crate::error::{Error, Result};

/// Attach resource details to a NotFound error
pub(crate) fn for_resource<T>(result: Result<T>, resource_type: &str, resource_id: &str) -> Result<T> {
    result.map_err(|err| match err {
        Error::Api(api) if api.is_not_found() => Error::Api(api.with_resource(resource_type, resource_id)),
        other => other,
    })
}

/// Treat an empty response as JSON null
pub(crate) fn or_null(value: Option<Value>) -> Value {
    value.unwrap_or(Value::Null)
}
