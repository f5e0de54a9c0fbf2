//! Call payload decoding.
//!
//! A call is a JSON object:
//!
//! ```json
//! {"action": "findNotes", "version": 6, "params": {"query": "deck:Default"}, "key": "..."}
//! ```
//!
//! Only `action` is required. Fields the gateway does not recognise are
//! ignored.

use serde_json::{Map, Value};

use super::errors::DispatchError;

/// One decoded action call.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCall {
    /// Requested action name.
    pub action: String,
    /// Protocol version the caller speaks.
    pub version: u32,
    /// Named parameters.
    pub params: Map<String, Value>,
    /// Shared secret presented by the caller.
    pub key: Option<String>,
}

impl ActionCall {
    /// Decodes a request body.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MalformedRequest`] when the body is not JSON
    /// and [`DispatchError::InvalidStructure`] when it is not a call object.
    pub fn parse(body: &[u8], default_version: u32) -> Result<Self, DispatchError> {
        let value = serde_json::from_slice(body).map_err(DispatchError::malformed)?;
        Self::from_value(value, default_version)
    }

    /// Decodes a call from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidStructure`] describing the first field
    /// that does not match the call schema.
    pub fn from_value(value: Value, default_version: u32) -> Result<Self, DispatchError> {
        let Value::Object(mut fields) = value else {
            return Err(DispatchError::invalid_structure(
                "request must be a JSON object",
            ));
        };

        let action = match fields.remove("action") {
            Some(Value::String(action)) if !action.is_empty() => action,
            Some(Value::String(_)) => {
                return Err(DispatchError::invalid_structure("action must not be empty"));
            }
            Some(_) => return Err(DispatchError::invalid_structure("action must be a string")),
            None => return Err(DispatchError::invalid_structure("action is required")),
        };

        let version = match fields.get("version") {
            None | Some(Value::Null) => default_version,
            Some(value) => version_of(value).ok_or_else(|| {
                DispatchError::invalid_structure("version must be a non-negative integer")
            })?,
        };

        let params = match fields.remove("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(params)) => params,
            Some(_) => return Err(DispatchError::invalid_structure("params must be an object")),
        };

        let key = match fields.remove("key") {
            None | Some(Value::Null) => None,
            Some(Value::String(key)) => Some(key),
            Some(_) => return Err(DispatchError::invalid_structure("key must be a string")),
        };

        Ok(Self {
            action,
            version,
            params,
            key,
        })
    }
}

/// Reads the version a payload asks for without validating the rest of it,
/// so failures can still be formatted for the caller's protocol.
#[must_use]
pub fn requested_version(value: &Value) -> Option<u32> {
    value.get("version").and_then(version_of)
}

fn version_of(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|version| u32::try_from(version).ok())
}
