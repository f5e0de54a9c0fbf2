//! Named parameter binding for action handlers.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::errors::ActionError;

/// Parameters supplied to one action call, checked against the names the
/// action declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    action: String,
    values: Map<String, Value>,
}

impl Params {
    /// Binds `values` to an action accepting exactly the `declared` names.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::UnexpectedArgument`] for the first supplied name
    /// the action does not declare.
    pub fn bind(
        action: &str,
        declared: &[String],
        values: Map<String, Value>,
    ) -> Result<Self, ActionError> {
        if let Some(name) = values
            .keys()
            .find(|name| !declared.iter().any(|known| known == *name))
        {
            return Err(ActionError::UnexpectedArgument {
                action: action.to_owned(),
                name: name.clone(),
            });
        }
        Ok(Self {
            action: action.to_owned(),
            values,
        })
    }

    /// Name of the action these parameters were bound to.
    #[must_use]
    pub fn action(&self) -> &str {
        self.action.as_str()
    }

    /// Raw value of a parameter, if supplied.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns `true` when no parameters were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decodes a parameter the caller must supply.
    ///
    /// An explicit `null` counts as supplied and is decoded as such.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::MissingArgument`] when absent and
    /// [`ActionError::InvalidArgument`] when it does not decode as `T`.
    pub fn required<T: DeserializeOwned>(&self, name: &str) -> Result<T, ActionError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| ActionError::MissingArgument {
                action: self.action.clone(),
                name: name.to_owned(),
            })?;
        decode(name, value)
    }

    /// Decodes an optional parameter; absent and `null` both yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidArgument`] when present but not a `T`.
    pub fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ActionError> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => decode(name, value).map(Some),
        }
    }

    /// Decodes an optional parameter, substituting `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidArgument`] when present but not a `T`.
    pub fn optional_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T, ActionError> {
        Ok(self.optional(name)?.unwrap_or(default))
    }
}

fn decode<T: DeserializeOwned>(name: &str, value: &Value) -> Result<T, ActionError> {
    T::deserialize(value).map_err(|error| ActionError::invalid_argument(name, error.to_string()))
}
