//! Argument bundle forwarded to command packages

use crate::error::TrellisResult;
use serde_json::{Map, Value};

/// Option key holding the parent command reference
const PARENT_KEY: &str = "parent";

/// Positional arguments plus a trailing options object.
///
/// On the wire this is a JSON array: the positional values followed by the
/// options object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentBundle {
    pub positional: Vec<Value>,
    pub options: Map<String, Value>,
}

impl ArgumentBundle {
    pub fn new(positional: Vec<Value>, options: Map<String, Value>) -> Self {
        Self {
            positional,
            options,
        }
    }

    /// Copy without private (`_`-prefixed) keys or the parent reference
    pub fn sanitized(&self) -> Self {
        let options = self
            .options
            .iter()
            .filter(|(key, _)| !is_internal_key(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self::new(self.positional.clone(), options)
    }

    /// Flat argument list with the options object last
    pub fn to_values(&self) -> Vec<Value> {
        let mut values = self.positional.clone();
        values.push(Value::Object(self.options.clone()));
        values
    }

    /// Serialized form handed to the child process
    pub fn to_wire(&self) -> TrellisResult<String> {
        Ok(serde_json::to_string(&self.to_values())?)
    }
}

/// Keys that never cross the process boundary
pub fn is_internal_key(key: &str) -> bool {
    key.starts_with('_') || key == PARENT_KEY
}
