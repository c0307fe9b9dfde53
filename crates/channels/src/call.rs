// Method calls from the shell and the notifications pushed back to it

use crate::error::{ChannelError, MethodError};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Outcome of one call
pub type MethodResult = std::result::Result<Value, MethodError>;

/// A named call with JSON arguments
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Decode the whole argument value
    pub fn arguments<T: DeserializeOwned>(&self) -> Result<T, ChannelError> {
        self.decode(self.arguments.clone())
    }

    /// Decode the argument map entry `key`; a missing key decodes as `null`
    pub fn argument<T: DeserializeOwned>(&self, key: &str) -> Result<T, ChannelError> {
        let value = self.arguments.get(key).cloned().unwrap_or(Value::Null);
        self.decode(value)
    }

    fn decode<T: DeserializeOwned>(&self, value: Value) -> Result<T, ChannelError> {
        serde_json::from_value(value).map_err(|source| ChannelError::Arguments {
            method: self.method.clone(),
            source,
        })
    }
}

/// A notification for the shell
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Item on the named event stream
    Data { stream: &'static str, payload: Value },
    /// Error on the named event stream
    Error {
        stream: &'static str,
        code: &'static str,
        message: String,
    },
    EndOfStream { stream: &'static str },
    /// Method invoked on the shell side
    Invoke { method: &'static str, arguments: Value },
}

/// Handles the calls of one plugin
pub trait MethodHandler: Send {
    fn handle(&mut self, call: &MethodCall) -> MethodResult;
}
