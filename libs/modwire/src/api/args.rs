use axum::response::Response;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

use crate::errors::{AppError, HandlerError};

/// Positional handler arguments, extracted from the request according to the
/// handler's parameter bindings. Unbound positions hold `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerArgs {
    values: Vec<Value>,
}

impl HandlerArgs {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn raw(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Move argument `index` out and deserialize it. A missing argument is
    /// treated as `null`, so `Option<T>` accepts it.
    pub fn take<T: DeserializeOwned>(&mut self, index: usize) -> Result<T, HandlerError> {
        let value = self
            .values
            .get_mut(index)
            .map(Value::take)
            .unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| {
            AppError::bad_request(format!("Invalid argument at position {index}: {e}")).into()
        })
    }

    /// Like [`take`](Self::take), but parses string values with `FromStr`,
    /// which suits path and query parameters.
    pub fn take_parsed<T>(&mut self, index: usize) -> Result<T, HandlerError>
    where
        T: FromStr + DeserializeOwned,
        T::Err: std::fmt::Display,
    {
        match self.values.get(index) {
            Some(Value::String(s)) => s.parse::<T>().map_err(|e| {
                AppError::bad_request(format!("Invalid argument at position {index}: {e}")).into()
            }),
            _ => self.take(index),
        }
    }
}

/// What a handler produced.
pub enum Reply {
    /// Serialized as the JSON response body.
    Json { status: StatusCode, body: Value },
    /// 204 with an empty body.
    NoContent,
    /// The handler built the response itself; sent untouched.
    Handled(Response),
}

impl Reply {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        Self::with_status(StatusCode::OK, value)
    }

    pub fn created<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        Self::with_status(StatusCode::CREATED, value)
    }

    pub fn with_status<T: Serialize>(status: StatusCode, value: &T) -> Result<Self, HandlerError> {
        let body = serde_json::to_value(value).map_err(anyhow::Error::from)?;
        Ok(Reply::Json { status, body })
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Json { status, body } => f
                .debug_struct("Json")
                .field("status", status)
                .field("body", body)
                .finish(),
            Reply::NoContent => f.write_str("NoContent"),
            Reply::Handled(resp) => f.debug_tuple("Handled").field(&resp.status()).finish(),
        }
    }
}
