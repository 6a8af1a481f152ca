//! Odoo JSON-RPC 2.0 envelopes and search domains.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::error::RpcErrorData;

/// Outgoing `call` request.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: RpcParams<'a>,
    pub id: u64,
}

#[derive(Debug, Serialize)]
pub struct RpcParams<'a> {
    pub service: &'a str,
    pub method: &'a str,
    pub args: Vec<Value>,
}

impl<'a> RpcRequest<'a> {
    pub fn call(service: &'a str, method: &'a str, args: Vec<Value>, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams {
                service,
                method,
                args,
            },
            id,
        }
    }
}

/// Incoming response: exactly one of `result` or `error` is expected.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<RpcErrorData>,
}

/// A search domain: a conjunction of `[field, operator, value]` leaves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain {
    leaves: Vec<(String, String, Value)>,
}

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.leaves
            .push((field.to_string(), operator.to_string(), value.into()));
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, "=", value)
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Array(
            self.leaves
                .iter()
                .map(|(field, op, value)| json!([field, op, value]))
                .collect(),
        )
    }
}

/// Keyword arguments for `search_read`.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<u32>,
    pub order: Option<String>,
}

impl SearchOptions {
    pub fn to_kwargs(&self, fields: &[&str]) -> Map<String, Value> {
        let mut kwargs = Map::new();
        kwargs.insert("fields".to_string(), json!(fields));
        if let Some(limit) = self.limit {
            kwargs.insert("limit".to_string(), json!(limit));
        }
        if let Some(ref order) = self.order {
            kwargs.insert("order".to_string(), json!(order));
        }
        kwargs
    }
}
