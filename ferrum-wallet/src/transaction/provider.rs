//! JSON-RPC transport

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ChainEndpoint;
use crate::error::{Error, Result};

/// A JSON-RPC 2.0 endpoint.
///
/// `call` returns the `result` member of the response. A response carrying an
/// `error` member becomes [`Error::Rpc`]; a failure to reach the endpoint
/// becomes [`Error::Network`].
#[async_trait::async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value>;
}

/// Call `method` and deserialize its result
pub async fn call_as<T: DeserializeOwned>(
    transport: &dyn RpcTransport,
    method: &str,
    params: Value,
) -> Result<T> {
    let result = transport.call(method, params).await?;
    serde_json::from_value(result)
        .map_err(|e| Error::Serialization(format!("Unexpected {} result: {}", method, e)))
}

/// Transport over HTTP POST
pub struct HttpTransport {
    /// Endpoint URL
    url: String,
    /// Bearer token (if required)
    api_key: Option<String>,
    /// HTTP client
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Transport for an endpoint's submission URL
    pub fn rpc(endpoint: &ChainEndpoint) -> Self {
        Self::new(endpoint.rpc_url.clone(), endpoint.api_key.clone())
    }

    /// Transport for an endpoint's balance URL
    pub fn balance(endpoint: &ChainEndpoint) -> Self {
        Self::new(endpoint.balance_url().to_string(), endpoint.api_key.clone())
    }
}

#[async_trait::async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        debug!(method, url = %self.url, "Sending JSON-RPC request");

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to send {} request: {}", method, e)))?;

        let status = response.status();
        let response_json: Value = response.json().await.map_err(|e| {
            if status.is_success() {
                Error::Serialization(format!("Failed to parse {} response: {}", method, e))
            } else {
                Error::Network(format!("{} request failed with HTTP {}", method, status))
            }
        })?;

        parse_response(method, response_json)
    }
}

/// Split a JSON-RPC response into its result or error
pub(crate) fn parse_response(method: &str, mut response: Value) -> Result<Value> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        let data = error.get("data").filter(|d| !d.is_null()).cloned();
        return Err(Error::Rpc { code, message, data });
    }

    response
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| Error::Serialization(format!("No result in {} response", method)))
}

type Handler = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Scripted in-memory transport for tests and offline use.
///
/// Responses are looked up per method. Queued responses are served in order
/// and the last one repeats; a handler computes a response from the params.
/// Every call is recorded.
#[derive(Default)]
pub struct MockTransport {
    /// Queued responses per method
    responses: Mutex<HashMap<String, VecDeque<Result<Value>>>>,
    /// Computed responses per method
    handlers: Mutex<HashMap<String, Handler>>,
    /// Calls received, in order
    calls: Mutex<Vec<(String, Value)>>,
    /// Delay applied before answering
    latency: Option<Duration>,
}

impl MockTransport {
    /// Create a mock with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a successful result for `method`
    pub fn respond(&self, method: &str, result: Value) -> &Self {
        self.push(method, Ok(result))
    }

    /// Queue a failure for `method`
    pub fn fail(&self, method: &str, error: Error) -> &Self {
        self.push(method, Err(error))
    }

    /// Answer `method` by calling `handler` with the request params
    pub fn handle<F>(&self, method: &str, handler: F) -> &Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        lock(&self.handlers).insert(method.to_string(), Arc::new(handler));
        self
    }

    fn push(&self, method: &str, response: Result<Value>) -> &Self {
        lock(&self.responses)
            .entry(method.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Total number of calls received
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of calls received for `method`
    pub fn calls_to(&self, method: &str) -> usize {
        lock(&self.calls).iter().filter(|(m, _)| m == method).count()
    }

    /// Params of every call received for `method`
    pub fn params_of(&self, method: &str) -> Vec<Value> {
        lock(&self.calls)
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    fn answer(&self, method: &str, params: &Value) -> Result<Value> {
        {
            let mut responses = lock(&self.responses);
            if let Some(queue) = responses.get_mut(method) {
                if queue.len() > 1 {
                    if let Some(response) = queue.pop_front() {
                        return response;
                    }
                }
                if let Some(response) = queue.front() {
                    return response.clone();
                }
            }
        }

        let handler = lock(&self.handlers).get(method).cloned();
        match handler {
            Some(handler) => handler(params),
            None => Err(Error::Rpc {
                code: -32601,
                message: format!("Method not found: {}", method),
                data: None,
            }),
        }
    }
}

#[async_trait::async_trait]
impl RpcTransport for MockTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        lock(&self.calls).push((method.to_string(), params.clone()));

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.answer(method, &params)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
