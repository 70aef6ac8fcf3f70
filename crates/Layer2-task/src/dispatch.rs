//! Request dispatch
//!
//! Maps a JSON request envelope onto one [`TaskManager`] operation. This is
//! the whole surface an outer transport needs: decode a [`Request`], call
//! [`Dispatcher::dispatch`], encode the [`Response`].

use crate::error::TaskError;
use crate::manager::{SendResponse, StartOptions, StopResponse, TaskManager};
use crate::task::{TaskId, TaskRequest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Envelope
// ============================================================================

/// Incoming request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    /// Echoed back in the response
    #[serde(default)]
    pub id: Option<Value>,

    pub method: String,

    #[serde(default)]
    pub params: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: None,
            method: method.into(),
            params,
            token: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Error codes carried in a [`Response`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unparseable envelope or unknown method
    InvalidRequest,
    /// Params did not match the method
    InvalidParams,
    /// Unknown task id
    NotFound,
    /// Rejected by the authorizer
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchError {
    pub code: ErrorCode,
    pub message: String,
}

impl DispatchError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<TaskError> for DispatchError {
    fn from(err: TaskError) -> Self {
        let code = match err {
            TaskError::NotFound { .. } => ErrorCode::NotFound,
            _ => ErrorCode::InvalidRequest,
        };
        Self::new(code, err.to_string())
    }
}

/// Outgoing response; exactly one of `result` and `error` is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchError>,
}

impl Response {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, error: DispatchError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================================================
// Authorization
// ============================================================================

/// Decides whether a request may reach the controller
pub trait Authorizer: Send + Sync {
    fn authorize(&self, request: &Request) -> bool;
}

/// Accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _request: &Request) -> bool {
        true
    }
}

/// Requires `token` to equal a shared secret
#[derive(Clone)]
pub struct TokenAuthorizer {
    token: String,
}

impl TokenAuthorizer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for TokenAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthorizer")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Authorizer for TokenAuthorizer {
    fn authorize(&self, request: &Request) -> bool {
        match request.token.as_deref() {
            Some(given) => constant_time_eq(given.as_bytes(), self.token.as_bytes()),
            None => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ============================================================================
// Params
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartParams {
    instruction: String,
    working_directory: PathBuf,
    #[serde(default)]
    wait_for_completion: bool,
    #[serde(default, alias = "timeout")]
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskParams {
    task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputParams {
    task_id: String,
    #[serde(default, alias = "lines")]
    line_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendParams {
    task_id: String,
    message: String,
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, DispatchError> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| DispatchError::new(ErrorCode::InvalidParams, format!("Invalid params: {}", e)))
}

/// Ids that do not parse cannot name a task
fn parse_task_id(raw: &str) -> Result<TaskId, TaskError> {
    raw.parse().map_err(|_| TaskError::not_found(raw))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, DispatchError> {
    serde_json::to_value(value).map_err(|e| {
        DispatchError::new(
            ErrorCode::InvalidRequest,
            format!("Failed to encode result: {}", e),
        )
    })
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Method names understood by [`Dispatcher`]
pub const METHODS: &[&str] = &["start", "status", "output", "send", "list", "stop", "stats"];

pub struct Dispatcher {
    manager: TaskManager,
    authorizer: Arc<dyn Authorizer>,
}

impl Dispatcher {
    pub fn new(manager: TaskManager) -> Self {
        Self::with_authorizer(manager, Arc::new(AllowAll))
    }

    pub fn with_authorizer(manager: TaskManager, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            manager,
            authorizer,
        }
    }

    pub fn manager(&self) -> &TaskManager {
        &self.manager
    }

    /// Handle one request
    pub async fn dispatch(&self, request: Request) -> Response {
        let Request {
            id, method, params, ..
        } = &request;

        if !self.authorizer.authorize(&request) {
            warn!("Rejected unauthorized {} request", method);
            return Response::failure(
                id.clone(),
                DispatchError::new(ErrorCode::Unauthorized, "Unauthorized"),
            );
        }

        debug!("Dispatching {}", method);
        match self.call(method, params.clone()).await {
            Ok(result) => Response::success(id.clone(), result),
            Err(error) => Response::failure(id.clone(), error),
        }
    }

    /// Decode a raw line and handle it
    pub async fn dispatch_json(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => Response::failure(
                None,
                DispatchError::new(ErrorCode::InvalidRequest, format!("Malformed request: {}", e)),
            ),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, DispatchError> {
        match method {
            "start" => {
                let p: StartParams = parse_params(params)?;
                if p.instruction.trim().is_empty() {
                    return Err(DispatchError::new(
                        ErrorCode::InvalidParams,
                        "instruction must not be empty",
                    ));
                }
                let options = StartOptions {
                    wait_for_completion: p.wait_for_completion,
                    timeout: p.timeout_seconds.map(Duration::from_secs),
                };
                let response = self
                    .manager
                    .start(TaskRequest::new(p.instruction, p.working_directory), options)
                    .await;
                to_value(&response)
            }
            "status" => {
                let p: TaskParams = parse_params(params)?;
                let id = parse_task_id(&p.task_id)?;
                to_value(&self.manager.get_status(id).await?)
            }
            "output" => {
                let p: OutputParams = parse_params(params)?;
                let id = parse_task_id(&p.task_id)?;
                to_value(&self.manager.get_output(id, p.line_count).await?)
            }
            "send" => {
                let p: SendParams = parse_params(params)?;
                let response = match parse_task_id(&p.task_id) {
                    Ok(id) => self.manager.send(id, &p.message).await,
                    Err(e) => SendResponse::failed(e),
                };
                to_value(&response)
            }
            "list" => to_value(&self.manager.list().await),
            "stop" => {
                let p: TaskParams = parse_params(params)?;
                let response = match parse_task_id(&p.task_id) {
                    Ok(id) => self.manager.stop(id).await,
                    Err(e) => StopResponse::failed(e),
                };
                to_value(&response)
            }
            "stats" => to_value(&self.manager.stats().await),
            other => Err(DispatchError::new(
                ErrorCode::InvalidRequest,
                format!("Unknown method: {} (expected one of {})", other, METHODS.join(", ")),
            )),
        }
    }
}
