use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ExplorerError;
use crate::validation;

/// HTTP methods supported by the explorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            HttpMethod::GET,
            HttpMethod::POST,
            HttpMethod::PUT,
            HttpMethod::DELETE,
            HttpMethod::PATCH,
            HttpMethod::HEAD,
            HttpMethod::OPTIONS,
        ]
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    /// Only these methods ever get a request body attached.
    pub fn carries_body(&self) -> bool {
        matches!(self, HttpMethod::POST | HttpMethod::PUT | HttpMethod::PATCH)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A placeholder extracted from a route template such as `/users/[id]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathParam {
    pub name: String,
    /// Exact placeholder text in the template (`:id`, `[id]`, `[...slug]`).
    pub pattern: String,
    pub value: String,
    pub required: bool,
}

impl PathParam {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            value: String::new(),
            required,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
}

/// Editable row used for both query parameters and headers.
///
/// `id` never changes across edits so a front end can keep focus and
/// selection on the same row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub id: String,
    pub key: String,
    pub value: String,
    pub enabled: bool,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether the row contributes to the outgoing request.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.key.is_empty() && !self.value.is_empty()
    }
}

/// How the request authenticates against the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthType {
    /// Cookie-based session; credentials are included.
    #[default]
    Session,
    /// Bearer API key.
    ApiKey,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Session => "session",
            AuthType::ApiKey => "apiKey",
        }
    }
}

/// A fully resolved request, ready to hand to the executor.
///
/// Can only be built through [`RequestConfig::new`], which rejects bodies
/// that are not valid JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    url: String,
    method: HttpMethod,
    headers: Vec<(String, String)>,
    body: Option<String>,
    auth_type: AuthType,
    api_key: Option<String>,
    session_cookie: Option<String>,
}

impl RequestConfig {
    pub fn new(
        method: HttpMethod,
        url: impl Into<String>,
        headers: Vec<(String, String)>,
        body: Option<String>,
        auth_type: AuthType,
    ) -> Result<Self, ExplorerError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ExplorerError::Validation(vec!["URL is required".to_string()]));
        }

        let body = body.filter(|b| !b.trim().is_empty());
        if let Some(body) = &body {
            if let Some(message) = validation::validate_json_body(body) {
                return Err(ExplorerError::Validation(vec![message]));
            }
        }

        Ok(Self {
            url,
            method,
            headers,
            body,
            auth_type,
            api_key: None,
            session_cookie: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = cookie.filter(|c| !c.is_empty());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn session_cookie(&self) -> Option<&str> {
        self.session_cookie.as_deref()
    }

    /// Body that actually goes over the wire for this method.
    pub fn outgoing_body(&self) -> Option<&str> {
        if self.method.carries_body() {
            self.body()
        } else {
            None
        }
    }

    /// Headers as sent: user headers, `Content-Type` defaulting to JSON,
    /// then the auth header for API-key requests.
    pub fn outgoing_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();

        let has_content_type = headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("Content-Type"));
        if !has_content_type {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        match self.auth_type {
            AuthType::ApiKey => {
                let has_authorization = headers
                    .iter()
                    .any(|(k, _)| k.eq_ignore_ascii_case("Authorization"));
                if let (Some(key), false) = (self.api_key(), has_authorization) {
                    headers.push(("Authorization".to_string(), format!("Bearer {}", key)));
                }
            }
            AuthType::Session => {
                let has_cookie = headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("Cookie"));
                if let (Some(cookie), false) = (self.session_cookie(), has_cookie) {
                    headers.push(("Cookie".to_string(), cookie.to_string()));
                }
            }
        }

        headers
    }

    /// Outgoing headers safe to persist: credential values are masked.
    pub fn recorded_headers(&self) -> Vec<(String, String)> {
        self.outgoing_headers()
            .into_iter()
            .map(|(key, value)| {
                if is_credential_header(&key) {
                    (key, MASKED_VALUE.to_string())
                } else {
                    (key, value)
                }
            })
            .collect()
    }
}

/// Stand-in for credential values in stored history.
pub const MASKED_VALUE: &str = "********";

fn is_credential_header(name: &str) -> bool {
    ["authorization", "cookie", "proxy-authorization", "x-api-key"]
        .iter()
        .any(|c| name.eq_ignore_ascii_case(c))
}

/// Response body, parsed as JSON when the server says it is JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// Body as display text; JSON is pretty-printed.
    pub fn to_display_string(&self) -> String {
        match self {
            ResponseBody::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            ResponseBody::Text(text) => text.clone(),
        }
    }
}

/// Normalized result of a completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
    /// Wall-clock milliseconds around the network call.
    pub timing: u64,
    pub size: Option<usize>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What the response panel should currently show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Idle => "idle",
            RequestStatus::Loading => "loading",
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Success | RequestStatus::Error | RequestStatus::Cancelled
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// History item stored in database
#[derive(Debug, Clone)]
pub struct HistoryItem {
    pub id: i64,
    pub timestamp: String,
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub response: Option<ApiResponse>,
}

impl HistoryItem {
    /// Short display title such as `GET users`.
    pub fn title(&self) -> String {
        if self.url.is_empty() {
            return "New Request".to_string();
        }

        let path = self
            .url
            .split('?')
            .next()
            .and_then(|s| s.split('/').last())
            .filter(|s| !s.is_empty())
            .unwrap_or("Untitled");

        format!("{} {}", self.method.as_str(), path)
    }
}
