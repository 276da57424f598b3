//! GraphQL client and fetch error taxonomy.
//!
//! [`GraphqlClient::execute`] issues exactly one POST per call and never
//! retries; retry policy belongs to the coordinator, which simply waits for
//! the next cycle.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::throttling::RequestBudget;
use crate::Credentials;

/// Fixed GraphQL endpoint of the remote platform.
pub const DEFAULT_ENDPOINT: &str = "https://cults3d.com/graphql";

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

const AUTH_MARKERS: [&str; 9] = [
    "unauthorized",
    "unauthenticated",
    "not authorized",
    "authentication",
    "invalid api key",
    "invalid credentials",
    "forbidden",
    "access denied",
    "api key",
];

const NOT_FOUND_MARKERS: [&str; 5] = [
    "not found",
    "not_found",
    "does not exist",
    "doesn't exist",
    "no such",
];

/// `extensions.code` values graphql-ruby reports for queries the current
/// schema no longer accepts.
const SCHEMA_CODES: [&str; 5] = [
    "undefinedfield",
    "undefinedtype",
    "argumentnotaccepted",
    "graphql_validation_failed",
    "parse_error",
];

/// Message fragments of the same validation failures, for servers that send
/// no code.
const SCHEMA_MARKERS: [&str; 3] = [
    "doesn't exist on type",
    "doesn't accept argument",
    "has no such field",
];

/// Fetch failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Network failure or timeout; no response was received.
    Transport,
    /// Response status outside 200-299 (other than 401/403).
    Http,
    /// Missing or rejected credentials.
    Authentication,
    /// Unknown nickname or creation.
    NotFound,
    /// Response did not have the expected shape.
    Schema,
    /// Any other GraphQL-level error.
    GraphQl,
    /// Refused locally because the request budget is spent.
    RateLimited,
}

/// Structured fetch error carried through the coordinator and into status reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    graphql_code: Option<String>,
}

impl FetchError {
    fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            graphql_code: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Transport, message)
    }

    pub fn http(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::new(
                FetchErrorKind::Http,
                format!("upstream returned status {status}"),
            )
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Authentication, message)
    }

    pub fn authentication_status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::new(
                FetchErrorKind::Authentication,
                format!("upstream rejected credentials with status {status}"),
            )
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NotFound, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Schema, message)
    }

    pub fn graphql(message: impl Into<String>, code: Option<String>) -> Self {
        Self {
            graphql_code: code,
            ..Self::new(FetchErrorKind::GraphQl, message)
        }
    }

    pub fn rate_limited(wait: Duration) -> Self {
        Self::new(
            FetchErrorKind::RateLimited,
            format!(
                "request budget exhausted; next request allowed in {}ms",
                wait.as_millis()
            ),
        )
    }

    /// Classifies the first entry of a GraphQL `errors` array.
    ///
    /// Schema validation failures are checked first: a removed field reads
    /// "Field 'x' doesn't exist on type 'User'" and must not pass for a
    /// missing record.
    pub fn from_graphql_error(error: &Value) -> Self {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown GraphQL error")
            .to_owned();
        let code = error
            .pointer("/extensions/code")
            .or_else(|| error.get("code"))
            .and_then(Value::as_str)
            .map(str::to_owned);

        let lowered_code = code.as_deref().unwrap_or_default().to_ascii_lowercase();
        let haystack = format!("{} {lowered_code}", message.to_ascii_lowercase());
        let kind = if SCHEMA_CODES.contains(&lowered_code.as_str())
            || SCHEMA_MARKERS.iter().any(|marker| haystack.contains(marker))
        {
            FetchErrorKind::Schema
        } else if AUTH_MARKERS.iter().any(|marker| haystack.contains(marker)) {
            FetchErrorKind::Authentication
        } else if NOT_FOUND_MARKERS
            .iter()
            .any(|marker| haystack.contains(marker))
        {
            FetchErrorKind::NotFound
        } else {
            FetchErrorKind::GraphQl
        };

        Self {
            graphql_code: code,
            ..Self::new(kind, message)
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn graphql_code(&self) -> Option<&str> {
        self.graphql_code.as_deref()
    }

    pub const fn is_authentication(&self) -> bool {
        matches!(self.kind, FetchErrorKind::Authentication)
    }

    /// Whether the next scheduled cycle may succeed without user action.
    pub const fn retryable(&self) -> bool {
        matches!(
            self.kind,
            FetchErrorKind::Transport
                | FetchErrorKind::Http
                | FetchErrorKind::RateLimited
                | FetchErrorKind::GraphQl
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Transport => "fetch.transport",
            FetchErrorKind::Http => "fetch.http",
            FetchErrorKind::Authentication => "fetch.authentication",
            FetchErrorKind::NotFound => "fetch.not_found",
            FetchErrorKind::Schema => "fetch.schema",
            FetchErrorKind::GraphQl => "fetch.graphql",
            FetchErrorKind::RateLimited => "fetch.rate_limited",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

/// Returns `data.<field>` of a GraphQL envelope, `None` when it is null.
pub fn data_field<'a>(envelope: &'a Value, field: &str) -> Result<Option<&'a Value>, FetchError> {
    let data = envelope
        .get("data")
        .filter(|data| data.is_object())
        .ok_or_else(|| FetchError::schema("response envelope has no 'data' object"))?;

    Ok(data.get(field).filter(|value| !value.is_null()))
}

/// Single-endpoint GraphQL client.
#[derive(Clone)]
pub struct GraphqlClient {
    http: Arc<dyn HttpClient>,
    endpoint: String,
    timeout: Duration,
    budget: Option<RequestBudget>,
}

impl GraphqlClient {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            endpoint: String::from(DEFAULT_ENDPOINT),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            budget: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_budget(mut self, budget: RequestBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Executes one query and returns the decoded envelope.
    ///
    /// Credentials are attached as Basic auth only when they carry an API key.
    ///
    /// # Errors
    ///
    /// - [`FetchErrorKind::Transport`] on network failure or timeout
    /// - [`FetchErrorKind::Authentication`] on 401/403 or an auth-class GraphQL error
    /// - [`FetchErrorKind::Http`] on any other non-2xx status
    /// - [`FetchErrorKind::Schema`] when the body is not JSON
    /// - [`FetchErrorKind::NotFound`] / [`FetchErrorKind::GraphQl`] from the `errors` array
    /// - [`FetchErrorKind::RateLimited`] when the request budget is spent
    pub async fn execute(
        &self,
        query: &str,
        variables: Value,
        credentials: Option<&Credentials>,
    ) -> Result<Value, FetchError> {
        if let Some(budget) = &self.budget {
            budget.acquire().map_err(FetchError::rate_limited)?;
        }

        let auth = credentials
            .and_then(|credentials| {
                credentials
                    .api_key()
                    .map(|key| HttpAuth::basic(credentials.username(), key))
            })
            .unwrap_or_default();
        let authenticated = !auth.is_none();

        let body = json!({ "query": query, "variables": variables }).to_string();
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let request = HttpRequest::post(&self.endpoint)
            .with_header("content-type", "application/json")
            .with_header("accept", "application/json")
            .with_auth(auth)
            .with_body(body)
            .with_timeout_ms(timeout_ms);

        debug!(endpoint = %self.endpoint, authenticated, "sending graphql request");

        let response = tokio::time::timeout(self.timeout, self.http.execute(request))
            .await
            .map_err(|_| {
                FetchError::transport(format!("request timed out after {timeout_ms}ms"))
            })?
            .map_err(|error| {
                if error.timed_out() {
                    FetchError::transport(format!("transport timed out: {}", error.message()))
                } else {
                    FetchError::transport(error.message())
                }
            })?;

        if matches!(response.status, 401 | 403) {
            return Err(FetchError::authentication_status(response.status));
        }
        if !response.is_success() {
            return Err(FetchError::http(response.status));
        }

        let envelope: Value = serde_json::from_str(&response.body).map_err(|error| {
            FetchError::schema(format!("response body is not valid JSON: {error}"))
        })?;

        if let Some(first) = envelope
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
        {
            return Err(FetchError::from_graphql_error(first));
        }

        Ok(envelope)
    }
}

impl std::fmt::Debug for GraphqlClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlClient")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("budget", &self.budget)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, ScriptedHttpClient};

    fn client(http: Arc<ScriptedHttpClient>) -> GraphqlClient {
        GraphqlClient::new(http).with_endpoint("https://example.test/graphql")
    }

    #[tokio::test]
    async fn attaches_basic_auth_only_when_a_key_is_present() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.push_json(r#"{"data":{}}"#).push_json(r#"{"data":{}}"#);
        let graphql = client(http.clone());

        let with_key = Credentials::new("alice", Some(String::from("k3y"))).expect("valid");
        let without_key = Credentials::new("alice", None).expect("valid");
        graphql
            .execute("query { a }", json!({}), Some(&with_key))
            .await
            .expect("ok");
        graphql
            .execute("query { a }", json!({}), Some(&without_key))
            .await
            .expect("ok");

        let requests = http.recorded_requests();
        assert_eq!(requests[0].auth, HttpAuth::basic("alice", "k3y"));
        assert!(requests[1].auth.is_none());

        let body: Value =
            serde_json::from_str(requests[0].body.as_deref().expect("body")).expect("json body");
        assert_eq!(body["query"], "query { a }");
        assert!(body["variables"].is_object());
    }

    #[tokio::test]
    async fn maps_statuses_to_error_kinds() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.push_status(401, "")
            .push_status(403, "")
            .push_status(502, "bad gateway")
            .push_json("<html>");
        let graphql = client(http);

        let first = graphql.execute("q", json!({}), None).await.expect_err("401");
        assert_eq!(first.kind(), FetchErrorKind::Authentication);
        assert_eq!(first.status(), Some(401));

        let second = graphql.execute("q", json!({}), None).await.expect_err("403");
        assert!(second.is_authentication());

        let third = graphql.execute("q", json!({}), None).await.expect_err("502");
        assert_eq!(third.kind(), FetchErrorKind::Http);
        assert_eq!(third.status(), Some(502));
        assert!(third.retryable());

        let fourth = graphql.execute("q", json!({}), None).await.expect_err("html");
        assert_eq!(fourth.kind(), FetchErrorKind::Schema);
    }

    #[tokio::test]
    async fn transport_failures_and_timeouts_are_transport_errors() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.push_error(HttpError::new("connection refused"));
        let error = client(http)
            .execute("q", json!({}), None)
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), FetchErrorKind::Transport);
        assert!(error.message().contains("connection refused"));

        let slow = Arc::new(ScriptedHttpClient::new().with_delay(Duration::from_millis(200)));
        slow.push_json(r#"{"data":{}}"#);
        let error = client(slow)
            .with_timeout(Duration::from_millis(20))
            .execute("q", json!({}), None)
            .await
            .expect_err("must time out");
        assert_eq!(error.kind(), FetchErrorKind::Transport);
        assert!(error.message().contains("timed out"));
    }

    #[test]
    fn classifies_graphql_errors() {
        let auth = FetchError::from_graphql_error(&json!({
            "message": "You are not authorized to access this field",
        }));
        assert_eq!(auth.kind(), FetchErrorKind::Authentication);

        let not_found = FetchError::from_graphql_error(&json!({
            "message": "Creation not found",
            "extensions": { "code": "NOT_FOUND" }
        }));
        assert_eq!(not_found.kind(), FetchErrorKind::NotFound);
        assert_eq!(not_found.graphql_code(), Some("NOT_FOUND"));

        let generic = FetchError::from_graphql_error(&json!({ "message": "Internal error" }));
        assert_eq!(generic.kind(), FetchErrorKind::GraphQl);
        assert_eq!(generic.code(), "fetch.graphql");
    }

    #[test]
    fn removed_fields_are_schema_errors_not_missing_records() {
        let coded = FetchError::from_graphql_error(&json!({
            "message": "Field 'viewsCount' doesn't exist on type 'User'",
            "extensions": { "code": "undefinedField" }
        }));
        assert_eq!(coded.kind(), FetchErrorKind::Schema);
        assert!(!coded.retryable());

        let uncoded = FetchError::from_graphql_error(&json!({
            "message": "Field 'salesBatch' doesn't exist on type 'PrivateUser'",
        }));
        assert_eq!(uncoded.kind(), FetchErrorKind::Schema);

        let validation = FetchError::from_graphql_error(&json!({
            "message": "Variable $nick is never used",
            "extensions": { "code": "GRAPHQL_VALIDATION_FAILED" }
        }));
        assert_eq!(validation.kind(), FetchErrorKind::Schema);

        let record = FetchError::from_graphql_error(&json!({
            "message": "Creation doesn't exist",
        }));
        assert_eq!(record.kind(), FetchErrorKind::NotFound);
    }

    #[tokio::test]
    async fn transport_timeouts_say_so() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.push_error(HttpError::timeout("operation timed out after 10s"));

        let error = client(http.clone())
            .execute("q", json!({}), None)
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), FetchErrorKind::Transport);
        assert!(error.message().starts_with("transport timed out"));
        assert_eq!(http.remaining(), 0);
    }

    #[tokio::test]
    async fn spent_budget_refuses_without_touching_the_network() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.push_json(r#"{"data":{}}"#);
        let graphql = client(http.clone()).with_budget(RequestBudget::per_minute(1));

        graphql.execute("q", json!({}), None).await.expect("first call");
        let error = graphql
            .execute("q", json!({}), None)
            .await
            .expect_err("budget spent");

        assert_eq!(error.kind(), FetchErrorKind::RateLimited);
        assert_eq!(http.request_count(), 1);
    }

    #[test]
    fn data_field_requires_a_data_object() {
        let envelope = json!({ "data": { "user": null, "myself": { "x": 1 } } });
        assert!(data_field(&envelope, "user").expect("data present").is_none());
        assert!(data_field(&envelope, "myself").expect("data present").is_some());

        let error = data_field(&json!({ "data": null }), "user").expect_err("must fail");
        assert_eq!(error.kind(), FetchErrorKind::Schema);
    }
}
