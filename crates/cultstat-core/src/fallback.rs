//! FULL-then-PUBLIC profile query selection.

use std::time::Instant;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::graphql::{data_field, FetchError, FetchErrorKind, GraphqlClient};
use crate::queries::{QuerySet, SALES_BATCH_LIMIT};
use crate::{Credentials, QueryMode};

/// Successful profile fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileFetch {
    pub mode: QueryMode,
    /// Full GraphQL envelope of the query that succeeded.
    pub response: Value,
    /// Why FULL was abandoned, when it was attempted and failed.
    pub fallback_reason: Option<FetchError>,
    /// Modes attempted in order.
    pub attempts: Vec<QueryMode>,
    pub latency_ms: u64,
}

impl ProfileFetch {
    pub fn fell_back(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Failed profile fetch.
///
/// When FULL was abandoned before PUBLIC failed too, `fallback_reason` keeps
/// the FULL error so a rejected key is not hidden behind the PUBLIC failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct ProfileError {
    pub error: FetchError,
    pub fallback_reason: Option<FetchError>,
}

impl ProfileError {
    /// The FULL authentication failure, if one caused this cycle to fall back.
    pub fn rejected_credentials(&self) -> Option<&FetchError> {
        std::iter::once(&self.error)
            .chain(self.fallback_reason.as_ref())
            .find(|error| error.is_authentication())
    }
}

impl From<FetchError> for ProfileError {
    fn from(error: FetchError) -> Self {
        Self {
            error,
            fallback_reason: None,
        }
    }
}

/// Runs the profile query for one cycle: at most two network calls.
///
/// Without an API key FULL is skipped. FULL failures of the authentication or
/// schema class fall back to PUBLIC; every other failure is returned as is,
/// because PUBLIC would fail the same way.
///
/// # Errors
///
/// Returns [`ProfileError`] carrying the final failure and, after a fallback,
/// the FULL error that caused it.
pub async fn fetch_profile(
    client: &GraphqlClient,
    queries: &QuerySet,
    credentials: &Credentials,
) -> Result<ProfileFetch, ProfileError> {
    let started = Instant::now();
    let mut attempts = Vec::with_capacity(2);

    let fallback_reason = if credentials.has_api_key() {
        attempts.push(QueryMode::Full);
        match run_full(client, queries, credentials).await {
            Ok(response) => {
                return Ok(ProfileFetch {
                    mode: QueryMode::Full,
                    response,
                    fallback_reason: None,
                    attempts,
                    latency_ms: elapsed_ms(started),
                });
            }
            Err(error) if triggers_fallback(&error) => {
                warn!(
                    username = credentials.username(),
                    code = error.code(),
                    error = %error,
                    "full query failed, falling back to public query"
                );
                Some(error)
            }
            Err(error) => return Err(error.into()),
        }
    } else {
        debug!(
            username = credentials.username(),
            "no api key configured, using public query"
        );
        None
    };

    attempts.push(QueryMode::Public);
    let public = client
        .execute(
            &queries.public(),
            json!({ "nick": credentials.username() }),
            None,
        )
        .await
        .and_then(|response| ensure_user(&response, credentials.username()).map(|()| response));
    let response = match public {
        Ok(response) => response,
        Err(error) => {
            return Err(ProfileError {
                error,
                fallback_reason,
            })
        }
    };

    Ok(ProfileFetch {
        mode: QueryMode::Public,
        response,
        fallback_reason,
        attempts,
        latency_ms: elapsed_ms(started),
    })
}

async fn run_full(
    client: &GraphqlClient,
    queries: &QuerySet,
    credentials: &Credentials,
) -> Result<Value, FetchError> {
    let response = client
        .execute(
            &queries.full(),
            json!({ "nick": credentials.username(), "salesLimit": SALES_BATCH_LIMIT }),
            Some(credentials),
        )
        .await?;

    ensure_user(&response, credentials.username())?;
    if data_field(&response, "myself")?.is_none() {
        return Err(FetchError::authentication(
            "authenticated query returned no 'myself' object",
        ));
    }

    Ok(response)
}

fn ensure_user(response: &Value, username: &str) -> Result<(), FetchError> {
    match data_field(response, "user")? {
        None => Err(FetchError::not_found(format!("user '{username}' not found"))),
        Some(user) if !user.is_object() => Err(FetchError::schema("'user' is not an object")),
        Some(_) => Ok(()),
    }
}

fn triggers_fallback(error: &FetchError) -> bool {
    matches!(
        error.kind(),
        FetchErrorKind::Authentication | FetchErrorKind::Schema
    )
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::http_client::{HttpAuth, HttpError, ScriptedHttpClient};

    const FULL_OK: &str = r#"{"data":{"user":{"nick":"alice","followersCount":1},"myself":{"salesBatch":{"total":0,"results":[]}}}}"#;
    const PUBLIC_OK: &str = r#"{"data":{"user":{"nick":"alice","followersCount":1}}}"#;

    fn setup() -> (Arc<ScriptedHttpClient>, GraphqlClient) {
        let http = Arc::new(ScriptedHttpClient::new());
        let client = GraphqlClient::new(http.clone());
        (http, client)
    }

    fn keyed() -> Credentials {
        Credentials::new("alice", Some(String::from("key"))).expect("valid")
    }

    #[tokio::test]
    async fn full_success_uses_one_call() {
        let (http, client) = setup();
        http.push_json(FULL_OK);

        let fetch = fetch_profile(&client, &QuerySet::default(), &keyed())
            .await
            .expect("full query succeeds");

        assert_eq!(fetch.mode, QueryMode::Full);
        assert_eq!(fetch.attempts, vec![QueryMode::Full]);
        assert!(!fetch.fell_back());
        assert_eq!(http.request_count(), 1);
    }

    #[tokio::test]
    async fn null_myself_falls_back_without_credentials() {
        let (http, client) = setup();
        http.push_json(r#"{"data":{"user":{"nick":"alice"},"myself":null}}"#)
            .push_json(PUBLIC_OK);

        let fetch = fetch_profile(&client, &QuerySet::default(), &keyed())
            .await
            .expect("public query succeeds");

        assert_eq!(fetch.mode, QueryMode::Public);
        assert_eq!(
            fetch.fallback_reason.as_ref().map(FetchError::kind),
            Some(FetchErrorKind::Authentication)
        );
        let requests = http.recorded_requests();
        assert!(!requests[0].auth.is_none());
        assert_eq!(requests[1].auth, HttpAuth::None);
    }

    #[tokio::test]
    async fn malformed_full_response_falls_back() {
        let (http, client) = setup();
        http.push_json(r#"{"unexpected":true}"#).push_json(PUBLIC_OK);

        let fetch = fetch_profile(&client, &QuerySet::default(), &keyed())
            .await
            .expect("public query succeeds");

        assert_eq!(fetch.mode, QueryMode::Public);
        assert_eq!(
            fetch.fallback_reason.as_ref().map(FetchError::kind),
            Some(FetchErrorKind::Schema)
        );
    }

    #[tokio::test]
    async fn not_found_and_transport_errors_do_not_fall_back() {
        let (http, client) = setup();
        http.push_json(r#"{"data":{"user":null,"myself":{}}}"#)
            .push_error(HttpError::new("connection reset"));

        let not_found = fetch_profile(&client, &QuerySet::default(), &keyed())
            .await
            .expect_err("unknown user");
        assert_eq!(not_found.error.kind(), FetchErrorKind::NotFound);
        assert!(not_found.fallback_reason.is_none());

        let transport = fetch_profile(&client, &QuerySet::default(), &keyed())
            .await
            .expect_err("network down");
        assert_eq!(transport.error.kind(), FetchErrorKind::Transport);
        assert_eq!(http.request_count(), 2);
    }

    #[tokio::test]
    async fn public_failure_after_fallback_is_returned() {
        let (http, client) = setup();
        http.push_status(401, "").push_status(503, "");

        let error = fetch_profile(&client, &QuerySet::default(), &keyed())
            .await
            .expect_err("both queries fail");

        assert_eq!(error.error.kind(), FetchErrorKind::Http);
        assert_eq!(error.error.status(), Some(503));
        assert_eq!(
            error.fallback_reason.as_ref().and_then(FetchError::status),
            Some(401)
        );
        assert_eq!(http.request_count(), 2);
    }

    #[tokio::test]
    async fn rejected_key_stays_visible_when_public_also_fails() {
        let (http, client) = setup();
        http.push_status(401, "")
            .push_error(HttpError::new("connection reset"));

        let error = fetch_profile(&client, &QuerySet::default(), &keyed())
            .await
            .expect_err("both queries fail");

        assert_eq!(error.error.kind(), FetchErrorKind::Transport);
        assert_eq!(
            error.rejected_credentials().map(FetchError::kind),
            Some(FetchErrorKind::Authentication)
        );
    }

    #[tokio::test]
    async fn removed_full_field_falls_back_to_public() {
        let (http, client) = setup();
        http.push_json(
            r#"{"errors":[{"message":"Field 'viewsCount' doesn't exist on type 'User'","extensions":{"code":"undefinedField"}}]}"#,
        )
        .push_json(PUBLIC_OK);

        let fetch = fetch_profile(&client, &QuerySet::default(), &keyed())
            .await
            .expect("public query succeeds");

        assert_eq!(fetch.mode, QueryMode::Public);
        assert_eq!(fetch.attempts, vec![QueryMode::Full, QueryMode::Public]);
        assert_eq!(
            fetch.fallback_reason.as_ref().map(FetchError::kind),
            Some(FetchErrorKind::Schema)
        );
    }
}
