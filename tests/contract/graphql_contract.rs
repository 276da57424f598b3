use std::sync::Arc;

use cultstat_core::{
    Credentials, FetchErrorKind, GraphqlClient, HttpAuth, HttpError, HttpResponse,
    ScriptedHttpClient,
};
use serde_json::{json, Value};

const ENDPOINT: &str = "https://example.test/graphql";

#[derive(Clone)]
struct ResponseCase {
    name: &'static str,
    response: Result<HttpResponse, HttpError>,
    expected: Result<(), FetchErrorKind>,
}

fn response_cases() -> Vec<ResponseCase> {
    vec![
        ResponseCase {
            name: "plain data envelope",
            response: Ok(HttpResponse::ok_json(r#"{"data":{"user":{"nick":"alice"}}}"#)),
            expected: Ok(()),
        },
        ResponseCase {
            name: "connection failure",
            response: Err(HttpError::new("connection refused")),
            expected: Err(FetchErrorKind::Transport),
        },
        ResponseCase {
            name: "transport timeout",
            response: Err(HttpError::timeout("request timeout")),
            expected: Err(FetchErrorKind::Transport),
        },
        ResponseCase {
            name: "401",
            response: Ok(HttpResponse::new(401, "")),
            expected: Err(FetchErrorKind::Authentication),
        },
        ResponseCase {
            name: "403",
            response: Ok(HttpResponse::new(403, "forbidden")),
            expected: Err(FetchErrorKind::Authentication),
        },
        ResponseCase {
            name: "429",
            response: Ok(HttpResponse::new(429, "slow down")),
            expected: Err(FetchErrorKind::Http),
        },
        ResponseCase {
            name: "500",
            response: Ok(HttpResponse::new(500, "")),
            expected: Err(FetchErrorKind::Http),
        },
        ResponseCase {
            name: "non-json body",
            response: Ok(HttpResponse::ok_json("<html>maintenance</html>")),
            expected: Err(FetchErrorKind::Schema),
        },
        ResponseCase {
            name: "auth graphql error",
            response: Ok(HttpResponse::ok_json(
                r#"{"data":null,"errors":[{"message":"Unauthenticated request"}]}"#,
            )),
            expected: Err(FetchErrorKind::Authentication),
        },
        ResponseCase {
            name: "not found graphql error",
            response: Ok(HttpResponse::ok_json(
                r#"{"errors":[{"message":"Record does not exist","extensions":{"code":"NOT_FOUND"}}]}"#,
            )),
            expected: Err(FetchErrorKind::NotFound),
        },
        ResponseCase {
            name: "generic graphql error",
            response: Ok(HttpResponse::ok_json(
                r#"{"errors":[{"message":"Internal server error"}]}"#,
            )),
            expected: Err(FetchErrorKind::GraphQl),
        },
        ResponseCase {
            name: "removed field",
            response: Ok(HttpResponse::ok_json(
                r#"{"errors":[{"message":"Field 'viewsCount' doesn't exist on type 'User'","extensions":{"code":"undefinedField"}}]}"#,
            )),
            expected: Err(FetchErrorKind::Schema),
        },
        ResponseCase {
            name: "removed argument",
            response: Ok(HttpResponse::ok_json(
                r#"{"errors":[{"message":"Field 'salesBatch' doesn't accept argument 'limit'"}]}"#,
            )),
            expected: Err(FetchErrorKind::Schema),
        },
        ResponseCase {
            name: "empty errors array",
            response: Ok(HttpResponse::ok_json(r#"{"data":{"user":null},"errors":[]}"#)),
            expected: Ok(()),
        },
    ]
}

#[tokio::test]
async fn responses_are_classified_per_error_taxonomy() {
    for case in response_cases() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.push(case.response.clone());
        let client = GraphqlClient::new(http.clone()).with_endpoint(ENDPOINT);

        let result = client.execute("query { user { nick } }", json!({}), None).await;

        match (&result, case.expected) {
            (Ok(envelope), Ok(())) => {
                assert!(envelope.get("data").is_some(), "case '{}'", case.name);
            }
            (Err(error), Err(kind)) => {
                assert_eq!(error.kind(), kind, "case '{}': {error}", case.name);
                assert!(!error.message().is_empty(), "case '{}'", case.name);
                assert!(error.code().starts_with("fetch."), "case '{}'", case.name);
            }
            _ => panic!("case '{}': unexpected result {result:?}", case.name),
        }
        assert_eq!(http.request_count(), 1, "case '{}': no retries", case.name);
    }
}

#[tokio::test]
async fn request_is_a_json_post_with_query_and_variables() {
    let http = Arc::new(ScriptedHttpClient::new());
    http.push_json(r#"{"data":{}}"#);
    let client = GraphqlClient::new(http.clone()).with_endpoint(ENDPOINT);

    client
        .execute(
            "query Q($nick: String!) { user(nick: $nick) { nick } }",
            json!({ "nick": "alice" }),
            None,
        )
        .await
        .expect("request succeeds");

    let request = &http.recorded_requests()[0];
    assert_eq!(request.url, ENDPOINT);
    assert_eq!(
        request.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );
    let body: Value =
        serde_json::from_str(request.body.as_deref().expect("body present")).expect("json body");
    assert_eq!(body["variables"]["nick"], "alice");
    assert!(body["query"]
        .as_str()
        .is_some_and(|query| query.contains("user(nick: $nick)")));
}

#[tokio::test]
async fn api_key_travels_as_basic_credentials_only_when_present() {
    let http = Arc::new(ScriptedHttpClient::new());
    http.push_json(r#"{"data":{}}"#).push_json(r#"{"data":{}}"#);
    let client = GraphqlClient::new(http.clone()).with_endpoint(ENDPOINT);

    let keyed = Credentials::new("alice", Some(String::from("api-key"))).expect("valid");
    let keyless = Credentials::new("alice", None).expect("valid");
    client.execute("q", json!({}), Some(&keyed)).await.expect("ok");
    client.execute("q", json!({}), Some(&keyless)).await.expect("ok");

    let requests = http.recorded_requests();
    assert_eq!(requests[0].auth, HttpAuth::basic("alice", "api-key"));
    assert!(requests[1].auth.is_none());
    assert!(!requests[0]
        .body
        .as_deref()
        .unwrap_or_default()
        .contains("api-key"));
}

#[test]
fn retryability_follows_error_kind() {
    use cultstat_core::FetchError;

    assert!(FetchError::transport("down").retryable());
    assert!(FetchError::http(503).retryable());
    assert!(!FetchError::authentication("bad key").retryable());
    assert!(!FetchError::not_found("gone").retryable());
    assert!(!FetchError::schema("changed").retryable());
}
