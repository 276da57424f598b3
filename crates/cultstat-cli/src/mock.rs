//! Offline transport for `--mock`.
//!
//! Answers by inspecting the query document, so it keeps working across any
//! number of watch cycles.

use std::future::Future;
use std::pin::Pin;

use cultstat_core::{
    Config, HttpClient, HttpError, HttpRequest, HttpResponse, UtcDateTime,
};
use serde_json::{json, Value};

pub const MOCK_USERNAME: &str = "mock-creator";

/// Configuration used when `--mock` runs without a config file.
pub fn demo_config() -> Config {
    Config {
        username: String::from(MOCK_USERNAME),
        api_key: Some(String::from("mock-key")),
        tracked_creations: vec![String::from("cool-gadget")],
        ..Config::default()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureHttpClient;

impl FixtureHttpClient {
    pub fn new() -> Self {
        Self
    }

    fn respond(request: &HttpRequest) -> HttpResponse {
        let Some(body) = request
            .body
            .as_deref()
            .and_then(|body| serde_json::from_str::<Value>(body).ok())
        else {
            return HttpResponse::new(400, "request body is not JSON");
        };
        let query = body.get("query").and_then(Value::as_str).unwrap_or_default();
        let variables = body.get("variables").cloned().unwrap_or(Value::Null);
        let now = UtcDateTime::now();

        let payload = if query.contains("creation(") {
            let slug = variables
                .get("slug")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            json!({ "data": { "creation": creation(slug, now.minus_days(12)) } })
        } else {
            let nick = variables
                .get("nick")
                .and_then(Value::as_str)
                .unwrap_or(MOCK_USERNAME);
            let mut data = json!({ "user": profile(nick, now) });
            if query.contains("myself") {
                data["myself"] = if request.auth.is_none() {
                    Value::Null
                } else {
                    myself(now)
                };
            }
            json!({ "data": data })
        };

        HttpResponse::ok_json(payload.to_string())
    }
}

impl HttpClient for FixtureHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = Self::respond(&request);
        Box::pin(async move { Ok(response) })
    }
}

fn profile(nick: &str, now: UtcDateTime) -> Value {
    json!({
        "nick": nick,
        "followersCount": 1280,
        "followingCount": 42,
        "creationsCount": 37,
        "viewsCount": 254_310,
        "latest": [creation("desk-organizer", now.minus_days(4))],
        "topDownloaded": [creation("articulated-dragon", now.minus_days(400))],
    })
}

fn myself(now: UtcDateTime) -> Value {
    let sale = |slug: &str, days_ago: i64, cents: u64| {
        json!({
            "createdAt": now.minus_days(days_ago).format_rfc3339(),
            "income": { "cents": cents },
            "creation": creation(slug, now.minus_days(400)),
        })
    };

    json!({
        "salesBatch": {
            "total": 4,
            "results": [
                sale("articulated-dragon", 2, 350),
                sale("articulated-dragon", 9, 350),
                sale("desk-organizer", 3, 199),
                sale("articulated-dragon", 75, 350),
            ],
        }
    })
}

fn creation(slug: &str, published_at: UtcDateTime) -> Value {
    let name = slug
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect::<Vec<_>>()
        .join(" ");

    json!({
        "slug": slug,
        "name": name,
        "url": format!("/en/3d-model/various/{slug}"),
        "illustrationImageUrl": format!("https://images.cults3d.com/{slug}.png"),
        "viewsCount": 1520,
        "downloadsCount": 311,
        "likesCount": 87,
        "publishedAt": published_at.format_rfc3339(),
    })
}
