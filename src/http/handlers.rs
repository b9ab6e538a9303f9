//! Route handlers.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::apm::RequestContext;
use crate::http::server::AppState;

/// Body of a successful `GET /fetch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStatus {
    #[serde(rename = "Status")]
    pub status: u16,
}

/// `GET /`
pub async fn root() -> &'static str {
    "OK\n"
}

/// `GET /fetch`: fetch the configured URL, relay one log line, report the
/// upstream status.
pub async fn fetch(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let response = match state
        .client
        .get(&ctx, &state.fetch_url, state.fetch_timeout)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(url = %state.fetch_url, error = %e, "Fetch failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("{e}\n")).into_response();
        }
    };

    let status = response.status().as_u16();
    drop(response);

    state
        .relay
        .log(&ctx, &format!("done fetch: status={status}"))
        .await;

    json_line(&FetchStatus { status })
}

/// JSON body terminated by a newline.
fn json_line<T: Serialize>(value: &T) -> Response {
    match serde_json::to_string(value) {
        Ok(mut body) => {
            body.push('\n');
            ([(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{e}\n")).into_response(),
    }
}
