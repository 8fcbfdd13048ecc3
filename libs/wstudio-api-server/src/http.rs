use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use wstudio_api::{Event, StoreError};

use super::AppState;
use crate::error::ApiError;

const ROOT_TEXT: &str = "Event Service Node Node REST Server Started";

// ═══════════════════════════════════════════════════════════════
//  GET /  and  GET /api/2.0/
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_root() -> &'static str {
    ROOT_TEXT
}

pub(crate) async fn handle_status() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "status": "started" }))
}

// ═══════════════════════════════════════════════════════════════
//  POST /api/2.0/resources/wstudio
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_write(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event = match parse_event(&headers, &body) {
        Ok(ev) => ev,
        Err(e) => return e.into_response(),
    };

    if state.options.strict_errors {
        let missing = event.missing_fields();
        if !missing.is_empty() {
            let err = StoreError::InvalidEvent(format!("missing field: {}", missing.join(", ")));
            return ApiError::from(err).into_response();
        }
    }

    tracing::debug!(event = ?event, "write");
    let result = state.store.write(event).await;
    if let Ok(receipt) = &result {
        tracing::info!(id = %receipt.id, "event recorded");
    }
    reply(&state, "write", result)
}

/// Lenient body parsing, as the clients expect:
/// non-JSON content types and empty bodies yield an empty object.
fn parse_event(headers: &HeaderMap, body: &[u8]) -> Result<Event, ApiError> {
    if !is_json(headers) || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Event::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("body: {e}")))
}

fn is_json(headers: &HeaderMap) -> bool {
    let Some(ct) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

// ═══════════════════════════════════════════════════════════════
//  GET /api/2.0/resources/wstudio/ts/{id}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_list_keys(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    log_lookup("list_keys", &id, &headers);
    let result = state.store.list_keys(&id).await;
    reply(&state, "list_keys", result)
}

// ═══════════════════════════════════════════════════════════════
//  GET /api/2.0/resources/wstudio/{id}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    log_lookup("read", &id, &headers);
    let result = state.store.read(&id).await;
    reply(&state, "read", result)
}

/// Clients sometimes send the key in an `id` header as well; log both.
fn log_lookup(op: &'static str, id: &str, headers: &HeaderMap) {
    let header_id = headers.get("id").and_then(|v| v.to_str().ok());
    tracing::debug!(op, id, header_id, "lookup");
}

// ═══════════════════════════════════════════════════════════════
//  Result → response
// ═══════════════════════════════════════════════════════════════

/// Serialize a store result. Errors are logged; in lenient mode the
/// client gets an empty JSON 200, in strict mode a 500.
fn reply<T: Serialize>(
    state: &AppState,
    op: &'static str,
    result: Result<T, StoreError>,
) -> Response {
    match result {
        Ok(value) => axum::Json(value).into_response(),
        Err(e) => {
            tracing::warn!(op, error = %e, "store call failed");
            if state.options.strict_errors {
                ApiError::from(e).into_response()
            } else {
                empty_json()
            }
        }
    }
}

fn empty_json() -> Response {
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        "",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_headers(ct: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::CONTENT_TYPE, HeaderValue::from_static(ct));
        h
    }

    #[test]
    fn content_type_detection() {
        assert!(is_json(&json_headers("application/json")));
        assert!(is_json(&json_headers("application/json; charset=utf-8")));
        assert!(is_json(&json_headers("application/vnd.api+json")));
        assert!(!is_json(&json_headers("text/plain")));
        assert!(!is_json(&HeaderMap::new()));
    }

    #[test]
    fn non_json_body_is_an_empty_event() {
        let ev = parse_event(&json_headers("text/plain"), b"studio_id=s1").unwrap();
        assert_eq!(ev, Event::default());
        let ev = parse_event(&json_headers("application/json"), b"  ").unwrap();
        assert_eq!(ev, Event::default());
    }

    #[test]
    fn malformed_or_non_object_json_is_rejected() {
        let h = json_headers("application/json");
        assert!(matches!(parse_event(&h, b"{oops"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_event(&h, b"[1,2]"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn object_body_parses() {
        let ev = parse_event(&json_headers("application/json"), br#"{"studio_id":"s1"}"#).unwrap();
        assert_eq!(ev.field_text("studio_id"), "s1");
    }
}
