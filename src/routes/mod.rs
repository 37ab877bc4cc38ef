//! Route gateway and helpers shared by the resource subrouters.
//!
//! `main.rs` only sees [`router`]; each resource lives in its own sibling
//! module and exports a subrouter (EMBP). The REST API mounts under
//! `/api/v1`, the server-rendered pages at the root.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;

use crate::query::NavLink;
use crate::Config;

mod devices;
mod health;
mod pages;
mod sensor_data;

// ---

pub fn router(pool: PgPool, config: Config) -> Router {
    // ---
    Router::new()
        .merge(devices::router())
        .merge(sensor_data::router())
        .merge(pages::router())
        .merge(health::router())
        .with_state((pool, config))
}

// ---

/// Single-resource (or per-item) representation with navigation links.
#[derive(Debug, Serialize)]
pub struct Linked<T> {
    pub data: T,
    pub links: Vec<NavLink>,
}

/// 404 body in the API's `{"message": ...}` convention.
pub fn not_found(message: String) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": message }))).into_response()
}

/// 400 body in the API's `{"message": ...}` convention.
pub fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "message": message }))).into_response()
}

// ---

/// Assemble a query string from optional parameters, skipping absent ones.
pub fn query_string(pairs: &[(&str, Option<String>)]) -> String {
    // ---
    pairs
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .map(|v| format!("{key}={}", encode_query_value(v)))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode the characters that would break a query string when they
/// appear in a caller-supplied filter value.
fn encode_query_value(value: &str) -> String {
    // ---
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b':' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
