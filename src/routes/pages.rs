//! Server-rendered web UI.
//!
//! A paginated device table, a per-device detail page, and the register /
//! edit / delete form flows, rendered as plain HTML. The listing page runs
//! through the same shaping helpers as the REST API, so a filter or sort
//! applied here pages out exactly like the equivalent API call. The edit
//! flow is the only place a device's name and location can change; the REST
//! surface treats them as write-once.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use sqlx::PgPool;

use super::query_string;
use crate::error::AppError;
use crate::models::{CreateDevice, DeviceStatus};
use crate::query::{self, DeviceSortField, PageRequest};
use crate::{service, Config};

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new()
        .route("/", get(|| async { Redirect::to("/devices") }))
        .route("/devices", get(device_index))
        .route("/devices/new", get(device_new_form).post(device_create))
        .route("/devices/{id}", get(device_detail))
        .route("/devices/{id}/edit", get(device_edit_form).post(device_edit))
        .route(
            "/devices/{id}/delete",
            get(device_delete_confirm).post(device_delete),
        )
}

/// Query parameters for the device listing page; same vocabulary as the
/// API's search endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevicePageParams {
    status: Option<String>,
    location: Option<String>,
    page_number: Option<u32>,
    page_size: Option<u32>,
    sort_by: Option<String>,
    sort_descending: Option<bool>,
}

/// Body of the edit form. The external device id is immutable, so it is
/// displayed but not submitted.
#[derive(Debug, Deserialize)]
struct EditDeviceForm {
    name: String,
    #[serde(default)]
    location: String,
    status: String,
}

// ---

async fn device_index(
    State((pool, _config)): State<(PgPool, Config)>,
    Query(params): Query<DevicePageParams>,
) -> Result<Response, AppError> {
    // ---
    let page_req = PageRequest::new(params.page_number, params.page_size);
    let sort_field = DeviceSortField::parse_or_default(params.sort_by.as_deref());
    let sort_desc = params.sort_descending.unwrap_or(false);

    let devices = service::list_devices(&pool).await?;
    let mut devices = query::filter_devices(
        devices,
        params.status.as_deref(),
        params.location.as_deref(),
    );
    query::sort_devices(&mut devices, sort_field, sort_desc);
    let page = query::paginate(devices, page_req, sort_field.as_str(), sort_desc);

    let href = |n: u32, field: DeviceSortField, desc: bool| {
        let qs = query_string(&[
            ("status", params.status.clone()),
            ("location", params.location.clone()),
            ("pageNumber", Some(n.to_string())),
            ("pageSize", Some(page_req.page_size.to_string())),
            ("sortBy", Some(field.as_str().to_string())),
            ("sortDescending", Some(desc.to_string())),
        ]);
        format!("/devices?{qs}")
    };

    // Clicking the active sort column flips its direction.
    let column = |field: DeviceSortField, label: &str| {
        let desc = if field == sort_field { !sort_desc } else { false };
        format!(
            r#"<th><a href="{}">{label}</a></th>"#,
            href(page.page_number, field, desc)
        )
    };

    let mut rows = String::new();
    for device in &page.items {
        rows.push_str(&format!(
            "<tr><td><a href=\"/devices/{id}\">{name}</a></td>\
             <td>{device_id}</td><td>{status}</td><td>{location}</td><td>{last_seen}</td></tr>\n",
            id = device.id,
            name = html_escape(&device.name),
            device_id = html_escape(&device.device_id),
            status = device.status,
            location = html_escape(&device.location),
            last_seen = device.last_seen.format("%Y-%m-%d %H:%M:%S UTC"),
        ));
    }
    if page.items.is_empty() {
        rows.push_str(r#"<tr><td colspan="5">No devices found.</td></tr>"#);
    }

    let prev = if page.has_previous_page {
        format!(
            r#"<a href="{}">&laquo; Previous</a>"#,
            href(page.page_number - 1, sort_field, sort_desc)
        )
    } else {
        String::new()
    };
    let next = if page.has_next_page {
        format!(
            r#"<a href="{}">Next &raquo;</a>"#,
            href(page.page_number + 1, sort_field, sort_desc)
        )
    } else {
        String::new()
    };

    let html = format!(
        r#"<!doctype html>
<html>
<head><title>Devices</title>{STYLE}</head>
<body>
<h1>Devices</h1>
<p><a href="/devices/new">Register a device</a></p>
<p>{total} device(s), page {page_number} of {total_pages}</p>
<table>
<thead><tr>{col_name}<th>Device ID</th>{col_status}<th>Location</th>{col_seen}</tr></thead>
<tbody>
{rows}</tbody>
</table>
<p class="nav">{prev} {next}</p>
</body>
</html>"#,
        total = page.total_count,
        page_number = page.page_number,
        total_pages = page.total_pages,
        col_name = column(DeviceSortField::Name, "Name"),
        col_status = column(DeviceSortField::Status, "Status"),
        col_seen = column(DeviceSortField::LastSeen, "Last seen"),
    );

    Ok(Html(html).into_response())
}

async fn device_detail(
    State((pool, _config)): State<(PgPool, Config)>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    // ---
    let Some(device) = service::get_device(&pool, id).await? else {
        return Ok(not_found_page(id));
    };

    let mut rows = String::new();
    for reading in &device.recent_readings {
        rows.push_str(&format!(
            "<tr><td>{sensor_type}</td><td>{value} {unit}</td><td>{timestamp}</td></tr>\n",
            sensor_type = html_escape(&reading.sensor_type),
            value = reading.value,
            unit = html_escape(&reading.unit),
            timestamp = reading.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        ));
    }
    if device.recent_readings.is_empty() {
        rows.push_str(r#"<tr><td colspan="3">No readings recorded.</td></tr>"#);
    }

    let html = format!(
        r#"<!doctype html>
<html>
<head><title>{name}</title>{STYLE}</head>
<body>
<h1>{name}</h1>
<dl>
<dt>Device ID</dt><dd>{device_id}</dd>
<dt>Status</dt><dd>{status}</dd>
<dt>Location</dt><dd>{location}</dd>
<dt>Last seen</dt><dd>{last_seen}</dd>
</dl>
<h2>Recent readings</h2>
<table>
<thead><tr><th>Sensor</th><th>Value</th><th>Recorded</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
<p class="nav"><a href="/devices/{id}/edit">Edit</a> <a href="/devices/{id}/delete">Delete</a> <a href="/devices">&laquo; Back to devices</a></p>
</body>
</html>"#,
        name = html_escape(&device.name),
        device_id = html_escape(&device.device_id),
        status = device.status,
        location = html_escape(&device.location),
        last_seen = device.last_seen.format("%Y-%m-%d %H:%M:%S UTC"),
    );

    Ok(Html(html).into_response())
}

// --- register ---

async fn device_new_form() -> Html<String> {
    render_create_form("", "", "", None)
}

async fn device_create(
    State((pool, _config)): State<(PgPool, Config)>,
    Form(form): Form<CreateDevice>,
) -> Result<Response, AppError> {
    // ---
    let (device_id, name, location) = (
        form.device_id.clone(),
        form.name.clone(),
        form.location.clone(),
    );

    match service::create_device(&pool, form).await {
        Ok(device) => Ok(Redirect::to(&format!("/devices/{}", device.id)).into_response()),
        Err(AppError::DuplicateDeviceId(_)) => {
            let error = format!("A device with ID '{device_id}' already exists.");
            Ok(render_create_form(&device_id, &name, &location, Some(&error)).into_response())
        }
        Err(e) => Err(e),
    }
}

// --- edit ---

async fn device_edit_form(
    State((pool, _config)): State<(PgPool, Config)>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    // ---
    let Some(device) = service::get_device(&pool, id).await? else {
        return Ok(not_found_page(id));
    };
    Ok(render_edit_form(
        id,
        &device.device_id,
        &device.name,
        &device.location,
        device.status.as_str(),
        None,
    )
    .into_response())
}

async fn device_edit(
    State((pool, _config)): State<(PgPool, Config)>,
    Path(id): Path<i32>,
    Form(form): Form<EditDeviceForm>,
) -> Result<Response, AppError> {
    // ---
    let Some(device) = service::get_device(&pool, id).await? else {
        return Ok(not_found_page(id));
    };

    let Some(status) = DeviceStatus::parse(&form.status) else {
        let error = format!("'{}' is not a valid status.", form.status);
        return Ok(render_edit_form(
            id,
            &device.device_id,
            &form.name,
            &form.location,
            device.status.as_str(),
            Some(&error),
        )
        .into_response());
    };

    service::update_device_details(&pool, id, &form.name, &form.location).await?;
    service::update_device_status(&pool, &device.device_id, status).await?;

    Ok(Redirect::to(&format!("/devices/{id}")).into_response())
}

// --- delete ---

async fn device_delete_confirm(
    State((pool, _config)): State<(PgPool, Config)>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    // ---
    let Some(device) = service::get_device(&pool, id).await? else {
        return Ok(not_found_page(id));
    };

    let html = format!(
        r#"<!doctype html>
<html>
<head><title>Delete device</title>{STYLE}</head>
<body>
<h1>Delete device</h1>
<p>Delete <strong>{name}</strong> ({device_id})? Its recorded readings are kept.</p>
<form method="post" action="/devices/{id}/delete">
<button type="submit">Delete</button> <a href="/devices/{id}">Cancel</a>
</form>
</body>
</html>"#,
        name = html_escape(&device.name),
        device_id = html_escape(&device.device_id),
    );

    Ok(Html(html).into_response())
}

async fn device_delete(
    State((pool, _config)): State<(PgPool, Config)>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    // ---
    if service::delete_device(&pool, id).await? {
        Ok(Redirect::to("/devices").into_response())
    } else {
        Ok(not_found_page(id))
    }
}

// --- rendering helpers ---

fn not_found_page(id: i32) -> Response {
    // ---
    let html = format!(
        r#"<!doctype html>
<html>
<head><title>Not found</title>{STYLE}</head>
<body><h1>Device not found</h1>
<p>No device with ID {id}.</p>
<p><a href="/devices">&laquo; Back to devices</a></p>
</body>
</html>"#
    );
    (StatusCode::NOT_FOUND, Html(html)).into_response()
}

fn render_create_form(device_id: &str, name: &str, location: &str, error: Option<&str>) -> Html<String> {
    // ---
    let html = format!(
        r#"<!doctype html>
<html>
<head><title>Register device</title>{STYLE}</head>
<body>
<h1>Register device</h1>
{error}<form method="post" action="/devices/new">
<p><label>Device ID <input name="deviceId" value="{device_id}" required></label></p>
<p><label>Name <input name="name" value="{name}" required></label></p>
<p><label>Location <input name="location" value="{location}"></label></p>
<button type="submit">Register</button> <a href="/devices">Cancel</a>
</form>
</body>
</html>"#,
        error = error_banner(error),
        device_id = html_escape(device_id),
        name = html_escape(name),
        location = html_escape(location),
    );
    Html(html)
}

fn render_edit_form(
    id: i32,
    device_id: &str,
    name: &str,
    location: &str,
    status: &str,
    error: Option<&str>,
) -> Html<String> {
    // ---
    let html = format!(
        r#"<!doctype html>
<html>
<head><title>Edit device</title>{STYLE}</head>
<body>
<h1>Edit {device_id}</h1>
{error}<form method="post" action="/devices/{id}/edit">
<p><label>Name <input name="name" value="{name}" required></label></p>
<p><label>Location <input name="location" value="{location}"></label></p>
<p><label>Status <select name="status">{options}</select></label></p>
<button type="submit">Save</button> <a href="/devices/{id}">Cancel</a>
</form>
</body>
</html>"#,
        error = error_banner(error),
        device_id = html_escape(device_id),
        name = html_escape(name),
        location = html_escape(location),
        options = status_options(status),
    );
    Html(html)
}

fn error_banner(error: Option<&str>) -> String {
    match error {
        Some(message) => format!("<p class=\"error\">{}</p>\n", html_escape(message)),
        None => String::new(),
    }
}

/// `<option>` list for the status select, with the current value selected.
fn status_options(selected: &str) -> String {
    // ---
    ["Online", "Offline", "Error"]
        .iter()
        .map(|s| {
            let sel = if *s == selected { " selected" } else { "" };
            format!(r#"<option value="{s}"{sel}>{s}</option>"#)
        })
        .collect()
}

// ---

const STYLE: &str = "<style>\
body{font-family:system-ui;margin:2rem;color:#222}\
table{border-collapse:collapse;min-width:40rem}\
th,td{border:1px solid #ccc;padding:.4rem .8rem;text-align:left}\
th a{text-decoration:none}\
.nav a{margin-right:1rem}\
.error{color:#b00}\
label{display:inline-block;min-width:16rem}\
</style>";

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn escape_covers_markup_characters() {
        // ---
        assert_eq!(
            html_escape(r#"<Lab & "annex">"#),
            "&lt;Lab &amp; &quot;annex&quot;&gt;"
        );
    }

    #[test]
    fn status_select_marks_only_the_current_value() {
        // ---
        let options = status_options("Error");
        assert_eq!(options.matches("selected").count(), 1);
        assert!(options.contains(r#"<option value="Error" selected>"#));
    }

    #[test]
    fn edit_form_escapes_submitted_values() {
        // ---
        let Html(body) = render_edit_form(7, "dev-7", r#""><script>"#, "lab", "Offline", None);
        assert!(!body.contains("<script>"));
        assert!(body.contains("&quot;&gt;&lt;script&gt;"));
    }
}
