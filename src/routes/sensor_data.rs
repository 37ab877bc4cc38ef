//! REST surface for the sensor data resource.
//!
//! Search requires a device id (readings are only queryable per device);
//! ingestion comes in single and atomic-bulk flavors.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use super::{bad_request, not_found, query_string, Linked};
use crate::error::AppError;
use crate::models::{CreateSensorData, SensorDataDto};
use crate::query::{self, NavLink, PageRequest, ReadingSortField};
use crate::{service, Config};

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new()
        .route("/api/v1/sensordata", post(add_reading))
        .route("/api/v1/sensordata/bulk", post(add_readings_bulk))
        .route("/api/v1/sensordata/search", get(search_readings))
        .route("/api/v1/sensordata/device/{device_id}", get(readings_for_device))
        .route("/api/v1/sensordata/{id}", get(get_reading))
}

/// Query parameters accepted by `GET /api/v1/sensordata/search`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadingSearchParams {
    device_id: Option<String>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    sensor_type: Option<String>,
    page_number: Option<u32>,
    page_size: Option<u32>,
    sort_by: Option<String>,
    sort_descending: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeRangeParams {
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

// ---

async fn search_readings(
    State((pool, config)): State<(PgPool, Config)>,
    Query(params): Query<ReadingSearchParams>,
) -> Result<Response, AppError> {
    // ---
    let Some(device_id) = params.device_id.as_deref().filter(|id| !id.is_empty()) else {
        return Ok(bad_request("deviceId is required"));
    };

    let page_req = PageRequest::new(params.page_number, params.page_size);
    let sort_field = ReadingSortField::parse_or_default(params.sort_by.as_deref());
    let sort_desc = params.sort_descending.unwrap_or(true);

    let readings =
        service::readings_for_device(&pool, device_id, params.start_date, params.end_date).await?;
    let mut readings = query::filter_readings(readings, params.sensor_type.as_deref());
    query::sort_readings(&mut readings, sort_field, sort_desc);

    let dtos: Vec<SensorDataDto> = readings.iter().map(|r| r.to_dto()).collect();
    let page =
        query::paginate(dtos, page_req, sort_field.as_str(), sort_desc).with_nav_links(|n| {
            let qs = query_string(&[
                ("deviceId", Some(device_id.to_string())),
                ("startDate", params.start_date.map(|d| d.to_rfc3339())),
                ("endDate", params.end_date.map(|d| d.to_rfc3339())),
                ("sensorType", params.sensor_type.clone()),
                ("pageNumber", Some(n.to_string())),
                ("pageSize", Some(page_req.page_size.to_string())),
                ("sortBy", Some(sort_field.as_str().to_string())),
                ("sortDescending", Some(sort_desc.to_string())),
            ]);
            format!("{}/api/v1/sensordata/search?{qs}", config.public_url)
        });

    Ok(Json(page).into_response())
}

async fn readings_for_device(
    State((pool, config)): State<(PgPool, Config)>,
    Path(device_id): Path<String>,
    Query(params): Query<TimeRangeParams>,
) -> Result<Response, AppError> {
    // ---
    let readings =
        service::readings_for_device(&pool, &device_id, params.start_date, params.end_date)
            .await?;

    let items: Vec<Linked<SensorDataDto>> = readings
        .iter()
        .map(|r| {
            let dto = r.to_dto();
            Linked {
                links: reading_links(&config.public_url, &dto),
                data: dto,
            }
        })
        .collect();

    Ok(Json(items).into_response())
}

async fn get_reading(
    State((pool, config)): State<(PgPool, Config)>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    // ---
    let Some(reading) = service::get_reading(&pool, id).await? else {
        return Ok(not_found(format!("Sensor data with ID {id} not found")));
    };

    let dto = reading.to_dto();
    let links = reading_links(&config.public_url, &dto);
    Ok(Json(Linked { data: dto, links }).into_response())
}

async fn add_reading(
    State((pool, config)): State<(PgPool, Config)>,
    Json(input): Json<CreateSensorData>,
) -> Result<Response, AppError> {
    // ---
    let reading = service::add_reading(&pool, input).await?;
    let dto = reading.to_dto();
    let links = reading_links(&config.public_url, &dto);
    let location = format!("/api/v1/sensordata/{}", dto.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(Linked { data: dto, links }),
    )
        .into_response())
}

async fn add_readings_bulk(
    State((pool, _config)): State<(PgPool, Config)>,
    Json(inputs): Json<Vec<CreateSensorData>>,
) -> Result<Response, AppError> {
    // ---
    let count = service::add_readings_bulk(&pool, inputs).await?;
    Ok(Json(json!({ "message": "Sensor data added successfully", "count": count }))
        .into_response())
}

// ---

/// Links attached to every reading representation.
fn reading_links(base: &str, dto: &SensorDataDto) -> Vec<NavLink> {
    // ---
    vec![
        NavLink {
            href: format!("{base}/api/v1/sensordata/{}", dto.id),
            rel: "self",
            method: "GET",
        },
        NavLink {
            href: format!("{base}/api/v1/sensordata/device/{}", dto.device_id),
            rel: "device-data",
            method: "GET",
        },
        NavLink {
            href: format!("{base}/api/v1/devices/by-deviceid/{}", dto.device_id),
            rel: "device",
            method: "GET",
        },
    ]
}
