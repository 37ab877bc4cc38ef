//! REST surface for the devices resource.
//!
//! List endpoints load the full set from the service and hand it to the
//! shaping layer; single-resource endpoints wrap their payload with the
//! follow-up requests available from it.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use sqlx::PgPool;

use super::{not_found, query_string, Linked};
use crate::error::AppError;
use crate::models::{CreateDevice, DeviceDto, DeviceStatus};
use crate::query::{self, DeviceSortField, NavLink, PageRequest};
use crate::{service, Config};

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new()
        .route("/api/v1/devices", get(list_devices).post(create_device))
        .route("/api/v1/devices/search", get(search_devices))
        .route(
            "/api/v1/devices/by-deviceid/{device_id}",
            get(get_device_by_device_id),
        )
        .route("/api/v1/devices/{id}", get(get_device).delete(delete_device))
        .route("/api/v1/devices/{id}/status", patch(update_device_status))
}

/// Query parameters accepted by `GET /api/v1/devices/search`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceSearchParams {
    status: Option<String>,
    location: Option<String>,
    page_number: Option<u32>,
    page_size: Option<u32>,
    sort_by: Option<String>,
    sort_descending: Option<bool>,
}

// ---

async fn search_devices(
    State((pool, config)): State<(PgPool, Config)>,
    Query(params): Query<DeviceSearchParams>,
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

    let dtos: Vec<DeviceDto> = devices.iter().map(|d| d.to_dto()).collect();
    let page =
        query::paginate(dtos, page_req, sort_field.as_str(), sort_desc).with_nav_links(|n| {
            let qs = query_string(&[
                ("status", params.status.clone()),
                ("location", params.location.clone()),
                ("pageNumber", Some(n.to_string())),
                ("pageSize", Some(page_req.page_size.to_string())),
                ("sortBy", Some(sort_field.as_str().to_string())),
                ("sortDescending", Some(sort_desc.to_string())),
            ]);
            format!("{}/api/v1/devices/search?{qs}", config.public_url)
        });

    Ok(Json(page).into_response())
}

async fn list_devices(
    State((pool, config)): State<(PgPool, Config)>,
) -> Result<Response, AppError> {
    // ---
    let devices = service::list_devices(&pool).await?;
    let items: Vec<Linked<DeviceDto>> = devices
        .iter()
        .map(|d| {
            let dto = d.to_dto();
            Linked {
                links: device_links(&config.public_url, &dto),
                data: dto,
            }
        })
        .collect();

    Ok(Json(items).into_response())
}

async fn get_device(
    State((pool, config)): State<(PgPool, Config)>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    // ---
    let Some(device) = service::get_device(&pool, id).await? else {
        return Ok(not_found(format!("Device with ID {id} not found")));
    };

    let dto = device.to_dto();
    let links = detail_links(&config.public_url, &dto);
    Ok(Json(Linked { data: dto, links }).into_response())
}

async fn get_device_by_device_id(
    State((pool, config)): State<(PgPool, Config)>,
    Path(device_id): Path<String>,
) -> Result<Response, AppError> {
    // ---
    let Some(device) = service::get_device_by_device_id(&pool, &device_id).await? else {
        return Ok(not_found(format!("Device with ID {device_id} not found")));
    };

    let dto = device.to_dto();
    let links = detail_links(&config.public_url, &dto);
    Ok(Json(Linked { data: dto, links }).into_response())
}

async fn create_device(
    State((pool, config)): State<(PgPool, Config)>,
    Json(input): Json<CreateDevice>,
) -> Result<Response, AppError> {
    // ---
    let device = service::create_device(&pool, input).await?;
    let dto = device.to_dto();
    let links = device_links(&config.public_url, &dto);
    let location = format!("/api/v1/devices/{}", dto.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(Linked { data: dto, links }),
    )
        .into_response())
}

async fn update_device_status(
    State((pool, _config)): State<(PgPool, Config)>,
    Path(id): Path<i32>,
    Json(status): Json<String>,
) -> Result<Response, AppError> {
    // ---
    let Some(device) = service::get_device(&pool, id).await? else {
        return Ok(not_found(format!("Device with ID {id} not found")));
    };
    let Some(status) = DeviceStatus::parse(&status) else {
        return Err(AppError::InvalidStatus(status));
    };

    service::update_device_status(&pool, &device.device_id, status).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn delete_device(
    State((pool, _config)): State<(PgPool, Config)>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    // ---
    if service::delete_device(&pool, id).await? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(not_found(format!("Device with ID {id} not found")))
    }
}

// ---

/// Links attached to every device representation.
fn device_links(base: &str, dto: &DeviceDto) -> Vec<NavLink> {
    // ---
    vec![
        NavLink {
            href: format!("{base}/api/v1/devices/{}", dto.id),
            rel: "self",
            method: "GET",
        },
        NavLink {
            href: format!("{base}/api/v1/devices/{}/status", dto.id),
            rel: "update-status",
            method: "PATCH",
        },
        NavLink {
            href: format!("{base}/api/v1/devices/{}", dto.id),
            rel: "delete",
            method: "DELETE",
        },
        NavLink {
            href: format!("{base}/api/v1/sensordata/device/{}", dto.device_id),
            rel: "sensor-data",
            method: "GET",
        },
    ]
}

/// Single-device links also point back at the collection.
fn detail_links(base: &str, dto: &DeviceDto) -> Vec<NavLink> {
    // ---
    let mut links = device_links(base, dto);
    links.push(NavLink {
        href: format!("{base}/api/v1/devices"),
        rel: "all-devices",
        method: "GET",
    });
    links
}
