//! Repository layer: CRUD and bounded-lookup accessors over Postgres.
//!
//! Free async functions over sqlx executors, so the services can run them
//! either straight against the pool or inside a transaction. Devices come
//! back with a bounded window of their most recent readings eagerly
//! attached.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use crate::models::{CreateDevice, CreateSensorData, Device, DeviceRow, DeviceStatus, SensorData};

// ---

/// Recent-readings window for single-device lookups.
const RECENT_WINDOW_SINGLE: i64 = 10;
/// Smaller window when listing every device.
const RECENT_WINDOW_LIST: i64 = 5;

// --- devices ---

pub async fn get_device_by_id(pool: &PgPool, id: i32) -> Result<Option<Device>, sqlx::Error> {
    // ---
    let row = sqlx::query_as::<_, DeviceRow>(
        "SELECT id, device_id, name, location, status, last_seen, created_at \
         FROM devices WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    attach_recent_readings(pool, row, RECENT_WINDOW_SINGLE).await
}

pub async fn get_device_by_device_id(
    pool: &PgPool,
    device_id: &str,
) -> Result<Option<Device>, sqlx::Error> {
    // ---
    let row = sqlx::query_as::<_, DeviceRow>(
        "SELECT id, device_id, name, location, status, last_seen, created_at \
         FROM devices WHERE device_id = $1",
    )
    .bind(device_id)
    .fetch_optional(pool)
    .await?;

    attach_recent_readings(pool, row, RECENT_WINDOW_SINGLE).await
}

/// All devices ordered by name, each with its recent-readings window.
pub async fn list_devices(pool: &PgPool) -> Result<Vec<Device>, sqlx::Error> {
    // ---
    let rows = sqlx::query_as::<_, DeviceRow>(
        "SELECT id, device_id, name, location, status, last_seen, created_at \
         FROM devices ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut devices = Vec::with_capacity(rows.len());
    for row in rows {
        let readings = recent_readings(pool, &row.device_id, RECENT_WINDOW_LIST).await?;
        devices.push(row.into_device(readings));
    }
    Ok(devices)
}

pub async fn insert_device(
    pool: &PgPool,
    input: &CreateDevice,
    status: DeviceStatus,
    last_seen: DateTime<Utc>,
) -> Result<Device, sqlx::Error> {
    // ---
    let row = sqlx::query_as::<_, DeviceRow>(
        r#"
        INSERT INTO devices (device_id, name, location, status, last_seen)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, device_id, name, location, status, last_seen, created_at
        "#,
    )
    .bind(&input.device_id)
    .bind(&input.name)
    .bind(&input.location)
    .bind(status.as_str())
    .bind(last_seen)
    .fetch_one(pool)
    .await?;

    Ok(row.into_device(Vec::new()))
}

/// Set status and refresh last-seen; returns the number of rows touched.
pub async fn set_device_status(
    exec: impl PgExecutor<'_>,
    device_id: &str,
    status: DeviceStatus,
    last_seen: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    // ---
    let result = sqlx::query("UPDATE devices SET status = $2, last_seen = $3 WHERE device_id = $1")
        .bind(device_id)
        .bind(status.as_str())
        .bind(last_seen)
        .execute(exec)
        .await?;
    Ok(result.rows_affected())
}

/// Update the fields the edit pages expose (name and location); returns the
/// number of rows touched.
pub async fn update_device_details(
    exec: impl PgExecutor<'_>,
    id: i32,
    name: &str,
    location: &str,
) -> Result<u64, sqlx::Error> {
    // ---
    let result = sqlx::query("UPDATE devices SET name = $2, location = $3 WHERE id = $1")
        .bind(id)
        .bind(name)
        .bind(location)
        .execute(exec)
        .await?;
    Ok(result.rows_affected())
}

/// Flip a device to Online and refresh last-seen, but only when it is not
/// already Online. Idempotent by construction: the second call in a row
/// matches zero rows.
pub async fn mark_device_seen(
    exec: impl PgExecutor<'_>,
    device_id: &str,
    seen_at: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    // ---
    let result = sqlx::query(
        "UPDATE devices SET status = 'Online', last_seen = $2 \
         WHERE device_id = $1 AND status <> 'Online'",
    )
    .bind(device_id)
    .bind(seen_at)
    .execute(exec)
    .await?;
    Ok(result.rows_affected())
}

/// Delete by surrogate id. Readings are left untouched (no cascade).
pub async fn delete_device(pool: &PgPool, id: i32) -> Result<u64, sqlx::Error> {
    // ---
    let result = sqlx::query("DELETE FROM devices WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn device_exists(
    exec: impl PgExecutor<'_>,
    device_id: &str,
) -> Result<bool, sqlx::Error> {
    // ---
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM devices WHERE device_id = $1)")
        .bind(device_id)
        .fetch_one(exec)
        .await
}

// --- sensor data ---

pub async fn get_reading_by_id(
    pool: &PgPool,
    id: i32,
) -> Result<Option<SensorData>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, SensorData>(
        "SELECT id, device_id, sensor_type, value, unit, timestamp \
         FROM sensor_data WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Readings for one device, newest first, optionally bounded on both ends
/// (inclusive).
pub async fn readings_for_device(
    pool: &PgPool,
    device_id: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<SensorData>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, SensorData>(
        "SELECT id, device_id, sensor_type, value, unit, timestamp \
         FROM sensor_data \
         WHERE device_id = $1 \
           AND ($2::timestamptz IS NULL OR timestamp >= $2) \
           AND ($3::timestamptz IS NULL OR timestamp <= $3) \
         ORDER BY timestamp DESC",
    )
    .bind(device_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

pub async fn recent_readings(
    exec: impl PgExecutor<'_>,
    device_id: &str,
    limit: i64,
) -> Result<Vec<SensorData>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, SensorData>(
        "SELECT id, device_id, sensor_type, value, unit, timestamp \
         FROM sensor_data WHERE device_id = $1 \
         ORDER BY timestamp DESC LIMIT $2",
    )
    .bind(device_id)
    .bind(limit)
    .fetch_all(exec)
    .await
}

pub async fn insert_reading(
    exec: impl PgExecutor<'_>,
    input: &CreateSensorData,
    timestamp: DateTime<Utc>,
) -> Result<SensorData, sqlx::Error> {
    // ---
    sqlx::query_as::<_, SensorData>(
        r#"
        INSERT INTO sensor_data (device_id, sensor_type, value, unit, timestamp)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, device_id, sensor_type, value, unit, timestamp
        "#,
    )
    .bind(&input.device_id)
    .bind(&input.sensor_type)
    .bind(input.value)
    .bind(&input.unit)
    .bind(timestamp)
    .fetch_one(exec)
    .await
}

/// Insert a batch of readings, all with the same server timestamp. Takes a
/// bare connection rather than an executor so the caller can hand it the
/// transaction the whole batch must live in.
pub async fn insert_batch(
    conn: &mut sqlx::PgConnection,
    inputs: &[CreateSensorData],
    timestamp: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    // ---
    for input in inputs {
        insert_reading(&mut *conn, input, timestamp).await?;
    }
    Ok(())
}

// ---

async fn attach_recent_readings(
    pool: &PgPool,
    row: Option<DeviceRow>,
    window: i64,
) -> Result<Option<Device>, sqlx::Error> {
    // ---
    match row {
        Some(row) => {
            let readings = recent_readings(pool, &row.device_id, window).await?;
            Ok(Some(row.into_device(readings)))
        }
        None => Ok(None),
    }
}
