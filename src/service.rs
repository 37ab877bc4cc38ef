//! Domain services for devices and sensor data.
//!
//! This is where the two rules the system actually has live: a reading may
//! only reference a registered device, and ingesting a reading marks the
//! device as seen (Online + fresh last-seen). Everything else is delegation
//! to the repository with storage errors translated into the domain
//! taxonomy.

use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{CreateDevice, CreateSensorData, Device, DeviceStatus, SensorData};
use crate::repo;

// --- devices ---

pub async fn get_device(pool: &PgPool, id: i32) -> AppResult<Option<Device>> {
    Ok(repo::get_device_by_id(pool, id).await?)
}

pub async fn get_device_by_device_id(pool: &PgPool, device_id: &str) -> AppResult<Option<Device>> {
    Ok(repo::get_device_by_device_id(pool, device_id).await?)
}

pub async fn list_devices(pool: &PgPool) -> AppResult<Vec<Device>> {
    Ok(repo::list_devices(pool).await?)
}

/// Register a device. Status is always forced to `Offline` and last-seen to
/// the creation time; the caller does not get a say.
///
/// Uniqueness of the external id is left to the store's unique index; a
/// violation comes back as [`AppError::DuplicateDeviceId`].
pub async fn create_device(pool: &PgPool, input: CreateDevice) -> AppResult<Device> {
    // ---
    match repo::insert_device(pool, &input, DeviceStatus::Offline, Utc::now()).await {
        Ok(device) => {
            info!("registered device {}", device.device_id);
            Ok(device)
        }
        Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateDeviceId(input.device_id)),
        Err(e) => Err(e.into()),
    }
}

/// Set a device's status and refresh last-seen. Silently succeeds when no
/// such device exists.
pub async fn update_device_status(
    pool: &PgPool,
    device_id: &str,
    status: DeviceStatus,
) -> AppResult<()> {
    // ---
    let touched = repo::set_device_status(pool, device_id, status, Utc::now()).await?;
    if touched == 0 {
        debug!("status update for unknown device {device_id} ignored");
    }
    Ok(())
}

/// Rename or relocate a device (the fields the edit pages expose). Returns
/// false when the device does not exist.
pub async fn update_device_details(
    pool: &PgPool,
    id: i32,
    name: &str,
    location: &str,
) -> AppResult<bool> {
    // ---
    Ok(repo::update_device_details(pool, id, name, location).await? > 0)
}

/// Returns false when the device does not exist. Associated readings are
/// not deleted.
pub async fn delete_device(pool: &PgPool, id: i32) -> AppResult<bool> {
    // ---
    Ok(repo::delete_device(pool, id).await? > 0)
}

// --- sensor data ---

pub async fn get_reading(pool: &PgPool, id: i32) -> AppResult<Option<SensorData>> {
    Ok(repo::get_reading_by_id(pool, id).await?)
}

pub async fn readings_for_device(
    pool: &PgPool,
    device_id: &str,
    start: Option<chrono::DateTime<Utc>>,
    end: Option<chrono::DateTime<Utc>>,
) -> AppResult<Vec<SensorData>> {
    Ok(repo::readings_for_device(pool, device_id, start, end).await?)
}

/// Ingest one reading. Fails when the referenced device is not registered;
/// otherwise server-stamps the timestamp, persists, and marks the device
/// seen, all in one transaction.
pub async fn add_reading(pool: &PgPool, input: CreateSensorData) -> AppResult<SensorData> {
    // ---
    if !repo::device_exists(pool, &input.device_id).await? {
        return Err(AppError::UnknownDevice(input.device_id));
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let reading = repo::insert_reading(&mut *tx, &input, now).await?;
    repo::mark_device_seen(&mut *tx, &input.device_id, now).await?;
    tx.commit().await?;

    debug!(
        "stored {} reading for {}",
        reading.sensor_type, reading.device_id
    );
    Ok(reading)
}

/// Ingest a batch atomically. Every distinct referenced device must exist
/// before anything is written; one missing id rejects the whole batch with
/// zero readings persisted. All inserts plus one seen-mark per distinct
/// device run in a single transaction.
pub async fn add_readings_bulk(
    pool: &PgPool,
    inputs: Vec<CreateSensorData>,
) -> AppResult<usize> {
    // ---
    let mut distinct_ids: Vec<&str> = Vec::new();
    for input in &inputs {
        if !distinct_ids.contains(&input.device_id.as_str()) {
            distinct_ids.push(&input.device_id);
        }
    }

    for device_id in &distinct_ids {
        if !repo::device_exists(pool, device_id).await? {
            return Err(AppError::UnknownDevice(device_id.to_string()));
        }
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    repo::insert_batch(&mut tx, &inputs, now).await?;
    for device_id in &distinct_ids {
        repo::mark_device_seen(&mut *tx, device_id, now).await?;
    }
    tx.commit().await?;

    info!(
        "stored {} readings for {} device(s)",
        inputs.len(),
        distinct_ids.len()
    );
    Ok(inputs.len())
}

// ---

/// SQLSTATE 23505, unique_violation.
fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}
