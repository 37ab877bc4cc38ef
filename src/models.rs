//! Entities, transfer objects, and the explicit conversions between them.
//!
//! Every layer boundary gets a plain field-by-field conversion function
//! instead of a reflection-style mapper, so each mapping is enumerable and
//! testable on its own.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---

/// Connectivity state of a registered device.
///
/// Stored as text (`Online` / `Offline` / `Error`) in the `devices` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
}

impl DeviceStatus {
    /// Parse a caller-supplied status string, case-insensitively.
    ///
    /// Returns `None` for anything outside the three known states; callers
    /// turn that into a validation failure.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Offline => "Offline",
            Self::Error => "Error",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---

/// A registered device with its bounded window of recent readings attached.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: i32,
    /// Caller-supplied external identifier, unique and immutable.
    pub device_id: String,
    pub name: String,
    pub location: String,
    pub status: DeviceStatus,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub recent_readings: Vec<SensorData>,
}

/// Raw `devices` row as it comes back from Postgres (status still text).
#[derive(Debug, sqlx::FromRow)]
pub struct DeviceRow {
    pub id: i32,
    pub device_id: String,
    pub name: String,
    pub location: String,
    pub status: String,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DeviceRow {
    /// Row -> entity, attaching the readings the repository loaded for it.
    ///
    /// A status string the application did not write itself decodes as
    /// `Error` rather than failing the whole request.
    pub fn into_device(self, recent_readings: Vec<SensorData>) -> Device {
        Device {
            id: self.id,
            device_id: self.device_id,
            name: self.name,
            location: self.location,
            status: DeviceStatus::parse(&self.status).unwrap_or(DeviceStatus::Error),
            last_seen: self.last_seen,
            created_at: self.created_at,
            recent_readings,
        }
    }
}

/// A single persisted sensor measurement.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SensorData {
    pub id: i32,
    /// External identifier of the owning device (relation by value).
    pub device_id: String,
    pub sensor_type: String,
    pub value: Decimal,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

// ---

/// Creation payload for `POST /api/v1/devices`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDevice {
    pub device_id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
}

/// Ingestion payload for `POST /api/v1/sensordata` (single and bulk).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSensorData {
    pub device_id: String,
    pub sensor_type: String,
    pub value: Decimal,
    pub unit: String,
}

// ---

/// Device representation returned by both HTTP surfaces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub id: i32,
    pub device_id: String,
    pub name: String,
    pub status: String,
    pub location: String,
    pub last_seen: DateTime<Utc>,
    pub recent_readings: Vec<SensorDataDto>,
}

/// Sensor reading representation returned by both HTTP surfaces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDataDto {
    pub id: i32,
    pub device_id: String,
    pub sensor_type: String,
    pub value: Decimal,
    pub timestamp: DateTime<Utc>,
    pub unit: String,
}

impl Device {
    pub fn to_dto(&self) -> DeviceDto {
        DeviceDto {
            id: self.id,
            device_id: self.device_id.clone(),
            name: self.name.clone(),
            status: self.status.to_string(),
            location: self.location.clone(),
            last_seen: self.last_seen,
            recent_readings: self.recent_readings.iter().map(SensorData::to_dto).collect(),
        }
    }
}

impl SensorData {
    pub fn to_dto(&self) -> SensorDataDto {
        SensorDataDto {
            id: self.id,
            device_id: self.device_id.clone(),
            sensor_type: self.sensor_type.clone(),
            value: self.value,
            timestamp: self.timestamp,
            unit: self.unit.clone(),
        }
    }
}
