//! Database schema management for `iot-monitor`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `devices` registry and the `sensor_data` measurement table.
/// Readings relate to devices by the external `device_id` value, not the
/// surrogate key, and carry no SQL foreign key: deleting a device leaves its
/// readings in place. Safe to call on every startup; no-op if objects
/// already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Device registry, one row per registered device
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            id         SERIAL PRIMARY KEY,
            device_id  TEXT        NOT NULL,
            name       TEXT        NOT NULL,
            location   TEXT        NOT NULL DEFAULT '',
            status     TEXT        NOT NULL,
            last_seen  TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Measurements, append-only
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_data (
            id          SERIAL PRIMARY KEY,
            device_id   TEXT          NOT NULL,
            sensor_type TEXT          NOT NULL,
            value       NUMERIC(18,2) NOT NULL,
            unit        TEXT          NOT NULL,
            timestamp   TIMESTAMPTZ   NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // External device identifiers are globally unique
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_devices_device_id
            ON devices (device_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Time-bounded per-device reading queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_data_device_id_timestamp
            ON sensor_data (device_id, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
