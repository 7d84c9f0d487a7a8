//! PostgreSQL-backed binding store.
//!
//! Rows live in the `device_bindings` table, keyed by the SHA-256 digest of
//! the API key. The raw key is never persisted; the masked form is kept for
//! administrative listings. Every operation is a single statement, so
//! PostgreSQL row locking serializes concurrent writers on the same key and
//! bindings are shared by every gateway instance using the same database.

use super::{BindingStore, StoreError};
use crate::clock::{Clock, SystemClock};
use crate::db::DbPool;
use crate::models::api_key::hash_key;
use crate::models::binding::{BindingEntry, DeviceBinding, DeviceIdentity, DeviceKind};
use crate::redact::mask_key;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const SELECT_COLUMNS: &str = "masked_key, device_id, device_type, first_seen, last_seen, \
     last_ip, banned, ban_reason, banned_at";

#[derive(Debug, sqlx::FromRow)]
struct BindingRow {
    masked_key: String,
    device_id: String,
    device_type: String,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    last_ip: String,
    banned: bool,
    ban_reason: String,
    banned_at: Option<DateTime<Utc>>,
}

impl TryFrom<BindingRow> for DeviceBinding {
    type Error = StoreError;

    fn try_from(row: BindingRow) -> Result<Self, Self::Error> {
        let kind = row
            .device_type
            .parse::<DeviceKind>()
            .map_err(StoreError::Corrupt)?;

        Ok(DeviceBinding {
            device_id: row.device_id,
            kind,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
            last_ip: row.last_ip,
            banned: row.banned,
            ban_reason: row.ban_reason,
            banned_at: row.banned_at,
        })
    }
}

pub struct PgBindingStore {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl PgBindingStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
        }
    }
}

#[async_trait]
impl BindingStore for PgBindingStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, api_key: &str) -> Result<Option<DeviceBinding>, StoreError> {
        let row = sqlx::query_as::<_, BindingRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM device_bindings WHERE key_hash = $1"
        ))
        .bind(hash_key(api_key))
        .fetch_optional(&self.pool)
        .await?;

        row.map(DeviceBinding::try_from).transpose()
    }

    async fn save(
        &self,
        api_key: &str,
        identity: &DeviceIdentity,
        client_ip: &str,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();

        // Upsert: a re-registration fully replaces the previous record
        sqlx::query(
            r#"
            INSERT INTO device_bindings (
                key_hash, masked_key, device_id, device_type,
                first_seen, last_seen, last_ip, banned, ban_reason, banned_at
            )
            VALUES ($1, $2, $3, $4, $5, $5, $6, FALSE, '', NULL)
            ON CONFLICT (key_hash) DO UPDATE
            SET masked_key = EXCLUDED.masked_key,
                device_id = EXCLUDED.device_id,
                device_type = EXCLUDED.device_type,
                first_seen = EXCLUDED.first_seen,
                last_seen = EXCLUDED.last_seen,
                last_ip = EXCLUDED.last_ip,
                banned = FALSE,
                ban_reason = '',
                banned_at = NULL
            "#,
        )
        .bind(hash_key(api_key))
        .bind(mask_key(api_key))
        .bind(&identity.device_id)
        .bind(identity.kind.as_str())
        .bind(now)
        .bind(client_ip)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn register(
        &self,
        api_key: &str,
        identity: &DeviceIdentity,
        client_ip: &str,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();

        let inserted = sqlx::query(
            r#"
            INSERT INTO device_bindings (
                key_hash, masked_key, device_id, device_type,
                first_seen, last_seen, last_ip, banned, ban_reason, banned_at
            )
            VALUES ($1, $2, $3, $4, $5, $5, $6, FALSE, '', NULL)
            ON CONFLICT (key_hash) DO NOTHING
            "#,
        )
        .bind(hash_key(api_key))
        .bind(mask_key(api_key))
        .bind(&identity.device_id)
        .bind(identity.kind.as_str())
        .bind(now)
        .bind(client_ip)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(inserted > 0)
    }

    async fn update_last_seen(&self, api_key: &str, ip: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE device_bindings SET last_seen = $2, last_ip = $3 WHERE key_hash = $1")
            .bind(hash_key(api_key))
            .bind(self.clock.now())
            .bind(ip)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn ban(&self, api_key: &str, reason: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE device_bindings
            SET banned = TRUE,
                ban_reason = $2,
                banned_at = $3
            WHERE key_hash = $1
            "#,
        )
        .bind(hash_key(api_key))
        .bind(reason)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn unban(&self, api_key: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE device_bindings SET banned = FALSE, ban_reason = '', banned_at = NULL WHERE key_hash = $1",
        )
        .bind(hash_key(api_key))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, api_key: &str) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM device_bindings WHERE key_hash = $1")
            .bind(hash_key(api_key))
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM device_bindings")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<BindingEntry>, StoreError> {
        let rows = sqlx::query_as::<_, BindingRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM device_bindings ORDER BY first_seen"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let api_key = row.masked_key.clone();
                Ok(BindingEntry {
                    api_key,
                    binding: row.try_into()?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(device_type: &str) -> BindingRow {
        let now = Utc::now();
        BindingRow {
            masked_key: "sk-l****cdef".to_string(),
            device_id: "203.0.113.7".to_string(),
            device_type: device_type.to_string(),
            first_seen: now,
            last_seen: now,
            last_ip: "203.0.113.7".to_string(),
            banned: false,
            ban_reason: String::new(),
            banned_at: None,
        }
    }

    #[test]
    fn row_converts_into_binding() {
        let binding = DeviceBinding::try_from(row("ip")).unwrap();
        assert_eq!(binding.kind, DeviceKind::Ip);
        assert_eq!(binding.last_ip, "203.0.113.7");
    }

    #[test]
    fn unknown_device_type_is_corrupt() {
        let err = DeviceBinding::try_from(row("bluetooth")).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
