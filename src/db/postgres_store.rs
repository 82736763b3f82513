// src/db/postgres_store.rs
// DOCUMENTATION: PostgreSQL/PostGIS geo cache store
// PURPOSE: Durable backend; geo members live in a geography column, payloads in a key/value table

use async_trait::async_trait;
use sqlx::PgPool;

use super::store::GeoCacheStore;
use crate::errors::CrowdSenseError;

/// Store backed by two tables:
/// - cache_entries(key, value, updated_at)
/// - geo_members(index_key, member_key, location GEOGRAPHY(POINT, 4326))
#[derive(Clone)]
pub struct PgGeoStore {
    pool: PgPool,
}

impl PgGeoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if missing
    pub async fn ensure_schema(&self) -> Result<(), CrowdSenseError> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS postgis")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS geo_members (
                index_key TEXT NOT NULL,
                member_key TEXT NOT NULL,
                location GEOGRAPHY(POINT, 4326) NOT NULL,
                PRIMARY KEY (index_key, member_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_geo_members_location ON geo_members USING GIST (location)",
        )
        .execute(&self.pool)
        .await?;

        log::info!("Geo cache schema ready");
        Ok(())
    }
}

/// Translate a `*` wildcard pattern to a LIKE pattern
fn like_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        match ch {
            '\\' | '%' | '_' => {
                out.push('\\');
                out.push(ch);
            }
            '*' => out.push('%'),
            _ => out.push(ch),
        }
    }
    out
}

#[async_trait]
impl GeoCacheStore for PgGeoStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), CrowdSenseError> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CrowdSenseError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM cache_entries WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), CrowdSenseError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>, CrowdSenseError> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT key FROM cache_entries WHERE key LIKE $1 ORDER BY key",
        )
        .bind(like_pattern(pattern))
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    async fn add_location_with_payload(
        &self,
        index_key: &str,
        member_key: &str,
        lat: f64,
        lng: f64,
        payload: &str,
    ) -> Result<(), CrowdSenseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO geo_members (index_key, member_key, location)
            VALUES ($1, $2, ST_SetSRID(ST_MakePoint($3, $4), 4326)::geography)
            ON CONFLICT (index_key, member_key) DO UPDATE SET location = EXCLUDED.location
            "#,
        )
        .bind(index_key) // $1
        .bind(member_key) // $2
        .bind(lng) // $3 - longitude
        .bind(lat) // $4 - latitude
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(member_key)
        .bind(payload)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_within_radius(
        &self,
        index_key: &str,
        lat: f64,
        lng: f64,
        radius_km: f64,
    ) -> Result<Vec<String>, CrowdSenseError> {
        let rows = sqlx::query_as::<_, (String, Option<String>)>(
            r#"
            SELECT g.member_key, c.value
            FROM geo_members g
            LEFT JOIN cache_entries c ON c.key = g.member_key
            WHERE g.index_key = $1
              AND ST_DWithin(
                    g.location,
                    ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography,
                    $4
                  )
            ORDER BY ST_Distance(g.location, ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography),
                     g.member_key
            "#,
        )
        .bind(index_key) // $1
        .bind(lng) // $2 - longitude
        .bind(lat) // $3 - latitude
        .bind(radius_km * 1000.0) // $4 - meters
        .fetch_all(&self.pool)
        .await?;

        let mut payloads = Vec::with_capacity(rows.len());
        for (member, value) in rows {
            match value {
                Some(payload) => payloads.push(payload),
                None => log::warn!("Geo member {} has no payload, skipping", member),
            }
        }

        Ok(payloads)
    }
}
