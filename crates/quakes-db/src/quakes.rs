//! The `quakes` table: merge, enrichment, retention and queries.
//!
//! [`QuakeStore`] is the only writer. Writes are serialized through an async
//! mutex and each batch runs in one transaction, so readers on other
//! connections never observe a partially merged batch.

use chrono::{DateTime, Utc};
use quakes_core::{ParsedNearbyCity, ParsedQuake, Provider};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::Mutex;

use crate::DbError;

const SELECT_COLUMNS: &str = "SELECT provider, identifier, name, magnitude, depth_m, latitude, \
     longitude, occurred_at_ms, revised_at_ms, detail_url, weblink, felt, country_code, \
     nearby_cities, distance_m FROM quakes";

/// A raw row from the `quakes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuakeRow {
    pub provider: String,
    pub identifier: String,
    pub name: String,
    pub magnitude: f64,
    pub depth_m: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub occurred_at_ms: i64,
    pub revised_at_ms: Option<i64>,
    pub detail_url: Option<String>,
    pub weblink: Option<String>,
    pub felt: f64,
    pub country_code: Option<String>,
    pub nearby_cities: Option<String>,
    pub distance_m: Option<f64>,
}

/// A persisted quake with its enrichment fields decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredQuake {
    pub provider: Provider,
    pub identifier: String,
    pub name: String,
    pub magnitude: f64,
    pub depth_m: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub occurred_at: DateTime<Utc>,
    pub revised_at: Option<DateTime<Utc>>,
    pub detail_url: Option<String>,
    pub weblink: Option<String>,
    pub felt: f64,
    pub country_code: Option<String>,
    pub nearby_cities: Option<Vec<ParsedNearbyCity>>,
    pub distance_m: Option<f64>,
}

impl TryFrom<QuakeRow> for StoredQuake {
    type Error = DbError;

    fn try_from(row: QuakeRow) -> Result<Self, Self::Error> {
        let invalid = |reason: String| DbError::InvalidRow {
            provider: row.provider.clone(),
            identifier: row.identifier.clone(),
            reason,
        };

        let provider: Provider = row.provider.parse().map_err(|e| invalid(format!("{e}")))?;
        let occurred_at = DateTime::from_timestamp_millis(row.occurred_at_ms)
            .ok_or_else(|| invalid(format!("occurred_at_ms {} out of range", row.occurred_at_ms)))?;
        let revised_at = row.revised_at_ms.and_then(DateTime::from_timestamp_millis);
        let nearby_cities = row
            .nearby_cities
            .as_deref()
            .map(serde_json::from_str::<Vec<ParsedNearbyCity>>)
            .transpose()
            .map_err(|e| invalid(format!("nearby_cities: {e}")))?;

        Ok(Self {
            provider,
            identifier: row.identifier,
            name: row.name,
            magnitude: row.magnitude,
            depth_m: row.depth_m,
            latitude: row.latitude,
            longitude: row.longitude,
            occurred_at,
            revised_at,
            detail_url: row.detail_url,
            weblink: row.weblink,
            felt: row.felt,
            country_code: row.country_code,
            nearby_cities,
            distance_m: row.distance_m,
        })
    }
}

/// Counts reported by [`QuakeStore::merge_quakes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: u64,
    /// Existing rows whose fields actually changed.
    pub updated: u64,
}

/// Enrichment fields to write. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub nearby_cities: Option<Vec<ParsedNearbyCity>>,
    pub country_code: Option<String>,
}

impl Enrichment {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nearby_cities.is_none() && self.country_code.is_none()
    }
}

/// Query filter for [`QuakeStore::list_quakes`] and [`QuakeStore::count_quakes`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuakeFilter {
    pub min_magnitude: Option<f64>,
    pub provider: Option<Provider>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

pub struct QuakeStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl QuakeStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts unseen quakes and refreshes known ones, in one transaction.
    ///
    /// A record is keyed by `(provider, identifier)`. For a known record the
    /// provider fields are overwritten unless the incoming copy is older
    /// than the stored revision; enrichment fields are never touched, and
    /// `distance_m` only changes when the incoming record carries one.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if any statement fails; the whole batch is
    /// rolled back.
    pub async fn merge_quakes(&self, parsed: &[ParsedQuake]) -> Result<MergeSummary, DbError> {
        if parsed.is_empty() {
            return Ok(MergeSummary::default());
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut summary = MergeSummary::default();

        for quake in parsed {
            let existing: Option<(i64, Option<i64>)> = sqlx::query_as(
                "SELECT occurred_at_ms, revised_at_ms FROM quakes \
                 WHERE provider = ? AND identifier = ?",
            )
            .bind(quake.provider.as_str())
            .bind(&quake.identifier)
            .fetch_optional(&mut *tx)
            .await?;

            let occurred_at_ms = quake.occurred_at.timestamp_millis();
            let revised_at_ms = quake.revised_at.map(|t| t.timestamp_millis());

            match existing {
                None => {
                    sqlx::query(
                        "INSERT INTO quakes \
                             (provider, identifier, name, magnitude, depth_m, latitude, longitude, \
                              occurred_at_ms, revised_at_ms, detail_url, weblink, felt, distance_m) \
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    )
                    .bind(quake.provider.as_str())
                    .bind(&quake.identifier)
                    .bind(&quake.name)
                    .bind(quake.magnitude)
                    .bind(quake.depth_m)
                    .bind(quake.latitude)
                    .bind(quake.longitude)
                    .bind(occurred_at_ms)
                    .bind(revised_at_ms)
                    .bind(&quake.detail_url)
                    .bind(&quake.weblink)
                    .bind(quake.felt)
                    .bind(quake.distance_m)
                    .execute(&mut *tx)
                    .await?;
                    summary.inserted += 1;
                }
                Some((stored_occurred, stored_revised)) => {
                    let stored_version = stored_revised.unwrap_or(stored_occurred);
                    let incoming_version = revised_at_ms.unwrap_or(occurred_at_ms);
                    if incoming_version < stored_version {
                        tracing::debug!(
                            provider = %quake.provider,
                            identifier = %quake.identifier,
                            "ignoring stale revision"
                        );
                        continue;
                    }

                    // The WHERE clause makes unchanged rows report zero affected rows.
                    let result = sqlx::query(
                        "UPDATE quakes SET \
                             name = ?1, magnitude = ?2, depth_m = ?3, latitude = ?4, \
                             longitude = ?5, occurred_at_ms = ?6, revised_at_ms = ?7, \
                             detail_url = COALESCE(?8, detail_url), \
                             weblink = COALESCE(?9, weblink), felt = ?10, \
                             distance_m = COALESCE(?11, distance_m) \
                         WHERE provider = ?12 AND identifier = ?13 AND ( \
                             name IS NOT ?1 OR magnitude IS NOT ?2 OR depth_m IS NOT ?3 \
                             OR latitude IS NOT ?4 OR longitude IS NOT ?5 \
                             OR occurred_at_ms IS NOT ?6 OR revised_at_ms IS NOT ?7 \
                             OR detail_url IS NOT COALESCE(?8, detail_url) \
                             OR weblink IS NOT COALESCE(?9, weblink) OR felt IS NOT ?10 \
                             OR distance_m IS NOT COALESCE(?11, distance_m))",
                    )
                    .bind(&quake.name)
                    .bind(quake.magnitude)
                    .bind(quake.depth_m)
                    .bind(quake.latitude)
                    .bind(quake.longitude)
                    .bind(occurred_at_ms)
                    .bind(revised_at_ms)
                    .bind(&quake.detail_url)
                    .bind(&quake.weblink)
                    .bind(quake.felt)
                    .bind(quake.distance_m)
                    .bind(quake.provider.as_str())
                    .bind(&quake.identifier)
                    .execute(&mut *tx)
                    .await?;
                    summary.updated += result.rows_affected();
                }
            }
        }

        tx.commit().await?;
        tracing::info!(
            batch = parsed.len(),
            inserted = summary.inserted,
            updated = summary.updated,
            "merged quakes"
        );
        Ok(summary)
    }

    /// Writes exactly the supplied enrichment fields.
    ///
    /// Returns `false` without error when the quake is no longer stored or
    /// there is nothing to write.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Encode`] if the city list cannot be serialized, or
    /// [`DbError::Sqlx`] if the update fails.
    pub async fn enrich_quake(
        &self,
        provider: Provider,
        identifier: &str,
        enrichment: &Enrichment,
    ) -> Result<bool, DbError> {
        if enrichment.is_empty() {
            return Ok(false);
        }
        let cities_json = enrichment
            .nearby_cities
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            "UPDATE quakes SET \
                 nearby_cities = COALESCE(?, nearby_cities), \
                 country_code = COALESCE(?, country_code) \
             WHERE provider = ? AND identifier = ?",
        )
        .bind(cities_json)
        .bind(&enrichment.country_code)
        .bind(provider.as_str())
        .bind(identifier)
        .execute(&self.pool)
        .await?;

        let found = result.rows_affected() > 0;
        if found {
            tracing::debug!(%provider, identifier, "quake enriched");
        } else {
            tracing::debug!(%provider, identifier, "enrichment target no longer stored");
        }
        Ok(found)
    }

    /// Deletes quakes that occurred before `cutoff`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the delete fails.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM quakes WHERE occurred_at_ms < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected();
        if removed > 0 {
            tracing::info!(removed, %cutoff, "pruned quakes outside retention window");
        }
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails or [`DbError::InvalidRow`]
    /// if the stored row cannot be decoded.
    pub async fn get_quake(
        &self,
        provider: Provider,
        identifier: &str,
    ) -> Result<Option<StoredQuake>, DbError> {
        let row = sqlx::query_as::<_, QuakeRow>(&format!(
            "{SELECT_COLUMNS} WHERE provider = ? AND identifier = ?"
        ))
        .bind(provider.as_str())
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        row.map(StoredQuake::try_from).transpose()
    }

    /// Lists quakes matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails or [`DbError::InvalidRow`]
    /// if a stored row cannot be decoded.
    pub async fn list_quakes(&self, filter: &QuakeFilter) -> Result<Vec<StoredQuake>, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY occurred_at_ms DESC, provider, identifier");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = builder
            .build_query_as::<QuakeRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(StoredQuake::try_from).collect()
    }

    /// Counts quakes matching `filter`; the limit is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails.
    pub async fn count_quakes(&self, filter: &QuakeFilter) -> Result<u64, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM quakes");
        push_filter(&mut builder, filter);
        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &QuakeFilter) {
    let mut clause = " WHERE ";
    if let Some(min) = filter.min_magnitude {
        builder.push(clause).push("magnitude >= ").push_bind(min);
        clause = " AND ";
    }
    if let Some(provider) = filter.provider {
        builder.push(clause).push("provider = ").push_bind(provider.as_str());
        clause = " AND ";
    }
    if let Some(since) = filter.since {
        builder
            .push(clause)
            .push("occurred_at_ms >= ")
            .push_bind(since.timestamp_millis());
    }
}

#[cfg(test)]
#[path = "quakes_test.rs"]
mod tests;
