//! Site reads and writes.

use fits_types::{FeatureCollection, Site};
use sqlx::PgPool;

use crate::error::DbError;
use crate::resolver::{Resolver, SITE_COLUMNS, SiteRow};

/// Which sites a collection query returns. Every filter is optional; unset
/// filters do not restrict.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteFilter<'q> {
    /// Only sites with at least one observation of this type.
    pub type_id: Option<&'q str>,
    /// With `type_id`, only observations made with this method.
    pub method_id: Option<&'q str>,
    /// Only sites inside this EPSG:4326 WKT polygon.
    pub within: Option<&'q str>,
}

/// `$1` type, `$2` method, `$3` polygon.
///
/// With a type filter the containment test shifts longitudes into 0..360
/// so polygons crossing the 180 meridian select the right sites.
const COLLECTION_PREDICATE: &str = r"
    WHERE ($1::text IS NULL OR s.sitepk IN (
            SELECT DISTINCT o.sitepk FROM fits.observation o
            WHERE o.typepk = (SELECT typepk FROM fits.type WHERE typeid = $1)
              AND ($2::text IS NULL OR o.methodpk = (SELECT methodpk FROM fits.method WHERE methodid = $2))))
      AND ($3::text IS NULL OR CASE
            WHEN $1::text IS NULL
              THEN ST_Within(s.location::geometry, ST_GeomFromText($3, 4326))
            ELSE ST_Within(ST_ShiftLongitude(s.location::geometry), ST_ShiftLongitude(ST_GeomFromText($3, 4326)))
          END)
    ORDER BY s.siteid";

const SAVE_SQL: &str = r"
    INSERT INTO fits.site(siteid, name, location, height, ground_relationship)
    VALUES ($1, $2, ST_GeogFromWKB(ST_AsEWKB(ST_SetSRID(ST_MakePoint($3, $4), 4326))), $5, $6)
    ON CONFLICT (siteid) DO UPDATE SET
      name = EXCLUDED.name,
      location = EXCLUDED.location,
      height = EXCLUDED.height,
      ground_relationship = EXCLUDED.ground_relationship";

/// Operations on `fits.site`.
pub struct SiteStore<'a> {
    pool: &'a PgPool,
}

impl<'a> SiteStore<'a> {
    /// Create a site store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch one site.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown identifier.
    pub async fn get(&self, site_id: &str) -> Result<Site, DbError> {
        Resolver::new(self.pool).valid_site(site_id).await
    }

    /// Sites matching `filter`, ordered by identifier.
    pub async fn collection(&self, filter: &SiteFilter<'_>) -> Result<Vec<Site>, DbError> {
        let sql = format!("SELECT {SITE_COLUMNS} FROM fits.site s {COLLECTION_PREDICATE}");
        let rows = sqlx::query_as::<_, SiteRow>(&sql)
            .bind(filter.type_id)
            .bind(filter.method_id)
            .bind(filter.within)
            .fetch_all(self.pool)
            .await?;

        tracing::debug!(count = rows.len(), "selected sites");
        Ok(rows.into_iter().map(Site::from).collect())
    }

    /// Sites matching `filter` as a `GeoJSON` feature collection.
    pub async fn geojson(&self, filter: &SiteFilter<'_>) -> Result<FeatureCollection, DbError> {
        Ok(self.collection(filter).await?.into_iter().collect())
    }

    /// Insert or update a site. Returns rows affected.
    pub async fn save(&self, site: &Site) -> Result<u64, DbError> {
        let affected = sqlx::query(SAVE_SQL)
            .bind(&site.site_id)
            .bind(&site.name)
            .bind(site.longitude)
            .bind(site.latitude)
            .bind(site.height)
            .bind(site.ground_relationship)
            .execute(self.pool)
            .await?
            .rows_affected();

        tracing::debug!(site_id = %site.site_id, affected, "saved site");
        Ok(affected)
    }

    /// Delete a site. Returns rows affected.
    pub async fn delete(&self, site_id: &str) -> Result<u64, DbError> {
        let affected = sqlx::query(r"DELETE FROM fits.site WHERE siteid = $1")
            .bind(site_id)
            .execute(self.pool)
            .await?
            .rows_affected();

        tracing::debug!(site_id, affected, "deleted site");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_shifts_only_with_type() {
        assert!(COLLECTION_PREDICATE.contains("WHEN $1::text IS NULL"));
        assert!(COLLECTION_PREDICATE.contains("ST_ShiftLongitude(ST_GeomFromText($3, 4326))"));
    }

    #[test]
    fn default_filter_is_unrestricted() {
        let f = SiteFilter::default();
        assert!(f.type_id.is_none() && f.method_id.is_none() && f.within.is_none());
    }
}
