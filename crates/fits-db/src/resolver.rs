//! Identifier resolution.
//!
//! Each lookup is a single parameterized query and nothing is cached. A
//! missing identifier is [`DbError::NotFound`]; an SRS or polygon the
//! database will not accept is [`DbError::Invalid`].

use fits_types::valid::Srs;
use fits_types::{ObservationType, Site};
use sqlx::PgPool;

use crate::error::DbError;

/// Row shape shared by every site query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SiteRow {
    /// `siteid`
    pub site_id: String,
    /// `name`
    pub name: String,
    /// Longitude from `ST_X(location::geometry)`.
    pub longitude: f64,
    /// Latitude from `ST_Y(location::geometry)`.
    pub latitude: f64,
    /// `height`
    pub height: f64,
    /// `ground_relationship`
    pub ground_relationship: f64,
}

impl From<SiteRow> for Site {
    fn from(r: SiteRow) -> Self {
        Self {
            site_id: r.site_id,
            name: r.name,
            longitude: r.longitude,
            latitude: r.latitude,
            height: r.height,
            ground_relationship: r.ground_relationship,
        }
    }
}

/// Column list for [`SiteRow`] against `fits.site`.
pub(crate) const SITE_COLUMNS: &str = r"siteid AS site_id, name,
    ST_X(location::geometry) AS longitude, ST_Y(location::geometry) AS latitude,
    height::float8 AS height, ground_relationship::float8 AS ground_relationship";

/// Existence and validity checks for request identifiers.
pub struct Resolver<'a> {
    pool: &'a PgPool,
}

impl<'a> Resolver<'a> {
    /// Create a resolver bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a site.
    ///
    /// Legacy data may hold more than one row per identifier; the row with
    /// the largest surrogate key wins.
    pub async fn valid_site(&self, site_id: &str) -> Result<Site, DbError> {
        let sql = format!(
            "SELECT {SITE_COLUMNS} FROM fits.site WHERE siteid = $1 ORDER BY sitepk DESC LIMIT 1"
        );
        sqlx::query_as::<_, SiteRow>(&sql)
            .bind(site_id)
            .fetch_optional(self.pool)
            .await?
            .map(Site::from)
            .ok_or_else(|| DbError::NotFound(format!("siteID not found: {site_id}")))
    }

    /// Resolve a type with its unit symbol.
    pub async fn valid_type(&self, type_id: &str) -> Result<ObservationType, DbError> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            r"SELECT type.typeid, type.name, unit.symbol, type.description
              FROM fits.type JOIN fits.unit USING (unitpk)
              WHERE type.typeid = $1",
        )
        .bind(type_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|(id, name, unit, description)| ObservationType {
            type_id: id,
            name,
            unit,
            description,
        })
        .ok_or_else(|| DbError::NotFound(format!("typeID not found: {type_id}")))
    }

    /// Check that a method exists.
    pub async fn valid_method(&self, method_id: &str) -> Result<(), DbError> {
        self.exists(
            r"SELECT 1 FROM fits.method WHERE methodid = $1",
            method_id,
            "methodID",
        )
        .await
    }

    /// Check that `method_id` is a permitted method for `type_id`.
    pub async fn valid_type_method(&self, type_id: &str, method_id: &str) -> Result<(), DbError> {
        let row: Option<(i32,)> = sqlx::query_as(
            r"SELECT 1 FROM fits.type
              JOIN fits.type_method USING (typepk)
              JOIN fits.method USING (methodpk)
              WHERE typeid = $1 AND methodid = $2
              LIMIT 1",
        )
        .bind(type_id)
        .bind(method_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|_| ()).ok_or_else(|| {
            DbError::NotFound(format!("methodID {method_id} not valid for typeID {type_id}"))
        })
    }

    /// Check that a sample exists.
    pub async fn valid_sample(&self, sample_id: &str) -> Result<(), DbError> {
        self.exists(
            r"SELECT 1 FROM fits.sample WHERE sampleid = $1",
            sample_id,
            "sampleID",
        )
        .await
    }

    /// Check that an SRS is registered in `public.spatial_ref_sys`.
    pub async fn valid_srs(&self, srs: &Srs) -> Result<(), DbError> {
        let row: Option<(i32,)> = sqlx::query_as(
            r"SELECT 1 FROM public.spatial_ref_sys WHERE auth_name = $1 AND srid = $2",
        )
        .bind(&srs.auth)
        .bind(srs.id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|_| ())
            .ok_or_else(|| DbError::Invalid(format!("invalid srsName: {srs}")))
    }

    /// Check that the database accepts `wkt` as an EPSG:4326 polygon.
    ///
    /// An error raised by the database while parsing is [`DbError::Invalid`];
    /// connection failures propagate as [`DbError::Postgres`].
    pub async fn valid_poly(&self, wkt: &str) -> Result<(), DbError> {
        let row: Result<(Option<bool>,), sqlx::Error> =
            sqlx::query_as(r"SELECT ST_PolygonFromText($1, 4326) IS NOT NULL")
                .bind(wkt)
                .fetch_one(self.pool)
                .await;

        match row {
            Ok((Some(true),)) => Ok(()),
            Ok(_) => Err(DbError::Invalid(format!("invalid polygon: {wkt}"))),
            Err(sqlx::Error::Database(e)) => {
                tracing::debug!(error = %e, "polygon rejected");
                Err(DbError::Invalid(format!("invalid polygon: {wkt}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, sql: &str, id: &str, what: &str) -> Result<(), DbError> {
        let row: Option<(i32,)> = sqlx::query_as(sql).bind(id).fetch_optional(self.pool).await?;
        row.map(|_| ())
            .ok_or_else(|| DbError::NotFound(format!("{what} not found: {id}")))
    }
}
