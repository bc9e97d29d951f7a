//! Type and method catalogs.

use fits_types::{Method, MethodCatalog, ObservationType, TypeCatalog};
use sqlx::PgPool;

use crate::error::DbError;

/// Read-only access to `fits.type`, `fits.unit` and `fits.method`.
pub struct CatalogStore<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogStore<'a> {
    /// Create a catalog store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every type with its unit, ordered by identifier.
    pub async fn types(&self) -> Result<TypeCatalog, DbError> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r"SELECT type.typeid, type.name, unit.symbol, type.description
              FROM fits.type JOIN fits.unit USING (unitpk)
              ORDER BY type.typeid ASC",
        )
        .fetch_all(self.pool)
        .await?;

        let types = rows
            .into_iter()
            .map(|(type_id, name, unit, description)| ObservationType {
                type_id,
                name,
                unit,
                description,
            })
            .collect();
        Ok(TypeCatalog { types })
    }

    /// Methods ordered by identifier, optionally only those valid for
    /// `type_id`.
    pub async fn methods(&self, type_id: Option<&str>) -> Result<MethodCatalog, DbError> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r"SELECT m.methodid, m.name, m.description, m.reference
              FROM fits.method m
              WHERE $1::text IS NULL OR m.methodpk IN (
                SELECT tm.methodpk FROM fits.type_method tm
                JOIN fits.type t ON t.typepk = tm.typepk
                WHERE t.typeid = $1)
              ORDER BY m.methodid ASC",
        )
        .bind(type_id)
        .fetch_all(self.pool)
        .await?;

        let methods = rows
            .into_iter()
            .map(|(method_id, name, description, reference)| Method {
                method_id,
                name,
                description,
                reference,
            })
            .collect();
        Ok(MethodCatalog { methods })
    }
}
