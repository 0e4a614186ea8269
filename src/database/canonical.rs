// ABOUTME: Canonical nutrient store operations with exact and trigram-similarity lookup
// ABOUTME: Enforces name uniqueness; concurrent duplicate inserts resolve to the stored row

use anyhow::{anyhow, Result};
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::models::{Canonical, CanonicalSource};
use crate::nutrients::similarity::trigram_similarity;

impl Database {
    /// Create the food_canonicals table with its unique name index
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_canonicals(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS food_canonicals (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT 'custom' CHECK (source IN ('USDA', 'OFF', 'custom')),
                kcal_per_100g REAL NOT NULL DEFAULT 0,
                protein_per_100g REAL NOT NULL DEFAULT 0,
                fat_per_100g REAL NOT NULL DEFAULT 0,
                carbs_per_100g REAL NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(self.pool())
        .await?;

        // Uniqueness bounds the duplicate-placeholder race between
        // concurrent resolver calls for the same novel label
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_food_canonicals_name ON food_canonicals(name)",
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Exact-name lookup
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn find_canonical_by_name(&self, name: &str) -> Result<Option<Canonical>> {
        let row = sqlx::query(
            r"
            SELECT id, name, source, kcal_per_100g, protein_per_100g,
                   fat_per_100g, carbs_per_100g
            FROM food_canonicals WHERE name = $1
            ",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await?;

        row.map(|r| Self::row_to_canonical(&r)).transpose()
    }

    /// Get a canonical by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_canonical(&self, canonical_id: Uuid) -> Result<Option<Canonical>> {
        let row = sqlx::query(
            r"
            SELECT id, name, source, kcal_per_100g, protein_per_100g,
                   fat_per_100g, carbs_per_100g
            FROM food_canonicals WHERE id = $1
            ",
        )
        .bind(canonical_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.map(|r| Self::row_to_canonical(&r)).transpose()
    }

    /// Trigram-similarity lookup: candidates scoring above `threshold`,
    /// ordered by descending score, at most `limit` rows, scores populated.
    ///
    /// SQLite has no trigram operator, so candidates are scored in process
    /// against the full name list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn similar_canonicals(
        &self,
        name: &str,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<Canonical>> {
        let rows = sqlx::query(
            r"
            SELECT id, name, source, kcal_per_100g, protein_per_100g,
                   fat_per_100g, carbs_per_100g
            FROM food_canonicals
            ",
        )
        .fetch_all(self.pool())
        .await?;

        let mut scored = Vec::new();
        for row in &rows {
            let mut canonical = Self::row_to_canonical(row)?;
            let score = trigram_similarity(name, &canonical.name);
            if score > threshold {
                canonical.score = Some(score);
                scored.push((score, canonical));
            }
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(limit);

        Ok(scored.into_iter().map(|(_, c)| c).collect())
    }

    /// Insert a canonical, treating a name conflict as "someone else stored
    /// it first": the row actually present under that name is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert or the follow-up lookup fails
    pub async fn insert_canonical(&self, canonical: &Canonical) -> Result<Canonical> {
        sqlx::query(
            r"
            INSERT INTO food_canonicals (
                id, name, source, kcal_per_100g, protein_per_100g,
                fat_per_100g, carbs_per_100g
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT(name) DO NOTHING
            ",
        )
        .bind(canonical.id.to_string())
        .bind(&canonical.name)
        .bind(canonical.source.as_str())
        .bind(canonical.kcal_per_100g)
        .bind(canonical.protein_per_100g)
        .bind(canonical.fat_per_100g)
        .bind(canonical.carbs_per_100g)
        .execute(self.pool())
        .await?;

        self.find_canonical_by_name(&canonical.name)
            .await?
            .ok_or_else(|| anyhow!("Canonical row missing after insert: {}", canonical.name))
    }

    /// Convert a database row to a `Canonical` (score unset)
    fn row_to_canonical(row: &sqlx::sqlite::SqliteRow) -> Result<Canonical> {
        let id: String = row.get("id");
        let source: String = row.get("source");

        Ok(Canonical {
            id: Uuid::parse_str(&id)?,
            name: row.get("name"),
            source: CanonicalSource::from_str_or_custom(&source),
            kcal_per_100g: row.get("kcal_per_100g"),
            protein_per_100g: row.get("protein_per_100g"),
            fat_per_100g: row.get("fat_per_100g"),
            carbs_per_100g: row.get("carbs_per_100g"),
            score: None,
        })
    }
}
