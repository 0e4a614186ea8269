// ABOUTME: Meal and meal-item database operations
// ABOUTME: Handles lifecycle transitions, computed item storage and the why_json audit trail

use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::models::{
    FailureEntry, MealItemRecord, MealRecord, MealStatus, MealSummary, NewMealItem,
};

impl Database {
    /// Create meals and meal_items tables
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_meals(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS meals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                asset_id TEXT,
                status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'processing', 'ready', 'failed')),
                kcal_mean INTEGER,
                kcal_min INTEGER,
                kcal_max INTEGER,
                confidence REAL,
                method_badge TEXT,
                why_json TEXT NOT NULL DEFAULT '[]',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS meal_items (
                id TEXT PRIMARY KEY,
                meal_id TEXT NOT NULL REFERENCES meals(id) ON DELETE CASCADE,
                label TEXT NOT NULL,
                grams_min REAL,
                grams_max REAL,
                grams_mean REAL,
                kcal INTEGER,
                protein REAL,
                fat REAL,
                carbs REAL,
                canonical_id TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_meals_user ON meals(user_id)")
            .execute(self.pool())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_meals_status ON meals(status)")
            .execute(self.pool())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_meal_items_meal ON meal_items(meal_id)")
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Create a pending meal for a user, optionally linked to a photo asset
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn create_meal(&self, user_id: Uuid, asset_id: Option<Uuid>) -> Result<MealRecord> {
        let id = Uuid::new_v4();
        sqlx::query(
            r"
            INSERT INTO meals (id, user_id, asset_id, status, why_json)
            VALUES ($1, $2, $3, 'pending', '[]')
            ",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(asset_id.map(|a| a.to_string()))
        .execute(self.pool())
        .await?;

        self.get_meal(id)
            .await?
            .ok_or_else(|| anyhow!("Meal row missing after insert: {id}"))
    }

    /// Get a meal by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_meal(&self, meal_id: Uuid) -> Result<Option<MealRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, asset_id, status, kcal_mean, kcal_min, kcal_max,
                   confidence, method_badge, why_json, created_at, updated_at
            FROM meals WHERE id = $1
            ",
        )
        .bind(meal_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.map(|r| Self::row_to_meal(&r)).transpose()
    }

    /// Get a meal by ID, scoped to its owner
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_meal_for_user(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MealRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, asset_id, status, kcal_mean, kcal_min, kcal_max,
                   confidence, method_badge, why_json, created_at, updated_at
            FROM meals WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(meal_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.map(|r| Self::row_to_meal(&r)).transpose()
    }

    /// Get a meal together with its computed items, scoped to its owner
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails
    pub async fn get_meal_with_items(
        &self,
        meal_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<(MealRecord, Vec<MealItemRecord>)>> {
        let Some(meal) = self.get_meal_for_user(meal_id, user_id).await? else {
            return Ok(None);
        };
        let items = self.get_meal_items(meal_id).await?;
        Ok(Some((meal, items)))
    }

    /// List the computed items of a meal, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_meal_items(&self, meal_id: Uuid) -> Result<Vec<MealItemRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, meal_id, label, grams_min, grams_max, grams_mean,
                   kcal, protein, fat, carbs, canonical_id, created_at
            FROM meal_items WHERE meal_id = $1 ORDER BY created_at, id
            ",
        )
        .bind(meal_id.to_string())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::row_to_meal_item).collect()
    }

    /// Get one meal item, scoped to its meal
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_meal_item(
        &self,
        item_id: Uuid,
        meal_id: Uuid,
    ) -> Result<Option<MealItemRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, meal_id, label, grams_min, grams_max, grams_mean,
                   kcal, protein, fat, carbs, canonical_id, created_at
            FROM meal_items WHERE id = $1 AND meal_id = $2
            ",
        )
        .bind(item_id.to_string())
        .bind(meal_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.map(|r| Self::row_to_meal_item(&r)).transpose()
    }

    /// Batch-insert computed meal items inside one transaction
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; no items are stored in that case
    pub async fn create_meal_items(
        &self,
        meal_id: Uuid,
        items: &[NewMealItem],
    ) -> Result<Vec<Uuid>> {
        let mut tx = self.pool().begin().await?;
        let mut ids = Vec::with_capacity(items.len());

        for item in items {
            let id = Uuid::new_v4();
            sqlx::query(
                r"
                INSERT INTO meal_items (
                    id, meal_id, label, grams_min, grams_max, grams_mean,
                    kcal, protein, fat, carbs, canonical_id
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ",
            )
            .bind(id.to_string())
            .bind(meal_id.to_string())
            .bind(&item.label)
            .bind(item.grams_min)
            .bind(item.grams_max)
            .bind(item.grams_mean)
            .bind(item.kcal)
            .bind(item.protein)
            .bind(item.fat)
            .bind(item.carbs)
            .bind(item.canonical_id.map(|c| c.to_string()))
            .execute(&mut *tx)
            .await?;
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    /// Mark a meal as being analyzed
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn set_meal_processing(&self, meal_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE meals SET status = 'processing', updated_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(meal_id.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Terminalize a meal as ready with its summary and audit trail
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn update_meal_ready(
        &self,
        meal_id: Uuid,
        summary: &MealSummary,
        why_json: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE meals SET
                status = 'ready',
                kcal_mean = $2,
                kcal_min = $3,
                kcal_max = $4,
                confidence = $5,
                method_badge = $6,
                why_json = $7,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            ",
        )
        .bind(meal_id.to_string())
        .bind(summary.kcal_mean)
        .bind(summary.kcal_min)
        .bind(summary.kcal_max)
        .bind(summary.confidence)
        .bind(summary.method_badge.as_str())
        .bind(why_json.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Terminalize a meal as failed, replacing the audit trail with a
    /// single `{error, timestamp}` entry
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the update fails
    pub async fn update_meal_failed(&self, meal_id: Uuid, error: &str) -> Result<()> {
        let why = serde_json::to_value(vec![FailureEntry {
            error: error.to_owned(),
            timestamp: Utc::now(),
        }])?;

        sqlx::query(
            r"
            UPDATE meals SET
                status = 'failed',
                why_json = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            ",
        )
        .bind(meal_id.to_string())
        .bind(why.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Rewrite a meal's summary fields and audit trail without touching its
    /// status. Used by manual portion adjustments on ready meals.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn update_meal_summary(
        &self,
        meal_id: Uuid,
        summary: &MealSummary,
        why_json: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE meals SET
                kcal_mean = $2,
                kcal_min = $3,
                kcal_max = $4,
                confidence = $5,
                method_badge = $6,
                why_json = $7,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            ",
        )
        .bind(meal_id.to_string())
        .bind(summary.kcal_mean)
        .bind(summary.kcal_min)
        .bind(summary.kcal_max)
        .bind(summary.confidence)
        .bind(summary.method_badge.as_str())
        .bind(why_json.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Rewrite one item's portion and computed nutrition after an adjustment
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn update_meal_item(&self, item: &MealItemRecord) -> Result<()> {
        sqlx::query(
            r"
            UPDATE meal_items SET
                grams_min = $2,
                grams_max = $3,
                grams_mean = $4,
                kcal = $5,
                protein = $6,
                fat = $7,
                carbs = $8
            WHERE id = $1
            ",
        )
        .bind(item.id.to_string())
        .bind(item.grams_min)
        .bind(item.grams_max)
        .bind(item.grams_mean)
        .bind(item.kcal)
        .bind(item.protein)
        .bind(item.fat)
        .bind(item.carbs)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Convert a database row to a `MealRecord`
    fn row_to_meal(row: &sqlx::sqlite::SqliteRow) -> Result<MealRecord> {
        let id: String = row.get("id");
        let user_id: String = row.get("user_id");
        let asset_id: Option<String> = row.get("asset_id");
        let status: String = row.get("status");
        let why_json: String = row.get("why_json");

        Ok(MealRecord {
            id: Uuid::parse_str(&id)?,
            user_id: Uuid::parse_str(&user_id)?,
            asset_id: asset_id.as_deref().map(Uuid::parse_str).transpose()?,
            status: MealStatus::from_str_or_pending(&status),
            kcal_mean: row.get("kcal_mean"),
            kcal_min: row.get("kcal_min"),
            kcal_max: row.get("kcal_max"),
            confidence: row.get("confidence"),
            method_badge: row.get("method_badge"),
            why_json: serde_json::from_str(&why_json)
                .unwrap_or_else(|_| serde_json::Value::Array(Vec::new())),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Convert a database row to a `MealItemRecord`
    fn row_to_meal_item(row: &sqlx::sqlite::SqliteRow) -> Result<MealItemRecord> {
        let id: String = row.get("id");
        let meal_id: String = row.get("meal_id");
        let canonical_id: Option<String> = row.get("canonical_id");

        Ok(MealItemRecord {
            id: Uuid::parse_str(&id)?,
            meal_id: Uuid::parse_str(&meal_id)?,
            label: row.get("label"),
            grams_min: row.get("grams_min"),
            grams_max: row.get("grams_max"),
            grams_mean: row.get("grams_mean"),
            kcal: row.get("kcal"),
            protein: row.get("protein"),
            fat: row.get("fat"),
            carbs: row.get("carbs"),
            canonical_id: canonical_id.as_deref().map(Uuid::parse_str).transpose()?,
            created_at: row.get("created_at"),
        })
    }
}
