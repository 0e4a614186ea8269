// ABOUTME: Media asset metadata operations
// ABOUTME: Owner-scoped lookups backing image loads for analysis

use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::models::MediaAssetRecord;

impl Database {
    /// Create the media_assets table
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_assets(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS media_assets (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                storage_key TEXT NOT NULL,
                mime TEXT NOT NULL,
                size INTEGER,
                width INTEGER,
                height INTEGER,
                sha256 TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_media_assets_owner ON media_assets(owner_id)")
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Record an uploaded asset's metadata
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn create_asset(&self, asset: &MediaAssetRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO media_assets (
                id, owner_id, storage_key, mime, size, width, height, sha256, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(asset.id.to_string())
        .bind(asset.owner_id.to_string())
        .bind(&asset.storage_key)
        .bind(&asset.mime)
        .bind(asset.size)
        .bind(asset.width)
        .bind(asset.height)
        .bind(&asset.sha256)
        .bind(asset.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Get an asset by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_asset(&self, asset_id: Uuid) -> Result<Option<MediaAssetRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, owner_id, storage_key, mime, size, width, height, sha256, created_at
            FROM media_assets WHERE id = $1
            ",
        )
        .bind(asset_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.map(|r| Self::row_to_asset(&r)).transpose()
    }

    /// Get an asset by ID, scoped to its owner
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn find_asset_for_owner(
        &self,
        asset_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<MediaAssetRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, owner_id, storage_key, mime, size, width, height, sha256, created_at
            FROM media_assets WHERE id = $1 AND owner_id = $2
            ",
        )
        .bind(asset_id.to_string())
        .bind(owner_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.map(|r| Self::row_to_asset(&r)).transpose()
    }

    /// Convert a database row to a `MediaAssetRecord`
    fn row_to_asset(row: &sqlx::sqlite::SqliteRow) -> Result<MediaAssetRecord> {
        let id: String = row.get("id");
        let owner_id: String = row.get("owner_id");

        Ok(MediaAssetRecord {
            id: Uuid::parse_str(&id)?,
            owner_id: Uuid::parse_str(&owner_id)?,
            storage_key: row.get("storage_key"),
            mime: row.get("mime"),
            size: row.get("size"),
            width: row.get("width"),
            height: row.get("height"),
            sha256: row.get("sha256"),
            created_at: row.get("created_at"),
        })
    }
}
