//! Media asset repository

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;

use crate::models::media::{CreateMediaRequest, MediaAsset, MediaType};
use crate::utils::errors::RivayaError;

#[derive(Clone, Debug)]
pub struct MediaRepository {
    pool: PgPool,
}

impl MediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: CreateMediaRequest) -> Result<MediaAsset, RivayaError> {
        let media_type = MediaType::from_mime(&request.mime_type);
        let asset = sqlx::query_as::<_, MediaAsset>(
            r#"
            INSERT INTO media_assets (id, group_id, uploaded_by, filename, storage_path, mime_type, size_bytes, media_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, group_id, uploaded_by, filename, storage_path, mime_type, size_bytes, media_type, created_at
            "#
        )
        .bind(request.id)
        .bind(request.group_id)
        .bind(request.uploaded_by)
        .bind(request.filename)
        .bind(request.storage_path)
        .bind(request.mime_type)
        .bind(request.size_bytes)
        .bind(media_type)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(asset)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<MediaAsset>, RivayaError> {
        let asset = sqlx::query_as::<_, MediaAsset>(
            "SELECT id, group_id, uploaded_by, filename, storage_path, mime_type, size_bytes, media_type, created_at FROM media_assets WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(asset)
    }

    /// Media of a group, newest first
    pub async fn list_for_group(&self, group_id: Uuid, limit: i64, offset: i64) -> Result<(Vec<MediaAsset>, i64), RivayaError> {
        let assets = sqlx::query_as::<_, MediaAsset>(
            r#"
            SELECT id, group_id, uploaded_by, filename, storage_path, mime_type, size_bytes, media_type, created_at
            FROM media_assets
            WHERE group_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(group_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media_assets WHERE group_id = $1")
            .bind(group_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((assets, total.0))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), RivayaError> {
        sqlx::query("DELETE FROM media_assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
