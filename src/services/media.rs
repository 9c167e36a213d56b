//! Media uploads: validation, on-disk storage and bookkeeping

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::database::DatabaseService;
use crate::models::*;
use crate::utils::errors::{Result, RivayaError};
use crate::utils::helpers;
use crate::utils::logging::log_group_event;

/// Files laid out as `{root}/{group_id}/{asset_id}-{filename}`
#[derive(Clone, Debug)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, group_id: Uuid, asset_id: Uuid, filename: &str) -> PathBuf {
        self.root
            .join(group_id.to_string())
            .join(format!("{}-{}", asset_id, helpers::sanitize_filename(filename)))
    }

    pub async fn save(&self, group_id: Uuid, asset_id: Uuid, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(group_id, asset_id, filename);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Remove a stored file; a file that is already gone is not an error
    pub async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Check an upload against the allowed types and size limit
pub fn validate_upload(config: &UploadConfig, mime_type: &str, size: u64) -> Result<()> {
    if size == 0 {
        return Err(RivayaError::Validation("File is empty".to_string()));
    }
    if size > config.max_file_size {
        return Err(RivayaError::PayloadTooLarge(format!(
            "File exceeds the {} byte limit",
            config.max_file_size
        )));
    }
    let mime_type = mime_type.to_ascii_lowercase();
    if !config.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(&mime_type)) {
        return Err(RivayaError::Validation(format!(
            "File type {} is not allowed",
            mime_type
        )));
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct MediaService {
    db: DatabaseService,
    storage: MediaStorage,
    config: UploadConfig,
    enabled: bool,
}

impl MediaService {
    pub fn new(db: DatabaseService, config: UploadConfig, enabled: bool) -> Self {
        Self {
            db,
            storage: MediaStorage::new(&config.path),
            config,
            enabled,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    pub async fn upload(
        &self,
        group_id: Uuid,
        actor: Uuid,
        filename: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<MediaAsset> {
        if !self.enabled {
            return Err(RivayaError::FeatureDisabled("File uploads are disabled".to_string()));
        }
        self.db.require_member(group_id, actor).await?;
        validate_upload(&self.config, mime_type, bytes.len() as u64)?;

        let asset_id = Uuid::new_v4();
        let path = self.storage.save(group_id, asset_id, filename, bytes).await?;

        let created = self
            .db
            .media
            .create(CreateMediaRequest {
                id: asset_id,
                group_id,
                uploaded_by: actor,
                filename: helpers::sanitize_filename(filename),
                storage_path: path.to_string_lossy().into_owned(),
                mime_type: mime_type.to_ascii_lowercase(),
                size_bytes: bytes.len() as i64,
            })
            .await;

        match created {
            Ok(asset) => {
                log_group_event(group_id, "media_uploaded", Some(actor), Some(&asset.filename));
                Ok(asset)
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.remove(&path).await {
                    warn!(path = %path.display(), error = %cleanup, "Failed to remove orphaned upload");
                }
                Err(e)
            }
        }
    }

    pub async fn list(&self, group_id: Uuid, actor: Uuid, params: PaginationParams) -> Result<Paginated<MediaAsset>> {
        self.db.require_member(group_id, actor).await?;
        let (assets, total) = self
            .db
            .media
            .list_for_group(group_id, params.limit() as i64, params.offset())
            .await?;

        Ok(Paginated::new(assets, &params, total))
    }

    /// Delete an asset; allowed for the uploader and group admins
    pub async fn delete(&self, media_id: Uuid, actor: Uuid) -> Result<()> {
        let asset = self
            .db
            .media
            .find_by_id(media_id)
            .await?
            .ok_or_else(|| RivayaError::not_found("Media", media_id))?;
        let (_, member) = self.db.require_member(asset.group_id, actor).await?;

        if asset.uploaded_by != actor && !member.role.allows(GroupPermission::ManageGroup) {
            return Err(RivayaError::PermissionDenied(
                "Only the uploader or a group admin may delete this file".to_string(),
            ));
        }

        self.db.media.delete(asset.id).await?;
        self.storage.remove(Path::new(&asset.storage_path)).await?;
        info!(media_id = %asset.id, group_id = %asset.group_id, "Media deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> UploadConfig {
        UploadConfig {
            path: "./uploads".to_string(),
            max_file_size: 1024,
            allowed_types: vec!["image/png".to_string(), "image/jpeg".to_string()],
        }
    }

    #[test]
    fn test_upload_validation() {
        assert!(validate_upload(&config(), "image/png", 10).is_ok());
        assert!(validate_upload(&config(), "IMAGE/PNG", 10).is_ok());
        assert!(matches!(
            validate_upload(&config(), "image/png", 2048),
            Err(RivayaError::PayloadTooLarge(_))
        ));
        assert!(matches!(
            validate_upload(&config(), "application/x-msdownload", 10),
            Err(RivayaError::Validation(_))
        ));
        assert!(validate_upload(&config(), "image/png", 0).is_err());
    }

    #[tokio::test]
    async fn test_storage_layout_and_removal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path());
        let group_id = Uuid::new_v4();
        let asset_id = Uuid::new_v4();

        let path = storage
            .save(group_id, asset_id, "../../etc/pass wd.png", b"png-bytes")
            .await
            .unwrap();

        assert!(path.starts_with(dir.path().join(group_id.to_string())));
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("{}-pass_wd.png", asset_id)
        );
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"png-bytes");

        storage.remove(&path).await.unwrap();
        assert!(!path.exists());
        storage.remove(&path).await.unwrap();
    }
}
