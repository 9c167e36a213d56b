//! Media asset model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
    Archive,
    Other,
}

impl MediaType {
    /// Classify an upload by its mime type
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        let (top, sub) = mime.split_once('/').unwrap_or((mime.as_str(), ""));

        match top {
            "image" => MediaType::Image,
            "video" => MediaType::Video,
            "audio" => MediaType::Audio,
            "text" => MediaType::Document,
            "application" => match sub {
                "pdf" | "msword" | "rtf" => MediaType::Document,
                s if s.starts_with("vnd.openxmlformats") || s.starts_with("vnd.ms-") => {
                    MediaType::Document
                }
                "zip" | "gzip" | "x-tar" | "x-7z-compressed" | "x-rar-compressed" => {
                    MediaType::Archive
                }
                _ => MediaType::Other,
            },
            _ => MediaType::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub id: Uuid,
    pub group_id: Uuid,
    pub uploaded_by: Uuid,
    pub filename: String,
    #[serde(skip_serializing, default)]
    pub storage_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub media_type: MediaType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateMediaRequest {
    pub id: Uuid,
    pub group_id: Uuid,
    pub uploaded_by: Uuid,
    pub filename: String,
    pub storage_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_mime() {
        assert_eq!(MediaType::from_mime("image/png"), MediaType::Image);
        assert_eq!(MediaType::from_mime("IMAGE/JPEG"), MediaType::Image);
        assert_eq!(MediaType::from_mime("video/mp4"), MediaType::Video);
        assert_eq!(MediaType::from_mime("audio/mpeg"), MediaType::Audio);
        assert_eq!(MediaType::from_mime("application/pdf"), MediaType::Document);
        assert_eq!(
            MediaType::from_mime("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            MediaType::Document
        );
        assert_eq!(MediaType::from_mime("application/zip"), MediaType::Archive);
        assert_eq!(MediaType::from_mime("application/octet-stream"), MediaType::Other);
        assert_eq!(MediaType::from_mime("garbage"), MediaType::Other);
    }
}
