//! Google Drive API client.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{stream, Stream, StreamExt, TryStreamExt};
use reqwest::{header, Body, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::info;

use driveup_auth::AuthorizedClient;
use driveup_common::{Error, Result};

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Boundary separating the metadata and media parts of an upload.
const MULTIPART_BOUNDARY: &str = "driveup_multipart_boundary";

/// Fields requested for every file resource.
const FILE_FIELDS: &str = "id,name,mimeType,size,createdTime,modifiedTime,parents,md5Checksum";

/// Google Drive file metadata from API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: String,
    /// File size in bytes (only for files, not folders).
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<String>,
    /// MD5 checksum (only for files).
    #[serde(default)]
    pub md5_checksum: Option<String>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Get size as u64.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Google Drive API client.
pub struct DriveClient {
    auth: Arc<AuthorizedClient>,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Create a new Drive client.
    pub fn new(auth: Arc<AuthorizedClient>) -> Self {
        Self::with_base_urls(auth, DRIVE_API_BASE, DRIVE_UPLOAD_BASE)
    }

    /// Create a client against other API hosts.
    pub fn with_base_urls(
        auth: Arc<AuthorizedClient>,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            api_base: api_base.into(),
            upload_base: upload_base.into(),
        }
    }

    /// Create a folder.
    ///
    /// A new folder is created on every call, even if one with the same name
    /// already exists.
    pub async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<DriveFile> {
        let url = format!("{}/files", self.api_base);
        let auth = self.auth.authorization_header().await?;

        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE
        });

        if let Some(parent) = parent_id {
            metadata["parents"] = serde_json::json!([parent]);
        }

        info!("Creating folder {}", name);

        let response = self
            .auth
            .http()
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to create folder: {}", e)))?;

        self.handle_response(response).await
    }

    /// Upload a local file into a folder.
    ///
    /// The content is streamed from disk in a single multipart request.
    pub async fn upload_file(
        &self,
        name: &str,
        parent_id: &str,
        source: impl AsRef<Path>,
    ) -> Result<DriveFile> {
        let file = tokio::fs::File::open(source.as_ref()).await?;
        let content = ReaderStream::new(file).map_err(Error::from);

        self.upload_stream(name, parent_id, content).await
    }

    /// Upload streamed content into a folder.
    pub async fn upload_stream<S>(&self, name: &str, parent_id: &str, content: S) -> Result<DriveFile>
    where
        S: Stream<Item = Result<Bytes>> + Send + Sync + 'static,
    {
        let url = format!("{}/files", self.upload_base);
        let auth = self.auth.authorization_header().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id]
        });

        info!("Uploading {} into folder {}", name, parent_id);

        let body = multipart_related(&metadata, content)?;

        let response = self
            .auth
            .http()
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .body(Body::wrap_stream(body))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to upload file: {}", e)))?;

        self.handle_response(response).await
    }

    /// Handle API response with error checking.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Transport(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound("Resource not found".to_string()))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(Error::Authentication(
                "Invalid or expired token".to_string(),
            ))
        } else if status == StatusCode::FORBIDDEN {
            Err(Error::PermissionDenied("Access denied".to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Transport(format!("API error: {} - {}", status, body)))
        }
    }
}

/// Frame `metadata` and `content` as a `multipart/related` body.
fn multipart_related<S>(
    metadata: &serde_json::Value,
    content: S,
) -> Result<impl Stream<Item = Result<Bytes>> + Send + Sync + 'static>
where
    S: Stream<Item = Result<Bytes>> + Send + Sync + 'static,
{
    let metadata_json = serde_json::to_string(metadata)
        .map_err(|e| Error::Serialization(format!("Failed to serialize metadata: {}", e)))?;

    let head = format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: application/octet-stream\r\n\r\n",
        b = MULTIPART_BOUNDARY,
        m = metadata_json
    );
    let tail = format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY);

    Ok(stream::once(async move { Ok(Bytes::from(head)) })
        .chain(content)
        .chain(stream::once(async move { Ok(Bytes::from(tail)) })))
}
