//! Google Drive backend for driveup.
//!
//! Folder creation and single-request multipart uploads over the Drive v3
//! REST API, authorized through a [`driveup_auth::AuthorizedClient`].

pub mod client;

pub use client::{DriveClient, DriveFile, FOLDER_MIME_TYPE};
