//! Remote storage access for driveup.
//!
//! Uploads go to Google Drive. Every run creates a fresh folder and uploads
//! the file into it; there is no lookup of existing folders and no
//! deduplication.

pub mod gdrive;

pub use gdrive::{DriveClient, DriveFile, FOLDER_MIME_TYPE};
