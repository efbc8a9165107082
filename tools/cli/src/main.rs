//! driveup CLI - upload a file to a new Google Drive folder.
//!
//! The first run walks the operator through OAuth2 authorization and caches
//! the credential; later runs reuse it.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use driveup_auth::{AuthSettings, ClientConfig, DRIVE_FILE_SCOPE};
use driveup_storage::DriveClient;

#[derive(Parser)]
#[command(name = "driveup")]
#[command(about = "driveup - Upload a file to Google Drive")]
#[command(version)]
struct Cli {
    /// File to upload.
    file: PathBuf,

    /// Google client secret file.
    #[arg(short, long, default_value = "client_secret.json")]
    client_secret: PathBuf,

    /// Name of the folder created for the upload.
    #[arg(short, long, default_value = "testFolder")]
    folder: String,

    /// Directory holding the cached credential.
    #[arg(long, default_value = "googleDriveToken")]
    cache_dir: String,

    /// Cached credential file name.
    #[arg(long, default_value = "drive-go-quickstart.json")]
    cache_file: String,

    /// State value embedded in the authorization URL.
    #[arg(long, default_value = "state-token")]
    state_token: String,

    /// Open the authorization URL in the default browser.
    #[arg(long)]
    open_browser: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = AuthSettings {
        cache_dir: cli.cache_dir,
        cache_file: cli.cache_file,
        state_token: cli.state_token,
        open_browser: cli.open_browser,
    };

    let config = load_client_config(&cli.client_secret)?;
    let client = driveup_auth::authorize(&config, &settings)
        .await
        .context("Unable to authorize with Google Drive")?;

    cmd_upload(DriveClient::new(Arc::new(client)), &cli.file, &cli.folder).await
}

/// Read the client secret file.
fn load_client_config(path: &Path) -> Result<ClientConfig> {
    let data = std::fs::read(path)
        .with_context(|| format!("Unable to read client secret file {}", path.display()))?;

    ClientConfig::from_google_json(&data, vec![DRIVE_FILE_SCOPE.to_string()])
        .context("Unable to parse client secret file to config")
}

/// Create the folder and upload the file into it.
async fn cmd_upload(drive: DriveClient, file: &Path, folder: &str) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("error opening {}: not a readable file", file.display());
    }

    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", file.display()))?;

    let created = drive
        .create_folder(folder, None)
        .await
        .context("Unable to create folder")?;
    info!("Created folder {} ({})", created.name, created.id);

    let uploaded = drive
        .upload_file(&name, &created.id, file)
        .await
        .context("Unable to create file")?;

    println!("Uploaded file:");
    println!("  ID: {}", uploaded.id);
    println!("  Name: {}", uploaded.name);
    println!("  MIME type: {}", uploaded.mime_type);
    if let Some(size) = uploaded.size_bytes() {
        println!("  Size: {} bytes", size);
    }
    println!("  Parents: {}", uploaded.parents.join(", "));

    info!("done");
    Ok(())
}
