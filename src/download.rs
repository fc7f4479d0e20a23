use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use log::{info, warn};
use reqwest::blocking::Client;

use crate::{
    db::backups::Backup,
    error::{DownloadError, FetchError},
};

/// Somewhere a backup file can be fetched from.
pub trait BackupSource {
    /// Write the content of `backup` to `file_path`.
    fn fetch(&self, backup: &Backup, file_path: &Path) -> Result<(), DownloadError>;
}

/// Plain HTTP GET of the backup URL.
///
/// With `strict_status` off, the body is written whatever the response status
/// is, a non-success status only shows up as a warning.
pub struct HttpSource {
    client: Client,
    strict_status: bool,
}

/// Blocking client shared by every file download.  Downloads may be large, so
/// there is no total timeout.
pub(crate) fn download_client() -> Result<Client, DownloadError> {
    Ok(Client::builder().timeout(None::<Duration>).build()?)
}

impl HttpSource {
    pub fn new(strict_status: bool) -> Result<HttpSource, DownloadError> {
        Ok(HttpSource {
            client: download_client()?,
            strict_status,
        })
    }
}

impl BackupSource for HttpSource {
    fn fetch(&self, backup: &Backup, file_path: &Path) -> Result<(), DownloadError> {
        let response = self.client.get(&backup.url).send()?;
        let status = response.status();
        if !status.is_success() {
            if self.strict_status {
                return Err(DownloadError::Status(status));
            }
            warn!("{} responded with {}, saving the body anyway", backup.url, status);
        }
        write_body(response, file_path)
    }
}

/// Stream a response body into a newly created file, creating the parent
/// directories first.
pub(crate) fn write_body(
    mut response: reqwest::blocking::Response,
    file_path: &Path,
) -> Result<(), DownloadError> {
    let write_err = |source| DownloadError::Write {
        path: file_path.to_path_buf(),
        source,
    };
    if let Some(dir) = file_path.parent() {
        fs::create_dir_all(dir).map_err(write_err)?;
    }
    let mut out = File::create(file_path).map_err(write_err)?;
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(DownloadError::Body)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).map_err(write_err)?;
    }
    out.flush().map_err(write_err)
}

/// Local path of `backup` inside `out_dir`.
pub fn backup_path(out_dir: &Path, backup: &Backup) -> Result<PathBuf, DownloadError> {
    backup
        .file_name()
        .map(|name| out_dir.join(name))
        .ok_or(DownloadError::NoFileName)
}

/// Download every backup, in order, into `out_dir`.  Returns the source URLs
/// of the downloaded files.  Stops at the first failure; files already
/// written are left in place.
pub fn save_package(
    source: &dyn BackupSource,
    backups: &[Backup],
    out_dir: &Path,
) -> Result<Vec<String>, FetchError> {
    let mut files = Vec::with_capacity(backups.len());
    for backup in backups {
        let to_fetch_error = |source| FetchError::Download {
            url: backup.url.clone(),
            source,
        };
        let path = backup_path(out_dir, backup).map_err(to_fetch_error)?;
        source.fetch(backup, &path).map_err(to_fetch_error)?;
        info!("Downloaded {} to {}", backup.url, path.display());
        files.push(backup.url.clone());
    }
    Ok(files)
}
