use std::{fs, io::Write, path::Path};

use log::info;

use crate::{
    db::backups::{PackageKey, PackageStore},
    download::{save_package, BackupSource},
    error::FetchError,
};

/// Look up the package for `key` and download all its backups into
/// `out_dir`.  Returns the URLs of the downloaded files, in package order.
pub fn retrieve_package(
    store: &dyn PackageStore,
    source: &dyn BackupSource,
    key: &PackageKey,
    out_dir: &Path,
) -> Result<Vec<String>, FetchError> {
    fs::create_dir_all(out_dir).map_err(|source| FetchError::OutputDir {
        path: out_dir.to_path_buf(),
        source,
    })?;
    let backups = store.find_backups(key)?;
    info!(
        "Saving {} backups of {} into {}",
        backups.len(),
        key,
        out_dir.display()
    );
    save_package(source, &backups, out_dir)
}

/// Write one URL per line.
pub fn report<W: Write>(out: &mut W, urls: &[String]) -> std::io::Result<()> {
    for url in urls {
        writeln!(out, "{}", url)?;
    }
    Ok(())
}
