use std::{fmt, path::Path, time::Duration};

use log::info;
use mongodb::{
    bson::doc,
    options::ClientOptions,
    sync::{Client, Collection},
};
use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FetchError;

/// Bounded wait for server selection and the initial connection.
const MONGO_CONN_TIMEOUT: Duration = Duration::from_secs(60);

/// Documents written by other tools store `null` for empty fields.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One file belonging to a backup package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hash: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: i64,
}

/// A single path component that stays inside the directory it is joined to.
fn usable_name(name: &str) -> Option<String> {
    match Path::new(name).file_name().and_then(|s| s.to_str()) {
        Some(s) if !s.is_empty() && s != "." && s != ".." => Some(s.to_string()),
        _ => None,
    }
}

impl Backup {
    /// Name of the local file, i.e. the last segment of the URL path.  Falls
    /// back to the last component of the content hash when the URL has no
    /// usable last segment.  `None` when neither gives a plain file name.
    pub fn file_name(&self) -> Option<String> {
        let segment = match Url::parse(&self.url) {
            Ok(url) => url
                .path_segments()
                .and_then(|mut xs| xs.next_back())
                .map(|s| s.to_string()),
            Err(_) => self.url.rsplit('/').next().map(|s| s.to_string()),
        };
        segment
            .as_deref()
            .and_then(usable_name)
            .or_else(|| usable_name(&self.hash))
    }
}

/// The only part of a package document this crate cares about.
#[derive(Debug, Default, Deserialize)]
pub struct PackageRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub backups: Vec<Backup>,
}

/// Composite key of a package: agency id, month and year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageKey {
    pub aid: String,
    pub month: u32,
    pub year: i32,
}

impl PackageKey {
    pub fn new(aid: &str, month: u32, year: i32) -> PackageKey {
        PackageKey {
            aid: aid.to_lowercase(),
            month,
            year,
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "agency id \"{}\" ({:02}/{})",
            self.aid, self.month, self.year
        )
    }
}

/// Read access to stored backup packages.
pub trait PackageStore {
    /// Return the backup descriptors of the package identified by `key`, in
    /// stored order.  Fails with [`FetchError::NotFound`] when no package matches.
    fn find_backups(&self, key: &PackageKey) -> Result<Vec<Backup>, FetchError>;
}

/// Package store backed by a MongoDB collection.
pub struct MongoPackageStore {
    collection: Collection<PackageRecord>,
}

impl MongoPackageStore {
    /// Connect to the server at `uri` and check it answers a ping within the
    /// connection timeout.
    pub fn connect(uri: &str, db_name: &str, coll_name: &str) -> Result<Self, FetchError> {
        let mut options = ClientOptions::parse(uri)
            .run()
            .map_err(FetchError::Connection)?;
        options.server_selection_timeout = Some(MONGO_CONN_TIMEOUT);
        options.connect_timeout = Some(MONGO_CONN_TIMEOUT);
        let client = Client::with_options(options).map_err(FetchError::Connection)?;
        client
            .database("admin")
            .run_command(doc! {"ping": 1})
            .run()
            .map_err(FetchError::Connection)?;
        info!("Connected to mongo, using {}.{}", db_name, coll_name);
        Ok(MongoPackageStore {
            collection: client.database(db_name).collection(coll_name),
        })
    }
}

impl PackageStore for MongoPackageStore {
    fn find_backups(&self, key: &PackageKey) -> Result<Vec<Backup>, FetchError> {
        let item = self
            .collection
            .find_one(doc! {
                "aid": key.aid.as_str(),
                "year": key.year,
                "month": (key.month as i32),
            })
            .projection(doc! {"backups": 1, "_id": 0})
            .run()
            .map_err(|source| FetchError::Lookup {
                key: key.clone(),
                source,
            })?;
        match item {
            Some(record) => {
                info!("Found {} backups for {}", record.backups.len(), key);
                Ok(record.backups)
            }
            None => Err(FetchError::NotFound(key.clone())),
        }
    }
}
