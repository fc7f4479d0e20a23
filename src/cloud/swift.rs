use std::{cell::RefCell, path::Path};

use log::{info, warn};
use reqwest::{blocking::Client, Url};
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::CloudConfig,
    db::backups::Backup,
    download::{download_client, write_body, BackupSource, HttpSource},
    error::DownloadError,
};

/// Token and storage endpoint returned by the auth service.
#[derive(Debug, Clone, PartialEq)]
struct Session {
    storage_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Token,
}

#[derive(Debug, Deserialize)]
struct Token {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    interface: String,
    url: String,
}

/// Minimal OpenStack Swift client, enough to download objects from one
/// container.  Authenticates on first use and keeps the token for the rest of
/// the run.
pub struct SwiftClient {
    client: Client,
    config: CloudConfig,
    session: RefCell<Option<Session>>,
}

impl SwiftClient {
    pub fn new(config: CloudConfig) -> Result<SwiftClient, DownloadError> {
        Ok(SwiftClient {
            client: download_client()?,
            config,
            session: RefCell::new(None),
        })
    }

    /// Keystone v3 when the auth URL path mentions it, v1 otherwise.
    fn is_v3(&self) -> bool {
        match Url::parse(&self.config.auth_url) {
            Ok(url) => url.path().contains("v3"),
            Err(_) => self.config.auth_url.contains("v3"),
        }
    }

    fn session(&self) -> Result<Session, DownloadError> {
        if let Some(session) = self.session.borrow().as_ref() {
            return Ok(session.clone());
        }
        let session = if self.is_v3() {
            self.authenticate_v3()?
        } else {
            self.authenticate_v1()?
        };
        info!("Authenticated with swift as {}", self.config.username);
        *self.session.borrow_mut() = Some(session.clone());
        Ok(session)
    }

    fn authenticate_v1(&self) -> Result<Session, DownloadError> {
        let response = self
            .client
            .get(&self.config.auth_url)
            .header("X-Auth-User", &self.config.username)
            .header("X-Auth-Key", &self.config.api_key)
            .send()?;
        if !response.status().is_success() {
            return Err(DownloadError::Auth(format!(
                "{} responded with {}",
                self.config.auth_url,
                response.status()
            )));
        }
        let header = |name: &str| -> Result<String, DownloadError> {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
                .ok_or_else(|| DownloadError::Auth(format!("missing {} header", name)))
        };
        Ok(Session {
            storage_url: header("X-Storage-Url")?,
            token: header("X-Auth-Token")?,
        })
    }

    fn authenticate_v3(&self) -> Result<Session, DownloadError> {
        let base = self.config.auth_url.trim_end_matches('/');
        let url = if base.ends_with("/auth/tokens") {
            base.to_string()
        } else {
            format!("{}/auth/tokens", base)
        };
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.config.username,
                            "domain": {"name": self.config.domain},
                            "password": self.config.api_key,
                        }
                    }
                }
            }
        });
        let response = self.client.post(&url).json(&body).send()?;
        if !response.status().is_success() {
            return Err(DownloadError::Auth(format!(
                "{} responded with {}",
                url,
                response.status()
            )));
        }
        let token = response
            .headers()
            .get("X-Subject-Token")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .ok_or_else(|| {
                DownloadError::Auth("missing X-Subject-Token header".to_string())
            })?;
        let res: TokenResponse = response.json()?;
        let storage_url = res
            .token
            .catalog
            .into_iter()
            .filter(|e| e.kind == "object-store")
            .flat_map(|e| e.endpoints)
            .find(|e| e.interface == "public")
            .map(|e| e.url)
            .ok_or_else(|| {
                DownloadError::Auth("no public object-store endpoint in catalog".to_string())
            })?;
        Ok(Session { storage_url, token })
    }

    fn object_url(&self, storage_url: &str, object: &str) -> Result<Url, DownloadError> {
        let mut url = Url::parse(storage_url).map_err(|e| {
            DownloadError::Auth(format!("bad storage url {}: {}", storage_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| DownloadError::Auth(format!("bad storage url {}", storage_url)))?
            .pop_if_empty()
            .push(&self.config.container)
            .push(object);
        Ok(url)
    }

    /// Download `object` from the configured container into `file_path`.
    pub fn download_object(
        &self,
        object: &str,
        file_path: &Path,
    ) -> Result<(), DownloadError> {
        let session = self.session()?;
        let url = self.object_url(&session.storage_url, object)?;
        let response = self
            .client
            .get(url)
            .header("X-Auth-Token", &session.token)
            .send()?;
        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status()));
        }
        write_body(response, file_path)
    }
}

/// Tries the backup URL first and falls back to the object of the same name in
/// the swift container.
pub struct CloudFallbackSource {
    primary: HttpSource,
    swift: SwiftClient,
}

impl CloudFallbackSource {
    pub fn new(config: CloudConfig) -> Result<CloudFallbackSource, DownloadError> {
        Ok(CloudFallbackSource {
            primary: HttpSource::new(true)?,
            swift: SwiftClient::new(config)?,
        })
    }
}

impl BackupSource for CloudFallbackSource {
    fn fetch(&self, backup: &Backup, file_path: &Path) -> Result<(), DownloadError> {
        let primary = match self.primary.fetch(backup, file_path) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!(
            "Download of {} failed ({}), trying container {}",
            backup.url, primary, self.swift.config.container
        );
        backup
            .file_name()
            .ok_or(DownloadError::NoFileName)
            .and_then(|object| self.swift.download_object(&object, file_path))
            .map_err(|fallback| DownloadError::Fallback {
                primary: Box::new(primary),
                fallback: Box::new(fallback),
            })
    }
}
