//! Settings read from the process environment.
//!
//! Every variable is declared once in a static table together with whether it
//! is required.  Loading goes through a lookup closure, so the parsing can be
//! exercised without touching the real environment.

use std::{
    collections::HashMap,
    env,
    path::{Path, PathBuf},
};

use crate::{db::backups::PackageKey, error::FetchError};

pub const DEFAULT_OUTPUT_FOLDER: &str = "./output";

#[derive(Debug, Clone, Copy)]
pub struct EnvVar {
    pub name: &'static str,
    pub required: bool,
}

const fn required(name: &'static str) -> EnvVar {
    EnvVar {
        name,
        required: true,
    }
}

const fn optional(name: &'static str) -> EnvVar {
    EnvVar {
        name,
        required: false,
    }
}

pub const PACKAGE_VARS: [EnvVar; 7] = [
    required("MONGODB_URI"),
    required("MONGODB_DBNAME"),
    required("MONGODB_BCOLL"),
    optional("OUTPUT_FOLDER"),
    required("AID"),
    required("MONTH"),
    required("YEAR"),
];

pub const CLOUD_VARS: [EnvVar; 5] = [
    required("SWIFT_USERNAME"),
    required("SWIFT_APIKEY"),
    required("SWIFT_AUTHURL"),
    required("SWIFT_DOMAIN"),
    required("SWIFT_CONTAINER"),
];

/// Preload the environment from `.env/<name>.env`, or from `.env` in the
/// working directory if present when no name is given.
pub fn load_dotenv(name: Option<&str>) -> Result<(), dotenvy::Error> {
    match name {
        Some(name) => dotenvy::from_path(Path::new(&format!(".env/{}.env", name))),
        None if Path::new(".env").is_file() => dotenvy::from_path(Path::new(".env")),
        None => Ok(()),
    }
}

/// Settings shared by all entry points.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_db: String,
    pub backup_collection: String,
    pub output_folder: PathBuf,
    pub key: PackageKey,
}

/// Object storage settings, only used by the cloud-backed entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudConfig {
    pub username: String,
    pub api_key: String,
    pub auth_url: String,
    pub domain: String,
    pub container: String,
}

/// Collect the values of `vars`.  Empty values count as missing; the first
/// missing required variable, in table order, is reported.
fn collect<F>(vars: &[EnvVar], lookup: F) -> Result<HashMap<&'static str, String>, FetchError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut values = HashMap::new();
    for var in vars {
        match lookup(var.name).filter(|v| !v.trim().is_empty()) {
            Some(v) => {
                values.insert(var.name, v);
            }
            None if var.required => return Err(FetchError::MissingSetting(var.name)),
            None => {}
        }
    }
    Ok(values)
}

/// Take a value that [`collect`] guarantees to be present.
fn take(
    values: &mut HashMap<&'static str, String>,
    name: &'static str,
) -> Result<String, FetchError> {
    values.remove(name).ok_or(FetchError::MissingSetting(name))
}

/// Months are always parsed in base 10, so `08` is August.
fn parse_month(value: &str) -> Result<u32, FetchError> {
    let invalid = |reason: &str| FetchError::InvalidSetting {
        name: "MONTH",
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let month = value
        .trim()
        .parse::<u32>()
        .map_err(|e| invalid(&e.to_string()))?;
    if !(1..=12).contains(&month) {
        return Err(invalid("month must be between 1 and 12"));
    }
    Ok(month)
}

fn parse_year(value: &str) -> Result<i32, FetchError> {
    let invalid = |reason: &str| FetchError::InvalidSetting {
        name: "YEAR",
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let year = value
        .trim()
        .parse::<i32>()
        .map_err(|e| invalid(&e.to_string()))?;
    if year <= 0 {
        return Err(invalid("year must be positive"));
    }
    Ok(year)
}

impl Config {
    pub fn from_env() -> Result<Config, FetchError> {
        Config::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, FetchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = collect(&PACKAGE_VARS, lookup)?;
        let month = parse_month(&take(&mut values, "MONTH")?)?;
        let year = parse_year(&take(&mut values, "YEAR")?)?;
        let aid = take(&mut values, "AID")?;
        Ok(Config {
            mongo_uri: take(&mut values, "MONGODB_URI")?,
            mongo_db: take(&mut values, "MONGODB_DBNAME")?,
            backup_collection: take(&mut values, "MONGODB_BCOLL")?,
            output_folder: PathBuf::from(
                values
                    .remove("OUTPUT_FOLDER")
                    .unwrap_or_else(|| DEFAULT_OUTPUT_FOLDER.to_string()),
            ),
            key: PackageKey::new(aid.trim(), month, year),
        })
    }
}

impl CloudConfig {
    pub fn from_env() -> Result<CloudConfig, FetchError> {
        CloudConfig::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<CloudConfig, FetchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = collect(&CLOUD_VARS, lookup)?;
        Ok(CloudConfig {
            username: take(&mut values, "SWIFT_USERNAME")?,
            api_key: take(&mut values, "SWIFT_APIKEY")?,
            auth_url: take(&mut values, "SWIFT_AUTHURL")?,
            domain: take(&mut values, "SWIFT_DOMAIN")?,
            container: take(&mut values, "SWIFT_CONTAINER")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("MONGODB_URI", "mongodb://localhost:27017"),
            ("MONGODB_DBNAME", "dadosjus"),
            ("MONGODB_BCOLL", "packages"),
            ("AID", "TRT13"),
            ("MONTH", "08"),
            ("YEAR", "2020"),
        ]
    }

    #[test]
    fn load_config() -> Result<(), Box<dyn Error>> {
        let config = Config::from_lookup(lookup_from(&base()))?;
        assert_eq!(config.key, PackageKey::new("trt13", 8, 2020));
        assert_eq!(config.mongo_db, "dadosjus");
        assert_eq!(config.backup_collection, "packages");
        assert_eq!(config.output_folder, PathBuf::from(DEFAULT_OUTPUT_FOLDER));

        let mut pairs = base();
        pairs.push(("OUTPUT_FOLDER", "/tmp/out"));
        let config = Config::from_lookup(lookup_from(&pairs))?;
        assert_eq!(config.output_folder, PathBuf::from("/tmp/out"));
        Ok(())
    }

    #[test]
    fn every_required_var_is_checked() {
        for var in PACKAGE_VARS.iter().filter(|v| v.required) {
            let pairs: Vec<_> = base().into_iter().filter(|(k, _)| *k != var.name).collect();
            match Config::from_lookup(lookup_from(&pairs)) {
                Err(FetchError::MissingSetting(name)) => assert_eq!(name, var.name),
                other => panic!("expected {} to be missing, got {:?}", var.name, other),
            }
        }
    }

    #[test]
    fn empty_value_is_missing() {
        let mut pairs = base();
        pairs.retain(|(k, _)| *k != "AID");
        pairs.push(("AID", "  "));
        let res = Config::from_lookup(lookup_from(&pairs));
        assert!(matches!(res, Err(FetchError::MissingSetting("AID"))));
    }

    #[test]
    fn invalid_month_and_year() {
        for month in ["13", "0", "aug", "-1"] {
            let mut pairs = base();
            pairs.retain(|(k, _)| *k != "MONTH");
            pairs.push(("MONTH", month));
            let res = Config::from_lookup(lookup_from(&pairs));
            assert!(
                matches!(res, Err(FetchError::InvalidSetting { name: "MONTH", .. })),
                "month {}",
                month
            );
        }

        let mut pairs = base();
        pairs.retain(|(k, _)| *k != "YEAR");
        pairs.push(("YEAR", "twenty"));
        let res = Config::from_lookup(lookup_from(&pairs));
        assert!(matches!(res, Err(FetchError::InvalidSetting { name: "YEAR", .. })));
    }

    #[test]
    fn month_is_decimal() -> Result<(), Box<dyn Error>> {
        assert_eq!(parse_month("09")?, 9);
        assert_eq!(parse_month("12")?, 12);
        Ok(())
    }

    #[test]
    fn load_cloud_config() -> Result<(), Box<dyn Error>> {
        let pairs = [
            ("SWIFT_USERNAME", "user"),
            ("SWIFT_APIKEY", "secret"),
            ("SWIFT_AUTHURL", "https://auth.example.org/v3"),
            ("SWIFT_DOMAIN", "default"),
            ("SWIFT_CONTAINER", "dadosjus"),
        ];
        let config = CloudConfig::from_lookup(lookup_from(&pairs))?;
        assert_eq!(config.container, "dadosjus");
        assert_eq!(config.auth_url, "https://auth.example.org/v3");

        let res = CloudConfig::from_lookup(lookup_from(&pairs[1..]));
        assert!(matches!(res, Err(FetchError::MissingSetting("SWIFT_USERNAME"))));
        Ok(())
    }
}
