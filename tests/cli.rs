use std::error::Error;

use assert_cmd::Command;
use predicates::prelude::*;

const PACKAGE_ENV: [(&str, &str); 6] = [
    // an address nothing answers on, the binaries must stop before using it
    ("MONGODB_URI", "mongodb://192.0.2.1:27017"),
    ("MONGODB_DBNAME", "dadosjus"),
    ("MONGODB_BCOLL", "packages"),
    ("AID", "trt13"),
    ("MONTH", "08"),
    ("YEAR", "2020"),
];

#[test]
fn missing_setting_fails_fast() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    Command::cargo_bin("fetch_backups")?
        .env_clear()
        .current_dir(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("missing required setting MONGODB_URI"));
    Ok(())
}

#[test]
fn invalid_month_fails_fast() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    Command::cargo_bin("fetch_backups")?
        .env_clear()
        .envs(PACKAGE_ENV)
        .env("MONTH", "13")
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("setting MONTH"));
    Ok(())
}

#[test]
fn cloud_requires_swift_settings() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    Command::cargo_bin("fetch_backups_cloud")?
        .env_clear()
        .envs(PACKAGE_ENV)
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required setting SWIFT_USERNAME"));
    // nothing was downloaded
    assert!(!dir.path().join("output").exists());
    Ok(())
}

#[test]
fn named_env_file_must_exist() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    Command::cargo_bin("fetch_backups")?
        .env_clear()
        .args(["--env", "nope"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error loading .env file"));
    Ok(())
}

#[test]
fn env_file_is_loaded() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join(".env"))?;
    std::fs::write(
        dir.path().join(".env/test.env"),
        "MONGODB_URI=mongodb://192.0.2.1:27017\n",
    )?;
    Command::cargo_bin("fetch_backups")?
        .env_clear()
        .args(["--env", "test"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required setting MONGODB_DBNAME"));
    Ok(())
}
