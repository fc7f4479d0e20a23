use std::{io, process::ExitCode};

use backup_retriever::{
    config::{load_dotenv, Config},
    db::backups::MongoPackageStore,
    download::HttpSource,
    workflow::{report, retrieve_package},
};
use clap::Parser;
use log::error;

#[derive(Parser, Debug)]
#[command(version, about = "Download the backups of one agency package", long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod.  Loads `.env/<env>.env` when given.
    #[arg(short, long)]
    env: Option<String>,
}

fn run(config: &Config) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let store = MongoPackageStore::connect(
        &config.mongo_uri,
        &config.mongo_db,
        &config.backup_collection,
    )?;
    let source = HttpSource::new(false)?;
    Ok(retrieve_package(
        &store,
        &source,
        &config.key,
        &config.output_folder,
    )?)
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(e) = load_dotenv(args.env.as_deref()) {
        error!("Error loading .env file: {}", e);
        return ExitCode::FAILURE;
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading config values: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(urls) => match report(&mut io::stdout().lock(), &urls) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Error writing report: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
