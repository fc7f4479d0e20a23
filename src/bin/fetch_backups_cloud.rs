use std::{io, process::ExitCode};

use backup_retriever::{
    cloud::swift::CloudFallbackSource,
    config::{load_dotenv, CloudConfig, Config},
    db::backups::MongoPackageStore,
    workflow::{report, retrieve_package},
};
use clap::Parser;
use log::error;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Download the backups of one agency package, falling back to swift",
    long_about = None
)]
struct Args {
    /// Environment name, e.g., test, prod.  Loads `.env/<env>.env` when given.
    #[arg(short, long)]
    env: Option<String>,
}

fn run(
    config: &Config,
    cloud: CloudConfig,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let store = MongoPackageStore::connect(
        &config.mongo_uri,
        &config.mongo_db,
        &config.backup_collection,
    )?;
    let source = CloudFallbackSource::new(cloud)?;
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

    let loaded = Config::from_env().and_then(|c| Ok((c, CloudConfig::from_env()?)));
    let (config, cloud) = match loaded {
        Ok(x) => x,
        Err(e) => {
            error!("Error loading config values: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&config, cloud) {
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
