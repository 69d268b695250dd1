use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use ras_stac::commands;
use ras_stac::inputs::StacInputs;
use ras_stac::logging::{self, LogFormat};
use ras_stac::params::Params;
use ras_stac::s3::Storage;
use ras_stac::settings::Settings;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Build STAC items and catalogs for HEC-RAS models.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Talk to a MinIO endpoint instead of AWS S3
    #[arg(long, global = true)]
    minio: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct ParamsSource {
    /// Parameters as a JSON file
    #[arg(long, value_name = "FILE")]
    params: Option<PathBuf>,

    /// Parameters as an inline JSON string
    #[arg(long, value_name = "JSON")]
    params_json: Option<String>,
}

impl ParamsSource {
    fn load<P: Params>(&self) -> Result<P> {
        match (&self.params, &self.params_json) {
            (Some(path), _) => P::read(path),
            (None, Some(json)) => P::from_json(json),
            (None, None) => Err(anyhow!("one of --params or --params-json is required")),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an item from a geometry HDF file
    GeomItem(ParamsSource),
    /// Create an item from a plan HDF file
    PlanItem(ParamsSource),
    /// Create an item for a depth grid derived from a plan item
    DgItem(ParamsSource),
    /// Create a catalog, optionally with a first item
    NewCatalog(ParamsSource),
    /// Add an item to a catalog
    UpdateCatalog(ParamsSource),
    /// Print item parameters for every HDF file under a model prefix
    Inputs {
        #[arg(long)]
        source_bucket: String,
        #[arg(long)]
        stac_bucket: String,
        #[arg(long)]
        model_prefix: String,
        #[arg(long, default_value = "stac")]
        stac_prefix: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    let settings = Settings::load(cli.config.as_deref(), cli.minio)?;
    let storage = Storage::from_settings(&settings).await?;
    info!(minio = settings.minio_mode, region = %settings.aws_region, "storage ready");

    let links = match cli.command {
        Command::GeomItem(source) => commands::geom_item(&storage, &settings, source.load()?).await?,
        Command::PlanItem(source) => commands::plan_item(&storage, &settings, source.load()?).await?,
        Command::DgItem(source) => commands::dg_item(&storage, &settings, source.load()?).await?,
        Command::NewCatalog(source) => {
            commands::new_catalog(&storage, &settings, source.load()?).await?
        }
        Command::UpdateCatalog(source) => {
            commands::update_catalog(&storage, &settings, source.load()?).await?
        }
        Command::Inputs {
            source_bucket,
            stac_bucket,
            model_prefix,
            stac_prefix,
        } => {
            let inputs = StacInputs::new(&source_bucket, &stac_bucket);
            let found = inputs.discover(&storage, &model_prefix, &stac_prefix).await?;
            return print_json(&found);
        }
    };
    print_json(&links)
}
