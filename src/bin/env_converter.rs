//! env-converter
//!
//! Turns the `payload` string of a build event into the workflow environment
//! file named by `GITHUB_ENV`.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trolley_backend::services::env_file::{write_env_file, EnvProvider};

#[derive(Debug, Parser)]
#[command(name = "env-converter", about = "Write a build payload as workflow environment variables")]
struct Args {
    /// The stringified JSON of all the requested parameters
    #[arg(long = "incoming-string", alias = "incoming_string", default_value = "")]
    incoming_string: String,

    /// The cloud provider the payload was built for
    #[arg(long, value_enum, default_value = "gcp")]
    provider: EnvProvider,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();
    info!("incoming_string is: {}", args.incoming_string);

    let path = env::var("GITHUB_ENV")
        .map(PathBuf::from)
        .context("GITHUB_ENV is not set")?;
    let content = write_env_file(&path, &args.incoming_string, args.provider)
        .with_context(|| format!("failed to render {}", path.display()))?;

    for line in content.lines() {
        info!("{}", line);
    }
    Ok(())
}
