//! myslice - dump a referentially consistent subset of a MySQL database.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use myslice_cli::describe::describe;
use myslice_cli::slice::{load_catalog, run_slice};
use myslice_cli::{Args, CliError};
use myslice_core::DumpHeader;
use myslice_mysql::{MySqlConfig, MySqlSource};

fn main() {
    // Diagnostics go to stderr, the dump owns stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "myslice=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.into_config()?;
    let mysql = MySqlConfig::new(&config.url);
    let database = mysql.database().ok_or_else(|| {
        CliError::Args("the connection URL must name a database".to_string())
    })?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), %database, "starting myslice");
    let source = MySqlSource::connect(&mysql)?;
    let mut catalog = load_catalog(&source, &database, &config)?;

    if let Some(format) = config.describe {
        println!("{}", describe(&catalog, format));
        source.close()?;
        return Ok(());
    }

    let mut out: Box<dyn Write> = match &config.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let header = DumpHeader::new(mysql.host(), &database);
    run_slice(&source, &mut catalog, &config.plan, &header, &mut out)?;
    source.close()?;
    Ok(())
}
