//! Command-line arguments and the slicing configuration built from them.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use myslice_core::Plan;

use crate::describe::DescribeFormat;
use crate::error::{CliError, Result};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "myslice")]
#[command(
    version,
    about = "Dump a referentially consistent subset of a MySQL database"
)]
pub struct Args {
    /// MySQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    pub url: String,

    /// Slicing plan (JSON).
    #[arg(short, long)]
    pub plan: Option<PathBuf>,

    /// Write the dump to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Plan variable substituted for `${NAME}`. Repeatable.
    #[arg(short = 's', long = "set", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Print the parsed schema instead of dumping.
    #[arg(long)]
    pub describe: bool,

    /// Schema description format.
    #[arg(long, default_value = "table", value_enum)]
    pub format: DescribeFormat,

    /// Keep orphans of nullable foreign keys unless the plan overrides it per table or field.
    #[arg(long)]
    pub no_expunge_orphans: bool,
}

/// Parse a `name=value` plan variable.
pub fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got `{s}`")),
    }
}

/// Everything a slicing run needs besides the database itself.
#[derive(Debug, Clone)]
pub struct SliceConfig {
    /// MySQL connection URL.
    pub url: String,

    /// Plan with variables substituted.
    pub plan: Plan,

    /// Dump destination, stdout if `None`.
    pub output: Option<PathBuf>,

    /// Describe the schema in this format instead of dumping.
    pub describe: Option<DescribeFormat>,

    /// Database-level orphan policy forced from the command line.
    pub expunge_orphans: Option<bool>,
}

impl Args {
    /// Load the plan and build the slicing configuration.
    pub fn into_config(self) -> Result<SliceConfig> {
        let vars: HashMap<String, String> = self.vars.into_iter().collect();
        let plan = match &self.plan {
            Some(path) => Plan::load(path)?,
            None if vars.is_empty() => Plan::default(),
            None => {
                return Err(CliError::Args(
                    "--set requires a plan to substitute into".to_string(),
                ))
            }
        };

        Ok(SliceConfig {
            url: self.url,
            plan: plan.substitute(&vars)?,
            output: self.output,
            describe: self.describe.then_some(self.format),
            expunge_orphans: self.no_expunge_orphans.then_some(false),
        })
    }
}
