use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::validators::{check_readable_file, parse_endpoint, parse_positive_secs, validate};
use crate::checker::{CheckerConfig, DEFAULT_MAX_CONCURRENCY};
use crate::infra::registry_adapter::RegistryConfig;

pub const CHECK_TIMEOUT_SECS_DEFAULT: u64 = 120;
pub const REQUEST_TIMEOUT_SECS_DEFAULT: u64 = 30;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Print extra stuff (use -v -v or --verbose --verbose for even more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Override the podman executable path
    #[arg(long, value_name = "PATH", global = true)]
    pub podman_bin: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check running containers for newer images
    Check(CheckArgs),
    /// Work out which version to roll a container back to
    Rollback(RollbackArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
    /// Stop after this many seconds and report whatever finished
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = CHECK_TIMEOUT_SECS_DEFAULT,
        value_parser = parse_positive_secs
    )]
    pub timeout_secs: u64,

    /// Maximum number of containers checked at once (0 = no limit)
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,

    /// Timeout for a single registry request
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = REQUEST_TIMEOUT_SECS_DEFAULT,
        value_parser = parse_positive_secs
    )]
    pub request_timeout_secs: u64,

    /// Registry endpoint override, e.g. registry.local:5000=http://registry.local:5000. Can be used multiple times.
    #[arg(long = "registry-endpoint", value_name = "HOST=URL", value_parser = parse_endpoint)]
    pub registry_endpoints: Vec<(String, String)>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Table width, defaults to the terminal width
    #[arg(long, value_name = "COLUMNS")]
    pub width: Option<usize>,
}

impl Default for CheckArgs {
    fn default() -> Self {
        Self {
            timeout_secs: CHECK_TIMEOUT_SECS_DEFAULT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout_secs: REQUEST_TIMEOUT_SECS_DEFAULT,
            registry_endpoints: Vec::new(),
            json: false,
            width: None,
        }
    }
}

impl CheckArgs {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn checker_config(&self) -> CheckerConfig {
        CheckerConfig {
            max_concurrency: self.max_concurrency,
        }
    }

    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            endpoints: self
                .registry_endpoints
                .iter()
                .cloned()
                .collect::<HashMap<_, _>>(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct RollbackArgs {
    /// JSON file with the recorded version transition of one container
    #[arg(long, value_name = "FILE", value_parser = check_readable_file)]
    pub detail_json: PathBuf,

    /// Print the rollback target as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Validate the arguments, without modifying the Args
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid for the selected command.
    pub fn validate(&self) -> Result<(), String> {
        validate(self)
    }
}
