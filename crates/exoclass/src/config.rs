//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::features::AlignmentPolicy;

/// Default bundle location, relative to the working directory.
pub const DEFAULT_PIPELINE_PATH: &str = "xgb_pipeline.pkl";

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Exoplanet classifier inference server.
#[derive(Debug, Clone, Parser)]
#[command(name = "exoclass", version, about)]
pub struct Config {
    /// Path to the pipeline bundle (model plus class labels, JSON).
    #[arg(long, env = "PIPELINE_PATH", default_value = DEFAULT_PIPELINE_PATH)]
    pub pipeline_path: PathBuf,

    /// Address to listen on.
    #[arg(long = "bind", env = "BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    pub bind_addr: SocketAddr,

    /// How request features map onto model inputs: `positional` or `by-name`.
    #[arg(long, env = "FEATURE_ALIGNMENT", default_value = "positional")]
    pub alignment: AlignmentPolicy,

    /// Load the bundle at startup instead of on the first request
    /// (`PIPELINE_EAGER_LOAD=true`).
    #[arg(long, env = "PIPELINE_EAGER_LOAD")]
    pub eager_load: bool,
}
