//! Configuration management for pixserve.
//!
//! This module provides the CLI configuration system:
//! - Subcommands via clap derive
//! - Environment variables with `PIXSERVE_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use pixserve::config::{Cli, Command};
//!
//! match Cli::parse().into_command() {
//!     Command::Render(config) => { /* build and run the pipeline */ }
//!     Command::Key(config) => { /* print the cache key */ }
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `PIXSERVE_ROOT` - Local directory holding source images
//! - `PIXSERVE_S3_BUCKET` - S3 bucket holding source images
//! - `PIXSERVE_S3_PREFIX` - Key prefix inside the bucket
//! - `PIXSERVE_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `PIXSERVE_S3_REGION` - AWS region (default: us-east-1)
//! - `PIXSERVE_CACHE_SIZE` - Memory cache capacity (default: 64MB)
//! - `PIXSERVE_DIGEST` - Cache key digest, sha256 or sha512 (default: sha256)
//! - `PIXSERVE_NAMESPACE` - Cache key namespace

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::cache::{KeyGenerator, Sha256KeyGenerator, Sha512KeyGenerator};
use crate::error::ConfigError;
use crate::params::{Params, Value};

// =============================================================================
// Default Values
// =============================================================================

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default memory cache capacity.
pub const DEFAULT_CACHE_SIZE: &str = "64MB";

// =============================================================================
// CLI Arguments
// =============================================================================

/// pixserve - Render images through a cached processing pipeline.
#[derive(Parser, Debug, Clone)]
#[command(name = "pixserve")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch, process and cache an image, optionally several times
    Render(RenderConfig),

    /// Print the cache key of a request
    Key(KeyConfig),
}

/// Digest algorithm for cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

/// Request parameters, shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    /// Request parameter as NAME=VALUE (repeatable).
    ///
    /// Values are read as an integer, else a float, else true/false, else a string.
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, Value)>,

    /// Request parameters as a JSON object. `--param` entries override its keys.
    #[arg(long, value_name = "JSON")]
    pub params_json: Option<String>,
}

impl RequestArgs {
    /// Build the parameter set for this request.
    pub fn to_params(&self) -> Result<Params, ConfigError> {
        let mut params = match self.params_json {
            Some(ref text) => {
                let json: serde_json::Value =
                    serde_json::from_str(text).map_err(|e| ConfigError::InvalidValue {
                        option: "params-json",
                        message: e.to_string(),
                    })?;
                Params::try_from(json).map_err(|e| ConfigError::InvalidValue {
                    option: "params-json",
                    message: e.to_string(),
                })?
            }
            None => Params::new(),
        };

        for (name, value) in &self.params {
            params = params.with(name.as_str(), value.clone());
        }

        Ok(params)
    }
}

/// Cache key derivation settings.
#[derive(Args, Debug, Clone)]
pub struct KeyArgs {
    /// Digest algorithm for cache keys.
    #[arg(long, value_enum, default_value = "sha256", env = "PIXSERVE_DIGEST")]
    pub digest: DigestAlgorithm,

    /// Namespace hashed into every cache key.
    #[arg(long, env = "PIXSERVE_NAMESPACE")]
    pub namespace: Option<String>,
}

impl KeyArgs {
    pub fn key_generator(&self) -> Arc<dyn KeyGenerator> {
        match self.digest {
            DigestAlgorithm::Sha256 => {
                let mut keys = Sha256KeyGenerator::new();
                if let Some(ref namespace) = self.namespace {
                    keys = keys.with_namespace(namespace.as_str());
                }
                Arc::new(keys)
            }
            DigestAlgorithm::Sha512 => {
                let mut keys = Sha512KeyGenerator::new();
                if let Some(ref namespace) = self.namespace {
                    keys = keys.with_namespace(namespace.as_str());
                }
                Arc::new(keys)
            }
        }
    }
}

impl Default for KeyArgs {
    fn default() -> Self {
        Self {
            digest: DigestAlgorithm::Sha256,
            namespace: None,
        }
    }
}

/// Configuration for the `render` command.
#[derive(Args, Debug, Clone)]
pub struct RenderConfig {
    // =========================================================================
    // Source Configuration
    // =========================================================================
    /// Local directory containing source images.
    #[arg(long, env = "PIXSERVE_ROOT")]
    pub root: Option<PathBuf>,

    /// S3 bucket containing source images.
    #[arg(long, env = "PIXSERVE_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix for source images inside the bucket.
    #[arg(long, env = "PIXSERVE_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "PIXSERVE_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "PIXSERVE_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Memory cache capacity (e.g. "64MB", "512KB", "1048576").
    #[arg(long, default_value = DEFAULT_CACHE_SIZE, env = "PIXSERVE_CACHE_SIZE")]
    pub cache_size: String,

    /// Share one computation between concurrent identical requests.
    #[arg(long, default_value_t = false)]
    pub single_flight: bool,

    #[command(flatten)]
    pub keys: KeyArgs,

    // =========================================================================
    // Request
    // =========================================================================
    #[command(flatten)]
    pub request: RequestArgs,

    /// Number of times to run the request.
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Write the rendered image to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl RenderConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.root, &self.s3_bucket) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidValue {
                    option: "source",
                    message: "set either --root or --s3-bucket, not both".to_string(),
                })
            }
            (None, None) => {
                return Err(ConfigError::InvalidValue {
                    option: "source",
                    message: "a source is required. Set --root / PIXSERVE_ROOT or \
                              --s3-bucket / PIXSERVE_S3_BUCKET"
                        .to_string(),
                })
            }
            _ => {}
        }

        if self.s3_bucket.as_deref() == Some("") {
            return Err(ConfigError::InvalidValue {
                option: "s3-bucket",
                message: "must not be empty".to_string(),
            });
        }

        if self.repeat == 0 {
            return Err(ConfigError::InvalidValue {
                option: "repeat",
                message: "must be at least 1".to_string(),
            });
        }

        self.cache_capacity()?;
        Ok(())
    }

    /// Cache capacity in bytes.
    pub fn cache_capacity(&self) -> Result<usize, ConfigError> {
        parse_size(&self.cache_size)
    }
}

/// Configuration for the `key` command.
#[derive(Args, Debug, Clone)]
pub struct KeyConfig {
    #[command(flatten)]
    pub keys: KeyArgs,

    #[command(flatten)]
    pub request: RequestArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Value Parsers
// =============================================================================

/// Parse a byte size such as `"1048576"`, `"512KB"`, `"64MB"` or `"2GiB"`.
///
/// Suffixes are binary multiples and case-insensitive. Zero is rejected.
pub fn parse_size(input: &str) -> Result<usize, ConfigError> {
    let invalid = || ConfigError::InvalidSize(input.to_string());

    let text = input.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, suffix) = text.split_at(split);
    if digits.is_empty() {
        return Err(invalid());
    }

    let multiplier: u64 = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1024,
        "m" | "mb" | "mib" => 1024 * 1024,
        "g" | "gb" | "gib" => 1024 * 1024 * 1024,
        _ => return Err(invalid()),
    };

    let bytes = digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(invalid)?;

    if bytes == 0 {
        return Err(invalid());
    }
    Ok(bytes)
}

/// Parse a `NAME=VALUE` request parameter.
pub fn parse_param(input: &str) -> Result<(String, Value), ConfigError> {
    let (name, raw) = input.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
        option: "param",
        message: format!("expected NAME=VALUE, got \"{}\"", input),
    })?;

    let name = name.trim();
    if name.is_empty() {
        return Err(ConfigError::InvalidValue {
            option: "param",
            message: format!("missing parameter name in \"{}\"", input),
        });
    }

    Ok((name.to_string(), parse_value(raw)))
}

fn parse_value(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Int(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        // "inf" and "nan" stay strings
        if float.is_finite() {
            return Value::Float(float);
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================
