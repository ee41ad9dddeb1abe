//! Command line arguments and validated runtime configuration
//!
//! `CliArgs` is what clap parses; `FlattenConfig` and `DownloadConfig` are
//! the checked forms the library works with.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Url;

use crate::error::{FlattenError, Result};

/// Name of the authentication cookie the library expects
pub const AUTH_COOKIE: &str = "FedAuth";

/// Flatten a document library into a JSON tree and download its files
#[derive(Parser, Debug, Clone)]
#[command(name = "sharepoint-utils", version, about)]
pub struct CliArgs {
    /// Directory the tree document, debug image and downloads are written to
    #[arg(long, default_value = "output", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Verbose output (per-scroll diagnostics)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Discover every file and folder below a listing URL
    Flatten(FlattenArgs),
    /// Download every file of a previously flattened tree
    Download(DownloadArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct FlattenArgs {
    /// The starting url of the library exploration
    pub start_url: String,

    /// The FedAuth cookie obtained by visiting the website
    pub fed_auth: String,

    /// Save an image of the last visited page after every scroll
    #[arg(long)]
    pub debug: bool,

    #[arg(long, default_value = "debug.png")]
    pub debug_image_key: String,

    #[arg(long, default_value = "flatten.json")]
    pub output_json_key: String,

    /// Maximum folder depth to explore (unlimited if not set)
    #[arg(long, value_name = "NUM")]
    pub max_depth: Option<usize>,

    /// Stop the whole traversal at the first folder reaching --max-depth
    /// instead of only skipping folders at that depth
    #[arg(long, requires = "max_depth")]
    pub halt_at_depth: bool,

    /// Timeout for page elements to appear, in seconds
    #[arg(long, default_value = "10", value_name = "SECS")]
    pub wait_timeout: f64,

    /// Settle time after each scroll of a listing with unknown size, in seconds
    #[arg(long, default_value = "2", value_name = "SECS")]
    pub height_based_scroll_time: f64,

    /// Wait after each scroll of a listing with a declared size, in seconds
    #[arg(long, default_value = "0.1", value_name = "SECS")]
    pub item_based_scroll_time: f64,

    /// Pixels to scroll per step; too large a step may skip rows
    #[arg(long, default_value = "150", value_name = "PX")]
    pub scroll_delta: f64,

    /// Hard ceiling on scroll steps for one listing
    #[arg(long, default_value = "10000", value_name = "NUM")]
    pub max_scroll_iterations: usize,

    /// Consecutive scroll steps without progress before a listing is reported incomplete
    #[arg(long, default_value = "50", value_name = "NUM")]
    pub stall_limit: usize,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DownloadArgs {
    /// The FedAuth cookie obtained by visiting the website
    pub fed_auth: String,

    /// Tree document to read, relative to --output-dir
    #[arg(long, default_value = "flatten.json")]
    pub input_json_key: String,

    /// Attempts per file before the download is abandoned
    #[arg(long, default_value = "3", value_name = "NUM")]
    pub max_retries: u32,

    /// Files fetched at the same time
    #[arg(long, default_value = "8", value_name = "NUM")]
    pub concurrency: usize,
}

/// What happens when the traversal reaches a folder at the depth bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthLimit {
    /// Skip folders at the bound and keep visiting the rest of the frontier
    #[default]
    Prune,
    /// Stop the entire traversal at the first folder at the bound
    Halt,
}

/// Locators for the targeted library layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiSelectors {
    /// Class of the virtualized list container
    pub scroll_container_class: String,
    /// CSS selector matching one rendered row
    pub row_selector: String,
    /// Row attribute holding the accessible label
    pub label_attribute: String,
    /// Class of the breadcrumb element
    pub breadcrumb_class: String,
    /// Breadcrumb attribute holding the JSON path segments
    pub breadcrumb_attribute: String,
}

impl Default for UiSelectors {
    fn default() -> Self {
        Self {
            scroll_container_class: "od-ItemsScopeItemContent-list".to_string(),
            row_selector: r#"div[data-automationid="DetailsRow"]"#.to_string(),
            label_attribute: "aria-label".to_string(),
            breadcrumb_class: "ms-Breadcrumb-item".to_string(),
            breadcrumb_attribute: "itemKey".to_string(),
        }
    }
}

/// Scroll Driver tuning
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollSettings {
    /// Pixels per scroll step
    pub delta: f64,
    /// Wait after a step when the listing declared its size
    pub count_wait: Duration,
    /// Longest settle time after a step when the size is unknown
    pub height_wait: Duration,
    pub max_iterations: usize,
    pub stall_limit: usize,
    /// Where to write a screenshot after every step, if anywhere
    pub debug_screenshot: Option<PathBuf>,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            delta: 150.0,
            count_wait: Duration::from_millis(100),
            height_wait: Duration::from_secs(2),
            max_iterations: 10_000,
            stall_limit: 50,
            debug_screenshot: None,
        }
    }
}

/// Validated discovery configuration
#[derive(Debug, Clone)]
pub struct FlattenConfig {
    pub start_url: Url,
    pub auth_token: String,
    pub output_path: PathBuf,
    pub wait_timeout: Duration,
    pub max_depth: Option<usize>,
    pub depth_limit: DepthLimit,
    pub scroll: ScrollSettings,
    pub selectors: UiSelectors,
}

impl FlattenConfig {
    /// Discovery configuration with default tuning
    pub fn new(start_url: &str, auth_token: &str, output_path: PathBuf) -> Result<Self> {
        Ok(Self {
            start_url: parse_start_url(start_url)?,
            auth_token: auth_token.to_string(),
            output_path,
            wait_timeout: Duration::from_secs(10),
            max_depth: None,
            depth_limit: DepthLimit::default(),
            scroll: ScrollSettings::default(),
            selectors: UiSelectors::default(),
        })
    }

    pub fn from_args(output_dir: &std::path::Path, args: FlattenArgs) -> Result<Self> {
        if args.scroll_delta <= 0.0 {
            return Err(invalid("scroll delta must be positive"));
        }
        if args.max_scroll_iterations == 0 {
            return Err(invalid("max scroll iterations must be at least 1"));
        }
        if args.stall_limit == 0 {
            return Err(invalid("stall limit must be at least 1"));
        }

        let debug_screenshot = args.debug.then(|| output_dir.join(&args.debug_image_key));

        let mut config = Self::new(
            &args.start_url,
            &args.fed_auth,
            output_dir.join(&args.output_json_key),
        )?;
        config.wait_timeout = seconds("wait timeout", args.wait_timeout)?;
        config.max_depth = args.max_depth;
        config.depth_limit = if args.halt_at_depth {
            DepthLimit::Halt
        } else {
            DepthLimit::Prune
        };
        config.scroll = ScrollSettings {
            delta: args.scroll_delta,
            count_wait: seconds("item based scroll time", args.item_based_scroll_time)?,
            height_wait: seconds("height based scroll time", args.height_based_scroll_time)?,
            max_iterations: args.max_scroll_iterations,
            stall_limit: args.stall_limit,
            debug_screenshot,
        };
        Ok(config)
    }
}

/// Validated download configuration
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub auth_token: String,
    pub max_attempts: u32,
    pub concurrency: usize,
}

impl DownloadConfig {
    pub fn from_args(output_dir: &std::path::Path, args: DownloadArgs) -> Result<Self> {
        if args.concurrency == 0 {
            return Err(invalid("concurrency must be at least 1"));
        }
        if args.max_retries == 0 {
            return Err(invalid("max retries must be at least 1"));
        }

        Ok(Self {
            input_path: output_dir.join(&args.input_json_key),
            output_dir: output_dir.to_path_buf(),
            auth_token: args.fed_auth,
            max_attempts: args.max_retries,
            concurrency: args.concurrency,
        })
    }
}

fn parse_start_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| invalid(&format!("start url '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(invalid(&format!(
            "start url '{}' must be an absolute http(s) url",
            raw
        ))),
    }
}

fn seconds(what: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(&format!("{} must be a positive number of seconds", what)));
    }
    Ok(Duration::from_secs_f64(value))
}

fn invalid(message: &str) -> FlattenError {
    FlattenError::InvalidConfig {
        message: message.to_string(),
    }
}
