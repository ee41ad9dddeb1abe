//! Download stage
//!
//! Walks a flattened tree and mirrors it on disk: every folder becomes a
//! directory below the output directory and every file is fetched from its
//! URL with the library's authentication cookie.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::COOKIE;
use reqwest::Client;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::AUTH_COOKIE;
use crate::error::{FlattenError, Result};
use crate::types::Item;

/// Retry policy for a single file
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
        }
    }
}

/// Totals of a finished download
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub folders: usize,
    pub files: usize,
    pub bytes: u64,
}

/// One file to fetch and where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileJob {
    pub url: String,
    pub path: PathBuf,
}

/// Directories and files a tree maps to below an output directory
#[derive(Debug, Default)]
pub struct DownloadPlan {
    /// Parents always come before their children
    pub folders: Vec<PathBuf>,
    pub files: Vec<FileJob>,
}

impl DownloadPlan {
    /// Map every node below `root` to a path under `output_dir`
    ///
    /// The root folder itself is `output_dir`.
    pub fn build(root: &Item, output_dir: &Path) -> Result<Self> {
        let mut plan = Self::default();
        plan.collect(root, output_dir)?;
        Ok(plan)
    }

    fn collect(&mut self, folder: &Item, dir: &Path) -> Result<()> {
        for child in &folder.children {
            let path = dir.join(safe_name(&child.name)?);
            if child.is_folder() {
                self.folders.push(path.clone());
                self.collect(child, &path)?;
            } else {
                self.files.push(FileJob {
                    url: child.url.clone(),
                    path,
                });
            }
        }
        Ok(())
    }
}

/// Reject names that would escape or collapse the mirrored hierarchy
fn safe_name(name: &str) -> Result<&str> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(FlattenError::InvalidStructure {
            message: format!("'{}' cannot be used as a file name", name),
        });
    }
    Ok(name)
}

/// Fetches the files of a flattened tree over one shared client
pub struct Downloader {
    client: Client,
    cookie: String,
    retry: RetryConfig,
    concurrency: usize,
}

impl Downloader {
    pub fn new(auth_token: &str, retry: RetryConfig, concurrency: usize) -> Self {
        let client = Client::builder()
            .user_agent("sharepoint-utils/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            cookie: format!("{}={}", AUTH_COOKIE, auth_token),
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Mirror the whole tree below `output_dir`
    ///
    /// Files are fetched concurrently in no particular order; the first file
    /// that still fails after its retries fails the download.
    pub async fn download_tree(&self, root: &Item, output_dir: &Path) -> Result<DownloadReport> {
        let plan = DownloadPlan::build(root, output_dir)?;
        info!(
            folders = plan.folders.len(),
            files = plan.files.len(),
            dir = %output_dir.display(),
            "Starting download"
        );

        fs::create_dir_all(output_dir).await?;
        for folder in &plan.folders {
            fs::create_dir_all(folder).await?;
        }

        let bytes = stream::iter(plan.files.iter())
            .map(|job| self.download_file(job))
            .buffer_unordered(self.concurrency)
            .try_fold(0u64, |total, written| async move { Ok::<_, FlattenError>(total + written) })
            .await?;

        Ok(DownloadReport {
            folders: plan.folders.len(),
            files: plan.files.len(),
            bytes,
        })
    }

    async fn download_file(&self, job: &FileJob) -> Result<u64> {
        let content = self.fetch_with_retry(&job.url).await?;

        if let Some(parent) = job.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&job.path, &content).await?;

        debug!(url = %job.url, path = %job.path.display(), bytes = content.len(), "Downloaded");
        Ok(content.len() as u64)
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<Bytes> {
        let mut attempts = 0;
        let mut delay = self.retry.initial_delay;

        loop {
            attempts += 1;

            match self.fetch(url).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_retryable() && attempts < self.retry.max_attempts => {
                    warn!(
                        url,
                        attempt = attempts,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "Fetch failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay
                        .mul_f64(self.retry.backoff_factor)
                        .min(self.retry.max_delay);
                }
                Err(FlattenError::Network(e)) => {
                    return Err(FlattenError::DownloadFetch {
                        url: url.to_string(),
                        message: e.to_string(),
                        status: e.status(),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .header(COOKIE, &self.cookie)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlattenError::DownloadFetch {
                url: url.to_string(),
                message: format!("unexpected status {}", status),
                status: Some(status),
            });
        }

        Ok(response.bytes().await?)
    }
}
