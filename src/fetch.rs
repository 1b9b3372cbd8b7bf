// src/fetch.rs

//! Source acquisition with retry and integrity verification.
//!
//! Sources are cached in the shared download area and treated as immutable
//! by filename: if the destination exists no download occurs, so a second
//! fetch of the same source is a no-op.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::hash::sha256_file;

/// Timeout for individual HTTP requests.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads sources and verifies their content hashes.
pub struct Fetcher {
    client: Client,
    retries: u32,
}

impl Fetcher {
    /// Create a fetcher allowing up to `retries` attempts per source.
    pub fn new(retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::Io(io::Error::new(
                    io::ErrorKind::Other,
                    format!("failed to create HTTP client: {e}"),
                ))
            })?;
        Ok(Self {
            client,
            retries: retries.max(1),
        })
    }

    /// Fetch `url` into `dest`, verifying against `expected` when given.
    ///
    /// An existing destination is never re-downloaded, but it is still
    /// verified, so a corrupted cache entry fails loudly rather than
    /// poisoning the build.
    pub fn fetch(&self, url: &str, dest: &Path, expected: Option<&str>) -> Result<()> {
        if dest.exists() {
            debug!("using cached source {}", dest.display());
        } else {
            self.download(url, dest)?;
        }

        match expected {
            Some(hash) => {
                let actual = sha256_file(dest)?;
                if actual != hash {
                    return Err(Error::Integrity {
                        file: dest.display().to_string(),
                        expected: hash.to_string(),
                        actual,
                    });
                }
                debug!("checksum verified for {}", dest.display());
            }
            None => warn!("no checksum for {}; proceeding unverified", url),
        }

        Ok(())
    }

    /// Download with linear back-off: attempt i sleeps i seconds on failure.
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        info!("downloading {}", url);
        let part = dest.with_extension("part");

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_download(url, &part) {
                Ok(bytes) => {
                    fs::rename(&part, dest)?;
                    debug!("downloaded {} bytes to {}", bytes, dest.display());
                    return Ok(());
                }
                Err(reason) => {
                    let _ = fs::remove_file(&part);
                    if attempt >= self.retries {
                        return Err(Error::Fetch {
                            url: url.to_string(),
                            reason: format!("{reason} (after {attempt} attempts)"),
                        });
                    }
                    warn!("fetch attempt {} for {} failed: {}, retrying", attempt, url, reason);
                    std::thread::sleep(Duration::from_secs(attempt as u64));
                }
            }
        }
    }

    fn try_download(&self, url: &str, part: &Path) -> std::result::Result<u64, String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let mut file = File::create(part).map_err(|e| e.to_string())?;
        io::copy(&mut response, &mut file).map_err(|e| e.to_string())
    }
}
