use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::util::Cancellation;
use crate::{PluginError, Result};

use super::archive::{default_extractors, ContentType, Extractor};
use super::fetcher::Fetcher;
use super::verifier::Verifier;

/// Fetches, verifies and unpacks one artifact.
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    verifier: Box<dyn Verifier>,
    extractors: HashMap<ContentType, Box<dyn Extractor>>,
    cancel: Cancellation,
}

impl Downloader {
    /// Create a downloader with the zip and tar.gz extractors registered
    pub fn new(fetcher: Arc<dyn Fetcher>, verifier: Box<dyn Verifier>) -> Self {
        Self {
            fetcher,
            verifier,
            extractors: default_extractors(),
            cancel: Cancellation::new(),
        }
    }

    /// Register (or replace) the extractor for a content type
    pub fn with_extractor(mut self, content_type: ContentType, extractor: Box<dyn Extractor>) -> Self {
        self.extractors.insert(content_type, extractor);
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Download `uri` and unpack it into `dest_dir`.
    ///
    /// Nothing is written to `dest_dir` unless the fetched bytes passed
    /// verification.
    pub async fn get(&self, uri: &str, dest_dir: &Path) -> Result<()> {
        log::info!("Downloading {}", uri);
        let data = self.fetcher.fetch(uri, &self.cancel).await?;

        self.verifier
            .verify(&data)
            .map_err(|reason| PluginError::VerificationFailed {
                uri: uri.to_string(),
                reason,
            })?;
        log::debug!("Verified {} bytes from {}", data.len(), uri);

        self.extract(&data, dest_dir)
    }

    fn extract(&self, data: &[u8], dest_dir: &Path) -> Result<()> {
        let content_type = ContentType::sniff(data);
        log::debug!("Detected content type {}", content_type.mime_type());

        let extractor = self
            .extractors
            .get(&content_type)
            .ok_or_else(|| PluginError::UnsupportedArchiveType {
                content_type: content_type.mime_type().to_string(),
            })?;

        std::fs::create_dir_all(dest_dir)?;
        extractor.extract(data, dest_dir, &self.cancel)?;
        log::debug!("Extracted archive to {}", dest_dir.display());
        Ok(())
    }
}
