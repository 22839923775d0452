//! Artifact downloading and extraction module.
//!
//! A [`Downloader`] composes three narrow capabilities:
//! - a [`Fetcher`] that produces the raw bytes (HTTP or a local file),
//! - a [`Verifier`] that accepts or rejects them,
//! - an [`Extractor`] chosen by sniffing the content type.

mod archive;
mod downloader;
mod fetcher;
mod verifier;

pub use archive::{default_extractors, ContentType, Extractor, TarGzExtractor, ZipExtractor, SNIFF_LEN};
pub use downloader::Downloader;
pub use fetcher::{FileFetcher, Fetcher, HttpFetcher, HttpFetcherConfig};
pub use verifier::{compute_sha256, InsecureVerifier, Sha256Verifier, Verifier};

#[cfg(test)]
pub(crate) use archive::tests as test_archives;
