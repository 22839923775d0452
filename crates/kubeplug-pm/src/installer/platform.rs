//! Platform and version resolution.

use crate::config::TargetPlatform;
use crate::index::{FileOperation, Labels, Platform, Plugin};
use crate::{PluginError, Result};

use super::planner::default_file_operations;

/// Version recorded for installs from a platform's `head` reference.
pub const HEAD_VERSION: &str = "HEAD";

/// Return the first platform whose selector matches `os` and `arch`.
///
/// `Ok(None)` means the plugin is not available for this platform; only a
/// malformed selector is an error.
pub fn resolve_platform<'a>(platforms: &'a [Platform], os: &str, arch: &str) -> Result<Option<&'a Platform>> {
    let mut env = Labels::new();
    env.insert("os".to_string(), os.to_string());
    env.insert("arch".to_string(), arch.to_string());
    log::debug!("Matching platform for labels {:?}", env);

    for (i, platform) in platforms.iter().enumerate() {
        let Some(selector) = &platform.selector else {
            continue;
        };
        if selector.compile()?.matches(&env) {
            log::debug!("Found matching platform with index {}", i);
            return Ok(Some(platform));
        }
    }

    Ok(None)
}

/// Pick the version and URI to install from a platform.
///
/// HEAD is used when forced, or when the platform declares nothing but a
/// `head` reference. Checksummed installs are identified by the lower-cased
/// checksum.
pub fn resolve_version(platform: &Platform, force_head: bool, plugin: &str) -> Result<(String, String)> {
    let has_head = !platform.head.is_empty();
    let head_only = has_head && platform.sha256.is_empty() && platform.uri.is_empty();

    if (force_head && has_head) || head_only {
        return Ok((HEAD_VERSION.to_string(), platform.head.clone()));
    }
    if force_head {
        return Err(PluginError::NoHeadAvailable {
            plugin: plugin.to_string(),
        });
    }

    Ok((platform.sha256.to_lowercase(), platform.uri.clone()))
}

/// Everything needed to download and lay out one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub version: String,
    pub uri: String,
    pub file_operations: Vec<FileOperation>,
    /// Entry point relative to the install directory
    pub bin: String,
}

impl DownloadTarget {
    pub fn is_head(&self) -> bool {
        self.version == HEAD_VERSION
    }

    /// The checksum to verify against, `None` for HEAD installs.
    pub fn checksum(&self) -> Option<&str> {
        if self.is_head() {
            None
        } else {
            Some(&self.version)
        }
    }
}

/// Resolve platform, version and file layout of `plugin` for `target`.
pub fn resolve_target(plugin: &Plugin, target: &TargetPlatform, force_head: bool) -> Result<DownloadTarget> {
    let platform = resolve_platform(&plugin.spec.platforms, &target.os, &target.arch)?.ok_or_else(|| {
        PluginError::NoMatchingPlatform {
            plugin: plugin.name().to_string(),
        }
    })?;

    let (version, uri) = resolve_version(platform, force_head, plugin.name())?;
    log::debug!("Matching plugin version is {}", version);

    let file_operations = if platform.files.is_empty() {
        default_file_operations()
    } else {
        platform.files.clone()
    };
    let bin = if platform.bin.is_empty() {
        super::plugin_name_to_bin(plugin.name(), target.is_windows())
    } else {
        platform.bin.clone()
    };

    Ok(DownloadTarget {
        version,
        uri,
        file_operations,
        bin,
    })
}
