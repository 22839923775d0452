use std::fmt;

use crate::index::Labels;

use super::source::ConfigLoader;

/// The `{os, arch}` pair platforms are matched against.
///
/// Values use the label vocabulary of plugin manifests (`linux`, `darwin`,
/// `windows`; `amd64`, `arm64`, `386`, `arm`), not Rust's target names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPlatform {
    pub os: String,
    pub arch: String,
}

impl TargetPlatform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform of the running process, without overrides.
    pub fn host() -> Self {
        Self::new(
            os_label(std::env::consts::OS),
            arch_label(std::env::consts::ARCH),
        )
    }

    /// The host platform with `KUBEPLUG_OS` / `KUBEPLUG_ARCH` applied.
    pub fn from_loader(loader: &ConfigLoader) -> Self {
        let host = Self::host();
        Self {
            os: loader.get_os().unwrap_or(host.os),
            arch: loader.get_arch().unwrap_or(host.arch),
        }
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// Label set used for selector matching
    pub fn labels(&self) -> Labels {
        let mut labels = Labels::new();
        labels.insert("os".to_string(), self.os.clone());
        labels.insert("arch".to_string(), self.arch.clone());
        labels
    }
}

impl Default for TargetPlatform {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

fn os_label(os: &str) -> String {
    match os {
        "macos" => "darwin",
        other => other,
    }
    .to_string()
}

fn arch_label(arch: &str) -> String {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64le",
        other => other,
    }
    .to_string()
}
