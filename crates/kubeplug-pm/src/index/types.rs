//! Manifest and receipt data types.

use serde::{Deserialize, Serialize};

use super::selector::LabelSelector;

pub const CURRENT_API_VERSION: &str = "kubeplug.dev/v1alpha2";
pub const PLUGIN_KIND: &str = "Plugin";

/// A plugin manifest as read from an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_kind")]
    pub kind: String,

    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PluginSpec,
}

fn default_api_version() -> String {
    CURRENT_API_VERSION.to_string()
}

fn default_kind() -> String {
    PLUGIN_KIND.to_string()
}

impl Plugin {
    /// Create a plugin with the given name and platforms.
    pub fn new(name: impl Into<String>, platforms: Vec<Platform>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta { name: name.into() },
            spec: PluginSpec {
                platforms,
                ..Default::default()
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homepage: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub short_description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caveats: String,

    #[serde(default)]
    pub platforms: Vec<Platform>,
}

/// One OS/architecture specific variant of a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Unversioned reference used for HEAD installs
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub head: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sha256: String,

    /// `None` matches no environment, an empty selector matches every one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileOperation>,

    /// Entry point relative to the install directory
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bin: String,
}

/// Maps a path (or glob) in the unpacked archive to the install directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOperation {
    pub from: String,

    #[serde(default)]
    pub to: String,
}

impl FileOperation {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Persisted proof of an installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub plugin: Plugin,

    #[serde(default)]
    pub status: ReceiptStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptStatus {
    pub source: SourceIndex,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIndex {
    pub name: String,
}
