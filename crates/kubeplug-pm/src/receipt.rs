//! Install receipts: what was installed, and from which index.

use std::io;
use std::path::Path;

use crate::index::{Plugin, Receipt, ReceiptStatus, SourceIndex, DEFAULT_INDEX_NAME};
use crate::{PluginError, Result};

/// Build a receipt for a plugin installed from `index_name`.
pub fn from_plugin(index_name: &str, plugin: &Plugin) -> Receipt {
    Receipt {
        plugin: plugin.clone(),
        status: ReceiptStatus {
            source: SourceIndex {
                name: index_name.to_string(),
            },
        },
    }
}

/// Write the receipt to `dest`. The parent directory must already exist.
pub fn store(receipt: &Receipt, dest: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(receipt)?;
    std::fs::write(dest, yaml)?;
    log::debug!("Stored receipt {}", dest.display());
    Ok(())
}

/// Read the receipt at `path`; `ReceiptNotFound` if there is none.
pub fn load(path: &Path) -> Result<Receipt> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PluginError::ReceiptNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_yaml::from_str(&content)?)
}

/// Load all receipts in `dir`, sorted by plugin name. A missing directory
/// holds no receipts.
pub fn load_all(dir: &Path) -> Result<Vec<Receipt>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut receipts = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
            receipts.push(load(&path)?);
        }
    }

    receipts.sort_by(|a, b| a.plugin.name().cmp(b.plugin.name()));
    Ok(receipts)
}

/// `name` for plugins from the default index, `index/name` otherwise.
pub fn canonical_name(receipt: &Receipt) -> String {
    let index = receipt.status.source.name.as_str();
    if index.is_empty() || index == DEFAULT_INDEX_NAME {
        receipt.plugin.name().to_string()
    } else {
        format!("{}/{}", index, receipt.plugin.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("foo.yaml");
        let receipt = from_plugin("default", &Plugin::new("foo", Vec::new()));

        store(&receipt, &path).unwrap();

        assert_eq!(load(&path).unwrap(), receipt);
    }

    #[test]
    fn test_load_missing_receipt() {
        let temp = TempDir::new().unwrap();

        let err = load(&temp.path().join("missing.yaml")).unwrap_err();

        assert!(matches!(err, PluginError::ReceiptNotFound { .. }));
    }

    #[test]
    fn test_store_requires_parent_directory() {
        let temp = TempDir::new().unwrap();
        let receipt = from_plugin("default", &Plugin::new("foo", Vec::new()));

        let err = store(&receipt, &temp.path().join("missing/foo.yaml")).unwrap_err();

        assert!(matches!(err, PluginError::Io(_)));
    }

    #[test]
    fn test_load_all() {
        let temp = TempDir::new().unwrap();
        store(&from_plugin("default", &Plugin::new("b", Vec::new())), &temp.path().join("b.yaml")).unwrap();
        store(&from_plugin("custom", &Plugin::new("a", Vec::new())), &temp.path().join("a.yaml")).unwrap();

        let names: Vec<String> = load_all(temp.path()).unwrap().iter().map(canonical_name).collect();

        assert_eq!(names, vec!["custom/a", "b"]);
        assert!(load_all(&temp.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_canonical_name() {
        let plugin = Plugin::new("foo", Vec::new());

        assert_eq!(canonical_name(&from_plugin("default", &plugin)), "foo");
        assert_eq!(canonical_name(&from_plugin("", &plugin)), "foo");
        assert_eq!(canonical_name(&from_plugin("custom", &plugin)), "custom/foo");
    }
}
