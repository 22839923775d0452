#![cfg(unix)]

/// Integration tests for the install pipeline
///
/// These tests drive the public API end to end against archives built on
/// the fly and served from disk.
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kubeplug_pm::downloader::compute_sha256;
use kubeplug_pm::installer::DESCRIPTOR_FILE_NAME;
use kubeplug_pm::receipt;
use kubeplug_pm::{
    FileFetcher, FileOperation, HttpFetcher, InstallOptions, InstallOutcome, InstallPhase, Installer,
    LabelSelector, Paths, Platform, Plugin, PluginError, TargetPlatform, UpgradeOutcome,
};
use tempfile::TempDir;

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().unix_permissions(0o644);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn tar_gz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn write_archive(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

fn linux_plugin(name: &str, uri: &str, sha256: &str, files: Vec<FileOperation>, bin: &str) -> Plugin {
    Plugin::new(
        name,
        vec![
            Platform {
                uri: "https://example.com/darwin.zip".to_string(),
                sha256: "ffff".to_string(),
                selector: Some(LabelSelector::with_labels([("os", "darwin")])),
                ..Default::default()
            },
            Platform {
                uri: uri.to_string(),
                sha256: sha256.to_string(),
                selector: Some(LabelSelector::with_labels([("os", "linux"), ("arch", "amd64")])),
                files,
                bin: bin.to_string(),
                ..Default::default()
            },
        ],
    )
}

fn installer(root: &Path, archive: &Path) -> Installer {
    Installer::new(Paths::new(root), Arc::new(FileFetcher::new(archive)))
        .with_target(TargetPlatform::new("linux", "amd64"))
}

#[tokio::test]
async fn test_install_reinstall_uninstall() {
    let temp = TempDir::new().unwrap();
    let data = zip_bytes(&[
        ("ctx-v1/kubectl-ctx", b"#!/bin/sh\necho ctx\n"),
        ("ctx-v1/LICENSE", b"MIT"),
        ("ctx-v1/docs/usage.md", b"usage"),
    ]);
    let archive = write_archive(temp.path(), "ctx.zip", &data);
    let sha256 = compute_sha256(&data);
    let root = temp.path().join("root");
    let installer = installer(&root, &archive);
    let plugin = linux_plugin(
        "ctx",
        "https://example.com/ctx.zip",
        &sha256.to_uppercase(),
        vec![
            FileOperation::new("ctx-v1/kubectl-ctx", "."),
            FileOperation::new("ctx-v1/LICENSE", "."),
        ],
        "kubectl-ctx",
    );
    let paths = Paths::new(&root);

    let outcome = installer.install(&plugin, &InstallOptions::default()).await.unwrap();
    assert_eq!(outcome, InstallOutcome::Installed { version: sha256.clone() });

    let version_dir = paths.plugin_version_install_path("ctx", &sha256);
    assert!(version_dir.join("kubectl-ctx").is_file());
    assert!(version_dir.join("LICENSE").is_file());
    assert!(!version_dir.join("docs").exists());
    assert!(version_dir.join(DESCRIPTOR_FILE_NAME).is_file());

    let link = paths.bin_path().join("kubectl-ctx");
    let target = std::fs::read_link(&link).unwrap();
    assert_eq!(std::fs::read_to_string(&link).unwrap(), "#!/bin/sh\necho ctx\n");

    let stored = receipt::load(&paths.plugin_install_receipt_path("ctx")).unwrap();
    assert_eq!(stored.plugin, plugin);
    assert_eq!(receipt::canonical_name(&stored), "ctx");

    // Second install changes nothing
    let receipt_before = std::fs::read_to_string(paths.plugin_install_receipt_path("ctx")).unwrap();
    let outcome = installer.install(&plugin, &InstallOptions::default()).await.unwrap();
    assert_eq!(outcome, InstallOutcome::AlreadyInstalled { version: sha256.clone() });
    assert_eq!(std::fs::read_link(&link).unwrap(), target);
    assert_eq!(
        std::fs::read_to_string(paths.plugin_install_receipt_path("ctx")).unwrap(),
        receipt_before
    );

    // Forced reinstall of the same version swaps the tree in place
    let options = InstallOptions {
        force_reinstall: true,
        ..Default::default()
    };
    let outcome = installer.install(&plugin, &options).await.unwrap();
    assert_eq!(outcome, InstallOutcome::Installed { version: sha256.clone() });
    assert_eq!(installer.list_installed().unwrap().len(), 1);

    installer.uninstall("ctx").unwrap();
    assert!(link.symlink_metadata().is_err());
    assert!(!paths.plugin_install_path("ctx").exists());
    assert!(!paths.plugin_install_receipt_path("ctx").exists());
    assert!(installer.list_installed().unwrap().is_empty());
}

#[tokio::test]
async fn test_install_tar_gz_with_glob_over_file_url() {
    let temp = TempDir::new().unwrap();
    let data = tar_gz_bytes(&[
        ("release/bin/kubectl-tail", b"tail"),
        ("release/bin/.completion", b"complete"),
        ("release/README.md", b"readme"),
    ]);
    let archive = write_archive(temp.path(), "tail.tar.gz", &data);
    let uri = url::Url::from_file_path(&archive).unwrap().to_string();
    let root = temp.path().join("root");
    let installer = Installer::new(Paths::new(&root), Arc::new(HttpFetcher::new().unwrap()))
        .with_target(TargetPlatform::new("linux", "amd64"));
    let plugin = linux_plugin(
        "tail",
        &uri,
        &compute_sha256(&data),
        vec![FileOperation::new("release/bin/*", "bin")],
        "bin/kubectl-tail",
    );

    installer.install(&plugin, &InstallOptions::default()).await.unwrap();

    let paths = Paths::new(&root);
    let version_dir = paths.plugin_version_install_path("tail", &compute_sha256(&data));
    assert!(version_dir.join("bin/kubectl-tail").is_file());
    assert!(version_dir.join("bin/.completion").is_file());
    assert!(!version_dir.join("README.md").exists());
    assert_eq!(
        std::fs::read_to_string(paths.bin_path().join("kubectl-tail")).unwrap(),
        "tail"
    );
}

#[tokio::test]
async fn test_uninstall_refuses_regular_file_at_link() {
    let temp = TempDir::new().unwrap();
    let data = zip_bytes(&[("kubectl-foo", b"foo")]);
    let archive = write_archive(temp.path(), "foo.zip", &data);
    let root = temp.path().join("root");
    let installer = installer(&root, &archive);
    let plugin = linux_plugin("foo", "https://example.com/foo.zip", &compute_sha256(&data), Vec::new(), "");
    installer.install(&plugin, &InstallOptions::default()).await.unwrap();

    let link = Paths::new(&root).bin_path().join("kubectl-foo");
    std::fs::remove_file(&link).unwrap();
    std::fs::write(&link, "not a link").unwrap();

    let err = installer.uninstall("foo").unwrap_err();

    assert_eq!(err.phase(), Some(InstallPhase::Uninstalling));
    assert!(matches!(err.root(), PluginError::NotASymlink { .. }));
    assert_eq!(std::fs::read_to_string(&link).unwrap(), "not a link");
}

#[tokio::test]
async fn test_upgrade_switches_version_and_link() {
    let temp = TempDir::new().unwrap();
    let v1 = zip_bytes(&[("kubectl-foo", b"v1")]);
    let v2 = zip_bytes(&[("kubectl-foo", b"v2"), ("NOTES", b"new")]);
    let root = temp.path().join("root");
    let paths = Paths::new(&root);

    let archive = write_archive(temp.path(), "v1.zip", &v1);
    let plugin = linux_plugin("foo", "https://example.com/v1.zip", &compute_sha256(&v1), Vec::new(), "");
    installer(&root, &archive)
        .install(&plugin, &InstallOptions::default())
        .await
        .unwrap();

    let archive = write_archive(temp.path(), "v2.zip", &v2);
    let upgraded = linux_plugin("foo", "https://example.com/v2.zip", &compute_sha256(&v2), Vec::new(), "");
    let installer = installer(&root, &archive);

    let outcome = installer.upgrade(&upgraded, &InstallOptions::default()).await.unwrap();
    assert_eq!(
        outcome,
        UpgradeOutcome::Upgraded {
            from: compute_sha256(&v1),
            to: compute_sha256(&v2),
        }
    );
    assert!(!paths.plugin_version_install_path("foo", &compute_sha256(&v1)).exists());
    assert_eq!(std::fs::read_to_string(paths.bin_path().join("kubectl-foo")).unwrap(), "v2");

    let outcome = installer.upgrade(&upgraded, &InstallOptions::default()).await.unwrap();
    assert_eq!(
        outcome,
        UpgradeOutcome::AlreadyUpgraded {
            version: compute_sha256(&v2)
        }
    );
}

#[tokio::test]
async fn test_install_rejects_tampered_archive() {
    let temp = TempDir::new().unwrap();
    let data = zip_bytes(&[("kubectl-foo", b"foo")]);
    let archive = write_archive(temp.path(), "foo.zip", &data);
    let root = temp.path().join("root");
    let installer = installer(&root, &archive);
    let plugin = linux_plugin("foo", "https://example.com/foo.zip", &compute_sha256(b"other"), Vec::new(), "");

    let err = installer.install(&plugin, &InstallOptions::default()).await.unwrap_err();

    assert!(matches!(err.root(), PluginError::VerificationFailed { .. }));
    assert!(installer.list_installed().unwrap().is_empty());
    assert!(Paths::new(&root).bin_path().join("kubectl-foo").symlink_metadata().is_err());
}
