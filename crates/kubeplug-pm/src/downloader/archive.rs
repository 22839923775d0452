//! Archive extraction (zip, tar.gz).

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::util::{join_within, Cancellation};
use crate::{PluginError, Result};

/// Number of leading bytes inspected by [`ContentType::sniff`].
pub const SNIFF_LEN: usize = 512;

/// Archive type detected from content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Zip,
    Gzip,
    Unknown,
}

impl ContentType {
    /// Detect the content type from magic numbers in the first bytes.
    pub fn sniff(data: &[u8]) -> Self {
        let head = &data[..data.len().min(SNIFF_LEN)];

        if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
            ContentType::Zip
        } else if head.starts_with(&[0x1f, 0x8b]) {
            ContentType::Gzip
        } else {
            ContentType::Unknown
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ContentType::Zip => "application/zip",
            ContentType::Gzip => "application/x-gzip",
            ContentType::Unknown => "application/octet-stream",
        }
    }
}

/// Unpacks one kind of archive.
pub trait Extractor: Send + Sync {
    /// Unpack `data` into the existing directory `dest`.
    fn extract(&self, data: &[u8], dest: &Path, cancel: &Cancellation) -> Result<()>;
}

/// The extractors registered by default, keyed by sniffed content type
pub fn default_extractors() -> HashMap<ContentType, Box<dyn Extractor>> {
    let mut extractors: HashMap<ContentType, Box<dyn Extractor>> = HashMap::new();
    extractors.insert(ContentType::Zip, Box::new(ZipExtractor));
    extractors.insert(ContentType::Gzip, Box::new(TarGzExtractor));
    extractors
}

/// Resolve an archive entry name below `dest`, rejecting escapes.
fn entry_destination(dest: &Path, name: &str) -> Result<PathBuf> {
    join_within(dest, Path::new(name)).ok_or_else(|| PluginError::ExtractionPathEscape {
        entry: name.to_string(),
    })
}

fn extraction_failed(context: &str, err: impl std::fmt::Display) -> PluginError {
    PluginError::ExtractionFailed(format!("{}: {}", context, err))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o777))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

enum Created {
    File(PathBuf),
    Dir(PathBuf),
}

/// Records everything an extraction creates and removes it again on drop
/// unless [`ExtractionGuard::commit`] was called.
struct ExtractionGuard {
    created: Vec<Created>,
    committed: bool,
}

impl ExtractionGuard {
    fn new() -> Self {
        Self {
            created: Vec::new(),
            committed: false,
        }
    }

    fn create_dir_all(&mut self, path: &Path) -> io::Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(path);
        while let Some(dir) = current {
            if dir.exists() {
                break;
            }
            missing.push(dir.to_path_buf());
            current = dir.parent();
        }

        for dir in missing.into_iter().rev() {
            match std::fs::create_dir(&dir) {
                Ok(()) => self.created.push(Created::Dir(dir)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn create_file(&mut self, path: &Path) -> io::Result<File> {
        let existed = path.exists();
        let file = File::create(path)?;
        if !existed {
            self.created.push(Created::File(path.to_path_buf()));
        }
        Ok(file)
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ExtractionGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for created in self.created.iter().rev() {
            let result = match created {
                Created::File(path) => std::fs::remove_file(path),
                Created::Dir(path) => std::fs::remove_dir(path),
            };
            if let Err(e) = result {
                log::warn!("Failed to clean up partial extraction: {}", e);
            }
        }
    }
}

/// Extracts zip archives
#[derive(Debug, Clone, Default)]
pub struct ZipExtractor;

impl Extractor for ZipExtractor {
    fn extract(&self, data: &[u8], dest: &Path, cancel: &Cancellation) -> Result<()> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| extraction_failed("failed to open zip", e))?;

        // The central directory lists every entry up front, so escapes are
        // rejected before anything is written.
        let mut targets = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let name = archive
                .name_for_index(i)
                .ok_or_else(|| extraction_failed("failed to read zip entry", i))?;
            targets.push(entry_destination(dest, name)?);
        }

        let mut guard = ExtractionGuard::new();

        for (i, outpath) in targets.iter().enumerate() {
            cancel.check()?;

            let mut file = archive
                .by_index(i)
                .map_err(|e| extraction_failed("failed to read zip entry", e))?;

            if file.is_dir() {
                guard.create_dir_all(outpath)?;
                continue;
            }
            if outpath.as_path() == dest {
                continue;
            }

            if let Some(parent) = outpath.parent() {
                guard.create_dir_all(parent)?;
            }
            log::trace!("Extracting {}", outpath.display());

            let mut outfile = guard.create_file(outpath)?;
            io::copy(&mut file, &mut outfile)?;

            if let Some(mode) = file.unix_mode() {
                set_mode(outpath, mode)?;
            }
        }

        guard.commit();
        Ok(())
    }
}

/// Extracts gzip compressed tar archives
#[derive(Debug, Clone, Default)]
pub struct TarGzExtractor;

impl Extractor for TarGzExtractor {
    fn extract(&self, data: &[u8], dest: &Path, cancel: &Cancellation) -> Result<()> {
        let mut archive = tar::Archive::new(GzDecoder::new(data));
        let mut guard = ExtractionGuard::new();

        let entries = archive
            .entries()
            .map_err(|e| extraction_failed("failed to read tar", e))?;

        for entry in entries {
            cancel.check()?;

            let mut entry = entry.map_err(|e| extraction_failed("failed to read tar entry", e))?;
            let name = entry
                .path()
                .map_err(|e| extraction_failed("invalid path in tar", e))?
                .to_string_lossy()
                .into_owned();
            let outpath = entry_destination(dest, &name)?;
            let entry_type = entry.header().entry_type();

            if entry_type.is_dir() {
                guard.create_dir_all(&outpath)?;
            } else if entry_type.is_file() {
                if outpath == dest {
                    continue;
                }
                if let Some(parent) = outpath.parent() {
                    guard.create_dir_all(parent)?;
                }
                log::trace!("Extracting {}", outpath.display());

                let mut outfile = guard.create_file(&outpath)?;
                io::copy(&mut entry, &mut outfile)?;

                let mode = entry
                    .header()
                    .mode()
                    .map_err(|e| extraction_failed("invalid mode in tar", e))?;
                set_mode(&outpath, mode)?;
            } else if entry_type.is_pax_global_extensions() {
                continue;
            } else {
                return Err(PluginError::ExtractionFailed(format!(
                    "unsupported tar entry type {:?} for {}",
                    entry_type, name
                )));
            }
        }

        guard.commit();
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    /// Build a zip archive in memory; names ending in `/` become directories.
    pub(crate) fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().unix_permissions(0o755);

        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content).unwrap();
            }
        }

        writer.finish().unwrap().into_inner()
    }

    /// Build a tar.gz archive in memory; names ending in `/` become directories.
    pub(crate) fn tar_gz_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            if name.ends_with('/') {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, name, io::empty()).unwrap();
            } else {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(0o755);
                header.set_size(content.len() as u64);
                builder.append_data(&mut header, name, *content).unwrap();
            }
        }

        builder.into_inner().unwrap().finish().unwrap()
    }

    /// Lists files below `root` prefixed with `/`, directories get a trailing `/`.
    pub(crate) fn collect_files(root: &Path) -> Vec<String> {
        walkdir::WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| {
                let entry = entry.unwrap();
                let relative = entry.path().strip_prefix(root).unwrap();
                let mut name = format!("/{}", relative.to_string_lossy().replace('\\', "/"));
                if entry.file_type().is_dir() {
                    name.push('/');
                }
                name
            })
            .collect()
    }

    #[test]
    fn test_sniff_content_type() {
        assert_eq!(ContentType::sniff(&zip_archive(&[("foo", b"x")])), ContentType::Zip);
        assert_eq!(ContentType::sniff(&tar_gz_archive(&[("foo", b"x")])), ContentType::Gzip);
        assert_eq!(ContentType::sniff(b"\x7fELF\x02\x01\x01"), ContentType::Unknown);
        assert_eq!(ContentType::sniff(b"#!/bin/bash\necho hi\n"), ContentType::Unknown);
        assert_eq!(ContentType::sniff(b""), ContentType::Unknown);
        assert_eq!(ContentType::Gzip.mime_type(), "application/x-gzip");
    }

    #[test]
    fn test_extract_zip_with_directory() {
        let dest = TempDir::new().unwrap();
        let data = zip_archive(&[("test/", b""), ("test/foo", b"foo")]);

        ZipExtractor.extract(&data, dest.path(), &Cancellation::new()).unwrap();

        assert_eq!(collect_files(dest.path()), vec!["/test/", "/test/foo"]);
    }

    #[test]
    fn test_extract_zip_without_directory() {
        let dest = TempDir::new().unwrap();
        let data = zip_archive(&[("foo", b"foo")]);

        ZipExtractor.extract(&data, dest.path(), &Cancellation::new()).unwrap();

        assert_eq!(collect_files(dest.path()), vec!["/foo"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_zip_preserves_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dest = TempDir::new().unwrap();
        let data = zip_archive(&[("bin/tool", b"#!/bin/sh\n")]);

        ZipExtractor.extract(&data, dest.path(), &Cancellation::new()).unwrap();

        let mode = std::fs::metadata(dest.path().join("bin/tool")).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn test_extract_zip_rejects_path_escape() {
        let outer = TempDir::new().unwrap();
        let dest = outer.path().join("a").join("b");
        std::fs::create_dir_all(&dest).unwrap();
        let data = zip_archive(&[("ok", b"fine"), ("../../evil", b"evil")]);

        let err = ZipExtractor.extract(&data, &dest, &Cancellation::new()).unwrap_err();

        assert!(matches!(err, PluginError::ExtractionPathEscape { .. }));
        assert!(!outer.path().join("evil").exists());
        assert!(collect_files(&dest).is_empty());
    }

    #[test]
    fn test_extract_tar_gz() {
        let cases: Vec<(Vec<u8>, Vec<&str>)> = vec![
            (tar_gz_archive(&[("foo", b"foo")]), vec!["/foo"]),
            (
                tar_gz_archive(&[("test/", b""), ("test/foo", b"foo")]),
                vec!["/test/", "/test/foo"],
            ),
            (tar_gz_archive(&[("test/foo", b"foo")]), vec!["/test/", "/test/foo"]),
        ];

        for (data, expected) in cases {
            let dest = TempDir::new().unwrap();
            TarGzExtractor.extract(&data, dest.path(), &Cancellation::new()).unwrap();
            assert_eq!(collect_files(dest.path()), expected);
        }
    }

    #[test]
    fn test_extract_tar_gz_rejects_path_escape_and_cleans_up() {
        let outer = TempDir::new().unwrap();
        let dest = outer.path().join("a").join("b");
        std::fs::create_dir_all(&dest).unwrap();

        // tar::Builder refuses `..`, so patch the name into a raw header.
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut ok = tar::Header::new_gnu();
        ok.set_size(2);
        ok.set_mode(0o644);
        builder.append_data(&mut ok, "dir/ok", &b"ok"[..]).unwrap();
        let mut evil = tar::Header::new_old();
        evil.as_old_mut().name[..10].copy_from_slice(b"../../evil");
        evil.set_size(4);
        evil.set_mode(0o644);
        evil.set_entry_type(tar::EntryType::Regular);
        evil.set_cksum();
        builder.append(&evil, &b"evil"[..]).unwrap();
        let data = builder.into_inner().unwrap().finish().unwrap();

        let err = TarGzExtractor.extract(&data, &dest, &Cancellation::new()).unwrap_err();

        assert!(matches!(err, PluginError::ExtractionPathEscape { .. }));
        assert!(!outer.path().join("evil").exists());
        assert!(collect_files(&dest).is_empty());
    }

    #[test]
    fn test_extract_rejects_corrupt_archive() {
        let dest = TempDir::new().unwrap();
        let err = ZipExtractor.extract(b"PK\x03\x04garbage", dest.path(), &Cancellation::new()).unwrap_err();
        assert!(matches!(err, PluginError::ExtractionFailed(_)));
    }

    #[test]
    fn test_extract_stops_when_cancelled() {
        let dest = TempDir::new().unwrap();
        let data = zip_archive(&[("foo", b"foo")]);
        let cancel = Cancellation::new();
        cancel.cancel();

        let err = ZipExtractor.extract(&data, dest.path(), &cancel).unwrap_err();

        assert!(matches!(err, PluginError::Cancelled));
        assert!(collect_files(dest.path()).is_empty());
    }
}
