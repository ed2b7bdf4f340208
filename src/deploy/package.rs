// ABOUTME: Source packaging: turns path references and inline files into one zip archive.
// ABOUTME: Directories are flattened into the archive root; inline files land under their own name.

use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::task::spawn_blocking;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::diagnostics::{Diagnostics, Warning};

use super::error::PackageError;

/// One input to the packager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileItem {
    /// A file or directory on the local filesystem.
    Path(PathBuf),
    /// File content supplied directly by the caller.
    Inline { name: String, content: String },
}

impl FileItem {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        FileItem::Path(path.into())
    }

    pub fn inline(name: impl Into<String>, content: impl Into<String>) -> Self {
        FileItem::Inline {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Final path component, used for Dockerfile detection.
    fn base_name(&self) -> Option<String> {
        let path = match self {
            FileItem::Path(path) => path.as_path(),
            FileItem::Inline { name, .. } => Path::new(name),
        };
        path.file_name().map(|n| n.to_string_lossy().into_owned())
    }
}

/// The packaged archive plus anything skipped along the way.
#[derive(Debug)]
pub struct PackagedSource {
    pub archive: Bytes,
    /// Number of file entries written.
    pub files: usize,
    pub diagnostics: Diagnostics,
}

/// Rewrite a `/c` drive prefix to its `/mnt/c` mount point.
///
/// Only the whole `/c` component is rewritten; `/code` is left alone.
pub fn normalize_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw == "/c" || raw.starts_with("/c/") {
        PathBuf::from(format!("/mnt{raw}"))
    } else {
        path.to_path_buf()
    }
}

/// Whether the inputs contain a Dockerfile.
///
/// A lone directory is searched for `Dockerfile` or `dockerfile`; otherwise any
/// item whose base name is `dockerfile` in any case counts.
pub fn detect_dockerfile(items: &[FileItem]) -> bool {
    if let [FileItem::Path(path)] = items {
        let dir = normalize_path(path);
        if dir.is_dir() {
            return dir.join("Dockerfile").exists() || dir.join("dockerfile").exists();
        }
    }

    items.iter().any(|item| {
        item.base_name()
            .is_some_and(|name| name.eq_ignore_ascii_case("dockerfile"))
    })
}

/// Package `items` into a zip archive with maximum compression.
///
/// # Errors
///
/// Returns `PackageError::NotFound` for a missing path, `PackageError::InvalidFile`
/// for an inline item without a name or content, and `PackageError::Io` for
/// read failures other than entries vanishing mid-walk.
pub async fn package_files(items: Vec<FileItem>) -> Result<PackagedSource, PackageError> {
    spawn_blocking(move || package_files_sync(&items))
        .await
        .map_err(|e| PackageError::Task(e.to_string()))?
}

fn package_files_sync(items: &[FileItem]) -> Result<PackagedSource, PackageError> {
    let mut archive = Archive::new();

    for item in items {
        match item {
            FileItem::Path(path) => {
                let path = normalize_path(path);
                let metadata = match fs::metadata(&path) {
                    Ok(metadata) => metadata,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        return Err(PackageError::NotFound(path));
                    }
                    Err(source) => return Err(PackageError::Io { path, source }),
                };

                if metadata.is_dir() {
                    archive.add_tree(&path, "")?;
                } else {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .ok_or_else(|| {
                            PackageError::InvalidFile(format!("{} has no file name", path.display()))
                        })?;
                    archive.add_file(&path, &name)?;
                }
            }
            FileItem::Inline { name, content } => {
                if name.trim().is_empty() {
                    return Err(PackageError::InvalidFile(
                        "inline file is missing a name".to_string(),
                    ));
                }
                if content.is_empty() {
                    return Err(PackageError::InvalidFile(format!(
                        "inline file {name} has no content"
                    )));
                }
                archive.add_bytes(name, content.as_bytes())?;
            }
        }
    }

    archive.finish()
}

/// Zip writer plus the bookkeeping needed to report what was packed.
struct Archive {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    files: usize,
    diagnostics: Diagnostics,
}

impl Archive {
    fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(9)),
            files: 0,
            diagnostics: Diagnostics::default(),
        }
    }

    fn add_bytes(&mut self, name: &str, content: &[u8]) -> Result<(), PackageError> {
        self.writer.start_file(name, self.options)?;
        self.writer
            .write_all(content)
            .map_err(|source| PackageError::Io {
                path: PathBuf::from(name),
                source,
            })?;
        self.files += 1;
        Ok(())
    }

    fn add_file(&mut self, path: &Path, name: &str) -> Result<(), PackageError> {
        let mut file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.skip(path, &e);
                return Ok(());
            }
            Err(source) => {
                return Err(PackageError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        self.writer.start_file(name, self.options)?;
        io::copy(&mut file, &mut self.writer).map_err(|source| PackageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.files += 1;
        Ok(())
    }

    /// Add the contents of `dir` under `prefix` (empty for the archive root).
    fn add_tree(&mut self, dir: &Path, prefix: &str) -> Result<(), PackageError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.skip(dir, &e);
                return Ok(());
            }
            Err(source) => {
                return Err(PackageError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut paths = entries
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()
            .map_err(|source| PackageError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        paths.sort();

        for path in paths {
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let name = format!("{prefix}{}", file_name.to_string_lossy());

            let is_link = fs::symlink_metadata(&path)
                .map(|metadata| metadata.file_type().is_symlink())
                .unwrap_or(false);

            // File links are followed; a link that cannot be resolved is skipped.
            match fs::metadata(&path) {
                Ok(metadata) if metadata.is_dir() && is_link => {
                    self.diagnostics.warn(Warning::skipped_entry(format!(
                        "skipped {} while packaging: directory links are not followed",
                        path.display()
                    )));
                }
                Ok(metadata) if metadata.is_dir() => {
                    self.writer
                        .add_directory(format!("{name}/"), self.options)?;
                    self.add_tree(&path, &format!("{name}/"))?;
                }
                Ok(_) => self.add_file(&path, &name)?,
                Err(e) if is_link || e.kind() == io::ErrorKind::NotFound => self.skip(&path, &e),
                Err(source) => return Err(PackageError::Io { path, source }),
            }
        }

        Ok(())
    }

    fn skip(&mut self, path: &Path, err: &io::Error) {
        self.diagnostics.warn(Warning::skipped_entry(format!(
            "skipped {} while packaging: {err}",
            path.display()
        )));
    }

    fn finish(self) -> Result<PackagedSource, PackageError> {
        let Archive {
            writer,
            files,
            diagnostics,
            ..
        } = self;
        let archive = writer.finish()?.into_inner();
        debug!(files, bytes = archive.len(), "source archive finalized");

        Ok(PackagedSource {
            archive: Bytes::from(archive),
            files,
            diagnostics,
        })
    }
}
