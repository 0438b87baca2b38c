//! Packs a flat directory of downloaded files into one zip.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::FileOptions;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("source directory {} does not exist", .0.display())]
    MissingSource(PathBuf),
    #[error("io error at {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Zips every regular file directly inside `source_dir` into `dest`, entry
/// name = file name only. Returns the number of entries.
///
/// The archive is assembled under `<dest>.part` and renamed at the end, so a
/// crash never leaves a `dest` that looks finished.
pub fn build_archive(source_dir: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    if !source_dir.is_dir() {
        return Err(ArchiveError::MissingSource(source_dir.to_path_buf()));
    }

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(source_dir).map_err(io_at(source_dir))? {
        let entry = entry.map_err(io_at(source_dir))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(io_at(&path))?;
        if !meta.is_file() {
            continue;
        }
        files.push((entry.file_name().to_string_lossy().into_owned(), path));
    }
    files.sort();

    let part = part_path(dest);
    let result = write_zip(&files, &part);
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result?;

    fs::rename(&part, dest).map_err(io_at(dest))?;
    info!("wrote archive {} ({} files)", dest.display(), files.len());
    Ok(files.len())
}

fn write_zip(files: &[(String, PathBuf)], part: &Path) -> Result<(), ArchiveError> {
    let out = File::create(part).map_err(io_at(part))?;
    let mut zip = ZipWriter::new(out);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, path) in files {
        debug!("adding {}", name);
        zip.start_file(name.as_str(), options)?;
        let mut f = File::open(path).map_err(io_at(path))?;
        io::copy(&mut f, &mut zip).map_err(io_at(path))?;
    }

    let mut out = zip.finish()?;
    out.flush().map_err(io_at(part))?;
    Ok(())
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn entries(zip_path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(zip_path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn flat_entries_named_by_file_name() {
        let src = TempDir::new().unwrap();
        fs::write(src.path().join("a.jpg"), b"aaaa").unwrap();
        fs::write(src.path().join("b.png"), b"bb").unwrap();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("Book.zip");

        let count = build_archive(src.path(), &dest).unwrap();

        assert_eq!(count, 2);
        assert_eq!(entries(&dest), vec!["a.jpg", "b.png"]);
        assert!(!part_path(&dest).exists());

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut body = Vec::new();
        archive.by_name("a.jpg").unwrap().read_to_end(&mut body).unwrap();
        assert_eq!(body, b"aaaa");
    }

    #[test]
    fn nested_directories_are_not_descended() {
        let src = TempDir::new().unwrap();
        fs::write(src.path().join("a.jpg"), b"a").unwrap();
        fs::create_dir(src.path().join("nested")).unwrap();
        fs::write(src.path().join("nested").join("c.jpg"), b"c").unwrap();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("Book.zip");

        build_archive(src.path(), &dest).unwrap();
        assert_eq!(entries(&dest), vec!["a.jpg"]);
    }

    #[test]
    fn empty_directory_gives_empty_archive() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("Empty.zip");

        assert_eq!(build_archive(src.path(), &dest).unwrap(), 0);
        assert!(entries(&dest).is_empty());
    }

    #[test]
    fn missing_source_is_reported() {
        let out = TempDir::new().unwrap();
        let err = build_archive(&out.path().join("nope"), &out.path().join("x.zip")).unwrap_err();
        assert!(matches!(err, ArchiveError::MissingSource(_)));
    }

    #[test]
    fn uncreatable_destination_is_io_error() {
        let src = TempDir::new().unwrap();
        fs::write(src.path().join("a.jpg"), b"a").unwrap();
        let dest = src.path().join("no-such-dir").join("x.zip");

        let err = build_archive(src.path(), &dest).unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));
    }
}
