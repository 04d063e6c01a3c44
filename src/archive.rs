use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::info;
use zip::ZipArchive;

use crate::app::ProgressSink;
use crate::domain::Outcome;
use crate::download::{CHUNK_SIZE, PROGRESS_INTERVAL, ProgressThrottle, remove_partial};
use crate::error::ReshakeError;

/// Decompress a single-entry gzip file, overwriting `destination`.
pub fn expand_gzip(
    archive: &Path,
    destination: &Path,
    sink: &dyn ProgressSink,
) -> Result<Outcome<PathBuf>, ReshakeError> {
    let input = File::open(archive).map_err(|err| {
        ReshakeError::Filesystem(format!("open gzip {}: {err}", archive.display()))
    })?;
    let mut decoder = GzDecoder::new(BufReader::new(input));
    let output = File::create(destination).map_err(|err| {
        ReshakeError::Filesystem(format!("create {}: {err}", destination.display()))
    })?;
    let mut writer = BufWriter::new(output);
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut written = 0u64;
    let mut throttle = ProgressThrottle::new(PROGRESS_INTERVAL);

    loop {
        if sink.is_canceled() {
            drop(writer);
            remove_partial(destination);
            info!(archive = %archive.display(), "decompression canceled");
            return Ok(Outcome::Canceled);
        }
        let read = match decoder.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                drop(writer);
                remove_partial(destination);
                return Err(ReshakeError::Archive(format!(
                    "gunzip {}: {err}",
                    archive.display()
                )));
            }
        };
        if let Err(err) = writer.write_all(&buffer[..read]) {
            drop(writer);
            remove_partial(destination);
            return Err(ReshakeError::Filesystem(err.to_string()));
        }
        written += read as u64;
        if throttle.ready() {
            // expanded size is unknown until the stream ends
            sink.progress(written, None);
        }
    }

    writer
        .flush()
        .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
    sink.progress(written, Some(written));
    Ok(Outcome::Done(destination.to_path_buf()))
}

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), ReshakeError> {
    let file = File::open(zip_path).map_err(|err| {
        ReshakeError::Filesystem(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive = ZipArchive::new(file).map_err(|err| ReshakeError::Archive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| ReshakeError::Archive(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(ReshakeError::Archive(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
        }
        let mut outfile = File::create(&entry_path)
            .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| ReshakeError::Archive(err.to_string()))?;
    }
    Ok(())
}

/// Read every file entry through its CRC check before anything is written.
/// Returns the number of file entries.
pub fn validate_zip(zip_path: &Path) -> Result<usize, ReshakeError> {
    let file = File::open(zip_path).map_err(|err| {
        ReshakeError::Filesystem(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive = ZipArchive::new(file).map_err(|err| ReshakeError::Archive(err.to_string()))?;

    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| ReshakeError::Archive(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| ReshakeError::Archive(format!("{name}: {err}")))?;
        files += 1;
    }
    info!(archive = %zip_path.display(), files, "zip archive verified");
    Ok(files)
}

/// Files below `root` whose name satisfies `accept`, sorted by path.
pub fn find_files(root: &Path, accept: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        if let Ok(entries) = fs::read_dir(&path) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(&accept)
                    .unwrap_or(false)
                {
                    out.push(path);
                }
            }
        }
    }
    out.sort();
    out
}
