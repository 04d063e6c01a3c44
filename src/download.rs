use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::app::ProgressSink;
use crate::domain::{Credentials, Outcome};
use crate::error::ReshakeError;
use crate::remote::RemoteClient;

pub const CHUNK_SIZE: usize = 1024;
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Limits progress callbacks to one per interval.
pub(crate) struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub(crate) fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Stream `url` into `destination`. A canceled download leaves no file behind.
pub fn download<C: RemoteClient + ?Sized>(
    client: &C,
    url: &str,
    destination: &Path,
    declared_size: Option<u64>,
    credentials: Option<&Credentials>,
    sink: &dyn ProgressSink,
) -> Result<Outcome<PathBuf>, ReshakeError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
    }

    let body = client.open(url, credentials)?;
    let total = body.content_length.or(declared_size);
    if body.content_length.is_none() {
        debug!(%url, ?declared_size, "server did not report a content length");
    }

    let file = File::create(destination).map_err(|err| {
        ReshakeError::Filesystem(format!("create {}: {err}", destination.display()))
    })?;
    let mut writer = BufWriter::new(file);
    let mut reader = body.reader;
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut written = 0u64;
    let mut throttle = ProgressThrottle::new(PROGRESS_INTERVAL);

    loop {
        if sink.is_canceled() {
            drop(writer);
            remove_partial(destination);
            info!(%url, "download canceled");
            return Ok(Outcome::Canceled);
        }
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                drop(writer);
                remove_partial(destination);
                return Err(ReshakeError::Http(format!("reading {url}: {err}")));
            }
        };
        if let Err(err) = writer.write_all(&buffer[..read]) {
            drop(writer);
            remove_partial(destination);
            return Err(ReshakeError::Filesystem(err.to_string()));
        }
        written += read as u64;
        if throttle.ready() {
            sink.progress(written, total);
        }
    }

    writer
        .flush()
        .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
    sink.progress(written, total);
    info!(%url, bytes = written, "download complete");
    Ok(Outcome::Done(destination.to_path_buf()))
}

pub(crate) fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(err) = fs::remove_file(path) {
            debug!(path = %path.display(), error = %err, "failed to remove partial output");
        }
    }
}
