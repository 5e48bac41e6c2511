use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::DownloadError;

pub const DOWNLOAD_CHUNK_BYTES: usize = 1024 * 1024;

/// Error text for a non-2xx media response: the body when it is JSON or
/// plain text, otherwise a generic `HTTP <status>`.
pub fn rejection_message(status: u16, content_type: &str, body: &str) -> String {
    let lowered = content_type.to_ascii_lowercase();
    let readable = lowered.contains("json") || lowered.starts_with("text/plain");
    if readable && !body.trim().is_empty() {
        return body.to_string();
    }
    format!("HTTP {status}")
}

/// `false` means the payload is probably not a video; callers only warn.
pub fn is_expected_media_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    lowered.contains("video") || lowered.contains("octet-stream")
}

/// Streams `reader` to `destination` in fixed-size chunks through a `.part`
/// sibling that is renamed into place once complete. Returns the byte count
/// and the hex SHA-256 of the content.
pub fn stream_to_file(
    reader: &mut dyn Read,
    destination: &Path,
) -> Result<(u64, String), DownloadError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    let partial = partial_path(destination);
    let written = copy_chunks(reader, &partial);
    let (bytes, digest) = match written {
        Ok(result) => result,
        Err(err) => {
            let _ = fs::remove_file(&partial);
            return Err(err);
        }
    };
    if let Err(source) = fs::rename(&partial, destination) {
        let _ = fs::remove_file(&partial);
        return Err(io_error(destination, source));
    }
    Ok((bytes, digest))
}

fn copy_chunks(reader: &mut dyn Read, partial: &Path) -> Result<(u64, String), DownloadError> {
    let file = File::create(partial).map_err(|source| io_error(partial, source))?;
    let mut writer = BufWriter::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; DOWNLOAD_CHUNK_BYTES];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(DownloadError::Transport(err.to_string())),
        };
        hasher.update(&buffer[..read]);
        writer
            .write_all(&buffer[..read])
            .map_err(|source| io_error(partial, source))?;
        total += read as u64;
    }
    writer.flush().map_err(|source| io_error(partial, source))?;
    Ok((total, hex::encode(hasher.finalize())))
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn io_error(path: &Path, source: io::Error) -> DownloadError {
    DownloadError::Io {
        path: path.to_path_buf(),
        source,
    }
}
