//! Post-copy integrity checks

use crate::error::{MoveError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

const BUFFER_SIZE: usize = 1024 * 1024;

/// Prefix for reading destinations that only the elevated copy can see
const ELEVATED_READ: &[&str] = &["sudo", "-n"];

/// How a finished copy is checked against its source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// Destination size must equal source size
    #[default]
    Size,
    /// Size plus an XXH3-128 content hash of both files
    Checksum,
}

/// Streaming XXH3-128 of a file, as 32 hex chars
pub fn file_checksum(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = xxhash_rust::xxh3::Xxh3::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let hash = hasher.digest128();
    tracing::debug!(
        "Hashed {} ({:.2} MB) = {:032x}",
        path.display(),
        size as f64 / (1024.0 * 1024.0),
        hash
    );
    Ok(format!("{hash:032x}"))
}

fn failed(path: &Path, reason: impl Into<String>) -> MoveError {
    MoveError::VerificationFailed {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_command(prefix: &[&str], tail: &[&str], path: &Path) -> Result<Command> {
    let (program, leading) = prefix
        .split_first()
        .ok_or_else(|| failed(path, "empty read command"))?;
    let mut cmd = Command::new(program);
    cmd.args(leading)
        .args(tail)
        .arg(path.as_os_str())
        .stdin(Stdio::null())
        .kill_on_drop(true);
    Ok(cmd)
}

/// Size of `path` as reported by `stat` run under `prefix`
async fn privileged_size(prefix: &[&str], path: &Path) -> Result<u64> {
    let output = read_command(prefix, &["stat", "-c", "%s"], path)?
        .output()
        .await
        .map_err(|e| failed(path, format!("cannot run stat: {e}")))?;

    if !output.status.success() {
        return Err(failed(
            path,
            format!(
                "cannot stat destination: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    text.trim()
        .parse()
        .map_err(|_| failed(path, format!("unexpected stat output '{}'", text.trim())))
}

/// XXH3-128 of `path` streamed from `cat` run under `prefix`
async fn privileged_checksum(prefix: &[&str], path: &Path) -> Result<String> {
    let mut child = read_command(prefix, &["cat", "--"], path)?
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| failed(path, format!("cannot run cat: {e}")))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| failed(path, "cat output was not captured"))?;

    let mut hasher = xxhash_rust::xxh3::Xxh3::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let read = stdout
            .read(&mut buffer)
            .await
            .map_err(|e| failed(path, format!("cannot hash: {e}")))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let status = child
        .wait()
        .await
        .map_err(|e| failed(path, format!("cannot hash: {e}")))?;
    if !status.success() {
        return Err(failed(path, format!("cannot hash: cat exited with {status}")));
    }
    Ok(format!("{:032x}", hasher.digest128()))
}

fn denied(e: &io::Error, elevated: bool) -> bool {
    elevated && e.kind() == io::ErrorKind::PermissionDenied
}

async fn destination_size(destination: &Path, elevated: bool) -> Result<u64> {
    match tokio::fs::metadata(destination).await {
        Ok(metadata) => Ok(metadata.len()),
        Err(e) if denied(&e, elevated) => privileged_size(ELEVATED_READ, destination).await,
        Err(e) => Err(failed(destination, format!("cannot stat destination: {e}"))),
    }
}

async fn checksum(path: &Path, elevated: bool) -> Result<String> {
    let owned: PathBuf = path.to_path_buf();
    let hashed = tokio::task::spawn_blocking(move || file_checksum(&owned))
        .await
        .map_err(|e| failed(path, format!("hash task failed: {e}")))?;

    match hashed {
        Ok(hash) => Ok(hash),
        Err(e) if denied(&e, elevated) => privileged_checksum(ELEVATED_READ, path).await,
        Err(e) => Err(failed(path, format!("cannot hash: {e}"))),
    }
}

/// Check `destination` against `source`
///
/// With `elevated` set, a destination the current user may not read is
/// measured through `sudo -n`, the same way the copy tool wrote it.
pub async fn verify_copy(
    source: &Path,
    destination: &Path,
    verification: Verification,
    elevated: bool,
) -> Result<()> {
    let source_size = tokio::fs::metadata(source)
        .await
        .map_err(|e| failed(source, format!("cannot stat source: {e}")))?
        .len();
    let dest_size = destination_size(destination, elevated).await?;

    if source_size != dest_size {
        return Err(failed(
            destination,
            format!("size mismatch: source {source_size} bytes, destination {dest_size} bytes"),
        ));
    }

    if verification == Verification::Checksum {
        let src_hash = checksum(source, false).await?;
        let dst_hash = checksum(destination, elevated).await?;

        if src_hash != dst_hash {
            return Err(failed(
                destination,
                format!("checksum mismatch: source {src_hash}, destination {dst_hash}"),
            ));
        }
    }

    tracing::debug!("Verified {} ({} bytes)", destination.display(), dest_size);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_checksum_is_stable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.bin");
        std::fs::write(&path, b"Hello, World!").unwrap();

        let hash = file_checksum(&path).unwrap();
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, file_checksum(&path).unwrap());
    }

    #[test]
    fn test_checksum_spans_buffers() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.bin");
        let b = temp.path().join("b.bin");
        let mut data = vec![7u8; BUFFER_SIZE * 2 + 17];
        std::fs::write(&a, &data).unwrap();
        data[BUFFER_SIZE + 3] = 8;
        std::fs::write(&b, &data).unwrap();

        assert_ne!(file_checksum(&a).unwrap(), file_checksum(&b).unwrap());
    }

    #[tokio::test]
    async fn test_verify_size() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.mkv");
        let dst = temp.path().join("dst.mkv");
        std::fs::write(&src, b"0123456789").unwrap();
        std::fs::write(&dst, b"0123456789").unwrap();
        verify_copy(&src, &dst, Verification::Size, false).await.unwrap();

        std::fs::write(&dst, b"01234").unwrap();
        let err = verify_copy(&src, &dst, Verification::Size, false).await.unwrap_err();
        assert!(matches!(err, MoveError::VerificationFailed { .. }));
    }

    #[tokio::test]
    async fn test_verify_checksum_catches_same_size_corruption() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.mkv");
        let dst = temp.path().join("dst.mkv");
        std::fs::write(&src, b"0123456789").unwrap();
        std::fs::write(&dst, b"0123456780").unwrap();

        verify_copy(&src, &dst, Verification::Size, false).await.unwrap();
        let err = verify_copy(&src, &dst, Verification::Checksum, false).await.unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[tokio::test]
    async fn test_verify_missing_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.mkv");
        std::fs::write(&src, b"x").unwrap();

        assert!(
            verify_copy(&src, &temp.path().join("missing.mkv"), Verification::Size, false)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_privileged_reads_match_direct_reads() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Movie (2021).mkv");
        std::fs::write(&path, vec![3u8; BUFFER_SIZE + 5]).unwrap();

        // `env` stands in for `sudo -n`: same argv shape, no privileges needed
        let size = privileged_size(&["env"], &path).await.unwrap();
        assert_eq!(size, (BUFFER_SIZE + 5) as u64);

        let hash = privileged_checksum(&["env"], &path).await.unwrap();
        assert_eq!(hash, file_checksum(&path).unwrap());
    }

    #[tokio::test]
    async fn test_privileged_size_of_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = privileged_size(&["env"], &temp.path().join("missing.mkv"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot stat destination"));
    }

    #[test]
    fn test_unelevated_denial_is_not_retried() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(denied(&err, true));
        assert!(!denied(&err, false));
        assert!(!denied(&io::Error::new(io::ErrorKind::NotFound, "gone"), true));
    }
}
