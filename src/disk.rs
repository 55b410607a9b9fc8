//! Free-space queries, abstracted for tests

use std::io;
use std::path::Path;

/// Trait for disk space queries
///
/// Allows different implementations for production (real disk) and testing (mock)
pub trait DiskOperations: Send + Sync {
    /// Bytes available to unprivileged writers on the filesystem holding `path`
    fn available_space(&self, path: &Path) -> io::Result<u64>;
}

/// Real disk operations using fs2
pub struct RealDisk;

impl RealDisk {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for RealDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskOperations for RealDisk {
    fn available_space(&self, path: &Path) -> io::Result<u64> {
        fs2::available_space(nearest_existing(path))
    }
}

/// `path` or its closest ancestor that exists
///
/// Library roots and season directories are often created by the move itself.
pub fn nearest_existing(path: &Path) -> &Path {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .unwrap_or(path)
}

/// Mock disk operations for testing
#[cfg(test)]
pub struct MockDisk {
    free: Option<u64>,
}

#[cfg(test)]
impl MockDisk {
    /// A disk with `free` bytes available
    pub const fn new(free: u64) -> Self {
        Self { free: Some(free) }
    }

    /// A disk whose statvfs always fails
    pub const fn unavailable() -> Self {
        Self { free: None }
    }
}

#[cfg(test)]
impl DiskOperations for MockDisk {
    fn available_space(&self, _path: &Path) -> io::Result<u64> {
        self.free
            .ok_or_else(|| io::Error::other("statvfs unavailable"))
    }
}
