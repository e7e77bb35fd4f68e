use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use pipepeer_common::{Fd, Pid};

use crate::error::ResolveError;

/// Why a descriptor (or a whole descriptor table) could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorRead {
    /// Entry is gone: never existed, or the process/descriptor closed
    /// between listing and reading.
    Vanished,
    /// Entry exists but is not a descriptor link.
    NotALink,
    /// Entry exists but reading it failed (usually EACCES).
    Unreadable(Errno),
}

impl DescriptorRead {
    fn from_errno(errno: Errno) -> Self {
        match errno {
            Errno::ENOENT | Errno::ESRCH => Self::Vanished,
            Errno::EINVAL => Self::NotALink,
            other => Self::Unreadable(other),
        }
    }

    fn from_io(err: &io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => Self::from_errno(Errno::from_raw(code)),
            None if err.kind() == io::ErrorKind::NotFound => Self::Vanished,
            None => Self::Unreadable(Errno::EIO),
        }
    }
}

/// Read-only view of a procfs-style introspection filesystem.
///
/// Layout expected under `root`:
///   <pid>/fd/<n>   symlink whose target names what descriptor n refers to
///   self/fd        the caller's own descriptor table
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Verify the facility is mounted and exposes descriptor tables.
    pub fn check_environment(&self) -> Result<(), ResolveError> {
        if !self.root.is_dir() {
            return Err(ResolveError::Environment {
                root: self.root.clone(),
                reason: "not a directory".to_string(),
            });
        }
        if !self.root.join("self").join("fd").is_dir() {
            return Err(ResolveError::Environment {
                root: self.root.clone(),
                reason: "no per-process descriptor tables (missing self/fd)".to_string(),
            });
        }
        Ok(())
    }

    pub fn process_dir(&self, pid: Pid) -> PathBuf {
        self.root.join(pid.to_string())
    }

    pub fn process_exists(&self, pid: Pid) -> bool {
        pid > 0 && self.process_dir(pid).is_dir()
    }

    /// All visible process IDs, ascending. Non-numeric entries such as
    /// `self` or `sys` are skipped.
    pub fn pids(&self) -> Vec<Pid> {
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) => {
                log::warn!("listing {}: {e}", self.root.display());
                return Vec::new();
            }
        };

        let mut pids: Vec<Pid> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<Pid>().ok())
            .filter(|&pid| self.process_exists(pid))
            .collect();
        pids.sort_unstable();
        pids
    }

    pub fn fd_dir(&self, pid: Pid) -> PathBuf {
        self.process_dir(pid).join("fd")
    }

    pub fn fd_path(&self, pid: Pid, fd: Fd) -> PathBuf {
        self.fd_dir(pid).join(fd.to_string())
    }

    /// Descriptor numbers open in `pid`, ascending.
    pub fn descriptors(&self, pid: Pid) -> Result<Vec<Fd>, DescriptorRead> {
        let entries = fs::read_dir(self.fd_dir(pid)).map_err(|e| DescriptorRead::from_io(&e))?;
        let mut fds: Vec<Fd> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<Fd>().ok())
            .collect();
        fds.sort_unstable();
        Ok(fds)
    }

    /// Resolve descriptor `fd` of `pid` to the target string the kernel
    /// reports for it (a path, `pipe:[N]`, `socket:[N]`, ...).
    pub fn read_descriptor(&self, pid: Pid, fd: Fd) -> Result<String, DescriptorRead> {
        let path = self.fd_path(pid, fd);
        let target = nix::fcntl::readlink(path.as_path()).map_err(DescriptorRead::from_errno)?;
        Ok(target.to_string_lossy().into_owned())
    }
}

/// Predicate deciding whether a descriptor target names a pipe.
///
/// Linux reports anonymous pipes as `pipe:[<inode>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeMatcher {
    prefix: String,
    suffix: String,
}

impl PipeMatcher {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn is_pipe(&self, target: &str) -> bool {
        target
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_suffix(self.suffix.as_str()))
            .is_some_and(|token| !token.is_empty())
    }
}

impl Default for PipeMatcher {
    fn default() -> Self {
        Self::new("pipe:[", "]")
    }
}
