use std::path::PathBuf;

use nix::errno::Errno;
use pipepeer_common::{ExitStatus, Fd, Pid};
use thiserror::Error;

/// Fatal failures while locating the target descriptor.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("introspection filesystem unusable at {}: {reason}", root.display())]
    Environment { root: PathBuf, reason: String },

    #[error("process {pid} not found")]
    ProcessNotFound { pid: Pid },

    #[error("process {pid} has no file descriptor {fd}")]
    DescriptorNotFound { pid: Pid, fd: Fd },

    #[error("cannot read file descriptor {fd} of process {pid}: {errno}")]
    DescriptorUnreadable { pid: Pid, fd: Fd, errno: Errno },
}

impl ResolveError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Environment { .. } => ExitStatus::Unknown,
            Self::ProcessNotFound { .. }
            | Self::DescriptorNotFound { .. }
            | Self::DescriptorUnreadable { .. } => ExitStatus::Error,
        }
    }
}
