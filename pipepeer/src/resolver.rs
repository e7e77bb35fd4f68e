use std::fmt;
use std::path::PathBuf;

use pipepeer_common::{Fd, Pid};

use crate::config::Settings;
use crate::error::ResolveError;
use crate::procfs::{DescriptorRead, PipeMatcher, ProcFs};

/// Kernel token naming a pipe buffer, e.g. `pipe:[1234]`.
///
/// Two descriptors share a pipe iff their identities are equal as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipeIdentity(String);

impl PipeIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the target descriptor turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Pipe(PipeIdentity),
    /// Descriptor exists but refers to something else; holds the raw target.
    NotAPipe(String),
}

/// Another holder of the target's pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub pid: Pid,
    /// First matching descriptor in this process.
    pub fd: Fd,
    /// Descriptor table entry, e.g. `/proc/812/fd/1`.
    pub path: PathBuf,
}

/// Result of scanning one process's descriptor table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    NoMatch,
    MatchFound(Peer),
    /// Table or one of its entries could not be read; rest of table skipped.
    Unreadable,
}

/// Correlates descriptors across processes by pipe identity.
#[derive(Debug, Clone)]
pub struct Resolver {
    procfs: ProcFs,
    matcher: PipeMatcher,
}

impl Resolver {
    pub fn new(procfs: ProcFs, matcher: PipeMatcher) -> Self {
        Self { procfs, matcher }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(ProcFs::new(&settings.proc_root), settings.matcher.clone())
    }

    pub fn procfs(&self) -> &ProcFs {
        &self.procfs
    }

    /// Resolve `(pid, fd)` to its pipe identity.
    pub fn resolve_target(&self, pid: Pid, fd: Fd) -> Result<Target, ResolveError> {
        if !self.procfs.process_exists(pid) {
            return Err(ResolveError::ProcessNotFound { pid });
        }

        let target = match self.procfs.read_descriptor(pid, fd) {
            Ok(t) => t,
            Err(DescriptorRead::Vanished | DescriptorRead::NotALink) => {
                return Err(ResolveError::DescriptorNotFound { pid, fd });
            }
            Err(DescriptorRead::Unreadable(errno)) => {
                return Err(ResolveError::DescriptorUnreadable { pid, fd, errno });
            }
        };

        if self.matcher.is_pipe(&target) {
            log::debug!("{pid}/{fd} -> {target}");
            Ok(Target::Pipe(PipeIdentity(target)))
        } else {
            log::debug!("{pid}/{fd} -> {target} (not a pipe)");
            Ok(Target::NotAPipe(target))
        }
    }

    /// Lazily enumerate processes, other than the exact `(pid, fd)` pair,
    /// holding a descriptor on `identity`. Each process is yielded once.
    pub fn find_peers<'a>(&'a self, identity: &'a PipeIdentity, pid: Pid, fd: Fd) -> Peers<'a> {
        Peers {
            resolver: self,
            identity,
            target: (pid, fd),
            pids: self.procfs.pids().into_iter(),
        }
    }

    /// Scan one descriptor table, stopping at the first match or the first
    /// entry that cannot be read.
    pub fn scan_process(&self, identity: &PipeIdentity, target: (Pid, Fd), pid: Pid) -> ScanOutcome {
        let fds = match self.procfs.descriptors(pid) {
            Ok(fds) => fds,
            Err(e) => {
                log::trace!("skipping process {pid}: fd table {e:?}");
                return ScanOutcome::Unreadable;
            }
        };

        for fd in fds {
            let resolved = match self.procfs.read_descriptor(pid, fd) {
                Ok(t) => t,
                Err(e) => {
                    log::trace!("skipping rest of process {pid} at fd {fd}: {e:?}");
                    return ScanOutcome::Unreadable;
                }
            };
            if resolved == identity.as_str() && (pid, fd) != target {
                return ScanOutcome::MatchFound(Peer {
                    pid,
                    fd,
                    path: self.procfs.fd_path(pid, fd),
                });
            }
        }

        ScanOutcome::NoMatch
    }
}

/// Iterator returned by [`Resolver::find_peers`].
///
/// The PID list is snapshotted on creation; descriptor tables are read as
/// the iterator advances.
pub struct Peers<'a> {
    resolver: &'a Resolver,
    identity: &'a PipeIdentity,
    target: (Pid, Fd),
    pids: std::vec::IntoIter<Pid>,
}

impl Iterator for Peers<'_> {
    type Item = Peer;

    fn next(&mut self) -> Option<Peer> {
        loop {
            let pid = self.pids.next()?;
            match self.resolver.scan_process(self.identity, self.target, pid) {
                ScanOutcome::MatchFound(peer) => return Some(peer),
                ScanOutcome::NoMatch | ScanOutcome::Unreadable => continue,
            }
        }
    }
}
