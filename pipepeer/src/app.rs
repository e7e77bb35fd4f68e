use std::io::{self, Write};

use pipepeer_common::{ExitStatus, Fd, Pid};

use crate::config::Settings;
use crate::resolver::{Resolver, Target};

/// Resolve `(pid, fd)` and print every peer PID to `out`, one per line.
///
/// Fatal diagnostics go to `err`. A descriptor that is not a pipe and a
/// pipe with no peers both produce empty output and `ExitStatus::Ok`.
pub fn run<W: Write, E: Write>(
    settings: &Settings,
    fd: Fd,
    pid: Pid,
    out: &mut W,
    err: &mut E,
) -> io::Result<ExitStatus> {
    let resolver = Resolver::from_settings(settings);

    let target = match resolver
        .procfs()
        .check_environment()
        .and_then(|()| resolver.resolve_target(pid, fd))
    {
        Ok(t) => t,
        Err(e) => {
            writeln!(err, "pipepeer: {e}")?;
            return Ok(e.exit_status());
        }
    };

    let identity = match target {
        Target::Pipe(id) => id,
        Target::NotAPipe(other) => {
            log::info!("{pid}/{fd} refers to {other}, not a pipe");
            return Ok(ExitStatus::Ok);
        }
    };

    log::debug!("scanning {} for {identity}", resolver.procfs().root().display());
    let mut found = 0usize;
    for peer in resolver.find_peers(&identity, pid, fd) {
        if settings.verbose {
            writeln!(out, "{}", peer.path.display())?;
        }
        writeln!(out, "{}", peer.pid)?;
        found += 1;
    }
    log::debug!("{identity}: {found} peer process(es)");

    Ok(ExitStatus::Ok)
}
