//! Scans against the live /proc using real pipes and child processes.
//!
//! Every test holds `LIVE` for its whole body so no other test thread opens
//! or closes descriptors while our own table is being scanned.

#![cfg(target_os = "linux")]

use std::collections::BTreeSet;
use std::os::fd::{AsRawFd, OwnedFd};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};

use nix::fcntl::OFlag;
use pipepeer::procfs::{PipeMatcher, ProcFs};
use pipepeer::resolver::{Resolver, ScanOutcome, Target};
use pipepeer_common::{Fd, Pid};

static LIVE: Mutex<()> = Mutex::new(());

fn lock() -> MutexGuard<'static, ()> {
    LIVE.lock().unwrap_or_else(|e| e.into_inner())
}

/// Kills and reaps a child on drop.
struct Reaped(Child);

impl Drop for Reaped {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn sleeper(stdin: Stdio, stdout: Stdio) -> Reaped {
    Reaped(
        Command::new("sleep")
            .arg("30")
            .stdin(stdin)
            .stdout(stdout)
            .spawn()
            .unwrap(),
    )
}

fn live_resolver() -> Option<Resolver> {
    let r = Resolver::new(ProcFs::new("/proc"), PipeMatcher::default());
    r.procfs().check_environment().ok().map(|_| r)
}

fn peer_set(r: &Resolver, pid: Pid, fd: Fd) -> BTreeSet<Pid> {
    match r.resolve_target(pid, fd).unwrap() {
        Target::Pipe(id) => r.find_peers(&id, pid, fd).map(|p| p.pid).collect(),
        Target::NotAPipe(t) => panic!("{pid}/{fd} is not a pipe: {t}"),
    }
}

#[test]
fn own_pipe_pair() {
    let _guard = lock();
    let Some(r) = live_resolver() else { return };

    // Scanning our own table opens a directory fd that is closed again
    // before the links are read; it shows up as a vanished entry and ends
    // the scan of this process. pipe2 takes the lowest free slots, so both
    // ends sort before that listing fd and are reached first.
    let (read_end, write_end): (OwnedFd, OwnedFd) =
        nix::unistd::pipe2(OFlag::O_CLOEXEC).unwrap();
    let me = std::process::id();
    let rfd = read_end.as_raw_fd() as Fd;
    let wfd = write_end.as_raw_fd() as Fd;

    let Target::Pipe(read_id) = r.resolve_target(me, rfd).unwrap() else {
        panic!("read end is not a pipe");
    };
    let Target::Pipe(write_id) = r.resolve_target(me, wfd).unwrap() else {
        panic!("write end is not a pipe");
    };
    assert_eq!(read_id, write_id);

    match r.scan_process(&read_id, (me, rfd), me) {
        ScanOutcome::MatchFound(peer) => {
            assert_eq!(peer.pid, me);
            assert_eq!(peer.fd, wfd);
        }
        other => panic!("expected our write end, got {other:?}"),
    }

    let own: Vec<_> = r
        .find_peers(&read_id, me, rfd)
        .filter(|p| p.pid == me)
        .collect();
    assert_eq!(own.len(), 1);
}

#[test]
fn pipe_between_two_children() {
    let _guard = lock();
    let Some(r) = live_resolver() else { return };

    // Our copy of the read end moves into `reader`'s Stdio and is closed
    // once spawned, so only the two children hold the pipe.
    let mut writer = sleeper(Stdio::null(), Stdio::piped());
    let read_end: OwnedFd = writer.0.stdout.take().unwrap().into();
    let reader = sleeper(Stdio::from(read_end), Stdio::null());

    let (w, rd) = (writer.0.id(), reader.0.id());
    assert_eq!(peer_set(&r, w, 1), BTreeSet::from([rd]));
    assert_eq!(peer_set(&r, rd, 0), BTreeSet::from([w]));
}

#[test]
fn writer_with_two_readers() {
    let _guard = lock();
    let Some(r) = live_resolver() else { return };

    let mut writer = sleeper(Stdio::null(), Stdio::piped());
    let read_end: OwnedFd = writer.0.stdout.take().unwrap().into();
    let second = read_end.try_clone().unwrap();
    let y = sleeper(Stdio::from(read_end), Stdio::null());
    let z = sleeper(Stdio::from(second), Stdio::null());

    assert_eq!(
        peer_set(&r, writer.0.id(), 1),
        BTreeSet::from([y.0.id(), z.0.id()])
    );
}

#[test]
fn terminal_or_file_is_not_a_pipe() {
    let _guard = lock();
    let Some(r) = live_resolver() else { return };

    let file = std::fs::File::open("/proc/self/status").unwrap();
    let me = std::process::id();
    assert!(matches!(
        r.resolve_target(me, file.as_raw_fd() as Fd).unwrap(),
        Target::NotAPipe(_)
    ));
}
