//! Self-check for the host's process introspection facility.
//!
//! Exercises each step pipepeer relies on independently, printing
//! PASS/FAIL with error details to stdout.
//!
//! Run: ./target/release/diagnose [PROC_ROOT]

use std::os::fd::{AsRawFd, OwnedFd};
use std::process::ExitCode;

use nix::fcntl::OFlag;
use pipepeer::procfs::{PipeMatcher, ProcFs};
use pipepeer::resolver::{Resolver, ScanOutcome, Target};
use pipepeer_common::{ExitStatus, Fd};

fn main() -> ExitCode {
    let root = std::env::args().nth(1).unwrap_or_else(|| "/proc".to_string());
    let resolver = Resolver::new(ProcFs::new(&root), PipeMatcher::default());
    let me = std::process::id();

    let mut pass = 0u32;
    let mut fail = 0u32;
    let total = 5u32;

    println!("=== pipepeer environment diagnostic ({root}) ===\n");

    // ── Step 1: Introspection filesystem present ──────────────
    print_step(1, "Introspection filesystem present");
    let step1 = resolver
        .procfs()
        .check_environment()
        .map(|()| "root and self/fd found".to_string())
        .map_err(|e| e.to_string());
    report(&step1, &mut pass, &mut fail);
    if step1.is_err() {
        return summary(pass, fail, total);
    }

    // ── Step 2: Own process visible ───────────────────────────
    print_step(2, "Own process visible in process table");
    let step2 = if resolver.procfs().pids().contains(&me) {
        Ok(format!("pid {me} listed"))
    } else {
        Err(format!("pid {me} missing from listing"))
    };
    report(&step2, &mut pass, &mut fail);

    // ── Step 3: Own descriptor table readable ─────────────────
    print_step(3, "Own descriptor table readable");
    let step3 = resolver
        .procfs()
        .descriptors(me)
        .map(|fds| format!("{} descriptors open", fds.len()))
        .map_err(|e| format!("{e:?}"));
    report(&step3, &mut pass, &mut fail);

    // ── Step 4: Fresh pipe resolves to a pipe identity ────────
    print_step(4, "pipe2() → resolve read end");
    let (read_end, write_end): (OwnedFd, OwnedFd) = match nix::unistd::pipe2(OFlag::O_CLOEXEC) {
        Ok(ends) => ends,
        Err(e) => {
            report(&Err::<String, _>(format!("pipe2: {e}")), &mut pass, &mut fail);
            return summary(pass, fail, total);
        }
    };
    let rfd = read_end.as_raw_fd() as Fd;
    let wfd = write_end.as_raw_fd() as Fd;
    let identity = match resolver.resolve_target(me, rfd) {
        Ok(Target::Pipe(id)) => {
            report(&Ok(format!("fd {rfd} → {id}")), &mut pass, &mut fail);
            id
        }
        Ok(Target::NotAPipe(other)) => {
            println!("  Pipe naming convention not recognised; kernel reported: {other}");
            report(&Err::<String, _>("not a pipe".into()), &mut pass, &mut fail);
            return summary(pass, fail, total);
        }
        Err(e) => {
            report(&Err::<String, _>(e.to_string()), &mut pass, &mut fail);
            return summary(pass, fail, total);
        }
    };

    // ── Step 5: Scanner finds the write end ───────────────────
    // The scan's own listing fd reads as vanished and ends the scan of this
    // process; the pipe ends got lower slots, so they are reached first.
    print_step(5, "Scan own table for the other end");
    let step5 = match resolver.scan_process(&identity, (me, rfd), me) {
        ScanOutcome::MatchFound(peer) if peer.fd == wfd => {
            Ok(format!("matched {}", peer.path.display()))
        }
        ScanOutcome::MatchFound(peer) => Err(format!(
            "matched fd {} but expected write end fd {wfd}",
            peer.fd
        )),
        ScanOutcome::NoMatch => Err("write end not found".into()),
        ScanOutcome::Unreadable => Err("own descriptor table became unreadable".into()),
    };
    report(&step5, &mut pass, &mut fail);

    summary(pass, fail, total)
}

fn print_step(n: u32, desc: &str) {
    println!("[Step {n}] {desc}");
}

fn report(result: &Result<String, String>, pass: &mut u32, fail: &mut u32) {
    match result {
        Ok(msg) => {
            println!("  PASS: {msg}\n");
            *pass += 1;
        }
        Err(msg) => {
            println!("  FAIL: {msg}\n");
            *fail += 1;
        }
    }
}

fn summary(pass: u32, fail: u32, total: u32) -> ExitCode {
    let skipped = total.saturating_sub(pass + fail);
    println!("=== Summary: {pass} passed, {fail} failed, {skipped} skipped (of {total}) ===");
    let status = if fail == 0 && skipped == 0 {
        ExitStatus::Ok
    } else {
        ExitStatus::Unknown
    };
    ExitCode::from(status.code())
}
