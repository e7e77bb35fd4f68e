use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use pipepeer::app;
use pipepeer::config::{Config, Settings};
use pipepeer_common::{ExitStatus, Fd, Pid};

#[derive(Parser)]
#[command(
    name = "pipepeer",
    version,
    about = "Print the PIDs of processes holding the other end of a pipe"
)]
struct Cli {
    /// Print the descriptor path of each match before its PID
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Root of the process introspection filesystem
    #[arg(long, value_name = "DIR")]
    proc_root: Option<PathBuf>,

    /// File descriptor number in the target process
    #[arg(value_name = "FD", value_parser = clap::value_parser!(u32).range(0..=i32::MAX as i64))]
    fd: Fd,

    /// Target process ID
    #[arg(value_name = "PID", value_parser = clap::value_parser!(u32).range(1..=i32::MAX as i64))]
    pid: Pid,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if let Err(io_err) = e.print() {
                eprintln!("pipepeer: {io_err}");
            }
            let status = match e.kind() {
                ErrorKind::DisplayVersion => ExitStatus::Ok,
                _ => ExitStatus::Usage,
            };
            return ExitCode::from(status.code());
        }
    };

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Load config
    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("ignoring config: {e:#}");
        Config::default()
    });
    let mut settings = Settings::from_config(config);

    // CLI overrides
    if cli.verbose {
        settings.verbose = true;
    }
    if let Some(root) = cli.proc_root {
        settings.proc_root = root;
    }

    let status = app::run(
        &settings,
        cli.fd,
        cli.pid,
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    )
    .unwrap_or_else(|e| {
        eprintln!("pipepeer: writing output: {e}");
        ExitStatus::Error
    });
    log::debug!("exit status {}", status.label());

    ExitCode::from(status.code())
}
