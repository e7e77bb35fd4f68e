//! Find the processes holding the other end of a pipe.
//!
//! Given one process's file descriptor, [`resolver::Resolver`] resolves it
//! to the kernel pipe identity and scans every visible descriptor table
//! for the same identity.

pub mod app;
pub mod config;
pub mod error;
pub mod procfs;
pub mod resolver;
