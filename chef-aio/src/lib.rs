// chef-aio/src/lib.rs
//! Asynchronous IO operations for chef (filesystem, json, process)

pub mod fs;
pub mod json_io;
pub mod process;

pub use fs::*;
pub use json_io::write_json_async;
pub use process::{run_command_async, run_shell_capture, shell_invocation};
