//! tasklist - Hierarchical markdown task lists with transactional edits

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = tasklist_cli::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
