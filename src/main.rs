// main.rs now uses items from lib.rs

use anyhow::Result;
use log::error;
use orion_kmer::{cli, commands, errors::OrionKmerError}; // Use items from the library part of the crate

fn main() -> Result<()> {
    let matches = cli::parse_cli();

    if let Err(e) = commands::dispatch_command(matches.command, matches.threads, matches.verbose) {
        error!("Error: {}", e);
        // `.context(...)` wraps the original `OrionKmerError` in an opaque
        // layer, so the exit-code classification walks the full cause chain
        // rather than downcasting only the top-level error.
        let exit_code = match e.chain().find_map(|cause| cause.downcast_ref::<OrionKmerError>()) {
            Some(kind) if kind.is_internal() => 2,
            _ => 1,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}
