//! meshmaker CLI: build a surface mesh from an MRC/MAP density map.
//!
//! Reads the option tokens, builds a validated configuration, then runs
//! the assembled pipeline and writes a single STL, VTK or VTP file.

mod commands;

use std::process::ExitCode;

use color_eyre::eyre::Result;

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let tokens: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    commands::run(tokens)
}
