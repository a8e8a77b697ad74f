use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use worldkit_core::{probe, ExpandContext, SpecRegistry};

use crate::output::format::format_state;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct DetectArgs {
    /// Directory to inspect
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

pub fn run(args: &DetectArgs, fmt: OutputFormat) -> Result<i32> {
    let ctx = ExpandContext::current(None);
    let registry = match SpecRegistry::builtin(&ctx) {
        Ok(registry) => registry,
        Err(e) => return Ok(super::spec_invalid(&e)),
    };
    let state = probe(&args.root, &registry);
    print!("{}", format_state(&state, fmt));
    Ok(0)
}
