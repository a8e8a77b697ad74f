use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use worldkit_core::{apply, plan_update, ApplyOptions, ExpandContext, SpecRegistry};

use crate::output::format::{format_plan, format_result};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct UpdateArgs {
    /// Scaffolded directory to migrate
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Project name bound to ${PROJECT} (default: the root directory name)
    #[arg(long)]
    pub project: Option<String>,

    /// Compute and report the plan without touching disk
    #[arg(long)]
    pub dry_run: bool,

    /// Proceed past conflicts, permitting file overwrite
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &UpdateArgs, fmt: OutputFormat) -> Result<i32> {
    let project = args.project.clone().or_else(|| {
        args.root
            .canonicalize()
            .ok()
            .as_deref()
            .unwrap_or(&args.root)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    });
    let ctx = ExpandContext::current(project);

    let registry = match SpecRegistry::builtin(&ctx) {
        Ok(registry) => registry,
        Err(e) => return Ok(super::spec_invalid(&e)),
    };
    let plan = match plan_update(&args.root, &registry) {
        Ok(plan) => plan,
        Err(e) => return Ok(super::spec_invalid(&e)),
    };

    let options = ApplyOptions {
        dry_run: args.dry_run,
        force: args.force,
        backup: false,
    };
    match apply(&plan, &options) {
        Ok(result) => {
            if result.dry_run {
                print!("{}", format_plan(&plan, true, fmt));
            } else {
                print!("{}", format_result(&result, fmt));
            }
            Ok(result.outcome.exit_code())
        }
        Err(e) => {
            eprintln!("error[{}]: {e}", e.kind());
            Ok(e.outcome().exit_code())
        }
    }
}
