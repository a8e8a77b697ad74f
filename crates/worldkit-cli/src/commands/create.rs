use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use worldkit_core::{
    apply, load, plan_create, ApplyOptions, ExpandContext, SpecRegistry, SpecSource,
};

use crate::output::format::{format_plan, format_result};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct CreateArgs {
    /// World type to scaffold (e.g. RESEARCH_WORLD)
    pub world_type: String,

    /// Target directory
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Project name bound to ${PROJECT} (default: the root directory name)
    #[arg(long)]
    pub project: Option<String>,

    /// Load the world spec from a file instead of the bundled set
    #[arg(long)]
    pub spec_file: Option<PathBuf>,

    /// Compute and report the plan without touching disk
    #[arg(long)]
    pub dry_run: bool,

    /// Proceed past conflicts, permitting file overwrite
    #[arg(long)]
    pub force: bool,

    /// Copy conflicting content aside to a timestamped sibling first
    #[arg(long)]
    pub backup: bool,
}

pub fn run(args: &CreateArgs, fmt: OutputFormat) -> Result<i32> {
    let project = args.project.clone().or_else(|| default_project(&args.root));
    let ctx = ExpandContext::current(project);

    let mut registry = match SpecRegistry::builtin(&ctx) {
        Ok(registry) => registry,
        Err(e) => return Ok(super::spec_invalid(&e)),
    };
    let spec = match &args.spec_file {
        Some(path) => match load(&SpecSource::File(path.clone()), &ctx) {
            Ok(loaded) => {
                for warning in &loaded.warnings {
                    eprintln!("warning: {warning}");
                }
                // Register it so probing knows this world's signature too.
                registry.register(loaded.spec.clone());
                loaded.spec
            }
            Err(e) => return Ok(super::spec_invalid(&e)),
        },
        None => match registry.latest(&args.world_type) {
            Some(spec) => spec.clone(),
            None => {
                eprintln!(
                    "error[unknown-world-type]: `{}` is not a bundled world type \
                     (see `worldkit worlds`)",
                    args.world_type
                );
                return Ok(worldkit_core::Outcome::SpecInvalid.exit_code());
            }
        },
    };

    let plan = plan_create(&spec, &args.root, &registry);
    let options = ApplyOptions {
        dry_run: args.dry_run,
        force: args.force,
        backup: args.backup,
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

fn default_project(root: &std::path::Path) -> Option<String> {
    root.canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(root)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}
