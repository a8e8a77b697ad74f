pub mod create;
pub mod detect;
pub mod update;
pub mod version;
pub mod worlds;

use clap::Subcommand;
use worldkit_core::{Outcome, SpecError};

/// Report a spec failure and hand back the spec-invalid exit code.
pub(crate) fn spec_invalid(err: &SpecError) -> i32 {
    eprintln!("error[{}]: {err}", err.kind());
    Outcome::SpecInvalid.exit_code()
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold a world layout at a target directory
    Create(create::CreateArgs),
    /// Migrate a scaffolded tree to the latest known spec version
    Update(update::UpdateArgs),
    /// Report the detected world type and version of a directory
    Detect(detect::DetectArgs),
    /// List registered world types and versions
    Worlds,
    /// Print version information
    Version,
}
