//! worldkit-core: turn declarative "world type" layout specifications into
//! filesystem state, and migrate scaffolded trees forward across spec
//! versions.
//!
//! Pipeline: [`spec::load`] a specification, [`probe::probe`] the target
//! tree, [`diff::diff`] the two into an additive [`diff::MigrationPlan`],
//! then [`apply::apply`] it all-or-nothing. Plans only ever create missing
//! paths; nothing here deletes or overwrites user content unless the
//! caller opts in with `force` or `backup`.

pub mod apply;
pub mod diff;
pub mod error;
pub mod metadata;
pub mod ops;
pub mod probe;
pub mod registry;
pub mod spec;
pub mod templates;

pub use apply::{apply, ApplyOptions, Outcome, TransactionResult};
pub use diff::{diff, MigrationPlan, MigrationStep, PlanReport, StepKind};
pub use error::{ApplyError, SpecError};
pub use metadata::{Descriptor, DESCRIPTOR_FILE, LOCK_FILE};
pub use ops::{plan_create, plan_update};
pub use probe::{probe, DetectionConfidence, ProjectState};
pub use registry::{SignatureRule, SpecRegistry};
pub use spec::{load, ExpandContext, LoadedSpec, SpecSource, SpecVersion, SpecWarning, WorldSpec};
