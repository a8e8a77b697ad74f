pub mod builtin;
pub mod loader;
pub mod model;

pub use loader::{load, load_str, ExpandContext, LoadedSpec, SpecSource, SpecWarning};
pub use model::{ParentDir, RequiredFile, SpecVersion, WorldSpec};
