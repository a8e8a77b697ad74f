use anyhow::Result;
use worldkit_core::{ExpandContext, SpecRegistry};

use crate::output::OutputFormat;

pub fn run(fmt: OutputFormat) -> Result<i32> {
    let ctx = ExpandContext::current(None);
    let registry = match SpecRegistry::builtin(&ctx) {
        Ok(registry) => registry,
        Err(e) => return Ok(super::spec_invalid(&e)),
    };

    match fmt {
        OutputFormat::Json => {
            let worlds: serde_json::Map<String, serde_json::Value> = registry
                .world_types()
                .map(|world_type| {
                    (
                        world_type.to_string(),
                        registry
                            .versions(world_type)
                            .iter()
                            .map(|v| v.to_string())
                            .collect::<Vec<_>>()
                            .into(),
                    )
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&worlds)?);
        }
        OutputFormat::Text => {
            for world_type in registry.world_types() {
                let versions: Vec<String> = registry
                    .versions(world_type)
                    .iter()
                    .map(|v| v.to_string())
                    .collect();
                println!("{world_type}  ({})", versions.join(", "));
            }
        }
    }
    Ok(0)
}
