use worldkit_core::{MigrationPlan, ProjectState, TransactionResult};

use super::OutputFormat;

pub fn format_plan(plan: &MigrationPlan, dry_run: bool, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&plan.report(dry_run)).unwrap_or_default()
        }
        OutputFormat::Text => format_plan_text(plan, dry_run),
    }
}

fn format_plan_text(plan: &MigrationPlan, dry_run: bool) -> String {
    let mut out = String::new();
    let header = if dry_run { "Would create" } else { "Planned" };
    out.push_str(&format!(
        "{header} for {} ({} {}):\n",
        plan.root.display(),
        plan.world_type,
        plan.target_version
    ));
    if plan.steps.is_empty() {
        out.push_str("  nothing to do — tree is up to date\n");
    }
    for dir in plan.directories() {
        out.push_str(&format!("  + {dir}/\n"));
    }
    for file in plan.files() {
        out.push_str(&format!("  + {file}\n"));
    }
    for warning in &plan.manual_warnings {
        out.push_str(&format!("  ! {warning}\n"));
    }
    out
}

pub fn format_result(result: &TransactionResult, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
        OutputFormat::Text => format_result_text(result),
    }
}

fn format_result_text(result: &TransactionResult) -> String {
    let mut out = String::new();
    if result.dry_run {
        out.push_str("Dry run — no changes written.\n");
    }
    let created = result.directories.len() + result.files.len();
    if created == 0 {
        out.push_str("Nothing to do — tree is up to date.\n");
    } else {
        out.push_str(&format!(
            "{} {} directories and {} files.\n",
            if result.dry_run { "Would create" } else { "Created" },
            result.directories.len(),
            result.files.len()
        ));
    }
    for warning in &result.manual_warnings {
        out.push_str(&format!("warning: {warning}\n"));
    }
    out
}

pub fn format_state(state: &ProjectState, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(state).unwrap_or_default(),
        OutputFormat::Text => {
            let world_type = state.declared_world_type.as_deref().unwrap_or("(unknown)");
            let version = state
                .declared_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "(unknown)".to_string());
            format!(
                "Root:       {}\nWorld type: {world_type}\nVersion:    {version}\nDetection:  {:?}\nPaths:      {}\n",
                state.root.display(),
                state.confidence,
                state.existing_paths.len()
            )
        }
    }
}
