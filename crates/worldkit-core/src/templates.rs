//! Built-in payloads for `requiredFiles` templates.
//!
//! Rendering depends only on the spec itself so plan computation stays a
//! pure function of `(spec, state)`.

use crate::spec::WorldSpec;

pub fn render(template_id: &str, spec: &WorldSpec) -> String {
    match template_id {
        "readme" => {
            let mut out = format!(
                "# {} workspace\n\nScaffolded as `{}` version {}.\n\n## Layout\n\n",
                spec.world_type, spec.world_type, spec.spec_version
            );
            for parent in &spec.parent_directories {
                if parent.description.is_empty() {
                    out.push_str(&format!("- `{}/`\n", parent.name));
                } else {
                    out.push_str(&format!("- `{}/` — {}\n", parent.name, parent.description));
                }
            }
            out
        }
        "project-manifest" => format!(
            "world_type: {}\nspec_version: \"{}\"\ntitle: \"\"\nstatus: draft\n",
            spec.world_type, spec.spec_version
        ),
        "topic-index" => {
            "# Topic index\n\nOne line per topic: `- [status] topic — note`\n".to_string()
        }
        "dataset-index" => {
            "# Datasets\n\nRecord each dataset here: source, license, retrieval date.\n"
                .to_string()
        }
        other => format!("<!-- placeholder for template `{other}` -->\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ParentDir, SpecVersion};

    fn spec() -> WorldSpec {
        WorldSpec {
            world_type: "JOURNAL_WORLD".into(),
            spec_version: SpecVersion::new(1, 0, 21),
            parent_directories: vec![ParentDir {
                name: "01_daily".into(),
                description: "Daily entries".into(),
            }],
            subdirectories: Default::default(),
            required_files: Vec::new(),
        }
    }

    #[test]
    fn test_readme_lists_layout() {
        let text = render("readme", &spec());
        assert!(text.contains("JOURNAL_WORLD"));
        assert!(text.contains("1.0.21"));
        assert!(text.contains("01_daily"));
    }

    #[test]
    fn test_unknown_template_gets_placeholder() {
        let text = render("no-such-template", &spec());
        assert!(text.contains("no-such-template"));
    }
}
