//! Prompt rendering. Pure and deterministic: the literal text is a contract.

use crate::skills::Skill;
use crate::types::{Feature, Section};
use crate::verifier::FailureDetail;
use std::fmt::Write;

/// Render the implementation prompt for `feature`.
///
/// When `skills` is non-empty an `<available_skills>` manifest comes first.
/// Optional sections follow the description in fixed order and are omitted
/// when their trimmed body is empty.
pub fn generate(feature: &Feature, skills: &[Skill]) -> String {
    let mut out = String::new();

    if !skills.is_empty() {
        out.push_str("<available_skills>\n");
        for skill in skills {
            out.push_str("  <skill>\n");
            let _ = writeln!(out, "    <name>{}</name>", skill.name);
            let _ = writeln!(out, "    <description>{}</description>", skill.description);
            let _ = writeln!(out, "    <location>{}</location>", skill.path.display());
            out.push_str("  </skill>\n");
        }
        out.push_str("</available_skills>\n\n");
    }

    let _ = writeln!(out, "Implement Feature: {}", feature.name);
    out.push('\n');
    out.push_str("Description:\n");
    let _ = writeln!(out, "{}", feature.description.trim());
    out.push('\n');

    for section in Section::all() {
        let body = feature.section(*section).map(str::trim).unwrap_or("");
        if body.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}:", section.title());
        let _ = writeln!(out, "{body}");
        out.push('\n');
    }

    out.trim_end().to_string()
}

/// Render the corrective prompt after a failed verification.
pub fn generate_failure(feature: &Feature, failures: &[FailureDetail]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "The implementation of feature '{}' failed verification.",
        feature.name
    );
    out.push_str("Please fix the following issues:\n\n");

    for failure in failures {
        let _ = writeln!(out, "Criterion: {}", failure.criterion.label());
        out.push_str("Error Details:\n");
        let _ = writeln!(out, "{}", failure.message.trim_end());
        out.push('\n');
    }

    out.trim_end().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criterion::AcceptanceCriterion;
    use std::path::PathBuf;

    fn feature() -> Feature {
        Feature::detached("Test Feature", "Test Description")
    }

    #[test]
    fn basic_prompt() {
        let prompt = generate(&feature(), &[]);
        assert_eq!(
            prompt,
            "Implement Feature: Test Feature\n\nDescription:\nTest Description"
        );
        assert!(!prompt.contains("Requirements:"));
        assert!(!prompt.contains("<available_skills>"));
    }

    #[test]
    fn requirements_header_followed_by_trimmed_body() {
        let mut f = feature();
        f.optional_sections
            .insert(Section::Requirements, "\n- Req 1\n- Req 2  \n".into());
        f.optional_sections.insert(Section::OutOfScope, "Nothing".into());
        let prompt = generate(&f, &[]);
        assert!(prompt.contains("Requirements:\n- Req 1\n- Req 2\n\nOut of Scope:\nNothing"));
    }

    #[test]
    fn sections_render_in_fixed_order_and_skip_blank() {
        let mut f = feature();
        f.optional_sections.insert(Section::Context, "ctx".into());
        f.optional_sections.insert(Section::Notes, "   ".into());
        f.optional_sections.insert(Section::Requirements, "req".into());
        let prompt = generate(&f, &[]);
        let req = prompt.find("Requirements:").unwrap();
        let ctx = prompt.find("Context:").unwrap();
        assert!(req < ctx);
        assert!(!prompt.contains("Notes:"));
        assert!(prompt.ends_with("Context:\nctx"));
    }

    #[test]
    fn skills_manifest_comes_first() {
        let skills = vec![
            Skill {
                name: "pdf-processing".into(),
                description: "Extracts text from PDF".into(),
                path: PathBuf::from("/path/to/pdf/SKILL.md"),
            },
            Skill {
                name: "data-analysis".into(),
                description: "Analyzes datasets".into(),
                path: PathBuf::from("/path/to/data/SKILL.md"),
            },
        ];
        let prompt = generate(&feature(), &skills);
        assert!(prompt.starts_with("<available_skills>\n  <skill>\n"));
        assert!(prompt.contains("<name>pdf-processing</name>"));
        assert!(prompt.contains("<description>Extracts text from PDF</description>"));
        assert!(prompt.contains("<location>/path/to/pdf/SKILL.md</location>"));
        assert!(prompt.contains("</available_skills>\n\nImplement Feature: Test Feature"));
    }

    #[test]
    fn failure_prompt() {
        let failures = vec![
            FailureDetail {
                criterion: AcceptanceCriterion::FileExists {
                    path: "test.txt".into(),
                },
                message: "File missing: test.txt".into(),
            },
            FailureDetail {
                criterion: AcceptanceCriterion::CommandSucceeds {
                    command: "npm test".into(),
                },
                message: "Command failed\n".into(),
            },
        ];
        let prompt = generate_failure(&feature(), &failures);
        assert!(prompt.starts_with(
            "The implementation of feature 'Test Feature' failed verification."
        ));
        assert!(prompt.contains("Criterion: File exists: test.txt\nError Details:\nFile missing: test.txt"));
        assert!(prompt.contains("Criterion: Command succeeds: npm test"));
        assert!(prompt.ends_with("Command failed"));
    }
}
