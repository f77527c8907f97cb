use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// AcceptanceCriterion
// ---------------------------------------------------------------------------

/// One independently checkable condition for accepting a feature as done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AcceptanceCriterion {
    FileExists { path: String },
    CommandSucceeds { command: String },
    /// Needs a test-runner integration; never executed automatically.
    NoTestsFail,
    ManualVerification { description: String },
}

impl AcceptanceCriterion {
    /// Canonical human-readable text. Round-trips through [`parse_criterion`].
    pub fn label(&self) -> String {
        match self {
            Self::FileExists { path } => format!("File exists: {path}"),
            Self::CommandSucceeds { command } => format!("Command succeeds: {command}"),
            Self::NoTestsFail => "No tests fail".to_string(),
            Self::ManualVerification { description } => {
                format!("Manual verification: {description}")
            }
        }
    }
}

impl fmt::Display for AcceptanceCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

// ---------------------------------------------------------------------------
// Sub-parse of an `### Acceptance Criteria` body
// ---------------------------------------------------------------------------

static BULLET_RE: OnceLock<Regex> = OnceLock::new();
static ITEM_RE: OnceLock<Regex> = OnceLock::new();

fn bullet_re() -> &'static Regex {
    BULLET_RE.get_or_init(|| Regex::new(r"^\s*[-*]\s+(?:\[[ xX]\]\s+)?(.+?)\s*$").unwrap())
}

fn item_re() -> &'static Regex {
    ITEM_RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(file exists|command succeeds|no tests fail|manual verification|manual)\s*(?::\s*(.*))?$",
        )
        .unwrap()
    })
}

fn strip_backticks(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('`')
        .and_then(|r| r.strip_suffix('`'))
        .map(str::trim)
        .unwrap_or(s)
}

/// Parse the text of one criterion (without its bullet).
pub fn parse_criterion(text: &str) -> Option<AcceptanceCriterion> {
    let caps = item_re().captures(text.trim())?;
    let kind = caps.get(1)?.as_str().to_lowercase();
    let arg = caps.get(2).map(|m| strip_backticks(m.as_str())).unwrap_or("");
    match kind.as_str() {
        "file exists" if !arg.is_empty() => Some(AcceptanceCriterion::FileExists {
            path: arg.to_string(),
        }),
        "command succeeds" if !arg.is_empty() => Some(AcceptanceCriterion::CommandSucceeds {
            command: arg.to_string(),
        }),
        "no tests fail" if arg.is_empty() => Some(AcceptanceCriterion::NoTestsFail),
        "manual" | "manual verification" if !arg.is_empty() => {
            Some(AcceptanceCriterion::ManualVerification {
                description: arg.to_string(),
            })
        }
        _ => None,
    }
}

/// Parse the body lines of an acceptance-criteria section.
///
/// Returns the recognised criteria in order plus one message per rejected
/// line. Messages carry no location; the caller prefixes them.
pub fn parse_criteria<'a, I>(lines: I) -> (Vec<AcceptanceCriterion>, Vec<String>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut criteria = Vec::new();
    let mut rejected = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let parsed = bullet_re()
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_criterion(m.as_str()));
        match parsed {
            Some(c) => criteria.push(c),
            None => rejected.push(format!(
                "Unrecognized acceptance criterion '{}'. Ignored.",
                line.trim()
            )),
        }
    }
    (criteria, rejected)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_kind() {
        assert_eq!(
            parse_criterion("File exists: src/main.rs"),
            Some(AcceptanceCriterion::FileExists {
                path: "src/main.rs".into()
            })
        );
        assert_eq!(
            parse_criterion("command succeeds: `npm test`"),
            Some(AcceptanceCriterion::CommandSucceeds {
                command: "npm test".into()
            })
        );
        assert_eq!(
            parse_criterion("No tests fail"),
            Some(AcceptanceCriterion::NoTestsFail)
        );
        assert_eq!(
            parse_criterion("Manual: Check the login page"),
            Some(AcceptanceCriterion::ManualVerification {
                description: "Check the login page".into()
            })
        );
        assert_eq!(
            parse_criterion("Manual verification: Looks right"),
            Some(AcceptanceCriterion::ManualVerification {
                description: "Looks right".into()
            })
        );
    }

    #[test]
    fn rejects_missing_argument() {
        assert_eq!(parse_criterion("File exists:"), None);
        assert_eq!(parse_criterion("Command succeeds"), None);
        assert_eq!(parse_criterion("Works great"), None);
    }

    #[test]
    fn label_roundtrips() {
        let all = vec![
            AcceptanceCriterion::FileExists {
                path: "a/b.txt".into(),
            },
            AcceptanceCriterion::CommandSucceeds {
                command: "cargo test --all".into(),
            },
            AcceptanceCriterion::NoTestsFail,
            AcceptanceCriterion::ManualVerification {
                description: "Check UI".into(),
            },
        ];
        for c in all {
            assert_eq!(parse_criterion(&c.label()), Some(c.clone()), "{c}");
        }
    }

    #[test]
    fn section_body_with_bullets_and_checkboxes() {
        let body = "\n- File exists: README.md\n* [ ] Command succeeds: `true`\n- [x] No tests fail\nsome prose\n- Manual: eyeball it\n";
        let (criteria, rejected) = parse_criteria(body.lines());
        assert_eq!(criteria.len(), 4);
        assert_eq!(criteria[2], AcceptanceCriterion::NoTestsFail);
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].contains("some prose"));
    }

    #[test]
    fn json_is_tagged() {
        let c = AcceptanceCriterion::CommandSucceeds {
            command: "make".into(),
        };
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"type\":\"command_succeeds\""));
        let back: AcceptanceCriterion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
