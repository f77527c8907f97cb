#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const BACKLOG: &str = "# Backlog

## Feature name
[ ] Greeting

### Description
Write a greeting file.

### Requirements
- Say hello

### Acceptance Criteria
- File exists: hello.txt
- Command succeeds: `test -f hello.txt`

---

## Feature name
[ ] Farewell

### Description
Say goodbye.
";

fn forch(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("forch").unwrap();
    cmd.current_dir(dir.path())
        .env("FORCH_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn with_backlog(doc: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("BACKLOG.md"), doc).unwrap();
    dir
}

// ---------------------------------------------------------------------------
// forch init / add
// ---------------------------------------------------------------------------

#[test]
fn init_creates_settings_and_backlog() {
    let dir = TempDir::new().unwrap();
    forch(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .forch/settings.yaml"))
        .stdout(predicate::str::contains("created: BACKLOG.md"));

    assert!(dir.path().join(".forch/settings.yaml").exists());
    let backlog = std::fs::read_to_string(dir.path().join("BACKLOG.md")).unwrap();
    assert!(backlog.contains("## Feature name"));
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    forch(&dir).arg("init").assert().success();
    let before = std::fs::read_to_string(dir.path().join("BACKLOG.md")).unwrap();
    forch(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:"));
    let after = std::fs::read_to_string(dir.path().join("BACKLOG.md")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn add_appends_with_separator() {
    let dir = with_backlog(BACKLOG);
    forch(&dir).args(["add", "--empty"]).assert().success();

    let text = std::fs::read_to_string(dir.path().join("BACKLOG.md")).unwrap();
    assert!(text.starts_with(BACKLOG.trim_end()));
    assert_eq!(text.matches("\n---\n").count(), 2);
    assert!(text.trim_end().ends_with("### Description"));
}

// ---------------------------------------------------------------------------
// forch status / list / prompt
// ---------------------------------------------------------------------------

#[test]
fn status_without_backlog() {
    let dir = TempDir::new().unwrap();
    forch(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("BACKLOG.md not found"));
}

#[test]
fn status_json_reports_next_feature() {
    let dir = with_backlog(BACKLOG);
    let out = forch(&dir).args(["status", "--json"]).output().unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value["status"], "ok");
    assert_eq!(value["unchecked"], 2);
    assert_eq!(value["next"]["name"], "Greeting");
    assert_eq!(value["next"]["criteria"][0]["type"], "file_exists");
}

#[test]
fn list_shows_all_features() {
    let dir = with_backlog(BACKLOG);
    forch(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Greeting"))
        .stdout(predicate::str::contains("Farewell"));
}

#[test]
fn list_reports_parse_warnings() {
    let dir = with_backlog("## Feature name\n[ ] No description\n\n### Notes\nx\n");
    forch(&dir)
        .arg("list")
        .assert()
        .success()
        .stderr(predicate::str::contains("Missing '### Description' section"));
}

#[test]
fn prompt_prints_first_unchecked() {
    let dir = with_backlog(BACKLOG);
    forch(&dir)
        .arg("prompt")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Implement Feature: Greeting"))
        .stdout(predicate::str::contains("Requirements:\n- Say hello"))
        .stdout(predicate::str::contains("Farewell").not());
}

#[test]
fn prompt_includes_skills_manifest() {
    let dir = with_backlog(BACKLOG);
    let skills = dir.path().join("skills/pdf");
    std::fs::create_dir_all(&skills).unwrap();
    std::fs::write(
        skills.join("SKILL.md"),
        "---\nname: pdf\ndescription: Work with PDFs\n---\n",
    )
    .unwrap();
    forch(&dir)
        .args(["config", "set", "skills_dir"])
        .arg(dir.path().join("skills"))
        .assert()
        .success();

    forch(&dir)
        .args(["prompt", "--skills"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("<available_skills>"))
        .stdout(predicate::str::contains("<name>pdf</name>"));
}

#[test]
fn prompt_leaves_out_unselected_skills() {
    let dir = with_backlog(BACKLOG);
    for (name, description) in [("docx", "Edit Word files"), ("pdf", "Work with PDFs")] {
        let skill = dir.path().join("skills").join(name);
        std::fs::create_dir_all(&skill).unwrap();
        std::fs::write(
            skill.join("SKILL.md"),
            format!("---\nname: {name}\ndescription: {description}\n---\n"),
        )
        .unwrap();
    }
    forch(&dir)
        .args(["config", "set", "skills_dir"])
        .arg(dir.path().join("skills"))
        .assert()
        .success();

    forch(&dir)
        .args(["skills", "unselect", "pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unselected: pdf"));
    forch(&dir)
        .args(["prompt", "--skills"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<name>docx</name>"))
        .stdout(predicate::str::contains("<name>pdf</name>").not());

    forch(&dir)
        .args(["skills", "select", "pdf"])
        .assert()
        .success();
    forch(&dir)
        .args(["prompt", "--skills"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<name>pdf</name>"));

    forch(&dir)
        .args(["skills", "select", "xlsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no skill named 'xlsx'"));
}

#[test]
fn missing_backlog_is_an_error() {
    let dir = TempDir::new().unwrap();
    forch(&dir)
        .arg("prompt")
        .assert()
        .failure()
        .stderr(predicate::str::contains("BACKLOG.md not found"));
}

// ---------------------------------------------------------------------------
// forch verify
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn verify_fails_then_passes() {
    let dir = with_backlog(BACKLOG);
    forch(&dir)
        .arg("verify")
        .assert()
        .failure()
        .stdout(predicate::str::contains("✘ File missing: hello.txt"))
        .stderr(predicate::str::contains("verification of 'Greeting' failed"));

    std::fs::write(dir.path().join("hello.txt"), "hi").unwrap();
    forch(&dir)
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("✔ File exists: hello.txt"))
        .stdout(predicate::str::contains("PASSED"));

    // Verification alone never edits the backlog.
    let text = std::fs::read_to_string(dir.path().join("BACKLOG.md")).unwrap();
    assert_eq!(text, BACKLOG);
}

#[test]
fn verify_without_criteria_fails() {
    let dir = with_backlog("## Feature name\n[ ] Loose\n\n### Description\nx\n");
    forch(&dir)
        .arg("verify")
        .assert()
        .failure()
        .stdout(predicate::str::contains("No acceptance criteria present."));
}

// ---------------------------------------------------------------------------
// forch run
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn run_hands_off_verifies_and_checks_off() {
    let dir = with_backlog(BACKLOG);
    std::fs::write(dir.path().join("hello.txt"), "hi").unwrap();
    forch(&dir)
        .args(["config", "set", "completion_behavior", "check_off"])
        .assert()
        .success();
    forch(&dir)
        .args(["config", "set", "copy_prompt_to_clipboard", "false"])
        .assert()
        .success();

    forch(&dir)
        .arg("run")
        .write_stdin("v\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Implement Feature: Greeting"))
        .stdout(predicate::str::contains("[AWAITING_AI]"))
        .stdout(predicate::str::contains("[COMPLETED]"));

    let text = std::fs::read_to_string(dir.path().join("BACKLOG.md")).unwrap();
    assert!(text.contains("[x] Greeting"));
    assert!(text.contains("[ ] Farewell"));
}

#[test]
fn run_with_nothing_to_do() {
    let dir = with_backlog("## Feature name\n[x] Done\n\n### Description\nx\n");
    forch(&dir)
        .arg("run")
        .write_stdin("q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("All features are done."));
}

#[test]
fn run_manual_complete_moves_to_completed_file() {
    let dir = with_backlog(BACKLOG);
    forch(&dir)
        .args(["config", "set", "copy_prompt_to_clipboard", "off"])
        .assert()
        .success();
    forch(&dir)
        .arg("run")
        .write_stdin("c\nq\n")
        .assert()
        .success();

    let completed = std::fs::read_to_string(dir.path().join("COMPLETED.md")).unwrap();
    assert!(completed.starts_with("# Completed Features"));
    assert!(completed.contains("[x] Greeting"));
    let text = std::fs::read_to_string(dir.path().join("BACKLOG.md")).unwrap();
    assert!(!text.contains("Greeting"));
}

#[cfg(unix)]
#[test]
fn run_exits_on_interrupt_after_a_verification() {
    use std::io::{Read, Write};
    use std::process::Stdio;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    let dir = with_backlog(BACKLOG);
    forch(&dir)
        .args(["config", "set", "copy_prompt_to_clipboard", "false"])
        .assert()
        .success();

    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("forch"))
        .arg("run")
        .current_dir(dir.path())
        .env("FORCH_ROOT", dir.path())
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let seen = Arc::new(Mutex::new(String::new()));
    let mut stdout = child.stdout.take().unwrap();
    let sink = Arc::clone(&seen);
    std::thread::spawn(move || {
        let mut buf = [0u8; 1024];
        while let Ok(n) = stdout.read(&mut buf) {
            if n == 0 {
                break;
            }
            sink.lock().unwrap().push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    });
    let wait_for_prompts = |count: usize| {
        let start = Instant::now();
        while seen.lock().unwrap().matches("file(s) changed > ").count() < count {
            assert!(start.elapsed() < Duration::from_secs(30), "no prompt: {}", seen.lock().unwrap());
            std::thread::sleep(Duration::from_millis(50));
        }
    };

    wait_for_prompts(1);
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"v\n").unwrap();
    stdin.flush().unwrap();
    wait_for_prompts(2);
    assert!(seen.lock().unwrap().contains("File missing: hello.txt"));

    let status = std::process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
    let exit = child.wait().unwrap();
    drop(stdin);
    assert_eq!(exit.code(), Some(130));
}

// ---------------------------------------------------------------------------
// forch config
// ---------------------------------------------------------------------------

#[test]
fn config_show_defaults() {
    let dir = TempDir::new().unwrap();
    forch(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("completion_behavior: move_to_completed"))
        .stdout(predicate::str::contains("command_timeout_seconds: 600"));
}

#[test]
fn config_set_rejects_bad_values() {
    let dir = TempDir::new().unwrap();
    forch(&dir)
        .args(["config", "set", "completion_behavior", "archive"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid setting 'completion_behavior'"));
    forch(&dir)
        .args(["config", "set", "colour", "blue"])
        .assert()
        .failure();
}

#[test]
fn config_validate_warns() {
    let dir = TempDir::new().unwrap();
    forch(&dir)
        .args(["config", "set", "command_timeout_seconds", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning] command_timeout_seconds"));
    forch(&dir)
        .args(["config", "validate", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("command_timeout_seconds"));
}

// ---------------------------------------------------------------------------
// forch skills
// ---------------------------------------------------------------------------

#[test]
fn skills_download_from_contents_api() {
    let mut server = mockito::Server::new();
    let base = server.url();
    let _root = server
        .mock("GET", "/skills")
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!([
                { "name": "pdf", "type": "dir", "url": format!("{base}/skills/pdf"), "download_url": null }
            ])
            .to_string(),
        )
        .create();
    let _pdf = server
        .mock("GET", "/skills/pdf")
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!([
                { "name": "SKILL.md", "type": "file", "url": "", "download_url": format!("{base}/raw/SKILL.md") }
            ])
            .to_string(),
        )
        .create();
    let _raw = server
        .mock("GET", "/raw/SKILL.md")
        .with_body("---\nname: pdf\ndescription: Work with PDFs\n---\n")
        .create();

    let dir = TempDir::new().unwrap();
    let skills_dir = dir.path().join("skills");
    forch(&dir)
        .args(["config", "set", "skills_dir"])
        .arg(&skills_dir)
        .assert()
        .success();

    forch(&dir)
        .args(["skills", "download"])
        .env("FORCH_SKILLS_URL", format!("{base}/skills"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloaded 1 skill(s)"));
    assert!(skills_dir.join("pdf/SKILL.md").exists());

    forch(&dir)
        .args(["skills", "download"])
        .env("FORCH_SKILLS_URL", format!("{base}/skills"))
        .assert()
        .success()
        .stdout(predicate::str::contains("already has skills"));

    forch(&dir)
        .args(["skills", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Work with PDFs"));
}
