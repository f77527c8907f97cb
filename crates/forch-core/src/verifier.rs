//! Acceptance verification: evaluates a feature's criteria in declared order
//! and produces a complete pass/fail report.

use crate::criterion::AcceptanceCriterion;
use crate::error::{ForchError, Result};
use crate::exec::{capture_env, ProcessExecutor, ProcessOutput, ShellExecutor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const NO_CRITERIA: &str = "No acceptance criteria present.";

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub criterion: AcceptanceCriterion,
    pub message: String,
}

/// A criterion left for a human to judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualCheck {
    pub description: String,
}

/// `success == failures.is_empty()` except for an empty criteria list,
/// which is a failure with no per-criterion entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    pub details: Vec<String>,
    pub failures: Vec<FailureDetail>,
    pub manual_verifications: Vec<ManualCheck>,
}

// ---------------------------------------------------------------------------
// PathResolver
// ---------------------------------------------------------------------------

/// Answers whether a relative path exists for the project.
pub trait PathResolver: Send + Sync {
    fn exists(&self, relative: &str) -> bool;

    /// Refresh any cached view of `relative` after it was found. Failures
    /// are logged by the caller and otherwise ignored.
    fn refresh(&self, _relative: &str) -> Result<()> {
        Ok(())
    }
}

/// Resolves against the configured content roots first, then the base
/// directory. A hit under any of them counts.
#[derive(Debug, Clone)]
pub struct FsPathResolver {
    base: PathBuf,
    roots: Vec<PathBuf>,
}

impl FsPathResolver {
    pub fn new(base: impl Into<PathBuf>, roots: Vec<PathBuf>) -> Self {
        let base = base.into();
        let roots = roots
            .into_iter()
            .map(|r| if r.is_absolute() { r } else { base.join(r) })
            .collect();
        Self { base, roots }
    }
}

impl PathResolver for FsPathResolver {
    fn exists(&self, relative: &str) -> bool {
        self.roots
            .iter()
            .chain(std::iter::once(&self.base))
            .any(|root| root.join(relative).exists())
    }

    fn refresh(&self, relative: &str) -> Result<()> {
        std::fs::metadata(self.base.join(relative))
            .or_else(|_| {
                self.roots
                    .iter()
                    .find_map(|r| std::fs::metadata(r.join(relative)).ok())
                    .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
            })
            .map(|_| ())
            .map_err(Into::into)
    }
}

// ---------------------------------------------------------------------------
// CancelFlag
// ---------------------------------------------------------------------------

/// Cooperative cancellation, checked between criteria. A command that has
/// already started runs to completion or timeout.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Re-arm after a cancelled pass so clones held elsewhere stay valid.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

pub struct Verifier {
    base_dir: PathBuf,
    resolver: Arc<dyn PathResolver>,
    executor: Arc<dyn ProcessExecutor>,
    env: Vec<(String, String)>,
    timeout: Duration,
}

impl Verifier {
    /// The process environment is captured here, once.
    pub fn new(
        base_dir: impl Into<PathBuf>,
        resolver: Arc<dyn PathResolver>,
        executor: Arc<dyn ProcessExecutor>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            resolver,
            executor,
            env: capture_env(),
            timeout,
        }
    }

    /// Filesystem resolver over `roots` + `base_dir` and the platform shell.
    pub fn for_project(base_dir: &Path, roots: Vec<PathBuf>, timeout: Duration) -> Self {
        Self::new(
            base_dir,
            Arc::new(FsPathResolver::new(base_dir, roots)),
            Arc::new(ShellExecutor::default()),
            timeout,
        )
    }

    /// Evaluate every criterion in order. No short-circuit: a failure early
    /// on does not stop later criteria from running.
    pub fn verify(
        &self,
        criteria: &[AcceptanceCriterion],
        cancel: &CancelFlag,
    ) -> Result<VerificationResult> {
        if criteria.is_empty() {
            return Ok(VerificationResult {
                success: false,
                details: vec![NO_CRITERIA.to_string()],
                failures: Vec::new(),
                manual_verifications: Vec::new(),
            });
        }

        let mut details = Vec::with_capacity(criteria.len());
        let mut failures = Vec::new();
        let mut manual_verifications = Vec::new();

        for criterion in criteria {
            if cancel.is_cancelled() {
                return Err(ForchError::Cancelled);
            }
            match criterion {
                AcceptanceCriterion::FileExists { path } => {
                    if self.resolver.exists(path) {
                        if let Err(e) = self.resolver.refresh(path) {
                            tracing::debug!(path, error = %e, "refresh after file check failed");
                        }
                        details.push(format!("✔ File exists: {path}"));
                    } else {
                        let msg = format!("✘ File missing: {path}");
                        details.push(msg.clone());
                        failures.push(FailureDetail {
                            criterion: criterion.clone(),
                            message: msg,
                        });
                    }
                }
                AcceptanceCriterion::CommandSucceeds { command } => {
                    let output =
                        self.executor
                            .run(command, &self.base_dir, &self.env, self.timeout)?;
                    if output.success() {
                        details.push(format!("✔ Command succeeded: {command}"));
                    } else {
                        let msg = self.command_failure(command, &output);
                        details.push(msg.clone());
                        failures.push(FailureDetail {
                            criterion: criterion.clone(),
                            message: msg,
                        });
                    }
                }
                AcceptanceCriterion::ManualVerification { description } => {
                    details.push(format!("• Manual verification required: {description}"));
                    manual_verifications.push(ManualCheck {
                        description: description.clone(),
                    });
                }
                AcceptanceCriterion::NoTestsFail => {
                    details.push(
                        "• No tests fail: no test runner integration, confirm manually"
                            .to_string(),
                    );
                    manual_verifications.push(ManualCheck {
                        description: criterion.label(),
                    });
                }
            }
        }

        Ok(VerificationResult {
            success: failures.is_empty(),
            details,
            failures,
            manual_verifications,
        })
    }

    fn command_failure(&self, command: &str, output: &ProcessOutput) -> String {
        let mut msg = if output.timed_out {
            format!(
                "✘ Command timed out after {}s ({command})",
                self.timeout.as_secs_f64()
            )
        } else {
            let exit = output
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            format!("✘ Command failed ({command}): exit={exit}")
        };
        msg.push_str(&format!("\nWorking Dir: {}", self.base_dir.display()));
        msg.push_str(&format!("\nSTDOUT:\n{}", output.stdout));
        msg.push_str(&format!("\nSTDERR:\n{}", output.stderr));

        let stderr = output.stderr.to_lowercase();
        if stderr.contains("not installed") || stderr.contains("command not found") {
            msg.push_str(
                "\n\nHINT: dependencies may be missing. Install the project's dependencies \
                 (e.g. 'npm install' or 'cargo fetch') and verify again.",
            );
        }
        msg
    }

    /// Run [`Verifier::verify`] on the blocking pool. The caller awaits the
    /// returned task; state is only touched once the result is back.
    pub fn spawn(
        self: &Arc<Self>,
        criteria: Vec<AcceptanceCriterion>,
        cancel: CancelFlag,
    ) -> VerificationTask {
        let verifier = Arc::clone(self);
        let handle = tokio::task::spawn_blocking(move || verifier.verify(&criteria, &cancel));
        VerificationTask { handle }
    }
}

/// Handle to a verification pass running off the caller's task.
pub struct VerificationTask {
    handle: tokio::task::JoinHandle<Result<VerificationResult>>,
}

impl VerificationTask {
    /// A panic inside the pass surfaces as [`ForchError::TaskCrashed`].
    pub async fn join(self) -> Result<VerificationResult> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(ForchError::TaskCrashed(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Shell;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every command and answers from a script.
    struct ScriptedExecutor {
        ran: Mutex<Vec<String>>,
        exit_code: i32,
        stderr: String,
    }

    impl ScriptedExecutor {
        fn new(exit_code: i32, stderr: &str) -> Arc<Self> {
            Arc::new(Self {
                ran: Mutex::new(Vec::new()),
                exit_code,
                stderr: stderr.to_string(),
            })
        }
    }

    impl ProcessExecutor for ScriptedExecutor {
        fn run(
            &self,
            command: &str,
            _workdir: &Path,
            _env: &[(String, String)],
            _timeout: Duration,
        ) -> Result<ProcessOutput> {
            self.ran.lock().unwrap().push(command.to_string());
            Ok(ProcessOutput {
                exit_code: Some(self.exit_code),
                stdout: "some output".to_string(),
                stderr: self.stderr.clone(),
                timed_out: false,
            })
        }
    }

    fn fs_verifier(dir: &TempDir) -> Verifier {
        Verifier::new(
            dir.path(),
            Arc::new(FsPathResolver::new(dir.path(), vec![])),
            ScriptedExecutor::new(0, ""),
            Duration::from_secs(5),
        )
    }

    fn file(path: &str) -> AcceptanceCriterion {
        AcceptanceCriterion::FileExists { path: path.into() }
    }

    fn command(cmd: &str) -> AcceptanceCriterion {
        AcceptanceCriterion::CommandSucceeds {
            command: cmd.into(),
        }
    }

    fn manual(desc: &str) -> AcceptanceCriterion {
        AcceptanceCriterion::ManualVerification {
            description: desc.into(),
        }
    }

    #[test]
    fn empty_criteria_is_failure() {
        let dir = TempDir::new().unwrap();
        let result = fs_verifier(&dir).verify(&[], &CancelFlag::new()).unwrap();
        assert!(!result.success);
        assert_eq!(result.details, vec![NO_CRITERIA.to_string()]);
    }

    #[test]
    fn manual_only_succeeds_and_is_surfaced() {
        let dir = TempDir::new().unwrap();
        let result = fs_verifier(&dir)
            .verify(&[manual("x")], &CancelFlag::new())
            .unwrap();
        assert!(result.success);
        assert_eq!(
            result.manual_verifications,
            vec![ManualCheck {
                description: "x".into()
            }]
        );
    }

    #[test]
    fn file_exists_flips_when_created() {
        let dir = TempDir::new().unwrap();
        let verifier = fs_verifier(&dir);
        let criteria = vec![file("test.txt")];

        let result = verifier.verify(&criteria, &CancelFlag::new()).unwrap();
        assert!(!result.success);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].message.contains("File missing"));
        assert!(result.failures[0].message.contains("test.txt"));

        std::fs::write(dir.path().join("test.txt"), "content").unwrap();
        let result = verifier.verify(&criteria, &CancelFlag::new()).unwrap();
        assert!(result.success);
        assert!(result.failures.is_empty());
    }

    #[test]
    fn file_found_under_content_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("web/src")).unwrap();
        std::fs::write(dir.path().join("web/src/app.ts"), "").unwrap();
        let resolver = FsPathResolver::new(dir.path(), vec![PathBuf::from("web")]);
        assert!(resolver.exists("src/app.ts"));
        assert!(resolver.exists("web/src/app.ts"));
        assert!(!resolver.exists("src/other.ts"));
    }

    #[test]
    fn mixed_criteria_keep_manual_entries() {
        let dir = TempDir::new().unwrap();
        let verifier = fs_verifier(&dir);
        let criteria = vec![file("test.txt"), manual("Check UI")];

        let result = verifier.verify(&criteria, &CancelFlag::new()).unwrap();
        assert!(!result.success);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.manual_verifications.len(), 1);

        std::fs::write(dir.path().join("test.txt"), "content").unwrap();
        let result = verifier.verify(&criteria, &CancelFlag::new()).unwrap();
        assert!(result.success);
        assert_eq!(result.manual_verifications.len(), 1);
        assert_eq!(result.details.len(), 2);
    }

    #[test]
    fn no_short_circuit_after_failure() {
        let dir = TempDir::new().unwrap();
        let exec = ScriptedExecutor::new(1, "");
        let verifier = Verifier::new(
            dir.path(),
            Arc::new(FsPathResolver::new(dir.path(), vec![])),
            exec.clone(),
            Duration::from_secs(5),
        );
        let criteria = vec![command("first"), file("missing.txt"), command("second")];
        let result = verifier.verify(&criteria, &CancelFlag::new()).unwrap();
        assert!(!result.success);
        assert_eq!(result.details.len(), 3);
        assert_eq!(result.failures.len(), 3);
        assert_eq!(*exec.ran.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(result.failures[1].criterion, file("missing.txt"));
    }

    #[test]
    fn command_failure_message_carries_context_and_hint() {
        let dir = TempDir::new().unwrap();
        let verifier = Verifier::new(
            dir.path(),
            Arc::new(FsPathResolver::new(dir.path(), vec![])),
            ScriptedExecutor::new(127, "sh: jest: Command Not Found"),
            Duration::from_secs(5),
        );
        let result = verifier
            .verify(&[command("jest")], &CancelFlag::new())
            .unwrap();
        let msg = &result.failures[0].message;
        assert!(msg.contains("exit=127"));
        assert!(msg.contains("Working Dir:"));
        assert!(msg.contains("STDOUT:\nsome output"));
        assert!(msg.contains("STDERR:\nsh: jest: Command Not Found"));
        assert!(msg.contains("dependencies may be missing"));
    }

    #[test]
    fn no_tests_fail_is_left_for_review() {
        let dir = TempDir::new().unwrap();
        let result = fs_verifier(&dir)
            .verify(&[AcceptanceCriterion::NoTestsFail], &CancelFlag::new())
            .unwrap();
        assert!(result.success);
        assert_eq!(result.manual_verifications[0].description, "No tests fail");
    }

    #[test]
    fn cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = fs_verifier(&dir).verify(&[file("a")], &cancel).unwrap_err();
        assert!(matches!(err, ForchError::Cancelled));
    }

    /// Cancels the pass from inside the first command it runs.
    struct CancelOnRun {
        cancel: CancelFlag,
        ran: Mutex<Vec<String>>,
    }

    impl ProcessExecutor for CancelOnRun {
        fn run(
            &self,
            command: &str,
            _workdir: &Path,
            _env: &[(String, String)],
            _timeout: Duration,
        ) -> Result<ProcessOutput> {
            self.ran.lock().unwrap().push(command.to_string());
            self.cancel.cancel();
            Ok(ProcessOutput {
                exit_code: Some(0),
                ..ProcessOutput::default()
            })
        }
    }

    #[test]
    fn cancel_takes_effect_before_next_criterion() {
        let dir = TempDir::new().unwrap();
        let cancel = CancelFlag::new();
        let exec = Arc::new(CancelOnRun {
            cancel: cancel.clone(),
            ran: Mutex::new(Vec::new()),
        });
        let verifier = Verifier::new(
            dir.path(),
            Arc::new(FsPathResolver::new(dir.path(), vec![])),
            exec.clone(),
            Duration::from_secs(5),
        );
        let err = verifier
            .verify(&[command("first"), command("second")], &cancel)
            .unwrap_err();
        assert!(matches!(err, ForchError::Cancelled));
        assert_eq!(*exec.ran.lock().unwrap(), vec!["first"]);
    }

    #[cfg(unix)]
    #[test]
    fn real_shell_commands() {
        let dir = TempDir::new().unwrap();
        let verifier = Verifier::new(
            dir.path(),
            Arc::new(FsPathResolver::new(dir.path(), vec![])),
            Arc::new(ShellExecutor::new(Shell::Posix(PathBuf::from("/bin/sh")))),
            Duration::from_secs(10),
        );
        let result = verifier
            .verify(&[command("true"), command("exit 2")], &CancelFlag::new())
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.failures.len(), 1);
        assert!(result.details[0].starts_with("✔ Command succeeded"));
        assert!(result.failures[0].message.contains("exit=2"));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_is_a_failure() {
        let dir = TempDir::new().unwrap();
        let verifier = Verifier::new(
            dir.path(),
            Arc::new(FsPathResolver::new(dir.path(), vec![])),
            Arc::new(ShellExecutor::new(Shell::Posix(PathBuf::from("/bin/sh")))),
            Duration::from_millis(200),
        );
        let result = verifier
            .verify(&[command("sleep 30")], &CancelFlag::new())
            .unwrap();
        assert!(!result.success);
        assert!(result.failures[0].message.contains("timed out"));
    }

    #[tokio::test]
    async fn spawned_pass_returns_report() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("done.txt"), "").unwrap();
        let verifier = Arc::new(fs_verifier(&dir));
        let result = verifier
            .spawn(vec![file("done.txt")], CancelFlag::new())
            .join()
            .await
            .unwrap();
        assert!(result.success);
    }
}
