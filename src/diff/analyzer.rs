use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::diff::FetchError;

pub const DEFAULT_ANALYZER_PROGRAM: &str = "slim";
pub const DEFAULT_ANALYZER_TIMEOUT: Duration = Duration::from_secs(300);

/// Produces an analysis report for `image` at `report_path`. Implementations
/// must stop their work when the returned future is dropped.
#[async_trait]
pub trait ReportAnalyzer: Send + Sync + 'static {
    async fn analyze(&self, image: &str, report_path: &Path) -> Result<(), FetchError>;
}

pub type SharedReportAnalyzer = Arc<dyn ReportAnalyzer>;

pub fn xray_args(image: &str, report_path: &Path) -> Vec<String> {
    vec![
        String::from("--report"),
        report_path.display().to_string(),
        String::from("xray"),
        String::from("--target"),
        image.to_string(),
        String::from("--changes"),
        String::from("all"),
        String::from("--changes-output"),
        String::from("report"),
    ]
}

/// Runs `slim xray` as a child process. The child is killed if the fetch is
/// cancelled or exceeds `timeout`.
#[derive(Debug, Clone)]
pub struct SlimAnalyzer {
    program: String,
    timeout: Duration,
}

impl SlimAnalyzer {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ReportAnalyzer for SlimAnalyzer {
    async fn analyze(&self, image: &str, report_path: &Path) -> Result<(), FetchError> {
        let args = xray_args(image, report_path);
        debug!(program = %self.program, args = ?args, "launching analyzer");

        let mut child = Command::new(self.program.as_str())
            .args(args.iter().map(String::as_str))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FetchError::AnalyzerLaunch {
                program: self.program.clone(),
                source,
            })?;

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                return Err(FetchError::AnalyzerLaunch {
                    program: self.program.clone(),
                    source,
                });
            }
            Err(_elapsed) => {
                let _ = child.kill().await;
                return Err(FetchError::AnalyzerTimeout {
                    program: self.program.clone(),
                    timeout: self.timeout,
                });
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(FetchError::AnalyzerExit {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn xray_args_request_a_full_change_report() {
        let args = xray_args("alpine:3.19", Path::new("/tmp/alpine_3.19-x-slim.report.json"));
        assert_eq!(
            args,
            vec![
                "--report",
                "/tmp/alpine_3.19-x-slim.report.json",
                "xray",
                "--target",
                "alpine:3.19",
                "--changes",
                "all",
                "--changes-output",
                "report",
            ]
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_failure() {
        let analyzer = SlimAnalyzer::new("slimdiff-no-such-analyzer", Duration::from_secs(5));
        let err = analyzer
            .analyze("alpine:3.19", PathBuf::from("/tmp/unused.json").as_path())
            .await
            .expect_err("launch should fail");
        assert!(matches!(err, FetchError::AnalyzerLaunch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_an_invocation_failure() {
        let analyzer = SlimAnalyzer::new("false", Duration::from_secs(5));
        let err = analyzer
            .analyze("alpine:3.19", PathBuf::from("/tmp/unused.json").as_path())
            .await
            .expect_err("false should exit nonzero");
        match err {
            FetchError::AnalyzerExit { program, .. } => assert_eq!(program, "false"),
            other => panic!("expected exit failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_is_success() {
        let analyzer = SlimAnalyzer::new("true", Duration::from_secs(5));
        analyzer
            .analyze("alpine:3.19", PathBuf::from("/tmp/unused.json").as_path())
            .await
            .expect("true should exit zero");
    }

    /// A stand-in analyzer that writes its pid to the report path and then
    /// sleeps in place of the real scan.
    #[cfg(unix)]
    struct SleepingAnalyzer {
        dir: PathBuf,
        script: PathBuf,
    }

    #[cfg(unix)]
    impl SleepingAnalyzer {
        fn install() -> Self {
            use std::os::unix::fs::PermissionsExt;

            let dir = std::env::temp_dir()
                .join(format!("slimdiff_analyzer_test_{}", uuid::Uuid::new_v4()));
            std::fs::create_dir_all(dir.as_path()).expect("temp dir should exist");
            let script = dir.join("sleepy-slim");
            std::fs::write(script.as_path(), "#!/bin/sh\necho $$ > \"$2\"\nexec sleep 5\n")
                .expect("script should be writable");
            std::fs::set_permissions(script.as_path(), std::fs::Permissions::from_mode(0o755))
                .expect("script should be executable");
            Self { dir, script }
        }

        fn analyzer(&self, timeout: Duration) -> SlimAnalyzer {
            SlimAnalyzer::new(self.script.display().to_string(), timeout)
        }

        fn report_path(&self) -> PathBuf {
            self.dir.join("pid.report.json")
        }

        async fn recorded_pid(&self) -> u32 {
            for _ in 0..50 {
                if let Ok(raw) = tokio::fs::read_to_string(self.report_path()).await {
                    if let Ok(pid) = raw.trim().parse() {
                        return pid;
                    }
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            panic!("analyzer never recorded its pid");
        }
    }

    /// Reaped processes vanish from /proc; a killed child that is not yet
    /// reaped lingers as a zombie.
    #[cfg(unix)]
    fn process_is_gone(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => true,
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .is_some_and(|state| state == "Z" || state == "X"),
        }
    }

    /// Freshly written scripts can briefly fail with ETXTBSY while another
    /// test thread forks.
    #[cfg(unix)]
    async fn analyze_retrying_busy_script(
        analyzer: &SlimAnalyzer,
        report_path: &Path,
    ) -> Result<(), FetchError> {
        let mut attempts = 0;
        loop {
            match analyzer.analyze("alpine:3.19", report_path).await {
                Err(FetchError::AnalyzerLaunch { source, .. })
                    if source.raw_os_error() == Some(26) && attempts < 5 =>
                {
                    attempts += 1;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                other => return other,
            }
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_analyzer_is_killed_at_the_timeout() {
        let sleeping = SleepingAnalyzer::install();
        let analyzer = sleeping.analyzer(Duration::from_millis(200));
        let report_path = sleeping.report_path();

        let started = std::time::Instant::now();
        let err = analyze_retrying_busy_script(&analyzer, report_path.as_path())
            .await
            .expect_err("analyzer should time out");
        assert!(started.elapsed() < Duration::from_secs(4));
        match err {
            FetchError::AnalyzerTimeout { timeout, .. } => {
                assert_eq!(timeout, Duration::from_millis(200))
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        let pid = sleeping.recorded_pid().await;
        assert!(process_is_gone(pid), "analyzer {pid} still running");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropping_the_analysis_kills_the_child() {
        let sleeping = SleepingAnalyzer::install();
        let analyzer = sleeping.analyzer(Duration::from_secs(30));
        let report_path = sleeping.report_path();

        let outcome = tokio::time::timeout(
            Duration::from_millis(200),
            analyze_retrying_busy_script(&analyzer, report_path.as_path()),
        )
        .await;
        assert!(outcome.is_err());

        let pid = sleeping.recorded_pid().await;
        let mut gone = process_is_gone(pid);
        for _ in 0..100 {
            if gone {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            gone = process_is_gone(pid);
        }
        assert!(gone, "analyzer {pid} survived its dropped future");
    }
}
