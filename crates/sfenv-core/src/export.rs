use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::command::CommandRunner;
use crate::config::ExportConfig;
use crate::envfile::{EnvFile, EnvFileError};
use crate::session::{reported_failure, SessionInfo, SessionParseError};

/// Errors that abort a session export. Nothing is written when one occurs.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {}: {detail}", describe_exit(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        detail: String,
    },
    #[error(transparent)]
    Parse(#[from] SessionParseError),
    #[error("failed to write env file: {0}")]
    EnvFile(#[from] EnvFileError),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_owned(),
    }
}

/// What a successful export produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub keys: Vec<String>,
}

/// Pulls the current session from the external tool and writes it as an env file.
pub struct SessionExporter<R> {
    runner: R,
    config: ExportConfig,
}

impl<R> SessionExporter<R>
where
    R: CommandRunner,
{
    pub fn new(runner: R, config: ExportConfig) -> Self {
        Self { runner, config }
    }

    /// Run the session command and decode its output.
    pub async fn fetch_session(&self) -> Result<SessionInfo, ExportError> {
        let command = &self.config.command;
        let output = self
            .runner
            .run(command)
            .await
            .map_err(|source| ExportError::Spawn {
                command: command.to_string(),
                source,
            })?;

        if !output.success {
            let detail = reported_failure(&output.stdout)
                .unwrap_or_else(|| output.stderr.trim().to_owned());
            return Err(ExportError::CommandFailed {
                command: command.to_string(),
                code: output.code,
                detail,
            });
        }

        let session = SessionInfo::from_cli_output(&output.stdout)?;
        debug!(fields = session.len(), "decoded session");
        Ok(session)
    }

    /// Fetch the session and replace the configured env file with it.
    pub async fn export(&self) -> Result<ExportSummary, ExportError> {
        let session = self.fetch_session().await?;
        let file = EnvFile::from_session(&session);
        file.write_to(&self.config.env_file)?;

        info!(
            path = %self.config.env_file.display(),
            keys = file.len(),
            "wrote session env file"
        );
        Ok(ExportSummary {
            path: self.config.env_file.clone(),
            keys: file.entries().iter().map(|(key, _)| key.clone()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, SessionCommand};
    use std::fs;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FakeRunner {
        result: fn() -> io::Result<CommandOutput>,
        calls: AtomicUsize,
    }

    impl FakeRunner {
        fn new(result: fn() -> io::Result<CommandOutput>) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CommandRunner for FakeRunner {
        async fn run(&self, _command: &SessionCommand) -> io::Result<CommandOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn stdout(text: &str) -> io::Result<CommandOutput> {
        Ok(CommandOutput {
            code: Some(0),
            success: true,
            stdout: text.to_owned(),
            stderr: String::new(),
        })
    }

    fn exporter(temp_dir: &TempDir, runner: FakeRunner) -> SessionExporter<FakeRunner> {
        let config = ExportConfig::default().with_env_file(temp_dir.path().join(".env"));
        SessionExporter::new(runner, config)
    }

    #[tokio::test]
    async fn writes_transformed_session() {
        let temp_dir = TempDir::new().unwrap();
        let exporter = exporter(
            &temp_dir,
            FakeRunner::new(|| stdout(r#"{"result":{"orgId":"00Dxx","accessToken":"tok123"}}"#)),
        );

        let summary = exporter.export().await.unwrap();

        let written = fs::read_to_string(temp_dir.path().join(".env")).unwrap();
        assert_eq!(written, "ORG_ID=00Dxx\nACCESS_TOKEN=tok123\n");
        assert_eq!(summary.keys, ["ORG_ID", "ACCESS_TOKEN"]);
        assert_eq!(exporter.runner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_json_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let exporter = exporter(&temp_dir, FakeRunner::new(|| stdout("Warning: not json")));

        let err = exporter.export().await.unwrap_err();

        assert!(matches!(err, ExportError::Parse(SessionParseError::Json(_))));
        assert!(!temp_dir.path().join(".env").exists());
    }

    #[tokio::test]
    async fn invalid_json_leaves_previous_file_alone() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");
        fs::write(&path, "INSTANCE_URL=https://old.example.com\n").unwrap();
        let exporter = exporter(&temp_dir, FakeRunner::new(|| stdout("{")));

        assert!(exporter.export().await.is_err());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "INSTANCE_URL=https://old.example.com\n"
        );
    }

    #[tokio::test]
    async fn non_zero_exit_uses_tool_message() {
        let temp_dir = TempDir::new().unwrap();
        let exporter = exporter(
            &temp_dir,
            FakeRunner::new(|| {
                Ok(CommandOutput {
                    code: Some(1),
                    success: false,
                    stdout: r#"{"status":1,"name":"NoOrgFound","message":"No default org set"}"#
                        .to_owned(),
                    stderr: String::new(),
                })
            }),
        );

        let err = exporter.export().await.unwrap_err();
        match &err {
            ExportError::CommandFailed { code, detail, .. } => {
                assert_eq!(*code, Some(1));
                assert_eq!(detail, "NoOrgFound: No default org set");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("status 1"));
        assert!(!temp_dir.path().join(".env").exists());
    }

    #[tokio::test]
    async fn non_zero_exit_falls_back_to_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let exporter = exporter(
            &temp_dir,
            FakeRunner::new(|| {
                Ok(CommandOutput {
                    code: None,
                    success: false,
                    stdout: String::new(),
                    stderr: "killed\n".to_owned(),
                })
            }),
        );

        let err = exporter.export().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "`sf org display user --json` exited with a signal: killed"
        );
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let exporter = exporter(
            &temp_dir,
            FakeRunner::new(|| Err(io::Error::new(io::ErrorKind::NotFound, "sf not found"))),
        );

        let err = exporter.export().await.unwrap_err();
        assert!(matches!(err, ExportError::Spawn { .. }));
        assert!(!temp_dir.path().join(".env").exists());
    }
}
