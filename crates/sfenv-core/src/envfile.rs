use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::keys::to_upper_snake;
use crate::session::SessionInfo;

/// Errors raised while reading or writing an env file.
#[derive(Debug, Error)]
pub enum EnvFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat `KEY=VALUE` file. Values are written verbatim: no quoting, no escaping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    entries: Vec<(String, String)>,
}

impl EnvFile {
    /// One entry per session field, keys converted to UPPER_SNAKE_CASE.
    pub fn from_session(session: &SessionInfo) -> Self {
        let entries = session
            .iter()
            .map(|(key, value)| (to_upper_snake(key), value.to_owned()))
            .collect();
        Self { entries }
    }

    /// Parse file contents. Blank lines and lines without `=` are skipped; the
    /// value is everything after the first `=`.
    pub fn parse(contents: &str) -> Self {
        let mut entries = Vec::new();
        for line in contents.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.trim().is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                debug!(line, "skipping env line without '='");
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            entries.push((key.to_owned(), value.to_owned()));
        }
        Self { entries }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read and parse the file at `path`; `Ok(None)` when it does not exist.
    pub fn read_from(path: &Path) -> Result<Option<Self>, EnvFileError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        Ok(Some(Self::parse(&raw)))
    }

    /// Replace the file at `path` with the rendered entries.
    pub fn write_to(&self, path: &Path) -> Result<(), EnvFileError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.write_all(self.render().as_bytes())?;

        // The file holds an access token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perm = file.metadata()?.permissions();
            perm.set_mode(0o600);
            fs::set_permissions(path, perm)?;
        }

        Ok(())
    }

    /// Export entries into the process environment. Variables that are already
    /// set win over the file, and entries containing a NUL byte are skipped.
    /// Returns how many entries were applied.
    ///
    /// Call this before any other threads are started.
    pub fn apply_to_process_env(&self) -> usize {
        let mut applied = 0;
        for (key, value) in &self.entries {
            if key.contains('\0') || value.contains('\0') {
                warn!(key = key.as_str(), "skipping env entry containing a NUL byte");
                continue;
            }
            if env::var_os(key).is_some() {
                debug!(key = key.as_str(), "keeping existing environment value");
                continue;
            }
            env::set_var(key, value);
            applied += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_session() -> SessionInfo {
        SessionInfo::from_cli_output(r#"{"result":{"orgId":"00Dxx","accessToken":"tok123"}}"#)
            .unwrap()
    }

    #[test]
    fn renders_transformed_keys_in_order() {
        let file = EnvFile::from_session(&sample_session());
        assert_eq!(file.render(), "ORG_ID=00Dxx\nACCESS_TOKEN=tok123\n");
    }

    #[test]
    fn values_are_not_escaped() {
        let session = SessionInfo::from_cli_output(
            r#"{"result":{"loginUrl":"https://login.example.com/?a=b&c=d","username":"a b@c.d"}}"#,
        )
        .unwrap();
        let file = EnvFile::from_session(&session);
        assert_eq!(
            file.render(),
            "LOGIN_URL=https://login.example.com/?a=b&c=d\nUSERNAME=a b@c.d\n"
        );
        let parsed = EnvFile::parse(&file.render());
        assert_eq!(parsed, file);
    }

    #[test]
    fn parse_skips_blank_and_malformed_lines() {
        let parsed = EnvFile::parse("A=1\r\n\nnot a pair\n=orphan\nB=x=y\nC=\n");
        assert_eq!(
            parsed.entries(),
            &[
                ("A".to_owned(), "1".to_owned()),
                ("B".to_owned(), "x=y".to_owned()),
                ("C".to_owned(), String::new()),
            ]
        );
    }

    #[test]
    fn write_truncates_previous_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");
        fs::write(&path, "STALE=1\nOTHER=2\nMORE=3\n").unwrap();

        EnvFile::from_session(&sample_session())
            .write_to(&path)
            .unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "ORG_ID=00Dxx\nACCESS_TOKEN=tok123\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn read_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = EnvFile::read_from(&temp_dir.path().join("absent.env")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn apply_keeps_existing_variables() {
        env::set_var("SFENV_APPLY_TEST_EXISTING", "from-shell");
        env::remove_var("SFENV_APPLY_TEST_NEW");

        let file = EnvFile::parse("SFENV_APPLY_TEST_EXISTING=from-file\nSFENV_APPLY_TEST_NEW=fresh\n");
        let applied = file.apply_to_process_env();

        assert_eq!(applied, 1);
        assert_eq!(env::var("SFENV_APPLY_TEST_EXISTING").unwrap(), "from-shell");
        assert_eq!(env::var("SFENV_APPLY_TEST_NEW").unwrap(), "fresh");
    }

    #[test]
    fn apply_skips_values_with_nul_bytes() {
        env::remove_var("SFENV_NUL_TEST_VALUE");
        env::remove_var("SFENV_NUL_TEST_OK");

        let session = SessionInfo::from_cli_output(
            r#"{"result":{"sfenvNulTestValue":"a\u0000b","sfenvNulTestOk":"fine"}}"#,
        )
        .unwrap();
        let file = EnvFile::parse(&EnvFile::from_session(&session).render());
        let applied = file.apply_to_process_env();

        assert_eq!(applied, 1);
        assert!(env::var_os("SFENV_NUL_TEST_VALUE").is_none());
        assert_eq!(env::var("SFENV_NUL_TEST_OK").unwrap(), "fine");
    }
}
