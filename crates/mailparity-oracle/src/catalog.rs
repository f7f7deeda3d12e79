//! Oracle definitions and invocation configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Builtin oracles. Several share an implementation under test but run a
/// different script (and emit a different row shape).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinOracle {
    /// ruby -Ilib -e <script> (Mapi::Msg)
    RubyMsg,

    /// mix run -e <script> (OutlookMsg.open)
    OutlookMsg,

    /// python -c <script> (extract_msg)
    ExtractMsg,

    /// bun <staged script> (msg-viewer TypeScript parser)
    MsgViewer,

    /// mix run -e <script> (OutlookMsg.open_eml)
    OutlookEml,

    /// python -c <script> (stdlib email)
    PythonEmail,

    /// mix run -e <script> (report-mode warnings)
    OutlookWarnings,

    /// mix run -e <script> (report-mode PST diagnostic codes)
    OutlookPstReport,

    /// mix run -e <script> (PST structural counts)
    OutlookPstProbe,
}

/// Where an oracle's runtime comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Runtime {
    Ruby,
    Mix,
    Python,
    Bun,
}

impl BuiltinOracle {
    /// Oracle name as it appears in reports and policy files.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinOracle::RubyMsg => "ruby-msg",
            BuiltinOracle::ExtractMsg => "extract-msg",
            BuiltinOracle::MsgViewer => "msg-viewer",
            BuiltinOracle::PythonEmail => "python_email",
            BuiltinOracle::OutlookMsg
            | BuiltinOracle::OutlookEml
            | BuiltinOracle::OutlookWarnings
            | BuiltinOracle::OutlookPstReport
            | BuiltinOracle::OutlookPstProbe => "outlook_msg",
        }
    }

    /// Embedded oracle script.
    pub fn script(&self) -> &'static str {
        match self {
            BuiltinOracle::RubyMsg => include_str!("../scripts/msg_ruby.rb"),
            BuiltinOracle::OutlookMsg => include_str!("../scripts/msg_elixir.exs"),
            BuiltinOracle::ExtractMsg => include_str!("../scripts/msg_extract.py"),
            BuiltinOracle::MsgViewer => include_str!("../scripts/msg_viewer.ts"),
            BuiltinOracle::OutlookEml => include_str!("../scripts/eml_elixir.exs"),
            BuiltinOracle::PythonEmail => include_str!("../scripts/eml_python.py"),
            BuiltinOracle::OutlookWarnings => include_str!("../scripts/warnings_elixir.exs"),
            BuiltinOracle::OutlookPstReport => include_str!("../scripts/pst_report_elixir.exs"),
            BuiltinOracle::OutlookPstProbe => include_str!("../scripts/pst_probe_elixir.exs"),
        }
    }

    fn runtime(&self) -> Runtime {
        match self {
            BuiltinOracle::RubyMsg => Runtime::Ruby,
            BuiltinOracle::ExtractMsg | BuiltinOracle::PythonEmail => Runtime::Python,
            BuiltinOracle::MsgViewer => Runtime::Bun,
            _ => Runtime::Mix,
        }
    }
}

/// Installation roots and interpreters the builtin oracles run from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRoots {
    pub ruby_root: PathBuf,
    pub elixir_root: PathBuf,
    pub msg_viewer_root: PathBuf,
    pub python: String,
}

/// A script written to a temporary file inside the oracle's working
/// directory and passed as the first argument after `command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedScript {
    pub contents: String,
    pub suffix: String,
}

/// Configuration for one oracle invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleConfig {
    /// Oracle name used in reports.
    pub name: String,

    /// Command to execute (first element is executable). Input files are
    /// appended after it.
    pub command: Vec<String>,

    /// Working directory; must exist when set.
    pub cwd: Option<PathBuf>,

    pub staged_script: Option<StagedScript>,

    /// A missing `cwd` yields an empty result set instead of an error.
    pub optional: bool,

    /// Timeout in seconds (0 = wait indefinitely).
    pub timeout_secs: u64,
}

impl OracleConfig {
    pub fn builtin(oracle: BuiltinOracle, roots: &OracleRoots, timeout_secs: u64) -> Self {
        let script = oracle.script().to_string();
        let (command, cwd, staged_script) = match oracle.runtime() {
            Runtime::Ruby => (
                vec!["ruby".to_string(), "-Ilib".to_string(), "-e".to_string(), script],
                Some(roots.ruby_root.clone()),
                None,
            ),
            Runtime::Mix => (
                vec![
                    "mix".to_string(),
                    "run".to_string(),
                    "-e".to_string(),
                    script,
                    "--".to_string(),
                ],
                Some(roots.elixir_root.clone()),
                None,
            ),
            Runtime::Python => (vec![roots.python.clone(), "-c".to_string(), script], None, None),
            Runtime::Bun => (
                vec!["bun".to_string()],
                Some(roots.msg_viewer_root.clone()),
                Some(StagedScript {
                    contents: script,
                    suffix: ".ts".to_string(),
                }),
            ),
        };

        Self {
            name: oracle.name().to_string(),
            command,
            cwd,
            staged_script,
            optional: oracle == BuiltinOracle::MsgViewer,
            timeout_secs,
        }
    }

    /// Create a custom oracle configuration.
    pub fn custom(name: impl Into<String>, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            command,
            cwd: None,
            staged_script: None,
            optional: false,
            timeout_secs,
        }
    }

    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Skip instead of failing when `cwd` is absent.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Whether this oracle should be skipped because its root is absent.
    pub fn should_skip(&self) -> bool {
        self.optional && self.cwd.as_ref().is_some_and(|d| !d.is_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> OracleRoots {
        OracleRoots {
            ruby_root: PathBuf::from("/opt/ruby-msg"),
            elixir_root: PathBuf::from("/opt/outlook_msg"),
            msg_viewer_root: PathBuf::from("/opt/msg-viewer"),
            python: "python3".to_string(),
        }
    }

    #[test]
    fn test_builtin_oracle_names() {
        assert_eq!(BuiltinOracle::RubyMsg.name(), "ruby-msg");
        assert_eq!(BuiltinOracle::OutlookMsg.name(), "outlook_msg");
        assert_eq!(BuiltinOracle::OutlookEml.name(), "outlook_msg");
        assert_eq!(BuiltinOracle::ExtractMsg.name(), "extract-msg");
        assert_eq!(BuiltinOracle::MsgViewer.name(), "msg-viewer");
        assert_eq!(BuiltinOracle::PythonEmail.name(), "python_email");
    }

    #[test]
    fn test_scripts_emit_row_protocol() {
        for oracle in [
            BuiltinOracle::RubyMsg,
            BuiltinOracle::OutlookMsg,
            BuiltinOracle::ExtractMsg,
            BuiltinOracle::MsgViewer,
            BuiltinOracle::OutlookEml,
            BuiltinOracle::PythonEmail,
            BuiltinOracle::OutlookPstReport,
            BuiltinOracle::OutlookPstProbe,
        ] {
            assert!(oracle.script().contains("ROW"), "{oracle:?}");
        }
        assert!(BuiltinOracle::OutlookWarnings.script().contains("WARN"));
    }

    #[test]
    fn test_ruby_command_runs_in_root() {
        let config = OracleConfig::builtin(BuiltinOracle::RubyMsg, &roots(), 0);
        assert_eq!(&config.command[..3], &["ruby", "-Ilib", "-e"]);
        assert_eq!(config.cwd, Some(PathBuf::from("/opt/ruby-msg")));
        assert!(!config.optional);
    }

    #[test]
    fn test_mix_command_separates_files() {
        let config = OracleConfig::builtin(BuiltinOracle::OutlookPstProbe, &roots(), 30);
        assert_eq!(config.command[0], "mix");
        assert_eq!(config.command.last().map(String::as_str), Some("--"));
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_python_uses_configured_interpreter() {
        let mut r = roots();
        r.python = "/usr/bin/python3.12".to_string();
        let config = OracleConfig::builtin(BuiltinOracle::PythonEmail, &r, 0);
        assert_eq!(config.command[0], "/usr/bin/python3.12");
        assert!(config.cwd.is_none());
    }

    #[test]
    fn test_msg_viewer_is_staged_and_optional() {
        let config = OracleConfig::builtin(BuiltinOracle::MsgViewer, &roots(), 0);
        assert_eq!(config.command, vec!["bun".to_string()]);
        assert!(config.optional);
        assert_eq!(
            config.staged_script.as_ref().map(|s| s.suffix.as_str()),
            Some(".ts")
        );
        assert!(config.should_skip());
    }

    #[test]
    fn test_custom_config() {
        let config = OracleConfig::custom("fake", vec!["sh".to_string()], 5).in_dir("/tmp");
        assert_eq!(config.name, "fake");
        assert!(!config.should_skip());
    }
}
