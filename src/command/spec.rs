//! # Command specification for the supervised child.
//!
//! Defines [`CommandSpec`]: the executable, its arguments, working directory,
//! environment overrides and the fork (structured channel) flag. A spec is
//! immutable once handed to the supervisor builder.
//!
//! ## Environment merge
//! The child environment is built from an **explicit** ambient mapping and the
//! spec's overrides: every ambient key passes through unchanged, override keys
//! win. The spec never reads the current process environment on its own.
//!
//! ```text
//! ambient   { PATH=/bin, A=1 }
//! overrides { B=2, PATH=/opt/bin }
//! ─────────────────────────────────
//! child     { A=1, B=2, PATH=/opt/bin }
//! ```

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

/// Specification of the process to supervise.
///
/// ## Example
/// ```rust
/// use procvisor::CommandSpec;
///
/// let spec = CommandSpec::new("/bin/sh")
///     .arg("-c")
///     .arg("echo hello")
///     .env("GREETING", "hi")
///     .cwd("/tmp");
///
/// assert_eq!(spec.program(), "/bin/sh");
/// assert_eq!(spec.get_args(), ["-c", "echo hello"]);
/// assert!(!spec.is_fork());
/// ```
#[derive(Clone, Debug)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    fork: bool,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// Creates a spec for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            fork: false,
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    /// Creates a spec from an argv-style list (`[program, args...]`).
    ///
    /// Returns `None` for an empty list.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut it = argv.into_iter().map(Into::into);
        let program = it.next()?;
        Some(Self::new(program).args(it))
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds or replaces one environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Adds or replaces several environment overrides.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Enables the structured message channel.
    pub fn fork(mut self, enabled: bool) -> Self {
        self.fork = enabled;
        self
    }

    /// Executable path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Ordered argument list.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Working directory override, if any.
    pub fn get_cwd(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    /// Environment overrides.
    pub fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns `true` if the structured channel is enabled.
    pub fn is_fork(&self) -> bool {
        self.fork
    }

    /// Merges `ambient` with the overrides (overrides win).
    pub fn merged_env<I, K, V>(&self, ambient: I) -> BTreeMap<OsString, OsString>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let mut out: BTreeMap<OsString, OsString> = ambient
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        for (k, v) in &self.env {
            out.insert(OsString::from(k), OsString::from(v));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(s: &str) -> OsString {
        OsString::from(s)
    }

    #[test]
    fn test_merge_keeps_ambient_and_adds_overrides() {
        let spec = CommandSpec::new("env").env("B", "2");
        let env = spec.merged_env([("A", "1")]);
        assert_eq!(env.get(&os("A")), Some(&os("1")));
        assert_eq!(env.get(&os("B")), Some(&os("2")));
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn test_merge_override_wins() {
        let spec = CommandSpec::new("env").env("PATH", "/opt/bin");
        let env = spec.merged_env([("PATH", "/bin"), ("HOME", "/root")]);
        assert_eq!(env.get(&os("PATH")), Some(&os("/opt/bin")));
        assert_eq!(env.get(&os("HOME")), Some(&os("/root")));
    }

    #[test]
    fn test_merge_with_empty_ambient() {
        let spec = CommandSpec::new("env").envs([("X", "y")]);
        let env = spec.merged_env(Vec::<(String, String)>::new());
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn test_from_argv_splits_program() {
        let spec = CommandSpec::from_argv(["node", "app.js", "--port", "80"]);
        let Some(spec) = spec else {
            panic!("argv is not empty");
        };
        assert_eq!(spec.program(), "node");
        assert_eq!(spec.get_args(), ["app.js", "--port", "80"]);
    }

    #[test]
    fn test_from_argv_empty_is_none() {
        assert!(CommandSpec::from_argv(Vec::<String>::new()).is_none());
    }
}
