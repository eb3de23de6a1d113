//! Shared utilities for the herogen codebase

use anyhow::{bail, Context, Result};
use std::fmt;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

/// A string wrapper that masks its contents in Debug/Display output.
/// Prevents accidental logging of API keys and other secrets.
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Intentionally access the raw secret value (for headers, URLs, etc.)
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<&str> for SecretString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Check that a package name is safe to splice into paths, URLs and
/// command arguments. npm names are lowercase alphanumerics plus `-`,
/// `_` and `.`, and may not start with `.`, `_` or `-`.
pub fn sanitize_package_name(name: &str) -> Result<&str, String> {
    if name.is_empty() {
        return Err("Empty package name".to_string());
    }
    if name.len() > 214 {
        return Err(format!("Package name longer than 214 characters: {}", name));
    }
    if name.starts_with(['.', '_', '-']) {
        return Err(format!(
            "Package name cannot start with '.', '_' or '-': {}",
            name
        ));
    }
    for ch in name.chars() {
        match ch {
            'a'..='z' | '0'..='9' | '-' | '_' | '.' => {}
            _ => {
                return Err(format!(
                    "Invalid character '{}' in package name: {}",
                    ch, name
                ));
            }
        }
    }
    Ok(name)
}

/// JavaScript reserved words, plus the CommonJS wrapper parameters that a
/// module-level `const` cannot redeclare.
const RESERVED_JS_NAMES: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield", "arguments",
    "eval", "exports", "require", "module", "__filename", "__dirname",
];

/// Names every generated test file already binds at top level.
pub const TEST_HARNESS_NAMES: &[&str] = &[
    "fs",
    "path",
    "generateBadgeUrl",
    "generateTestBadge",
    "addToReadme",
    "runTests",
];

/// Function names end up as file stems and JS identifiers.
pub fn sanitize_function_name(name: &str) -> Result<&str, String> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("Empty function name".to_string()),
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        Some(c) => {
            return Err(format!(
                "Function name cannot start with '{}': {}",
                c, name
            ))
        }
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '$')) {
        return Err(format!(
            "Invalid character '{}' in function name: {}",
            bad, name
        ));
    }
    if RESERVED_JS_NAMES.contains(&name) {
        return Err(format!("Function name is a reserved word: {}", name));
    }
    if TEST_HARNESS_NAMES.contains(&name) {
        return Err(format!("Function name clashes with the test harness: {}", name));
    }
    Ok(name)
}

#[cfg(unix)]
fn kill_process(pid: u32) {
    // SAFETY: kill(2) has no memory-safety preconditions; a stale pid just
    // yields ESRCH.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

/// Run a command with a timeout, killing the child process on expiry.
/// Spawns the command, waits up to `timeout` for it to finish.
/// On timeout, kills the child process and returns an error.
pub fn run_cmd_with_timeout(mut cmd: Command, timeout: Duration) -> Result<std::process::Output> {
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to spawn command")?;

    let pid = child.id();
    let (sender, receiver) = mpsc::channel();

    std::thread::spawn(move || {
        let result = child.wait_with_output();
        let _ = sender.send(result);
    });

    match receiver.recv_timeout(timeout) {
        Ok(result) => result.context("Failed to execute command"),
        Err(_) => {
            kill_process(pid);
            bail!("Command timed out after {:?}", timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_hides_in_debug() {
        let secret = SecretString::new("sk-live-123".to_string());
        let debug_output = format!("{:?}", secret);
        assert_eq!(debug_output, "***");
        assert!(!debug_output.contains("sk-live"));
    }

    #[test]
    fn test_secret_string_hides_in_display() {
        let secret = SecretString::new("sk-live-123".to_string());
        assert_eq!(format!("{}", secret), "***");
    }

    #[test]
    fn test_secret_string_expose_returns_value() {
        let secret: SecretString = "sk-live-123".to_string().into();
        assert_eq!(secret.expose(), "sk-live-123");
        assert!(secret == "sk-live-123");
    }

    #[test]
    fn test_sanitize_package_name_valid() {
        assert!(sanitize_package_name("demo-string-utils").is_ok());
        assert!(sanitize_package_name("trig.helpers").is_ok());
        assert!(sanitize_package_name("a1_b2").is_ok());
    }

    #[test]
    fn test_sanitize_package_name_rejects_injection() {
        assert!(sanitize_package_name("").is_err());
        assert!(sanitize_package_name("-rf").is_err());
        assert!(sanitize_package_name("../etc").is_err());
        assert!(sanitize_package_name("pkg; rm -rf /").is_err());
        assert!(sanitize_package_name("Uppercase").is_err());
        assert!(sanitize_package_name("a/b").is_err());
    }

    #[test]
    fn test_sanitize_function_name() {
        assert!(sanitize_function_name("capitalizeWords").is_ok());
        assert!(sanitize_function_name("_private$").is_ok());
        assert!(sanitize_function_name("").is_err());
        assert!(sanitize_function_name("1abc").is_err());
        assert!(sanitize_function_name("to.string").is_err());
        assert!(sanitize_function_name("a b").is_err());
    }

    #[test]
    fn test_sanitize_function_name_rejects_reserved_and_harness_names() {
        for name in ["delete", "class", "require", "__dirname"] {
            assert!(sanitize_function_name(name).is_err(), "{} accepted", name);
        }
        for name in ["fs", "path", "generateBadgeUrl", "generateTestBadge", "addToReadme"] {
            assert!(sanitize_function_name(name).is_err(), "{} accepted", name);
        }
        assert!(sanitize_function_name("pathJoin").is_ok());
        assert!(sanitize_function_name("deleteKey").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_cmd_with_timeout_success() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello"]);
        let output = run_cmd_with_timeout(cmd, Duration::from_secs(10)).unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_cmd_with_timeout_expires() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        let err = run_cmd_with_timeout(cmd, Duration::from_millis(100)).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
