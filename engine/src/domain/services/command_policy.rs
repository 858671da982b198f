//! Command Policy
//!
//! Validates and sanitizes lifecycle commands before anything is spawned,
//! and decides whether a command needs a shell. Checks run in a fixed order
//! and each failure maps to its own `RejectionReason`.

use crate::constants::command::MAX_LENGTH;
use crate::domain::ports::Invocation;
use crate::domain::{DomainError, RejectionReason};
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// A whole token naming a destructive program, optionally behind a path.
/// Flags such as `--log-format` or `--del` are not tokens of this shape.
static DANGEROUS_PROGRAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s;&|])(?:[^\s/;&|]*/)*(rm|del|format)(?:$|[\s;&|])").expect("valid regex")
});

/// Control operators accepted when shell operators are allowed
static SHELL_OPERATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&&|\|\||;|\|").expect("valid regex"));

const METACHARACTERS: [char; 8] = [';', '&', '|', '>', '<', '$', '\\', '`'];

const TRAVERSAL_SEQUENCES: [&str; 2] = ["../", "..\\"];

const SENSITIVE_PATHS: [&str; 4] = ["/etc/passwd", "/etc/shadow", "/proc/", "/sys/"];

#[derive(Debug, Clone)]
pub struct CommandPolicy {
    allow_shell_operators: bool,
    max_length: usize,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self::new(false)
    }
}

impl CommandPolicy {
    pub fn new(allow_shell_operators: bool) -> Self {
        Self {
            allow_shell_operators,
            max_length: MAX_LENGTH,
        }
    }

    /// Trim and collapse runs of whitespace
    pub fn sanitize(command: &str) -> String {
        WHITESPACE.replace_all(command.trim(), " ").into_owned()
    }

    /// Run every check against an already sanitized command
    pub fn validate(&self, command: &str) -> Result<(), DomainError> {
        if command.is_empty() {
            return Err(DomainError::rejected(RejectionReason::Empty));
        }
        if command.len() > self.max_length {
            return Err(DomainError::rejected(RejectionReason::TooLong {
                max: self.max_length,
            }));
        }

        let scanned = if self.allow_shell_operators {
            SHELL_OPERATORS.replace_all(command, " ")
        } else {
            command.into()
        };
        if let Some(c) = scanned.chars().find(|c| METACHARACTERS.contains(c)) {
            return Err(DomainError::rejected(RejectionReason::Metacharacter(c)));
        }

        if let Some(program) = DANGEROUS_PROGRAM.captures(command).and_then(|c| c.get(1)) {
            return Err(DomainError::rejected(RejectionReason::DangerousProgram(
                program.as_str().to_string(),
            )));
        }

        if TRAVERSAL_SEQUENCES.iter().any(|seq| command.contains(seq)) {
            return Err(DomainError::rejected(RejectionReason::PathTraversal));
        }

        if let Some(path) = SENSITIVE_PATHS.iter().find(|p| command.contains(*p)) {
            return Err(DomainError::rejected(RejectionReason::SensitivePath(
                path.to_string(),
            )));
        }

        Ok(())
    }

    /// Sanitize, validate and choose how the command is executed
    pub fn plan(&self, command: &str) -> Result<Invocation, DomainError> {
        let command = Self::sanitize(command);
        self.validate(&command)?;

        if self.allow_shell_operators && SHELL_OPERATORS.is_match(&command) {
            return Ok(Invocation::Shell(command));
        }

        let mut parts = command.split(' ').map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| DomainError::rejected(RejectionReason::Empty))?;
        Ok(Invocation::Direct {
            program,
            args: parts.collect(),
        })
    }

    pub fn allows_shell_operators(&self) -> bool {
        self.allow_shell_operators
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(result: Result<Invocation, DomainError>) -> RejectionReason {
        match result {
            Err(DomainError::CommandRejected { reason }) => reason,
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(
            CommandPolicy::sanitize("  ./run.sh \t --port   8080 \n"),
            "./run.sh --port 8080"
        );
    }

    #[test]
    fn test_simple_command_runs_directly() {
        let plan = CommandPolicy::default().plan("python3  -m http.server 8080").unwrap();
        assert_eq!(
            plan,
            Invocation::Direct {
                program: "python3".to_string(),
                args: vec![
                    "-m".to_string(),
                    "http.server".to_string(),
                    "8080".to_string()
                ],
            }
        );
    }

    #[test]
    fn test_rejects_empty_and_long() {
        let policy = CommandPolicy::default();
        assert_eq!(reason(policy.plan("   ")), RejectionReason::Empty);
        assert_eq!(
            reason(policy.plan(&"a".repeat(MAX_LENGTH + 1))),
            RejectionReason::TooLong { max: MAX_LENGTH }
        );
    }

    #[test]
    fn test_rejects_metacharacters() {
        let policy = CommandPolicy::default();
        for (command, c) in [
            ("echo a; echo b", ';'),
            ("sleep 1 &", '&'),
            ("ps | grep x", '|'),
            ("echo $HOME", '$'),
            ("echo a > out", '>'),
            ("cat < in", '<'),
            ("echo a\\b", '\\'),
            ("echo `id`", '`'),
        ] {
            assert_eq!(
                reason(policy.plan(command)),
                RejectionReason::Metacharacter(c),
                "{}",
                command
            );
        }
    }

    #[test]
    fn test_rejects_dangerous_programs() {
        let policy = CommandPolicy::default();
        assert_eq!(
            reason(policy.plan("rm -rf /")),
            RejectionReason::DangerousProgram("rm".to_string())
        );
        assert_eq!(
            reason(policy.plan("format c:")),
            RejectionReason::DangerousProgram("format".to_string())
        );
        assert_eq!(
            reason(policy.plan("sudo /bin/rm data")),
            RejectionReason::DangerousProgram("rm".to_string())
        );
        // Substrings of longer words are fine
        assert!(policy.plan("./reformat.sh").is_ok());
    }

    #[test]
    fn test_flags_naming_programs_are_accepted() {
        let policy = CommandPolicy::default();
        assert_eq!(
            policy.plan("./app --log-format json").unwrap(),
            Invocation::Direct {
                program: "./app".to_string(),
                args: vec!["--log-format".to_string(), "json".to_string()],
            }
        );
        assert!(policy.plan("./app --format text").is_ok());
        assert!(policy.plan("./cleanup --del --rm-stale").is_ok());
        assert!(policy.plan("java -Dformat=rm -jar app.jar").is_ok());
    }

    #[test]
    fn test_rejects_traversal_and_sensitive_paths() {
        let policy = CommandPolicy::default();
        assert_eq!(
            reason(policy.plan("cat ../secret")),
            RejectionReason::PathTraversal
        );
        assert_eq!(
            reason(policy.plan("cat /etc/shadow")),
            RejectionReason::SensitivePath("/etc/shadow".to_string())
        );
        assert_eq!(
            reason(policy.plan("ls /proc/1")),
            RejectionReason::SensitivePath("/proc/".to_string())
        );
    }

    #[test]
    fn test_shell_operators_only_when_allowed() {
        let strict = CommandPolicy::new(false);
        assert!(strict.plan("make build && ./app").is_err());

        let relaxed = CommandPolicy::new(true);
        assert_eq!(
            relaxed.plan("make build && ./app").unwrap(),
            Invocation::Shell("make build && ./app".to_string())
        );
        assert_eq!(
            relaxed.plan("ps aux | grep app").unwrap(),
            Invocation::Shell("ps aux | grep app".to_string())
        );
        // Everything else is still checked
        assert_eq!(
            reason(relaxed.plan("./app && echo $HOME")),
            RejectionReason::Metacharacter('$')
        );
        assert_eq!(
            reason(relaxed.plan("./stop.sh; rm -rf data")),
            RejectionReason::DangerousProgram("rm".to_string())
        );
        assert_eq!(
            reason(relaxed.plan("./app &")),
            RejectionReason::Metacharacter('&')
        );
    }
}
