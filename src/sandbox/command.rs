use tracing::warn;

use crate::tools::ToolError;

/// Syntactic denylist applied to shell commands before execution.
///
/// Rules are checked in order; the first match wins. This is a
/// best-effort filter, not a sandbox guarantee: a determined command
/// can still do damage inside the root, and substring checks can be
/// dodged (e.g. via `$(...)` indirection). Kernel-level confinement is
/// out of scope here.
pub struct CommandFilter;

impl CommandFilter {
    /// Checks a raw command string against the denylist.
    pub fn check(command: &str) -> Result<(), ToolError> {
        if command.contains("..") {
            return Self::blocked(command, "parent directory traversal (`..`)");
        }
        if command.contains('~') {
            return Self::blocked(command, "home directory shorthand (`~`)");
        }
        if command.split_whitespace().any(|tok| tok == "sudo") {
            return Self::blocked(command, "privilege escalation (`sudo`)");
        }
        if Self::is_recursive_force_delete(command) {
            return Self::blocked(command, "recursive force delete (`rm -rf`)");
        }

        // Absolute paths point outside the sandbox by definition; flags
        // like `-l` or `--color=auto` are exempt from this rule.
        for token in command.split_whitespace() {
            if !token.starts_with('-') && token.starts_with('/') {
                return Self::blocked(command, "absolute path argument");
            }
        }

        Ok(())
    }

    /// Detects `rm` invoked with the recursive and force flags in any
    /// spelling (`-rf`, `-fr`, or separate `-r -f`).
    fn is_recursive_force_delete(command: &str) -> bool {
        let tokens: Vec<&str> = command.split_whitespace().collect();
        let Some(rm_pos) = tokens.iter().position(|t| *t == "rm") else {
            return false;
        };

        let mut recursive = false;
        let mut force = false;
        for token in &tokens[rm_pos + 1..] {
            if let Some(flags) = token.strip_prefix('-').filter(|f| !f.starts_with('-')) {
                recursive |= flags.contains('r') || flags.contains('R');
                force |= flags.contains('f');
            }
            recursive |= *token == "--recursive";
            force |= *token == "--force";
        }
        recursive && force
    }

    fn blocked(command: &str, reason: &str) -> Result<(), ToolError> {
        warn!("Command blocked ({reason}): {command}");
        Err(ToolError::CommandBlocked(reason.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_commands() {
        assert!(CommandFilter::check("ls -la").is_ok());
        assert!(CommandFilter::check("cargo test").is_ok());
        assert!(CommandFilter::check("grep -rn pattern src").is_ok());
        assert!(CommandFilter::check("rm notes.txt").is_ok());
    }

    #[test]
    fn test_rejects_parent_traversal() {
        assert!(matches!(
            CommandFilter::check("cat ../secret.txt"),
            Err(ToolError::CommandBlocked(_))
        ));
    }

    #[test]
    fn test_rejects_home_shorthand() {
        assert!(CommandFilter::check("cat ~/.ssh/id_rsa").is_err());
    }

    #[test]
    fn test_rejects_sudo() {
        assert!(CommandFilter::check("sudo apt install foo").is_err());
        // `sudo` inside a larger word is not the sudo binary
        assert!(CommandFilter::check("echo pseudocode").is_ok());
    }

    #[test]
    fn test_rejects_recursive_force_delete() {
        assert!(CommandFilter::check("rm -rf build").is_err());
        assert!(CommandFilter::check("rm -fr build").is_err());
        assert!(CommandFilter::check("rm -r -f build").is_err());
        assert!(CommandFilter::check("rm --recursive --force build").is_err());
        // Recursive without force is allowed
        assert!(CommandFilter::check("rm -r build").is_ok());
    }

    #[test]
    fn test_rejects_absolute_path_arguments() {
        assert!(CommandFilter::check("cat /etc/passwd").is_err());
        assert!(CommandFilter::check("ls /").is_err());
    }

    #[test]
    fn test_allows_flags_that_look_like_paths() {
        // A flag marker exempts the token from the absolute-path rule
        assert!(CommandFilter::check("ls --directory=x -l").is_ok());
    }
}
