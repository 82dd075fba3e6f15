//! Tmux command builder for detached node sessions.
//!
//! Node processes and reporting agents run inside detached tmux sessions in
//! their container so they outlive the connection that started them.
//! `TmuxCommandBuilder` only builds command strings; the caller hands them
//! to a `RemoteExecutor`.

// ---------------------------------------------------------------------------
// Command builder
// ---------------------------------------------------------------------------

/// Builds tmux CLI command strings without executing them.
pub struct TmuxCommandBuilder;

impl TmuxCommandBuilder {
    pub fn new() -> Self {
        TmuxCommandBuilder
    }

    /// `tmux new -s <name> -d`
    pub fn new_session(&self, name: &str) -> String {
        format!("tmux new -s {} -d", shell_escape(name))
    }

    /// `tmux send-keys -t <name> '<keys>' C-m`
    pub fn send_keys(&self, name: &str, keys: &str) -> String {
        format!(
            "tmux send-keys -t {} {} C-m",
            shell_escape(name),
            shell_escape(keys)
        )
    }

    /// `tmux has-session -t <name>`
    pub fn has_session(&self, name: &str) -> String {
        format!("tmux has-session -t {}", shell_escape(name))
    }
}

impl Default for TmuxCommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Shell escaping
// ---------------------------------------------------------------------------

/// Quote a string for a POSIX shell. Strings made only of safe characters are
/// returned bare; anything else is wrapped in single quotes, with embedded
/// single quotes written using the `'\''` idiom.
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '/' || c == '%' || c == ':')
    {
        return s.to_string();
    }
    let escaped = s.replace('\'', "'\\''");
    format!("'{}'", escaped)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmd_new_session() {
        let b = TmuxCommandBuilder::new();
        assert_eq!(b.new_session("whiteblock"), "tmux new -s whiteblock -d");
    }

    #[test]
    fn cmd_send_keys_quotes_payload() {
        let b = TmuxCommandBuilder::new();
        let cmd = b.send_keys("ethnet", "cd /app && pm2 start app.json");
        assert_eq!(
            cmd,
            "tmux send-keys -t ethnet 'cd /app && pm2 start app.json' C-m"
        );
    }

    #[test]
    fn cmd_send_keys_keeps_double_quotes() {
        let b = TmuxCommandBuilder::new();
        let cmd = b.send_keys("s", r#"geth --unlock="0xa,0xb""#);
        assert!(cmd.contains(r#"'geth --unlock="0xa,0xb"'"#));
    }

    #[test]
    fn cmd_has_session() {
        let b = TmuxCommandBuilder::new();
        assert_eq!(b.has_session("whiteblock"), "tmux has-session -t whiteblock");
    }

    #[test]
    fn escape_simple() {
        assert_eq!(shell_escape("hello"), "hello");
    }

    #[test]
    fn escape_with_space() {
        assert_eq!(shell_escape("hello world"), "'hello world'");
    }

    #[test]
    fn escape_with_single_quote() {
        assert_eq!(shell_escape("it's"), "'it'\\''s'");
    }

    #[test]
    fn escape_empty() {
        assert_eq!(shell_escape(""), "''");
    }

    #[test]
    fn escape_path_no_quoting() {
        assert_eq!(shell_escape("/geth/static-nodes.json"), "/geth/static-nodes.json");
    }
}
