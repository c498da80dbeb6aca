//! Plain-text command messages.
//!
//! A command is a single line of text whose first whitespace-delimited token
//! selects the handler.  Everything after the first separator is the
//! handler-specific payload and is kept verbatim, so tokens and patterns may
//! themselves contain spaces.
//!
//! Rather than scattering prefix checks through the handlers, the text is
//! parsed once into a tagged [`Command`] and the handlers match on variants.

use std::fmt;

/// Keyword selecting the authentication handler.
pub const AUTH_KEYWORD: &str = "auth";

/// Keyword selecting the discovery handler.
pub const DISCOVER_KEYWORD: &str = "discover";

/// A parsed command message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `auth <token>` – authenticate the control channel with a shared token.
    Auth {
        /// Everything after `auth `; empty when the keyword stands alone.
        token: String,
    },
    /// `discover <pattern>` – ask whether the service name matches a glob.
    Discover {
        /// Everything after `discover `; empty when the keyword stands alone.
        pattern: String,
    },
    /// Any other text, including an empty message.
    Unknown {
        /// The received line with its line terminator removed.
        raw: String,
    },
}

impl Command {
    /// Builds an `auth` command.
    pub fn auth(token: impl Into<String>) -> Self {
        Self::Auth {
            token: token.into(),
        }
    }

    /// Builds a `discover` command.
    pub fn discover(pattern: impl Into<String>) -> Self {
        Self::Discover {
            pattern: pattern.into(),
        }
    }

    /// Parses one received message into a [`Command`].
    ///
    /// Parsing never fails: text that does not start with a known keyword
    /// becomes [`Command::Unknown`].  A single trailing `\n` or `\r\n` is
    /// stripped so that line-oriented tools such as `nc` work unchanged.
    ///
    /// This is more lenient than a card, which splits on a single space and
    /// keeps the terminator as part of the payload: a card rejects
    /// `"auth tok\n"` because it compares `"tok\n"` with the token, and it
    /// does not treat a tab after the keyword as a separator.  Here both
    /// forms are accepted.  Clients that must also work against real cards
    /// should send a single space and no line terminator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rtmc_core::Command;
    ///
    /// assert_eq!(Command::parse("auth secret"), Command::auth("secret"));
    /// assert_eq!(Command::parse("discover rtmc*\n"), Command::discover("rtmc*"));
    /// assert!(matches!(Command::parse("xyz"), Command::Unknown { .. }));
    /// ```
    pub fn parse(text: &str) -> Self {
        let line = strip_line_terminator(text);

        let (keyword, payload) = line
            .split_once(char::is_whitespace)
            .unwrap_or((line, ""));

        match keyword {
            AUTH_KEYWORD => Self::auth(payload),
            DISCOVER_KEYWORD => Self::discover(payload),
            _ => Self::Unknown {
                raw: line.to_string(),
            },
        }
    }

    /// Returns the token that selected this command's handler.
    pub fn keyword(&self) -> &str {
        match self {
            Self::Auth { .. } => AUTH_KEYWORD,
            Self::Discover { .. } => DISCOVER_KEYWORD,
            Self::Unknown { raw } => raw.split(char::is_whitespace).next().unwrap_or(""),
        }
    }
}

impl fmt::Display for Command {
    /// Renders the command as wire text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth { token } => write!(f, "{AUTH_KEYWORD} {token}"),
            Self::Discover { pattern } => write!(f, "{DISCOVER_KEYWORD} {pattern}"),
            Self::Unknown { raw } => f.write_str(raw),
        }
    }
}

fn strip_line_terminator(text: &str) -> &str {
    match text.strip_suffix('\n') {
        Some(line) => line.strip_suffix('\r').unwrap_or(line),
        None => text,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auth_extracts_token() {
        // Arrange / Act
        let cmd = Command::parse("auth dummy_token");

        // Assert
        assert_eq!(
            cmd,
            Command::Auth {
                token: "dummy_token".to_string()
            }
        );
    }

    #[test]
    fn test_parse_auth_keeps_spaces_inside_token() {
        let cmd = Command::parse("auth two words");
        assert_eq!(cmd, Command::auth("two words"));
    }

    #[test]
    fn test_parse_bare_auth_keyword_yields_empty_token() {
        assert_eq!(Command::parse("auth"), Command::auth(""));
    }

    #[test]
    fn test_parse_discover_extracts_pattern() {
        assert_eq!(Command::parse("discover rtmc*"), Command::discover("rtmc*"));
    }

    #[test]
    fn test_parse_strips_trailing_newline() {
        assert_eq!(Command::parse("auth abc\n"), Command::auth("abc"));
        assert_eq!(Command::parse("auth abc\r\n"), Command::auth("abc"));
    }

    #[test]
    fn test_parse_accepts_tab_after_keyword() {
        // Arrange / Act
        let cmd = Command::parse("auth\tabc");

        // Assert: any whitespace separates the keyword.
        assert_eq!(cmd, Command::auth("abc"));
    }

    #[test]
    fn test_parse_unknown_keyword_keeps_raw_text() {
        // Arrange / Act
        let cmd = Command::parse("xyz 1 2 3");

        // Assert
        assert_eq!(
            cmd,
            Command::Unknown {
                raw: "xyz 1 2 3".to_string()
            }
        );
        assert_eq!(cmd.keyword(), "xyz");
    }

    #[test]
    fn test_parse_keyword_must_match_exactly() {
        // "authx" is not "auth" followed by a payload.
        assert!(matches!(Command::parse("authx token"), Command::Unknown { .. }));
        assert!(matches!(Command::parse("AUTH token"), Command::Unknown { .. }));
    }

    #[test]
    fn test_parse_empty_message_is_unknown() {
        let cmd = Command::parse("");
        assert_eq!(cmd, Command::Unknown { raw: String::new() });
        assert_eq!(cmd.keyword(), "");
    }

    #[test]
    fn test_display_renders_wire_text() {
        assert_eq!(Command::auth("t0k3n").to_string(), "auth t0k3n");
        assert_eq!(Command::discover("rtmc*").to_string(), "discover rtmc*");
        assert_eq!(Command::parse("xyz").to_string(), "xyz");
    }

    #[test]
    fn test_keyword_for_known_variants() {
        assert_eq!(Command::auth("a").keyword(), "auth");
        assert_eq!(Command::discover("*").keyword(), "discover");
    }
}
