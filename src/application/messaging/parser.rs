//! Command parser - Splits a message body into prefix, command word and arguments

/// A command extracted from a message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub prefix: String,
    pub name: String,
    pub args: Vec<String>,
}

/// Parses `<prefix><name> [args...]` bodies
pub struct CommandParser;

impl CommandParser {
    /// Parse `body` against the accepted prefixes; longest prefix wins
    pub fn parse<S: AsRef<str>>(body: &str, prefixes: &[S]) -> Option<ParsedCommand> {
        let text = body.trim_start();

        let prefix = prefixes
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| !p.is_empty() && text.starts_with(*p))
            .max_by_key(|p| p.len())?;

        let cmd_text = &text[prefix.len()..];
        // "<prefix> name" is not a command
        if cmd_text.starts_with(char::is_whitespace) {
            return None;
        }

        let mut parts = cmd_text.split_whitespace();
        let name = parts.next()?.to_lowercase();
        let args = parts.map(str::to_string).collect();

        Some(ParsedCommand {
            prefix: prefix.to_string(),
            name,
            args,
        })
    }

    /// True when `body` is any command under the given prefixes
    pub fn is_command<S: AsRef<str>>(body: &str, prefixes: &[S]) -> bool {
        Self::parse(body, prefixes).is_some()
    }
}
