use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Stop the response being generated
    Stop,
    /// Delete all chats, including saved history
    Clear,
    /// Toggle light/dark theme
    Theme,
    /// Copy the last reply (or `all`, or the attachment) to the clipboard
    Copy,
    /// Read the last reply aloud, or stop reading
    Speak,
    /// Attach a file for preview
    Attach,
    /// Remove the attached file
    Detach,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Stop => "stop the response being generated",
            SlashCommand::Clear => "delete all chats and saved history",
            SlashCommand::Theme => "toggle light/dark theme",
            SlashCommand::Copy => "copy the last reply (`/copy all` for the whole chat, `/copy attachment` for the file as a data URL)",
            SlashCommand::Speak => "read the last reply aloud, or stop reading",
            SlashCommand::Attach => "attach a file for preview: /attach <path>",
            SlashCommand::Detach => "remove the attached file",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether this command can be run while a response is in progress.
    pub fn available_while_busy(self) -> bool {
        !matches!(self, SlashCommand::Copy | SlashCommand::Speak)
    }
}

/// Return all built-in commands in a Vec paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let body = input.trim().strip_prefix('/')?;

    let mut parts = body.splitn(2, char::is_whitespace);
    let head = parts.next()?;
    let rest = parts.next().map(str::trim).filter(|rest| !rest.is_empty());

    let command = SlashCommand::from_str(head)
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "quit" | "exit" => Some(SlashCommand::Bye),
            "delete" | "reset" => Some(SlashCommand::Clear),
            "cancel" => Some(SlashCommand::Stop),
            "tts" | "say" => Some(SlashCommand::Speak),
            "file" => Some(SlashCommand::Attach),
            "h" | "?" => Some(SlashCommand::Help),
            _ => None,
        })?;

    Some(ParsedCommand {
        command,
        argument: rest.map(str::to_string),
    })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("/{} - {}\n", command_str, command.description()));
    }

    help.push_str("\nAliases: /q for /bye, /delete for /clear, /cancel for /stop, /tts for /speak.");
    help.push_str("\nKeys: Enter sends, Shift+Enter adds a line, Esc stops a response, Ctrl+Q quits.");

    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_argument() {
        let parsed = parse_slash_command("/attach  ~/pics/cat 1.png ").expect("command");
        assert_eq!(parsed.command, SlashCommand::Attach);
        assert_eq!(parsed.argument(), Some("~/pics/cat 1.png"));
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(
            parse_slash_command("/q").map(|p| p.command),
            Some(SlashCommand::Bye)
        );
        assert_eq!(
            parse_slash_command("/delete").map(|p| p.command),
            Some(SlashCommand::Clear)
        );
    }

    #[test]
    fn plain_text_and_unknown_commands_are_not_commands() {
        assert!(parse_slash_command("hello /stop").is_none());
        assert!(parse_slash_command("/nope").is_none());
        assert!(parse_slash_command("/").is_none());
    }

    #[test]
    fn help_lists_every_command() {
        let help = get_help_text();
        for (keyword, _) in built_in_slash_commands() {
            assert!(help.contains(&format!("/{keyword}")), "missing /{keyword}");
        }
    }
}
