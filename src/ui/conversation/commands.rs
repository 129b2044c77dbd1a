use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Show the info dialog
    About,
    /// Exit the application
    Quit,
}

impl SlashCommand {
    /// User-visible description shown in the info dialog.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::About => "show information about this app",
            SlashCommand::Quit => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Parse a slash command from user input. Unknown commands are not
/// commands, so they get sent as ordinary text.
pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let rest = input.trim().strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let head = parts.next()?.to_lowercase();
    if parts.next().is_some() {
        return None;
    }

    SlashCommand::from_str(&head).ok().or_else(|| match head.as_str() {
        "info" | "help" | "h" => Some(SlashCommand::About),
        "q" | "exit" | "bye" => Some(SlashCommand::Quit),
        _ => None,
    })
}

/// One line per command, for the info dialog
pub fn help_lines() -> Vec<String> {
    SlashCommand::iter()
        .map(|command| format!("/{} - {}", command.command(), command.description()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!(parse_slash_command("/about"), Some(SlashCommand::About));
        assert_eq!(parse_slash_command("  /QUIT "), Some(SlashCommand::Quit));
        assert_eq!(parse_slash_command("/q"), Some(SlashCommand::Quit));
        assert_eq!(parse_slash_command("/help"), Some(SlashCommand::About));
    }

    #[test]
    fn ordinary_text_is_not_a_command() {
        assert_eq!(parse_slash_command("hello"), None);
        assert_eq!(parse_slash_command("/"), None);
        assert_eq!(parse_slash_command("/unknown"), None);
        assert_eq!(parse_slash_command("/quit now please"), None);
    }

    #[test]
    fn help_lists_every_command() {
        let lines = help_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "/about - show information about this app");
    }
}
