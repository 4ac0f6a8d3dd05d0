//! Console commands.
//!
//! One command per stdin line. Page names are single words; feedback fields
//! are separated by `|`.

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub label: &'static str,
    pub description: &'static str,
}

const COMMAND_SPECS: &[CommandSpec] = &[
    CommandSpec {
        label: "track <page>",
        description: "Enter a page and start its ads",
    },
    CommandSpec {
        label: "leave <page>",
        description: "Leave a page and cancel its ads",
    },
    CommandSpec {
        label: "state <page>",
        description: "Show a page's scheduling state",
    },
    CommandSpec {
        label: "banner <page>",
        description: "Register a banner container for a page",
    },
    CommandSpec {
        label: "unbanner <page>",
        description: "Remove a page's banner container",
    },
    CommandSpec {
        label: "click <page>",
        description: "Show whether click ads are enabled on a page",
    },
    CommandSpec {
        label: "fg, bg",
        description: "Simulate app foreground / background",
    },
    CommandSpec {
        label: "init",
        description: "Run the startup pipeline again",
    },
    CommandSpec {
        label: "session",
        description: "Show the published session",
    },
    CommandSpec {
        label: "feedback <subject> | <content> [| <contact>]",
        description: "Send user feedback",
    },
    CommandSpec {
        label: "clear",
        description: "Cancel everything and forget all pages",
    },
    CommandSpec {
        label: "q, quit",
        description: "Exit",
    },
];

#[must_use]
pub fn help_text() -> String {
    let width = COMMAND_SPECS
        .iter()
        .map(|spec| spec.label.len())
        .max()
        .unwrap_or(0);
    COMMAND_SPECS
        .iter()
        .map(|spec| format!("  {:width$}  {}\n", spec.label, spec.description))
        .collect()
}

/// Parsed command with borrowed arguments.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Track(&'a str),
    Leave(&'a str),
    State(&'a str),
    Banner(&'a str),
    Unbanner(&'a str),
    Click(&'a str),
    Foreground,
    Background,
    Init,
    Session,
    Feedback {
        subject: &'a str,
        content: &'a str,
        contact: Option<&'a str>,
    },
    Clear,
    Help,
    Quit,
    /// Known command without its required argument.
    Missing(&'static str),
    Unknown(&'a str),
    Empty,
}

impl<'a> Command<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let raw = raw.trim();
        let (name, rest) = raw
            .split_once(char::is_whitespace)
            .map_or((raw, ""), |(name, rest)| (name, rest.trim()));
        let page = rest.split_whitespace().next();

        match name {
            "" => Command::Empty,
            "track" => page.map_or(Command::Missing("track <page>"), Command::Track),
            "leave" => page.map_or(Command::Missing("leave <page>"), Command::Leave),
            "state" => page.map_or(Command::Missing("state <page>"), Command::State),
            "banner" => page.map_or(Command::Missing("banner <page>"), Command::Banner),
            "unbanner" => page.map_or(Command::Missing("unbanner <page>"), Command::Unbanner),
            "click" => page.map_or(Command::Missing("click <page>"), Command::Click),
            "fg" | "foreground" => Command::Foreground,
            "bg" | "background" => Command::Background,
            "init" => Command::Init,
            "session" => Command::Session,
            "feedback" => Self::parse_feedback(rest),
            "clear" => Command::Clear,
            "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other),
        }
    }

    fn parse_feedback(rest: &'a str) -> Self {
        let mut fields = rest.splitn(3, '|').map(str::trim);
        let subject = fields.next().unwrap_or_default();
        let content = fields.next().unwrap_or_default();
        let contact = fields.next().filter(|c| !c.is_empty());
        if subject.is_empty() || content.is_empty() {
            return Command::Missing("feedback <subject> | <content> [| <contact>]");
        }
        Command::Feedback {
            subject,
            content,
            contact,
        }
    }
}
