//! Channel command table.
//!
//! Every accepted message is treated as one command name.  Names are
//! matched case-insensitively, with or without a leading `/`, and the
//! handler's reply is posted back to the channel.

use std::sync::Arc;

use pb_session::{DispatchSink, MessageSender};

use crate::indicator::{Indicator, Rgb};

/// Upper bound on registered commands.
pub const MAX_COMMANDS: usize = 20;

/// What a handler can see while it runs.
pub struct CommandContext<'a> {
    pub indicator: &'a Indicator,
    /// Whether the gateway session is currently Ready.
    pub online: bool,
    pub table: &'a CommandTable,
}

/// A command handler returns the reply text.
pub type Handler = fn(&CommandContext<'_>) -> String;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("maximum number of commands ({max}) reached")]
    TooMany { max: usize },
    #[error("command already registered: {0}")]
    Duplicate(String),
}

struct Entry {
    name: String,
    description: String,
    handler: Handler,
}

/// Registered commands plus what they act on.
pub struct CommandTable {
    entries: Vec<Entry>,
    indicator: Arc<Indicator>,
    sender: Arc<dyn MessageSender>,
    online: Box<dyn Fn() -> bool + Send + Sync>,
}

impl CommandTable {
    /// An empty table.
    pub fn new(sender: Arc<dyn MessageSender>, indicator: Arc<Indicator>) -> Self {
        Self {
            entries: Vec::new(),
            indicator,
            sender,
            online: Box::new(|| true),
        }
    }

    /// A table with the built-in status, power, LED and help commands.
    pub fn with_builtins(
        sender: Arc<dyn MessageSender>,
        indicator: Arc<Indicator>,
    ) -> Result<Self, CommandError> {
        let mut table = Self::new(sender, indicator);
        table
            .register("status", "Check system status", status)?
            .register("turn_on", "Turn on the PC", turn_on)?
            .register("turn_off", "Turn off the PC", turn_off)?
            .register("rainbow", "Enable rainbow LED mode", rainbow)?
            .register("red", "Set LED to red", red)?
            .register("green", "Set LED to green", green)?
            .register("blue", "Set LED to blue", blue)?
            .register("white", "Set LED to white", white)?
            .register("off", "Turn off LED", off)?
            .register("help", "Show available commands", help)?;
        Ok(table)
    }

    /// Report the gateway as online through `check` in `status` replies.
    pub fn with_online_check(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.online = Box::new(check);
        self
    }

    /// Add a command.  The name is stored lowercased.
    ///
    /// Returns `&mut Self` for method chaining.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Handler,
    ) -> Result<&mut Self, CommandError> {
        let name = name.into().to_lowercase();
        if self.entries.len() >= MAX_COMMANDS {
            tracing::error!(command = %name, max = MAX_COMMANDS, "command table full");
            return Err(CommandError::TooMany { max: MAX_COMMANDS });
        }
        if self.entries.iter().any(|e| e.name == name) {
            return Err(CommandError::Duplicate(name));
        }
        tracing::debug!(command = %name, "command registered");
        self.entries.push(Entry {
            name,
            description: description.into(),
            handler,
        });
        Ok(self)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn help_text(&self) -> String {
        let mut text = String::from("🤖 **Available Commands:**\n\n");
        for e in &self.entries {
            text.push_str(&format!("`{}` - {}\n", e.name, e.description));
        }
        text.push_str("\n💡 **Tips:**\n");
        text.push_str("• Commands are case-insensitive\n");
        text.push_str("• You can use commands with or without `/`\n");
        text.push_str("• LED starts in rainbow mode by default");
        text
    }

    /// Run the command named by `input` and return its reply.  `None`
    /// when the input is blank.
    pub fn execute(&self, input: &str) -> Option<String> {
        let cmd = normalize(input)?;
        let ctx = CommandContext {
            indicator: &self.indicator,
            online: (self.online)(),
            table: self,
        };
        match self.entries.iter().find(|e| e.name == cmd) {
            Some(entry) => {
                tracing::info!(command = %cmd, "executing command");
                Some((entry.handler)(&ctx))
            }
            None => {
                tracing::info!(command = %cmd, "unknown command");
                Some(format!(
                    "❌ Unknown command: `{cmd}`. Type `help` to see available commands."
                ))
            }
        }
    }
}

#[async_trait::async_trait]
impl DispatchSink for CommandTable {
    async fn dispatch(&self, text: String) {
        let Some(reply) = self.execute(&text) else {
            return;
        };
        if !self.sender.send(&reply).await {
            tracing::warn!("failed to post command reply");
        }
    }
}

/// Lowercase, trim, and drop one leading `/`.  `None` when nothing is left.
fn normalize(input: &str) -> Option<String> {
    let lowered = input.to_lowercase();
    let trimmed = lowered.trim();
    let cmd = trimmed.strip_prefix('/').unwrap_or(trimmed);
    if cmd.is_empty() {
        None
    } else {
        Some(cmd.to_owned())
    }
}

// ── Built-in handlers ────────────────────────────────────────────────

fn status(ctx: &CommandContext<'_>) -> String {
    let ind = ctx.indicator.snapshot();
    format!(
        "✅ **System Status:**\n🖥️ PC: {}\n💡 LED: {}\n🌈 Mode: {}",
        if ctx.online { "Online" } else { "Offline" },
        if ind.enabled { "Enabled" } else { "Disabled" },
        if ind.rainbow { "Rainbow" } else { "Static" },
    )
}

fn turn_on(ctx: &CommandContext<'_>) -> String {
    ctx.indicator.flash(Rgb::GREEN);
    "🔌 **PC Turn On Command Executed**\n*Note: This is a simulation. Connect actual hardware for real control.*".into()
}

fn turn_off(ctx: &CommandContext<'_>) -> String {
    ctx.indicator.flash(Rgb::RED);
    "🔴 **PC Turn Off Command Executed**\n*Note: This is a simulation. Connect actual hardware for real control.*".into()
}

fn rainbow(ctx: &CommandContext<'_>) -> String {
    ctx.indicator.set_rainbow(true);
    ctx.indicator.set_enabled(true);
    "🌈 **Rainbow mode enabled!**".into()
}

fn red(ctx: &CommandContext<'_>) -> String {
    ctx.indicator.set_color(Rgb::RED);
    "🔴 **LED set to red**".into()
}

fn green(ctx: &CommandContext<'_>) -> String {
    ctx.indicator.set_color(Rgb::GREEN);
    "🟢 **LED set to green**".into()
}

fn blue(ctx: &CommandContext<'_>) -> String {
    ctx.indicator.set_color(Rgb::BLUE);
    "🔵 **LED set to blue**".into()
}

fn white(ctx: &CommandContext<'_>) -> String {
    ctx.indicator.set_color(Rgb::WHITE);
    "⚪ **LED set to white**".into()
}

fn off(ctx: &CommandContext<'_>) -> String {
    ctx.indicator.set_enabled(false);
    "⚫ **LED turned off**".into()
}

fn help(ctx: &CommandContext<'_>) -> String {
    ctx.table.help_text()
}
