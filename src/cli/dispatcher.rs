use anyhow::{Result, anyhow};

use crate::{cli::handlers, core::settings::Settings};

/// A system command, its aliases, and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &Settings) -> Result<()>,
}

/// The single source of truth for all commands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "start",
        aliases: &[],
        handler: handlers::start::handle,
    },
    CommandDefinition {
        name: "resume",
        aliases: &["run"],
        handler: handlers::resume::handle,
    },
    CommandDefinition {
        name: "template",
        aliases: &[],
        handler: handlers::template::handle,
    },
    CommandDefinition {
        name: "package",
        aliases: &[],
        handler: handlers::package::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Routes `charty <command> [args...]` to its handler.
pub fn dispatch(all_args: Vec<String>, settings: &Settings) -> Result<()> {
    log::debug!("Dispatching args: {:?}", all_args);

    let mut args = all_args.into_iter();
    let Some(name) = args.next() else {
        return Err(anyhow!(t!("cli.error.no_command")));
    };
    let command = find_command(&name)
        .ok_or_else(|| anyhow!(t!("cli.error.unknown_command"), command = name))?;

    (command.handler)(args.collect(), settings)
}
