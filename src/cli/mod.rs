use clap::Parser;

pub mod args;
pub mod dispatcher;
pub mod handlers;

/// Markup used by `cli.help.template` and the ANSI style each tag stands for.
const HELP_TAGS: &[(&str, &str)] = &[
    ("title", "\x1b[1;33m"),
    ("group", "\x1b[1;32m"),
    ("cmd", "\x1b[36m"),
    ("hl", "\x1b[1;36m"),
    ("dim", "\x1b[2m"),
];
const RESET: &str = "\x1b[0m";

/// Replaces the help markup with ANSI styles, or strips it when color is off.
fn style_help(template: &str, use_color: bool) -> String {
    HELP_TAGS.iter().fold(template.to_string(), |text, (tag, style)| {
        let (open, close) = if use_color { (*style, RESET) } else { ("", "") };
        text.replace(&format!("<{tag}>"), open)
            .replace(&format!("</{tag}>"), close)
    })
}

/// clap takes the help template as a `&'static str`.
fn help_template() -> &'static str {
    let use_color = colored::control::SHOULD_COLORIZE.should_colorize();
    Box::leak(style_help(t!("cli.help.template"), use_color).into_boxed_str())
}

/// charty: a declarative test harness for charts of shell commands.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    help_template = { help_template() },
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// The command followed by its own arguments; each handler parses the rest.
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}
