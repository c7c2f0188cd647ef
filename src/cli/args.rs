// src/cli/args.rs
use clap::{Args, Parser};

/// Template value overrides, merged files first, then `--set`, left to right.
#[derive(Args, Debug, Default, Clone)]
pub struct ValueArgs {
    /// Set template values on the command line (e.g. `--set image.tag=1.2,debug=true`).
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// YAML file or URL with template values. Can be repeated; the last one wins.
    #[arg(long = "values", short = 'f', visible_alias = "values-files", value_name = "FILE")]
    pub values: Vec<String>,
}

/// Runtime option overrides (`pre`, `post`, `commands`), merged like template values.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Override runtime options on the command line (e.g. `--run 'pre={make setup}'`).
    #[arg(long = "run", value_name = "KEY=VALUE")]
    pub run: Vec<String>,

    /// YAML file or URL with runtime options. Can be repeated; the last one wins.
    #[arg(long = "run-files", value_name = "FILE")]
    pub run_files: Vec<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct StartArgs {
    /// Charts to run: directories, `.tar.gz` packages or URLs.
    #[arg(required = true, value_name = "CHART")]
    pub charts: Vec<String>,

    #[command(flatten)]
    pub values: ValueArgs,

    #[command(flatten)]
    pub run: RunArgs,

    /// Print a JSON report per chart, one per line, instead of the human report.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct ResumeArgs {
    /// Directories previously produced by `charty template`.
    #[arg(required = true, value_name = "DIR")]
    pub dirs: Vec<String>,

    #[command(flatten)]
    pub run: RunArgs,

    /// Print a JSON report per chart, one per line, instead of the human report.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct PackageArgs {
    /// The chart directory to package.
    pub chart: String,

    /// Where to write `<name>-<version>.tar.gz`.
    pub dest: String,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct TemplateArgs {
    /// The chart to render: a directory, a `.tar.gz` package or a URL.
    pub chart: String,

    /// Directory that receives the rendered files.
    pub dest: String,

    #[command(flatten)]
    pub values: ValueArgs,
}
