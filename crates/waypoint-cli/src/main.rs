use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use waypoint_cli::OutputFormat;
use waypoint_cli::commands::{self, BrowserArgs, MethodArg, run::RunArgs};

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(author, version)]
#[command(
    about = "Drive a browser toward a goal with a language model",
    long_about = "Waypoint maps a page into numbered elements, asks a language model what to \
                  do next, performs the chosen clicks and inputs, and repeats until the task \
                  is done."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "pretty")]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Carry out a task on a website
    Run(RunArgs),

    /// Map a page once and print its numbered elements
    Map {
        /// Page to map
        #[arg(value_name = "URL")]
        url: String,

        /// Element detection method
        #[arg(long, value_enum)]
        method: Option<MethodArg>,

        /// Draw numbered badges over mapped elements
        #[arg(long)]
        show_visuals: bool,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Generate shell completion scripts
    #[command(after_help = "SUPPORTED SHELLS:
    bash, zsh, fish, powershell, elvish

INSTALLATION:
    Bash:  waypoint completion --shell bash >> ~/.bashrc
    Zsh:   waypoint completion --shell zsh > ~/.zfunc/_waypoint
           (add ~/.zfunc to fpath in ~/.zshrc)
    Fish:  waypoint completion --shell fish > ~/.config/fish/completions/waypoint.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(long, value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, cli.format),
        Commands::Map {
            url,
            method,
            show_visuals,
            browser,
        } => commands::map::execute(&url, method, show_visuals, &browser, cli.format),
        Commands::Completion { shell } => commands::completion::execute(shell, &mut Cli::command()),
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if let Ok(filter) = EnvFilter::try_from_default_env() {
        filter
    } else if verbose {
        EnvFilter::new(
            "waypoint=debug,waypoint_cli=debug,waypoint_core=debug,waypoint_browser=debug,\
             waypoint_llm=debug,waypoint_plugins=debug",
        )
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::new(
            "waypoint=info,waypoint_cli=info,waypoint_core=info,waypoint_browser=info,\
             waypoint_plugins=info",
        )
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
