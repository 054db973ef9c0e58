use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use env_logger::Env;
use log::LevelFilter;

use nsctl::{
    commands,
    namespace::NamespaceError,
    paths::Paths,
    rootspace::{RootSpace, RootSpaceError},
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "nsctl")]
#[command(about = "POSIX user namespace control - switch sets of dotfiles via symlinks")]
#[command(version)]
struct Cli {
    /// Namespace root directory (overrides NSCTL_ROOT_PATH; default ~/.ns)
    #[arg(short = 'r', long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Directory the active namespace is linked into (overrides
    /// NSCTL_SYMLINK_PATH; default ~)
    #[arg(short = 's', long, global = true, value_name = "DIR")]
    symlink_path: Option<PathBuf>,

    /// Enable debug logging of individual file operations
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all namespaces
    List {
        /// Print machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the active namespace and marker status
    Current,

    /// Create a new namespace
    Create {
        /// Name of the namespace to create
        name: String,
    },

    /// Remove a namespace (must be empty and not active)
    Remove {
        /// Name of the namespace to remove
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Activate a namespace, exposing its files as symlinks
    Activate {
        /// Name of the namespace to activate
        name: String,
    },

    /// Deactivate all namespaces and restore displaced files
    Deactivate,

    /// Run diagnostics on the nsctl setup
    Doctor,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ui = Ui::new(cli.color, cli.no_color);

    match run(cli, &ui) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&ui, &err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, ui: &Ui) -> Result<()> {
    // Completions need no filesystem at all.
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    let paths = Paths::resolve(cli.root, cli.symlink_path)?;

    // Doctor inspects the raw paths; everything else needs a validated root.
    if matches!(cli.command, Commands::Doctor) {
        return commands::doctor(&paths, ui);
    }

    let space = RootSpace::new(paths.root_path, paths.symlink_path)?;

    match cli.command {
        Commands::List { json } => commands::list(&space, ui, json),
        Commands::Current => commands::current(&space, ui),
        Commands::Create { name } => commands::create(&space, &name, ui),
        Commands::Remove { name, force } => commands::remove(&space, &name, ui, force),
        Commands::Activate { name } => commands::activate(&space, &name, ui),
        Commands::Deactivate => commands::deactivate_all(&space, ui),
        // Handled above.
        Commands::Doctor | Commands::Completions { .. } => Ok(()),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp(None);
    let _ = builder.try_init();
}

/// Print an error with its kind prefix so scripts can tell validation
/// failures from operation failures.
fn report(ui: &Ui, err: &anyhow::Error) {
    if let Some(e) = err.downcast_ref::<RootSpaceError>() {
        ui.err(format!("rootspace error: {}", e));
    } else if let Some(e) = err.downcast_ref::<NamespaceError>() {
        ui.err(format!("namespace error: {}", e));
    } else {
        ui.err(format!("{:#}", err));
    }
}
