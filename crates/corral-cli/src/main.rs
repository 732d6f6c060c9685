mod commands;
mod progress;

use clap::{Parser, Subcommand};
use commands::Project;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "corral",
    version,
    about = "Scenario sequencer for testing infrastructure-as-code roles"
)]
struct Cli {
    /// Project directory holding corral.toml and the scenarios directory.
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    /// Root of the state store (overrides [store] root in corral.toml).
    #[arg(long, env = "CORRAL_STORE", global = true)]
    store: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the test sequence for one or more scenarios.
    Test(commands::test::TestArgs),
    /// List scenarios and their persisted state.
    List,
    /// Forget persisted scenario state. Instances are left alone.
    Reset {
        /// Scenario to reset (defaults to the project's default scenario).
        #[arg(short = 's', long = "scenario-name", conflicts_with = "all")]
        scenario_name: Option<String>,
        /// Reset every scenario in the project.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CORRAL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;
    let result = Project::load(&cli.project, cli.store.as_deref()).and_then(|project| {
        match cli.command {
            Commands::Test(args) => Ok(commands::test::run(&project, args, json_output)),
            Commands::List => commands::list::run(&project, json_output),
            Commands::Reset { scenario_name, all } => {
                commands::reset::run(&project, scenario_name, all, json_output)
            }
        }
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
