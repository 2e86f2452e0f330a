#![deny(clippy::all, warnings)]

use std::env;
use std::path::Path;
use std::process;

use atty::Stream;
use clap::{Arg, ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use soap_core::{prepare, CondaTool, EnvTool, PrepareOptions};
use soap_domain::{Alias, Config, ConfigError, Env, DEFAULT_ENV};

mod style;

use style::Style;

/// Exit code when invoked with no subcommand at all.
const NO_SUBCOMMAND_EXIT_CODE: i32 = 1;

/// Built-in subcommand names an alias may not shadow.
const RESERVED_SUBCOMMANDS: [&str; 4] = ["run", "update", "list", "help"];

#[derive(Parser)]
#[command(name = "soap", version, about = "Snakes on a Plane: Cargo for Conda.")]
struct Cli {
    /// Increase log verbosity (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command in an environment
    Run {
        /// Command to run, quoted as a single argument
        command: String,

        /// Environment in which to run the command
        #[arg(long, default_value = DEFAULT_ENV)]
        env: String,
    },

    /// Create or update Conda environments
    Update {
        /// Environment to update; all configured environments when omitted
        #[arg(long)]
        env: Option<String>,

        /// Delete and recreate rather than updating in place
        #[arg(long)]
        recreate: bool,
    },

    /// List configured environments
    List,
}

fn main() {
    let _ = color_eyre::install();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            let style = Style::new(false, atty::is(Stream::Stderr));
            if debug_enabled() {
                eprintln!("{}", style.error("Error:"));
                eprintln!("{err:?}");
            } else {
                eprintln!("{}", style.error("Error:"));
                eprintln!("{err}");
            }
            process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cwd = env::current_dir()?;
    let loaded = Config::load(&cwd);

    // The alias dispatch table is built from the parsed configuration
    // before argument parsing begins. A missing or broken configuration
    // must not take down `--help`/`--version`, so it is deferred until a
    // subcommand actually needs it.
    let mut command = Cli::command();
    if let Ok(config) = &loaded {
        for alias in config.aliases.values() {
            if RESERVED_SUBCOMMANDS.contains(&alias.name.as_str()) {
                eprintln!(
                    "warning: alias '{}' shadows a built-in subcommand and is ignored",
                    alias.name
                );
                continue;
            }
            command = command.subcommand(alias_subcommand(alias));
        }
    }
    let matches = match command.try_get_matches() {
        Ok(matches) => matches,
        Err(err) => err.exit(),
    };

    init_tracing(matches.get_count("verbose"));
    let style = Style::new(matches.get_flag("no_color"), atty::is(Stream::Stdout));

    let Some((name, sub)) = matches.subcommand() else {
        println!("No subcommand given; for help, pass '--help'");
        return Ok(NO_SUBCOMMAND_EXIT_CODE);
    };

    if loaded
        .as_ref()
        .is_ok_and(|config| config.aliases.contains_key(name))
    {
        let config = loaded.expect("checked above");
        let alias = &config.aliases[name];
        return run_alias(&config, alias, sub);
    }

    let cli = Cli::from_arg_matches(&matches)?;
    match cli.command.expect("subcommand presence checked above") {
        Commands::Run { command, env } => {
            let config = fatal(loaded)?;
            exec_in_env(&config, &env, &command, None)
        }
        Commands::Update { env, recreate } => {
            let config = fatal(loaded)?;
            update_envs(&config, &style, env.as_deref(), recreate)
        }
        Commands::List => {
            let config = fatal(loaded)?;
            Ok(list_envs(&config, &style, cli.verbose))
        }
    }
}

fn fatal(loaded: Result<Config, ConfigError>) -> Result<Config> {
    loaded.map_err(color_eyre::Report::new)
}

fn alias_subcommand(alias: &Alias) -> clap::Command {
    let mut cmd = clap::Command::new(alias.name.clone())
        .about(alias.description.clone())
        .arg(
            Arg::new("env")
                .long("env")
                .help("Environment in which to run the command")
                .default_value(alias.default_env.clone()),
        );
    if alias.passthrough_args {
        cmd = cmd.arg(
            Arg::new("args")
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true)
                .help("Extra arguments appended to the aliased command"),
        );
    }
    cmd
}

fn run_alias(config: &Config, alias: &Alias, matches: &ArgMatches) -> Result<i32> {
    let env_name = matches
        .get_one::<String>("env")
        .cloned()
        .unwrap_or_else(|| alias.default_env.clone());
    let mut command_line = alias.command.clone();
    if alias.passthrough_args {
        if let Some(extra) = matches.get_many::<String>("args") {
            for token in extra {
                command_line.push(' ');
                command_line.push_str(token);
            }
        }
    }
    exec_in_env(config, &env_name, &command_line, alias.working_dir.as_deref())
}

/// Prepare the named environment, then run `command_line` inside it. The
/// child's exit code becomes this process's exit code.
fn exec_in_env(
    config: &Config,
    env_name: &str,
    command_line: &str,
    cwd: Option<&Path>,
) -> Result<i32> {
    let env = lookup_env(config, env_name)?;
    let argv = shlex::split(command_line)
        .ok_or_else(|| eyre!("command '{command_line}' has unbalanced quotes"))?;
    let tool = CondaTool::locate()?;
    prepare(&tool, env, &PrepareOptions::default())?;
    Ok(tool.run_in(&env.env_path, &argv, cwd)?)
}

fn update_envs(
    config: &Config,
    style: &Style,
    env: Option<&str>,
    recreate: bool,
) -> Result<i32> {
    let selected: Vec<&Env> = match env {
        Some(name) => vec![lookup_env(config, name)?],
        None => config.envs.values().collect(),
    };
    let plural = if selected.len() == 1 { "" } else { "s" };
    println!(
        "{}",
        style.info(&format!("Updating {} environment{plural}", selected.len()))
    );

    let tool = CondaTool::locate()?;
    let opts = PrepareOptions {
        ignore_cache: true,
        allow_update: !recreate,
    };
    for env in selected {
        println!();
        println!(
            "{}",
            style.info(&format!(
                "Preparing environment '{}' from '{}' in '{}':",
                env.name,
                env.yml_path.display(),
                env.env_path.display()
            ))
        );
        prepare(&tool, env, &opts)?;
    }
    Ok(0)
}

fn list_envs(config: &Config, style: &Style, verbose: u8) -> i32 {
    for env in config.envs.values() {
        let installed = if env.env_path.is_dir() {
            "installed"
        } else {
            "missing"
        };
        println!(
            "{}  {}  [{installed}]",
            style.header(&env.name),
            env.env_path.display()
        );
        if verbose > 0 {
            println!("    yml_path: {}", env.yml_path.display());
            println!("    install_current: {}", env.install_current);
        }
        if verbose > 1 {
            println!("    additional_channels: {:?}", env.additional_channels);
            println!(
                "    additional_dependencies: {:?}",
                env.additional_dependencies
            );
        }
    }
    0
}

fn lookup_env<'a>(config: &'a Config, name: &str) -> Result<&'a Env> {
    config
        .envs
        .get(name)
        .ok_or_else(|| eyre!("no environment named '{name}' is configured"))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = env::var("SOAP_LOG").unwrap_or_else(|_| {
        format!("soap_cli={level},soap_core={level},soap_domain={level}")
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// `SOAP_DEBUG=1` switches the short error banner to the full report.
fn debug_enabled() -> bool {
    env::var_os("SOAP_DEBUG").is_some_and(|value| !value.is_empty() && value != "0")
}
