mod commands;

use std::env;
use std::io;
use std::process::ExitCode;

use commands::{run, CommandKind, DemoOptions};
use theme_engine::resolve_app_paths;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }

    let kind = parse_command(&args)?;
    let paths = resolve_app_paths().map_err(|err| {
        error!(error = %err, "startup_failed");
        err.to_string()
    })?;
    info!(
        root = %paths.root.display(),
        themes_dir = %paths.themes_dir.display(),
        "theme_studio_startup"
    );

    run(kind, &paths, &mut io::stdout())
}

fn parse_command(args: &[String]) -> Result<CommandKind, String> {
    let command = args
        .first()
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[1..];

    match command {
        "list" => {
            if !command_args.is_empty() {
                return Err("list takes no arguments".to_string());
            }
            Ok(CommandKind::List)
        }
        "show" | "apply" => {
            let [theme] = command_args else {
                return Err(format!("{command} requires exactly one theme id or file"));
            };
            let theme = theme.clone();
            Ok(if command == "show" {
                CommandKind::Show { theme }
            } else {
                CommandKind::Apply { theme }
            })
        }
        "demo" => {
            let name = command_args
                .first()
                .ok_or_else(|| "demo requires a theme name".to_string())?
                .clone();
            let mut options = DemoOptions::default();
            for arg in &command_args[1..] {
                match arg.as_str() {
                    "--materialize" => options.materialize = true,
                    "--overwrite" => options.overwrite = true,
                    other => {
                        return Err(format!(
                            "unknown demo argument '{other}' (expected --materialize or --overwrite)"
                        ))
                    }
                }
            }
            Ok(CommandKind::Demo { name, options })
        }
        other => Err(format!("unknown subcommand '{other}'")),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "theme_studio - author, save and update placement themes",
        "",
        "Usage:",
        "  theme_studio list",
        "  theme_studio show <theme-id | file.theme.json>",
        "  theme_studio apply <theme-id | file.theme.json>",
        "  theme_studio demo <name> [--materialize] [--overwrite]",
        "",
        "Environment:",
        "  THEME_STUDIO_ROOT  project root holding assets/themes and assets/templates",
        "  RUST_LOG           log filter (default info)",
    ]
    .join("\n")
}
