use clap::{CommandFactory, Parser};
use color_eyre::Result;
use mvextras::error_display::user_message_from_report;
use mvextras::{AppConfig, Args, Command, ConfigManager, APP_NAME};

fn init_tracing(debug: bool) -> Result<()> {
    let default_filter = if debug { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| color_eyre::eyre::eyre!(err.to_string()))?;
    Ok(())
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        match ConfigManager::new(APP_NAME) {
            Ok(config_manager) => match config_manager.write_default_config(args.force) {
                Ok(config_path) => {
                    println!("Configuration file written to: {}", config_path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing configuration file: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

fn run(command: &Command, config: &AppConfig) -> Result<()> {
    let stdout = std::io::stdout();
    match command {
        Command::Correlate(args) => mvextras::run_correlate(args, config, stdout.lock()),
        Command::Batches(args) => mvextras::run_batches(args, config, stdout.lock()),
        Command::Tag(args) => mvextras::run_tag(args, config),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;

    let config = match AppConfig::load(APP_NAME) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    init_tracing(args.debug || config.debug.enabled)?;

    let Some(command) = &args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    if let Err(e) = run(command, &config) {
        eprintln!("Error: {}", user_message_from_report(&e, None));
        std::process::exit(1);
    }
    Ok(())
}
