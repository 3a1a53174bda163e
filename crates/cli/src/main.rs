mod config_commands;
mod run;
mod subscriber_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "postwatch",
    version,
    about = "Forwards matching Telegram channel posts to subscribers"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (defaults to postwatch.{toml,yaml,yml,json} in ./ or the
    /// user config dir).
    #[arg(long, global = true, env = "POSTWATCH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch channels and deliver matching posts (default).
    Run,
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Manage subscribers in the registry.
    Subscribers {
        #[command(subcommand)]
        action: Option<subscriber_commands::SubscriberAction>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = cli.config.as_deref();
    match cli.command {
        None | Some(Commands::Run) => {
            info!(version = env!("CARGO_PKG_VERSION"), "postwatch starting");
            run::run(config).await
        },
        Some(Commands::Check { verbose }) => config_commands::check(config, verbose),
        Some(Commands::Subscribers { action }) => subscriber_commands::handle_subscribers(
            config,
            action.unwrap_or(subscriber_commands::SubscriberAction::List),
        ),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_is_the_default_command() {
        let cli = Cli::try_parse_from(["postwatch"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "postwatch",
            "check",
            "--verbose",
            "--config",
            "/etc/postwatch.toml",
            "--json-logs",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Check { verbose: true })));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/postwatch.toml")));
        assert!(cli.json_logs);
    }

    #[test]
    fn subscribers_add_takes_filters() {
        let cli = Cli::try_parse_from([
            "postwatch",
            "subscribers",
            "add",
            "-100200",
            "--channels",
            "@jobs,@remote",
            "--keywords",
            "rust",
        ])
        .unwrap();
        let Some(Commands::Subscribers {
            action: Some(subscriber_commands::SubscriberAction::Add { id, channels, keywords }),
        }) = cli.command
        else {
            panic!("expected subscribers add");
        };
        assert_eq!(id, -100200);
        assert_eq!(channels, ["@jobs,@remote"]);
        assert_eq!(keywords, ["rust"]);
    }
}
