use clap::Parser;
use sammy_shell::cli::{Cli, Commands, ConfigAction};
use sammy_shell::config::{build_config, ConfigOptions, EnvSnapshot, TokenExpiredHook};
use sammy_shell::logging;
use sammy_shell::proxy::{ProxyConfig, ProxyServer};
use sammy_shell::ui::config_banner;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();
    let env = EnvSnapshot::from_process();

    match cli.command {
        Commands::Config(opts) => {
            let on_expired: TokenExpiredHook =
                Arc::new(|| warn!("JWT token expired, need to refresh"));
            let built = match build_config(ConfigOptions::from_env(&env, on_expired), &env) {
                Ok(built) => built,
                Err(err) => {
                    match config_banner(&err) {
                        Some(banner) => eprint!("{banner}"),
                        None => eprintln!("{err}"),
                    }
                    std::process::exit(1);
                }
            };

            for warning in &built.warnings {
                eprintln!("warning: {warning}");
            }

            match opts.action {
                ConfigAction::Show => {
                    println!("{}", serde_json::to_string_pretty(built.config.as_ref())?);
                }
                ConfigAction::Validate => {
                    info!(fingerprint = %built.config.fingerprint(), "Configuration is valid");
                }
            }
        }
        Commands::Proxy(opts) => {
            let config = ProxyConfig::resolve(
                &env,
                opts.listen.as_deref(),
                opts.target.as_deref(),
                opts.allow_origin.as_deref(),
            )?;
            info!("Starting Sammy development proxy");
            let server = ProxyServer::bind(config).await?;
            server.run_until_shutdown().await?;
        }
        Commands::Version => {
            println!("sammy-shell {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
