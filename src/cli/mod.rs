use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sammy-shell", version, about = "Sammy voice agent shell")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect the provider configuration resolved from the environment.
    Config(ConfigOpts),
    /// Run the development CORS proxy.
    Proxy(ProxyOpts),
    Version,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the resolved configuration as JSON (token redacted).
    Show,
    /// Validate only; exit non-zero when invalid.
    Validate,
}

#[derive(clap::Args)]
pub struct ProxyOpts {
    #[arg(short, long)]
    pub listen: Option<String>,
    #[arg(short, long)]
    pub target: Option<String>,
    #[arg(short, long)]
    pub allow_origin: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_proxy_overrides() {
        let cli = Cli::parse_from([
            "sammy-shell",
            "proxy",
            "--listen",
            "127.0.0.1:4000",
            "--allow-origin",
            "http://localhost:5173",
        ]);
        match cli.command {
            Commands::Proxy(opts) => {
                assert_eq!(opts.listen.as_deref(), Some("127.0.0.1:4000"));
                assert_eq!(opts.target, None);
                assert_eq!(opts.allow_origin.as_deref(), Some("http://localhost:5173"));
            }
            _ => panic!("expected proxy command"),
        }
    }

    #[test]
    fn parses_config_actions() {
        let cli = Cli::parse_from(["sammy-shell", "config", "validate"]);
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigOpts {
                action: ConfigAction::Validate
            })
        ));
    }
}
