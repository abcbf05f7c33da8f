//! Development-only reverse proxy that relays `/validate` and `/api` calls
//! to the Sammy API host with permissive CORS headers.

pub mod routes;
pub mod server;

pub use server::{ProxyServer, ProxyState};

use crate::config::{
    EnvSnapshot, DEFAULT_PROXY_ALLOW_ORIGIN, DEFAULT_PROXY_LISTEN, DEFAULT_PROXY_TARGET,
    ENV_PROXY_ALLOW_ORIGIN, ENV_PROXY_LISTEN, ENV_PROXY_TARGET,
};

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub listen: SocketAddr,
    pub target: Url,
    pub allow_origin: String,
}

impl ProxyConfig {
    pub fn new(listen: &str, target: &str, allow_origin: &str) -> Result<Self> {
        let listen: SocketAddr = listen
            .parse()
            .with_context(|| format!("invalid listen address '{listen}'"))?;
        let target = Url::parse(target).with_context(|| format!("invalid proxy target '{target}'"))?;
        if !matches!(target.scheme(), "http" | "https") || target.host().is_none() {
            bail!("proxy target must be an http(s) URL with a host, got '{target}'");
        }
        if allow_origin.trim().is_empty() {
            bail!("allowed origin must not be empty");
        }
        Ok(Self {
            listen,
            target,
            allow_origin: allow_origin.trim().to_string(),
        })
    }

    /// Resolve from `SAMMY_PROXY_*` variables, falling back to defaults.
    pub fn from_env(env: &EnvSnapshot) -> Result<Self> {
        Self::resolve(env, None, None, None)
    }

    /// Each field is taken from its override, then the environment, then the
    /// default. Only the winning value is parsed.
    pub fn resolve(
        env: &EnvSnapshot,
        listen: Option<&str>,
        target: Option<&str>,
        allow_origin: Option<&str>,
    ) -> Result<Self> {
        Self::new(
            listen
                .or_else(|| env.get(ENV_PROXY_LISTEN))
                .unwrap_or(DEFAULT_PROXY_LISTEN),
            target
                .or_else(|| env.get(ENV_PROXY_TARGET))
                .unwrap_or(DEFAULT_PROXY_TARGET),
            allow_origin
                .or_else(|| env.get(ENV_PROXY_ALLOW_ORIGIN))
                .unwrap_or(DEFAULT_PROXY_ALLOW_ORIGIN),
        )
    }

    /// Upstream URL for an already rewritten path and optional query.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        let base = self.target.as_str().trim_end_matches('/');
        match query {
            Some(q) if !q.is_empty() => format!("{base}{path}?{q}"),
            _ => format!("{base}{path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_from_empty_env() {
        let config = ProxyConfig::from_env(&EnvSnapshot::default()).unwrap();
        assert_eq!(config.listen.to_string(), DEFAULT_PROXY_LISTEN);
        assert_eq!(config.target.as_str(), "https://app.sammylabs.com/");
        assert_eq!(config.allow_origin, DEFAULT_PROXY_ALLOW_ORIGIN);
    }

    #[test]
    fn env_overrides_and_validation() {
        let env = EnvSnapshot::from_pairs([
            (ENV_PROXY_TARGET, "http://localhost:9000"),
            (ENV_PROXY_ALLOW_ORIGIN, "http://localhost:5173"),
        ]);
        let config = ProxyConfig::from_env(&env).unwrap();
        assert_eq!(config.target.as_str(), "http://localhost:9000/");
        assert_eq!(config.allow_origin, "http://localhost:5173");

        assert!(ProxyConfig::new("127.0.0.1:0", "ftp://example.com", "x").is_err());
        assert!(ProxyConfig::new("not-an-addr", DEFAULT_PROXY_TARGET, "x").is_err());
    }

    #[test]
    fn overrides_win_over_malformed_environment() {
        let env = EnvSnapshot::from_pairs([
            (ENV_PROXY_LISTEN, "not-an-addr"),
            (ENV_PROXY_TARGET, "http://localhost:9000"),
        ]);
        assert!(ProxyConfig::from_env(&env).is_err());

        let config = ProxyConfig::resolve(&env, Some("127.0.0.1:4000"), None, None).unwrap();
        assert_eq!(config.listen.to_string(), "127.0.0.1:4000");
        assert_eq!(config.target.as_str(), "http://localhost:9000/");
        assert_eq!(config.allow_origin, DEFAULT_PROXY_ALLOW_ORIGIN);
    }

    #[test]
    fn upstream_url_keeps_query() {
        let config = ProxyConfig::new("127.0.0.1:0", "https://app.sammylabs.com", "o").unwrap();
        assert_eq!(
            config.upstream_url("/guides/1", Some("lang=en")),
            "https://app.sammylabs.com/guides/1?lang=en"
        );
        assert_eq!(config.upstream_url("/", None), "https://app.sammylabs.com/");
    }
}
