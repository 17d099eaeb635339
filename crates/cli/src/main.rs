use std::path::PathBuf;

use clap::Parser;
use server::{Config, Credentials};

#[derive(Parser)]
#[command(name = "arbor-feeds")]
#[command(about = "RSS feeds for Ann Arbor listings, weather, alerts and events", long_about = None)]
#[command(version = env!("ARBOR_FEEDS_VERSION"))]
struct Cli {
    /// TOML config file. Flags and environment variables override it
    #[arg(short, long, env = "ARBOR_FEEDS_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Directory for cached upstream responses
    #[arg(long, env = "ARBOR_FEEDS_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Public base URL used in feed self links
    #[arg(long, env = "ARBOR_FEEDS_PUBLIC_URL")]
    public_url: Option<String>,

    #[arg(long, env = "TICKETMASTER_API_KEY", hide_env_values = true, hide = true)]
    ticketmaster_api_key: Option<String>,

    #[arg(long, env = "RAPIDAPI_KEY", hide_env_values = true, hide = true)]
    rapidapi_key: Option<String>,

    #[arg(long, env = "RENTSPREE_API_KEY", hide_env_values = true, hide = true)]
    rentspree_api_key: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<Config, server::ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(cache_dir) = self.cache_dir {
            config.cache_dir = cache_dir;
        }
        if let Some(public_url) = self.public_url {
            config.public_url = public_url;
        }

        let Credentials {
            ticketmaster_api_key,
            rapidapi_key,
            rentspree_api_key,
        } = &mut config.credentials;
        override_key(ticketmaster_api_key, self.ticketmaster_api_key);
        override_key(rapidapi_key, self.rapidapi_key);
        override_key(rentspree_api_key, self.rentspree_api_key);

        Ok(config)
    }
}

/// Blank values leave the file's key in place.
fn override_key(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *slot = Some(value);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    server::print_banner();

    let cli = Cli::parse();
    let config = cli.into_config()?;

    for (name, key) in [
        ("TICKETMASTER_API_KEY", &config.credentials.ticketmaster_api_key),
        ("RAPIDAPI_KEY", &config.credentials.rapidapi_key),
    ] {
        if key.is_none() {
            tracing::warn!("{} is not set; the feed that needs it will return errors", name);
        }
    }

    server::run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "arbor-feeds",
            "--port",
            "8080",
            "--public-url",
            "https://feeds.example.org",
            "--rapidapi-key",
            "abc",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.public_url, "https://feeds.example.org");
        assert_eq!(config.credentials.rapidapi_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_blank_key_is_ignored() {
        let mut slot = Some("from-file".to_string());
        override_key(&mut slot, Some("  ".to_string()));
        assert_eq!(slot.as_deref(), Some("from-file"));

        override_key(&mut slot, None);
        assert_eq!(slot.as_deref(), Some("from-file"));
    }
}
