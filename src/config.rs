use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use crate::auth::SessionSigner;

/// Environment variable naming the SQLite database file.
pub const DATABASE_PATH_ENV: &str = "BLOG_DATABASE_PATH";
/// Environment variable holding the session-signing secret.
pub const SECRET_KEY_ENV: &str = "BLOG_SECRET_KEY";

#[derive(Parser, Debug)]
#[command(name = "blog", about = "A small blogging server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub bcrypt_cost: u32,
    pub secret_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "blog_session".to_string(),
            session_hours: 720,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            secret_key: None,
        }
    }
}

impl Config {
    /// Layering, lowest to highest: defaults, config file, environment, CLI.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());

        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("blog.db"));
        }

        Ok(config)
    }

    /// Override file values with whatever `lookup` finds for the
    /// `BLOG_*` variables. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(path) = lookup(DATABASE_PATH_ENV) {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(secret) = lookup(SECRET_KEY_ENV) {
            self.auth.secret_key = Some(secret);
        }
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".blog"))
                .unwrap_or_else(|| PathBuf::from(".blog"))
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("blog.db"))
    }

    /// Signer for session cookies. Without a configured secret every restart
    /// invalidates existing sessions.
    pub fn session_signer(&self) -> SessionSigner {
        match &self.auth.secret_key {
            Some(secret) => SessionSigner::new(secret.as_bytes().to_vec()),
            None => {
                tracing::warn!(
                    "No secret key configured (set {} or [auth] secret_key); \
                     sessions will not survive a restart",
                    SECRET_KEY_ENV
                );
                SessionSigner::ephemeral()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(data_dir: &std::path::Path) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(data_dir.to_path_buf()),
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.cookie_name, "blog_session");
        assert_eq!(config.auth.session_hours, 720);
        assert_eq!(config.auth.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.auth.secret_key.is_none());
        assert!(config.database.path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli(std::path::Path::new("/tmp/test-blog"));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-blog"));
    }

    #[test]
    fn data_dir_defaults_to_dot_blog() {
        let cli = Cli {
            config: None,
            host: None,
            port: None,
            data_dir: None,
        };
        assert!(Config::data_dir(&cli).ends_with(".blog"));
    }

    #[test]
    fn load_with_no_config_file_places_db_in_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli(tmp.path())).unwrap();
        assert_eq!(config.server.port, 5000);
        if std::env::var(DATABASE_PATH_ENV).is_err() {
            assert_eq!(config.db_path(), tmp.path().join("blog.db"));
        }
    }

    #[test]
    fn load_reads_toml_file_and_applies_cli_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000

[auth]
cookie_name = "my_cookie"
session_hours = 24
bcrypt_cost = 6
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: None,
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.auth.cookie_name, "my_cookie");
        assert_eq!(config.auth.session_hours, 24);
        assert_eq!(config.auth.bcrypt_cost, 6);
    }

    #[test]
    fn env_overrides_database_path_and_secret() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            DATABASE_PATH_ENV => Some("/srv/blog/blog.db".to_string()),
            SECRET_KEY_ENV => Some("s3cret".to_string()),
            _ => None,
        });
        assert_eq!(config.db_path(), PathBuf::from("/srv/blog/blog.db"));
        assert_eq!(config.auth.secret_key.as_deref(), Some("s3cret"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = Config::default();
        config.auth.secret_key = Some("from-file".to_string());
        config.apply_env(|_| Some(String::new()));
        assert_eq!(config.auth.secret_key.as_deref(), Some("from-file"));
        assert!(config.database.path.is_none());
    }

    #[test]
    fn configured_secret_gives_stable_signatures() {
        let mut config = Config::default();
        config.auth.secret_key = Some("s3cret".to_string());
        let cookie = config.session_signer().sign("token");
        assert_eq!(config.session_signer().verify(&cookie), Some("token"));
    }
}
