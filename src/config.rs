use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Value shipped in sample secrets files; treated the same as no key at all.
const PLACEHOLDER_API_KEY: &str = "sk-your-openai-api-key-here";

#[derive(Parser, Debug)]
#[command(name = "appfab", about = "Generate small apps from a prompt")]
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
    pub accounts: AccountsConfig,
    pub generation: GenerationConfig,
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
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AccountsConfig {
    /// Balance granted at registration.
    pub welcome_credits: i64,
    /// bcrypt work factor for password hashes.
    pub password_cost: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub cost_per_generation: i64,
    /// Serve a canned demo artifact instead of failing when no key is configured.
    pub demo_fallback: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "appfab_session".to_string(),
            session_hours: 720,
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            welcome_credits: 10,
            password_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: 60,
            api_key_env: "OPENAI_API_KEY".to_string(),
            cost_per_generation: 1,
            demo_fallback: false,
        }
    }
}

impl GenerationConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key_from_env(&self) -> Option<String> {
        normalize_api_key(std::env::var(&self.api_key_env).ok())
    }
}

/// Blank values and the sample placeholder count as "no key".
pub fn normalize_api_key(raw: Option<String>) -> Option<String> {
    raw.map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && k != PLACEHOLDER_API_KEY)
}

impl Config {
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

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("appfab.db"));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break credit accounting.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.generation.cost_per_generation >= 1,
            "generation.cost_per_generation must be at least 1, got {}",
            self.generation.cost_per_generation
        );
        anyhow::ensure!(
            self.accounts.welcome_credits >= 0,
            "accounts.welcome_credits must not be negative, got {}",
            self.accounts.welcome_credits
        );
        Ok(())
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".appfab")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("appfab.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_for(data_dir: PathBuf) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(data_dir),
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.cookie_name, "appfab_session");
        assert_eq!(config.accounts.welcome_credits, 10);
        assert_eq!(config.generation.cost_per_generation, 1);
        assert_eq!(config.generation.timeout_secs, 60);
        assert!(!config.generation.demo_fallback);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn data_dir_defaults_to_home_dot_appfab() {
        let cli = Cli {
            config: None,
            host: None,
            port: None,
            data_dir: None,
        };
        assert!(Config::data_dir(&cli).ends_with(".appfab"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_for(tmp.path().to_path_buf())).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.db_path(), tmp.path().join("appfab.db"));
    }

    #[test]
    fn load_reads_toml_sections() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
port = 9000

[accounts]
welcome_credits = 3

[generation]
model = "gpt-4o"
timeout_secs = 15
demo_fallback = true
"#,
        )
        .unwrap();

        let mut cli = cli_for(tmp.path().to_path_buf());
        cli.config = Some(config_path);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.accounts.welcome_credits, 3);
        assert_eq!(config.accounts.password_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.generation.model, "gpt-4o");
        assert_eq!(config.generation.timeout_secs, 15);
        assert_eq!(config.generation.max_tokens, 2000);
        assert!(config.generation.demo_fallback);
    }

    #[test]
    fn load_rejects_non_positive_generation_cost() {
        let tmp = tempfile::tempdir().unwrap();
        for cost in ["0", "-3"] {
            let config_path = tmp.path().join("config.toml");
            std::fs::write(
                &config_path,
                format!("[generation]\ncost_per_generation = {}\n", cost),
            )
            .unwrap();

            let mut cli = cli_for(tmp.path().to_path_buf());
            cli.config = Some(config_path);
            let err = Config::load(&cli).unwrap_err();
            assert!(err.to_string().contains("cost_per_generation"));
        }
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[server]\nhost = \"192.168.1.1\"\nport = 9000\n").unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn placeholder_and_blank_keys_are_treated_as_missing() {
        assert_eq!(normalize_api_key(None), None);
        assert_eq!(normalize_api_key(Some("   ".into())), None);
        assert_eq!(
            normalize_api_key(Some("sk-your-openai-api-key-here".into())),
            None
        );
        assert_eq!(
            normalize_api_key(Some(" sk-live ".into())),
            Some("sk-live".to_string())
        );
    }
}
