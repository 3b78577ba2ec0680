use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub store: StoreConfig,
    pub agent: AgentConfig,
    pub pricing: PricingConfig,
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// Which durable backend holds conversation records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    File,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreBackend::File),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!(
                "THREAD_STORE_BACKEND must be 'file' or 'postgres', got '{}'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Root directory for the file backend
    pub storage_path: PathBuf,
    /// Only present when the postgres backend is selected
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Azure OpenAI deployment used as the external reasoning agent
#[derive(Clone)]
pub struct AgentConfig {
    pub api_key: String,
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub timeout: Duration,
    pub temperature: f32,
}

// Keep the API key out of logs
impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("api_key", &"***")
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Per-thousand-token prices used to cost a chat turn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingConfig {
    pub input_per_1k: Decimal,
    pub output_per_1k: Decimal,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            store: StoreConfig::from_env()?,
            agent: AgentConfig::from_env()?,
            pricing: PricingConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StoreConfig {
    const DEFAULT_STORAGE_PATH: &'static str = "./storage/chat";

    pub fn from_env() -> Result<Self, String> {
        let backend = env::var("THREAD_STORE_BACKEND")
            .unwrap_or_else(|_| "file".to_string())
            .parse::<StoreBackend>()?;

        let storage_path = PathBuf::from(
            env::var("CHAT_STORAGE_PATH").unwrap_or_else(|_| Self::DEFAULT_STORAGE_PATH.to_string()),
        );

        let database = match backend {
            StoreBackend::Postgres => Some(DatabaseConfig::from_env()?),
            StoreBackend::File => None,
        };

        Ok(Self {
            backend,
            storage_path,
            database,
        })
    }
}

impl DatabaseConfig {
    // Default values for database connection pool (conservative defaults for small-medium apps)
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set for the postgres backend".to_string())?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a valid number".to_string())?;

        let min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MIN_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let idle_timeout_secs = env::var("DB_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_IDLE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_IDLE_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_lifetime_secs = env::var("DB_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_LIFETIME_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_MAX_LIFETIME_SECS must be a valid number".to_string())?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
        })
    }
}

impl AgentConfig {
    const DEFAULT_TIMEOUT_SECS: u64 = 120;
    const DEFAULT_API_VERSION: &'static str = "2024-06-01";

    pub fn from_env() -> Result<Self, String> {
        let api_key = env::var("AZURE_OPENAI_API_KEY")
            .map_err(|_| "AZURE_OPENAI_API_KEY environment variable is required".to_string())?;

        let endpoint = env::var("AZURE_OPENAI_ENDPOINT")
            .map_err(|_| "AZURE_OPENAI_ENDPOINT environment variable is required".to_string())?
            .trim_end_matches('/')
            .to_string();

        let deployment = env::var("AZURE_OPENAI_DEPLOYMENT")
            .map_err(|_| "AZURE_OPENAI_DEPLOYMENT environment variable is required".to_string())?;

        let api_version = env::var("AZURE_OPENAI_API_VERSION")
            .unwrap_or_else(|_| Self::DEFAULT_API_VERSION.to_string());

        let timeout_secs = env::var("AGENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "AGENT_TIMEOUT_SECS must be a valid number".to_string())?;

        let temperature = env::var("AGENT_TEMPERATURE")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<f32>()
            .map_err(|_| "AGENT_TEMPERATURE must be a valid number".to_string())?;

        Ok(Self {
            api_key,
            endpoint,
            deployment,
            api_version,
            timeout: Duration::from_secs(timeout_secs),
            temperature,
        })
    }
}

impl PricingConfig {
    // Azure OpenAI GPT-4o list prices, USD per 1K tokens
    const DEFAULT_INPUT_PER_1K: &'static str = "0.005";
    const DEFAULT_OUTPUT_PER_1K: &'static str = "0.015";

    pub fn from_env() -> Result<Self, String> {
        let input_per_1k = Self::parse_price(
            "PRICE_PER_1K_INPUT_TOKENS",
            env::var("PRICE_PER_1K_INPUT_TOKENS").ok(),
            Self::DEFAULT_INPUT_PER_1K,
        )?;
        let output_per_1k = Self::parse_price(
            "PRICE_PER_1K_OUTPUT_TOKENS",
            env::var("PRICE_PER_1K_OUTPUT_TOKENS").ok(),
            Self::DEFAULT_OUTPUT_PER_1K,
        )?;

        Ok(Self {
            input_per_1k,
            output_per_1k,
        })
    }

    fn parse_price(name: &str, value: Option<String>, default: &str) -> Result<Decimal, String> {
        let raw = value.unwrap_or_else(|| default.to_string());
        let price = Decimal::from_str(raw.trim())
            .map_err(|_| format!("{} must be a valid decimal number", name))?;
        if price.is_sign_negative() {
            return Err(format!("{} must not be negative", name));
        }
        Ok(price)
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_1k: Decimal::new(5, 3),
            output_per_1k: Decimal::new(15, 3),
        }
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title =
            env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Trading Assistant API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION").unwrap_or_else(|_| {
            "Conversation threads and chat for the trading assistant".to_string()
        });

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("file".parse::<StoreBackend>(), Ok(StoreBackend::File));
        assert_eq!(" Postgres ".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_parse_price_defaults_and_overrides() {
        let default = PricingConfig::parse_price("P", None, "0.005").unwrap();
        assert_eq!(default, Decimal::new(5, 3));

        let custom = PricingConfig::parse_price("P", Some("0.0025".into()), "0.005").unwrap();
        assert_eq!(custom, Decimal::new(25, 4));

        assert!(PricingConfig::parse_price("P", Some("abc".into()), "0.005").is_err());
        assert!(PricingConfig::parse_price("P", Some("-1".into()), "0.005").is_err());
    }

    #[test]
    fn test_default_pricing_matches_list_prices() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.input_per_1k.to_string(), "0.005");
        assert_eq!(pricing.output_per_1k.to_string(), "0.015");
    }

    #[test]
    fn test_agent_config_debug_hides_key() {
        let config = AgentConfig {
            api_key: "secret-key".to_string(),
            endpoint: "https://example.openai.azure.com".to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-06-01".to_string(),
            timeout: Duration::from_secs(5),
            temperature: 0.0,
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("gpt-4o"));
    }
}
