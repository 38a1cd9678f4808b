use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CurrencyEntry {
    pub code: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IndexEntry {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AwesomeProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub awesome: Option<AwesomeProviderConfig>,
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            awesome: Some(AwesomeProviderConfig {
                base_url: "https://economia.awesomeapi.com.br".to_string(),
            }),
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub primary_ttl_secs: u64,
    pub historical_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            primary_ttl_secs: 120,
            historical_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_concurrent_requests: usize,
    /// Upper bound for a whole refresh cycle.
    pub refresh_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_concurrent_requests: 10,
            refresh_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub quote_currency: String,
    pub pivot_currency: String,
    pub fx_ticker_suffix: String,
    pub currencies: Vec<CurrencyEntry>,
    pub equities: Vec<String>,
    pub indices: Vec<IndexEntry>,
    pub movers: usize,
    pub refresh_interval_secs: u64,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub providers: ProvidersConfig,
}

fn currency(code: &str, name: &str) -> CurrencyEntry {
    CurrencyEntry {
        code: code.to_string(),
        name: Some(name.to_string()),
    }
}

fn index(name: &str, symbol: &str) -> IndexEntry {
    IndexEntry {
        name: name.to_string(),
        symbol: symbol.to_string(),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            quote_currency: "BRL".to_string(),
            pivot_currency: "USD".to_string(),
            fx_ticker_suffix: "=X".to_string(),
            currencies: vec![
                currency("USD", "US Dollar"),
                currency("EUR", "Euro"),
                currency("JPY", "Japanese Yen"),
                currency("GBP", "Pound Sterling"),
                currency("CHF", "Swiss Franc"),
                currency("UYU", "Uruguayan Peso"),
                currency("CNY", "Chinese Yuan"),
                currency("COP", "Colombian Peso"),
                currency("ARS", "Argentine Peso"),
                currency("CLP", "Chilean Peso"),
            ],
            equities: [
                "PETR4.SA", "VALE3.SA", "ITUB4.SA", "BBDC4.SA", "ABEV3.SA", "BBAS3.SA",
                "MGLU3.SA", "LREN3.SA", "SUZB3.SA", "GGBR4.SA",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            indices: vec![
                index("Ibovespa", "^BVSP"),
                index("Nasdaq", "^IXIC"),
                index("S&P 500", "^GSPC"),
                index("Dow Jones", "^DJI"),
            ],
            movers: 5,
            refresh_interval_secs: 60,
            cache: CacheConfig::default(),
            http: HttpConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fxboard", "fxboard")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.validate()?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.movers == 0 {
            anyhow::bail!("movers must be at least 1");
        }
        if self.http.max_concurrent_requests == 0 {
            anyhow::bail!("http.max_concurrent_requests must be at least 1");
        }
        if self.quote_currency.trim().is_empty() || self.pivot_currency.trim().is_empty() {
            anyhow::bail!("quote_currency and pivot_currency must not be empty");
        }
        Ok(())
    }

    pub fn awesome_base_url(&self) -> &str {
        self.providers
            .awesome
            .as_ref()
            .map_or("https://economia.awesomeapi.com.br", |p| &p.base_url)
    }

    pub fn yahoo_base_url(&self) -> &str {
        self.providers
            .yahoo
            .as_ref()
            .map_or("https://query1.finance.yahoo.com", |p| &p.base_url)
    }

    pub fn primary_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.primary_ttl_secs)
    }

    pub fn historical_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.historical_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.http.refresh_timeout_secs.max(self.http.timeout_secs))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
quote_currency: "BRL"
pivot_currency: "USD"
currencies:
  - code: "USD"
    name: "US Dollar"
  - code: "EUR"
equities: ["PETR4.SA", "VALE3.SA"]
indices:
  - name: "Ibovespa"
    symbol: "^BVSP"
movers: 3
cache:
  primary_ttl_secs: 30
providers:
  yahoo:
    base_url: "http://example.com/yahoo"
  awesome:
    base_url: "http://example.com/awesome"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.quote_currency, "BRL");
        assert_eq!(config.currencies.len(), 2);
        assert_eq!(config.currencies[0].name.as_deref(), Some("US Dollar"));
        assert!(config.currencies[1].name.is_none());
        assert_eq!(config.equities, vec!["PETR4.SA", "VALE3.SA"]);
        assert_eq!(config.indices[0].symbol, "^BVSP");
        assert_eq!(config.movers, 3);
        assert_eq!(config.primary_ttl(), Duration::from_secs(30));
        // unspecified fields keep their defaults
        assert_eq!(config.historical_ttl(), Duration::from_secs(300));
        assert_eq!(config.refresh_interval_secs, 60);
        assert_eq!(config.fx_ticker_suffix, "=X");
        assert_eq!(config.yahoo_base_url(), "http://example.com/yahoo");
        assert_eq!(config.awesome_base_url(), "http://example.com/awesome");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.quote_currency, "BRL");
        assert_eq!(config.pivot_currency, "USD");
        assert_eq!(config.currencies.len(), 10);
        assert_eq!(config.equities.len(), 10);
        assert_eq!(config.indices.len(), 4);
        assert_eq!(config.movers, 5);
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.http.max_concurrent_requests, 10);
        assert_eq!(config.awesome_base_url(), "https://economia.awesomeapi.com.br");
    }

    #[test]
    fn test_invalid_movers_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "movers: 0\n").unwrap();

        let err = AppConfig::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("movers must be at least 1"));
    }
}
