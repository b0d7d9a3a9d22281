use crate::errors::AppError;
use crate::jwt::JwtConfig;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

/// Page size bounds shared by every list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_per_page: i64,
    pub max_per_page: i64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: MAX_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub jwt: JwtConfig,
    pub pages: PageLimits,
    pub tls: Option<TlsPaths>,
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert_path: String,
    pub key_path: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let port = parse_env("APP_PORT", DEFAULT_PORT)?;
        let default_per_page = parse_env("DEFAULT_PER_PAGE", DEFAULT_PER_PAGE)?;
        let max_per_page = parse_env("MAX_PER_PAGE", MAX_PER_PAGE)?;

        if default_per_page < 1 || max_per_page < default_per_page {
            return Err(AppError::configuration(
                "DEFAULT_PER_PAGE must be >= 1 and <= MAX_PER_PAGE",
            ));
        }

        let tls = match (std::env::var("CERT_PATH"), std::env::var("KEY_PATH")) {
            (Ok(cert_path), Ok(key_path)) => Some(TlsPaths { cert_path, key_path }),
            _ => None,
        };

        Ok(Self {
            port,
            jwt: JwtConfig::from_env()?,
            pages: PageLimits {
                default_per_page,
                max_per_page,
            },
            tls,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::configuration(format!("{key} must be a valid number"))),
        Err(_) => Ok(default),
    }
}
