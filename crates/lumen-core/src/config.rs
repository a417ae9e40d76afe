use std::env;
use std::path::PathBuf;

const PORT: u16 = 8000;
const MAX_UPLOAD_SIZE_MB: usize = 25;
const MAX_IMAGE_DIMENSION: u32 = 8192;
const MAX_PIXEL_COUNT: u64 = 36_000_000;
const QUEUE_CONCURRENCY: usize = 4;
const QUEUE_MAX_ATTEMPTS: u32 = 2;
const DB_MAX_CONNECTIONS: u32 = 10;
const ACCESS_TOKEN_EXPIRY: &str = "1y";

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub server_port: u16,
    pub storage_directory: PathBuf,
    pub tmp_directory: PathBuf,
    /// `None` runs the service against the in-memory record store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub secret_key: String,
    pub access_token_expiry: String,
    pub max_upload_size_bytes: usize,
    pub max_image_dimension: u32,
    pub max_pixel_count: u64,
    pub queue_concurrency: usize,
    pub queue_max_attempts: u32,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_directory: PathBuf = env::var("STORAGE_DIRECTORY")
            .unwrap_or_else(|_| "./storage".to_string())
            .into();
        let tmp_directory = env::var("TMP_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| storage_directory.join(".tmp"));

        let max_upload_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let log_format = match env::var("LOG_FORMAT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        let config = Config {
            environment,
            server_port: env::var("PORT")
                .unwrap_or_else(|_| PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            storage_directory,
            tmp_directory,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| DB_MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(DB_MAX_CONNECTIONS),
            secret_key: env::var("SECRET_KEY")
                .map_err(|_| anyhow::anyhow!("SECRET_KEY must be set for authentication"))?,
            access_token_expiry: env::var("ACCESS_TOKEN_EXPIRY")
                .unwrap_or_else(|_| ACCESS_TOKEN_EXPIRY.to_string()),
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            max_image_dimension: env::var("MAX_IMAGE_DIMENSION")
                .unwrap_or_else(|_| MAX_IMAGE_DIMENSION.to_string())
                .parse()
                .unwrap_or(MAX_IMAGE_DIMENSION),
            max_pixel_count: env::var("MAX_PIXEL_COUNT")
                .unwrap_or_else(|_| MAX_PIXEL_COUNT.to_string())
                .parse()
                .unwrap_or(MAX_PIXEL_COUNT),
            queue_concurrency: env::var("QUEUE_CONCURRENCY")
                .unwrap_or_else(|_| QUEUE_CONCURRENCY.to_string())
                .parse()
                .unwrap_or(QUEUE_CONCURRENCY),
            queue_max_attempts: env::var("QUEUE_MAX_ATTEMPTS")
                .unwrap_or_else(|_| QUEUE_MAX_ATTEMPTS.to_string())
                .parse()
                .unwrap_or(QUEUE_MAX_ATTEMPTS),
            log_format,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.secret_key.len() < 32 {
            return Err(anyhow::anyhow!(
                "SECRET_KEY must be at least 32 characters long"
            ));
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.max_image_dimension == 0 || self.max_pixel_count == 0 {
            return Err(anyhow::anyhow!(
                "MAX_IMAGE_DIMENSION and MAX_PIXEL_COUNT must be positive"
            ));
        }

        if self.queue_concurrency == 0 {
            return Err(anyhow::anyhow!("QUEUE_CONCURRENCY must be at least 1"));
        }

        if self.queue_max_attempts == 0 {
            return Err(anyhow::anyhow!("QUEUE_MAX_ATTEMPTS must be at least 1"));
        }

        crate::models::parse_token_lifetime(&self.access_token_expiry).ok_or_else(|| {
            anyhow::anyhow!("ACCESS_TOKEN_EXPIRY must look like 30m, 12h, 7d or 1y")
        })?;

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn transform_limits(&self) -> crate::models::TransformLimits {
        crate::models::TransformLimits {
            max_dimension: self.max_image_dimension,
            max_pixel_count: self.max_pixel_count,
        }
    }

    /// Configuration suitable for tests and local tooling.
    pub fn for_directories(storage_directory: PathBuf, tmp_directory: PathBuf) -> Self {
        Config {
            environment: "test".to_string(),
            server_port: PORT,
            storage_directory,
            tmp_directory,
            database_url: None,
            db_max_connections: DB_MAX_CONNECTIONS,
            secret_key: "0123456789abcdef0123456789abcdef".to_string(),
            access_token_expiry: ACCESS_TOKEN_EXPIRY.to_string(),
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            max_image_dimension: MAX_IMAGE_DIMENSION,
            max_pixel_count: MAX_PIXEL_COUNT,
            queue_concurrency: QUEUE_CONCURRENCY,
            queue_max_attempts: QUEUE_MAX_ATTEMPTS,
            log_format: LogFormat::Compact,
        }
    }
}
