/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Dedicated compute pool base URL.
    pub dedicated_pool_url: String,
    /// Serverless compute pool base URL.
    pub serverless_pool_url: String,
    /// API key shared by both compute pools.
    pub compute_api_key: String,
    /// Hosted generation gateway base URL.
    pub hosted_api_url: String,
    /// Hosted generation gateway API key.
    pub hosted_api_key: String,
    /// Minimum delay between outbound hosted calls per agency, in
    /// milliseconds (default: `1000`).
    pub min_dispatch_delay_ms: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                   |
    /// |--------------------------|---------------------------|
    /// | `HOST`                   | `0.0.0.0`                 |
    /// | `PORT`                   | `3000`                    |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`   |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                      |
    /// | `DEDICATED_POOL_URL`     | `http://localhost:8801`   |
    /// | `SERVERLESS_POOL_URL`    | `http://localhost:8802`   |
    /// | `COMPUTE_API_KEY`        | (empty)                   |
    /// | `HOSTED_API_URL`         | `http://localhost:8810`   |
    /// | `HOSTED_API_KEY`         | (empty)                   |
    /// | `MIN_DISPATCH_DELAY_MS`  | `1000`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let min_dispatch_delay_ms: u64 = std::env::var("MIN_DISPATCH_DELAY_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("MIN_DISPATCH_DELAY_MS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            dedicated_pool_url: std::env::var("DEDICATED_POOL_URL")
                .unwrap_or_else(|_| "http://localhost:8801".into()),
            serverless_pool_url: std::env::var("SERVERLESS_POOL_URL")
                .unwrap_or_else(|_| "http://localhost:8802".into()),
            compute_api_key: std::env::var("COMPUTE_API_KEY").unwrap_or_default(),
            hosted_api_url: std::env::var("HOSTED_API_URL")
                .unwrap_or_else(|_| "http://localhost:8810".into()),
            hosted_api_key: std::env::var("HOSTED_API_KEY").unwrap_or_default(),
            min_dispatch_delay_ms,
        }
    }
}
