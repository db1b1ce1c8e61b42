use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub reset_ttl_minutes: i64,
    /// When set, new accounts start inactive and must follow the emailed link.
    pub require_activation: bool,
    pub public_base_url: String,
    pub cors_origins: Vec<String>,
    pub static_dir: Option<String>,
    pub login_rate_limit: RateLimitConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24),
        };
        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            db_timeout_secs: env_or("DB_TIMEOUT_SECS", 5),
            jwt,
            reset_ttl_minutes: env_or("RESET_TOKEN_TTL_MINUTES", 60),
            require_activation: env_or("REQUIRE_ACTIVATION", false),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into())
                .trim_end_matches('/')
                .to_string(),
            cors_origins,
            static_dir: std::env::var("STATIC_DIR").ok().filter(|s| !s.is_empty()),
            login_rate_limit: RateLimitConfig {
                max_requests: env_or("LOGIN_RATE_LIMIT", 50),
                window_secs: env_or("LOGIN_RATE_WINDOW_SECS", 60),
            },
        })
    }
}
