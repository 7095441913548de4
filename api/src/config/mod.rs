use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub kafka: KafkaConfig,
    pub reminder: ReminderConfig,
    pub cors: CorsConfig,
    pub agent: AgentConfig,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// §6: `JWT_SECRET`, `JWT_ALGORITHM` (default HS-256), `JWT_EXPIRY_DAYS` (default 30).
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: String,
    pub expiry_days: i64,
}

/// §6: `KAFKA_BROKERS`, `KAFKA_REPLICATION_FACTOR`, `KAFKA_RETENTION_MS`.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub replication_factor: i32,
    pub retention_ms: i64,
    pub security_protocol: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
}

/// §6: `REMINDER_CHECK_INTERVAL` (minutes, default 10), `REMINDER_ENABLE_OVERDUE` (bool, default true).
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub check_interval_minutes: i64,
    pub enable_overdue: bool,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub frontend_url: String,
}

/// Opaque LLM provider knobs (§6) — the agent itself is an external collaborator (§1).
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub provider_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .expect("PORT must be a valid u16"),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("DATABASE_MAX_CONNECTIONS must be a valid u32"),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "0".to_string())
                    .parse()
                    .expect("DATABASE_MIN_CONNECTIONS must be a valid u32"),
                acquire_timeout: env::var("DATABASE_ACQUIRE_TIMEOUT")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("DATABASE_ACQUIRE_TIMEOUT must be a valid u64"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
                algorithm: env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string()),
                expiry_days: env::var("JWT_EXPIRY_DAYS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("JWT_EXPIRY_DAYS must be a valid i64"),
            },
            kafka: KafkaConfig {
                brokers: env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                replication_factor: env::var("KAFKA_REPLICATION_FACTOR")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()
                    .expect("KAFKA_REPLICATION_FACTOR must be a valid i32"),
                retention_ms: env::var("KAFKA_RETENTION_MS")
                    .unwrap_or_else(|_| (7 * 24 * 3600 * 1000).to_string())
                    .parse()
                    .expect("KAFKA_RETENTION_MS must be a valid i64"),
                security_protocol: env::var("KAFKA_SECURITY_PROTOCOL").ok(),
                sasl_username: env::var("KAFKA_SASL_USERNAME").ok(),
                sasl_password: env::var("KAFKA_SASL_PASSWORD").ok(),
            },
            reminder: ReminderConfig {
                check_interval_minutes: env::var("REMINDER_CHECK_INTERVAL")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("REMINDER_CHECK_INTERVAL must be a valid i64"),
                enable_overdue: env::var("REMINDER_ENABLE_OVERDUE")
                    .map(|v| v.to_lowercase() == "true")
                    .unwrap_or(true),
            },
            cors: CorsConfig {
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            agent: AgentConfig {
                provider_url: env::var("AGENT_PROVIDER_URL").ok(),
                api_key: env::var("AGENT_API_KEY").ok(),
                model: env::var("AGENT_MODEL").unwrap_or_else(|_| "default".to_string()),
                request_timeout_secs: env::var("AGENT_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("AGENT_TIMEOUT_SECS must be a valid u64"),
            },
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    pub fn redis_url(&self) -> &str {
        &self.redis.url
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
