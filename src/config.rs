#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub refresh_token_maxage: i64,
    pub redis_url: String,
    pub port: u16,
    pub frontend_url: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub rate_limit_per_minute: u64,
}

impl Config {
    pub fn init() -> Config {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; missing required keys panic at startup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
        let required = |key: &str| lookup(key).unwrap_or_else(|| panic!("{} must be set", key));

        let database_url = required("DATABASE_URL");
        let jwt_secret = required("JWT_SECRET_KEY");
        let jwt_maxage = required("JWT_MAXAGE");
        let refresh_token_maxage = required("REFRESH_TOKEN_MAXAGE");
        let redis_url = required("REDIS_URL");
        let frontend_url = required("FRONTEND_URL");

        Config {
            database_url,
            jwt_secret,
            jwt_maxage: jwt_maxage
                .parse::<i64>()
                .expect("JWT_MAXAGE must be a number of seconds"),
            refresh_token_maxage: refresh_token_maxage
                .parse::<i64>()
                .expect("REFRESH_TOKEN_MAXAGE must be a number of seconds"),
            redis_url,
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            frontend_url,
            upload_dir: lookup("UPLOAD_DIR").unwrap_or_else(|| "./uploads".to_string()),
            max_upload_bytes: lookup("MAX_UPLOAD_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10 * 1024 * 1024),
            rate_limit_per_minute: lookup("RATE_LIMIT_PER_MINUTE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/blog"),
            ("JWT_SECRET_KEY", "secret"),
            ("JWT_MAXAGE", "900"),
            ("REFRESH_TOKEN_MAXAGE", "604800"),
            ("REDIS_URL", "redis://127.0.0.1/"),
            ("FRONTEND_URL", "http://localhost:3000"),
        ])
    }

    #[test]
    fn optional_values_have_defaults() {
        let vars = required_vars();
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.jwt_maxage, 900);
        assert_eq!(config.port, 8000);
        assert_eq!(config.upload_dir, "./uploads");
        assert_eq!(config.max_upload_bytes, 10_485_760);
        assert_eq!(config.rate_limit_per_minute, 120);
    }

    #[test]
    fn optional_values_can_be_overridden() {
        let mut vars = required_vars();
        vars.insert("PORT", "9000");
        vars.insert("RATE_LIMIT_PER_MINUTE", "30");
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.port, 9000);
        assert_eq!(config.rate_limit_per_minute, 30);
    }

    #[test]
    #[should_panic(expected = "DATABASE_URL must be set")]
    fn missing_required_value_panics() {
        Config::from_lookup(|_| None);
    }
}
