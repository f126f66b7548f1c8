use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    /// Comma-separated origin allowlist. Empty means "allow any" (dev).
    pub cors_allowed_origins: Vec<String>,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // No fallback credentials here on purpose: a missing DATABASE_URL is
        // a startup error, not a silent connection to a baked-in database.
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|s| parse_origin_list(&s))
            .unwrap_or_default();
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(5 * 1024 * 1024);

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            cors_allowed_origins,
            upload_dir,
            max_upload_bytes,
        })
    }
}

fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origin_list() {
        let origins = parse_origin_list("https://tabib-iq.com, https://www.tabib-iq.com");
        assert_eq!(
            origins,
            vec!["https://tabib-iq.com", "https://www.tabib-iq.com"]
        );

        assert!(parse_origin_list("").is_empty());
        assert!(parse_origin_list(" , ,").is_empty());
    }
}
