use redis::{AsyncCommands, aio::ConnectionManager};

/// Per-IP login attempts allowed per day
pub const MAX_IP_ATTEMPTS: i64 = 100;
/// Login attempts allowed per identifier and IP per hour
pub const MAX_IDENTIFIER_IP_ATTEMPTS: i64 = 10;

#[derive(Clone)]
pub struct RedisClient {
    pub conn: ConnectionManager,
}

fn ip_attempts_key(ip: &str) -> String {
    format!("login_attempts:ip:{}", ip)
}

fn identifier_ip_attempts_key(identifier: &str, ip: &str) -> String {
    format!("login_attempts:{}:{}", identifier.to_lowercase(), ip)
}

fn rate_window_key(ip: &str, window: u64) -> String {
    format!("rate:{}:{}", ip, window)
}

impl RedisClient {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn save_refresh_token(
        &self,
        user_id: &str,
        refresh_token: &str,
        expires_in_seconds: i64,
    ) -> redis::RedisResult<()> {
        let key = format!("refresh:{}", user_id);
        // ConnectionManager clones share one multiplexed connection
        let mut conn = self.conn.clone();
        conn.set_ex(key, refresh_token, expires_in_seconds as u64).await
    }

    pub async fn get_refresh_token(&self, user_id: &str) -> redis::RedisResult<Option<String>> {
        let key = format!("refresh:{}", user_id);
        let mut conn = self.conn.clone();
        conn.get(key).await
    }

    pub async fn delete_refresh_token(&self, user_id: &str) -> redis::RedisResult<()> {
        let key = format!("refresh:{}", user_id);
        let mut conn = self.conn.clone();
        conn.del(key).await
    }

    pub async fn get_ip_attempts(&self, ip: &str) -> redis::RedisResult<i64> {
        let mut conn = self.conn.clone();
        let attempts: Option<i64> = conn.get(ip_attempts_key(ip)).await?;
        Ok(attempts.unwrap_or(0))
    }

    pub async fn get_identifier_ip_attempts(
        &self,
        identifier: &str,
        ip: &str,
    ) -> redis::RedisResult<i64> {
        let mut conn = self.conn.clone();
        let attempts: Option<i64> = conn.get(identifier_ip_attempts_key(identifier, ip)).await?;
        Ok(attempts.unwrap_or(0))
    }

    /// Counts a failed login against both the IP (24h) and the identifier+IP pair (1h)
    pub async fn increment_attempts(&self, identifier: &str, ip: &str) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        let ip_key = ip_attempts_key(ip);
        let pair_key = identifier_ip_attempts_key(identifier, ip);

        let _: () = redis::pipe()
            .atomic()
            .incr(&ip_key, 1)
            .ignore()
            .expire(&ip_key, 60 * 60 * 24)
            .ignore()
            .incr(&pair_key, 1)
            .ignore()
            .expire(&pair_key, 60 * 60)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn delete_identifier_ip_attempts(
        &self,
        identifier: &str,
        ip: &str,
    ) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.del(identifier_ip_attempts_key(identifier, ip)).await
    }

    /// Fixed one-minute window counter; returns the request count within the window
    pub async fn hit_rate_window(&self, ip: &str, now_secs: u64) -> redis::RedisResult<u64> {
        let mut conn = self.conn.clone();
        let key = rate_window_key(ip, now_secs / 60);

        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire(&key, 60)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_keys_are_case_insensitive_per_identifier() {
        assert_eq!(
            identifier_ip_attempts_key("Alice@Example.com", "10.0.0.1"),
            identifier_ip_attempts_key("alice@example.com", "10.0.0.1")
        );
        assert_ne!(ip_attempts_key("10.0.0.1"), ip_attempts_key("10.0.0.2"));
    }

    #[test]
    fn rate_window_changes_every_minute() {
        assert_eq!(rate_window_key("1.2.3.4", 120 / 60), rate_window_key("1.2.3.4", 179 / 60));
        assert_ne!(rate_window_key("1.2.3.4", 179 / 60), rate_window_key("1.2.3.4", 180 / 60));
    }
}
