use anyhow::anyhow;
use chrono::{Duration, Utc};

use crate::auth::{generate_token, Claims};
use crate::config::config;

pub fn run(sub: String, username: Option<String>, role: Option<String>, ttl_hours: i64) -> anyhow::Result<()> {
    let secret = &config().security.jwt_secret;
    if secret.is_empty() {
        anyhow::bail!("JWT_SECRET is not set");
    }

    let mut claims = Claims::new(sub, lifetime(ttl_hours)?);
    if let Some(username) = username {
        claims = claims.with_username(username);
    }
    if let Some(role) = role {
        claims = claims.with_role(role);
    }

    println!("{}", generate_token(&claims, secret)?);
    Ok(())
}

/// Token lifetime, refusing values whose expiry would not fit a timestamp.
fn lifetime(ttl_hours: i64) -> anyhow::Result<Duration> {
    if ttl_hours <= 0 {
        anyhow::bail!("--ttl-hours must be positive");
    }
    let ttl = Duration::try_hours(ttl_hours).ok_or_else(|| anyhow!("--ttl-hours {} is out of range", ttl_hours))?;
    Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| anyhow!("--ttl-hours {} is out of range", ttl_hours))?;
    Ok(ttl)
}
