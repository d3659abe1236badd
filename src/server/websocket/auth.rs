//! WebSocket auth handshake, grounded in the teacher's
//! `router::middleware::auth::validate_websocket_token`.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsocketClaims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl WebsocketClaims {
    /// Matches a permission the way the teacher's claims do: exact match,
    /// `*` wildcard, or a `prefix.*` match.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| {
            p == "*" || p == permission || p.strip_suffix(".*").map(|prefix| permission.starts_with(prefix)).unwrap_or(false)
        })
    }
}

pub fn validate_websocket_token(token: &str, secret: &[u8]) -> Result<WebsocketClaims, jsonwebtoken::errors::Error> {
    let data = decode::<WebsocketClaims>(token, &DecodingKey::from_secret(secret), &Validation::default())?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_permission_matches_anything() {
        let claims = WebsocketClaims { sub: "u".into(), exp: 0, permissions: vec!["*".into()] };
        assert!(claims.has_permission("exec.interactive"));
    }

    #[test]
    fn prefix_permission_matches_namespace() {
        let claims = WebsocketClaims { sub: "u".into(), exp: 0, permissions: vec!["exec.*".into()] };
        assert!(claims.has_permission("exec.interactive"));
        assert!(!claims.has_permission("sessions.delete"));
    }
}
