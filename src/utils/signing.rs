//! Signed deep-link tokens for the public booking and contract pages.
//!
//! A token is `{record_id}.{expires_unix}.{hex_hmac}` where the HMAC-SHA256
//! covers the purpose string, the record id and the expiry, keyed with
//! `LINK_TOKEN_SECRET`. The token itself is the only thing persisted nowhere:
//! possession of a valid, unexpired token is what authorizes the public flow.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Tokens minted for one purpose never validate for another.
pub const PURPOSE_BOOKING: &str = "booking";
pub const PURPOSE_CONTRACT: &str = "contract";

#[derive(Debug, PartialEq, Eq)]
pub enum LinkTokenError {
    /// Malformed, tampered with, or signed for a different purpose.
    Invalid,
    /// Signature checks out but the expiry has passed.
    Expired,
}

pub fn mint(purpose: &str, record_id: Uuid, expires_at: DateTime<Utc>, secret: &str) -> String {
    let exp = expires_at.timestamp();
    format!("{}.{}.{}", record_id, exp, signature(purpose, record_id, exp, secret))
}

pub fn verify(
    purpose: &str,
    token: &str,
    now: DateTime<Utc>,
    secret: &str,
) -> std::result::Result<Uuid, LinkTokenError> {
    let mut parts = token.splitn(3, '.');
    let (Some(id_part), Some(exp_part), Some(sig_part)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(LinkTokenError::Invalid);
    };

    let record_id = Uuid::parse_str(id_part).map_err(|_| LinkTokenError::Invalid)?;
    let exp: i64 = exp_part.parse().map_err(|_| LinkTokenError::Invalid)?;

    let expected = signature(purpose, record_id, exp, secret);
    let signature_ok: bool = expected.as_bytes().ct_eq(sig_part.as_bytes()).into();
    if !signature_ok {
        return Err(LinkTokenError::Invalid);
    }

    if now.timestamp() > exp {
        return Err(LinkTokenError::Expired);
    }

    Ok(record_id)
}

fn signature(purpose: &str, record_id: Uuid, exp: i64, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(purpose.as_bytes());
    mac.update(b".");
    mac.update(record_id.as_bytes());
    mac.update(b".");
    mac.update(exp.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn roundtrip_returns_the_record_id() {
        let id = Uuid::new_v4();
        let token = mint(PURPOSE_BOOKING, id, Utc::now() + Duration::hours(1), SECRET);
        let verified = verify(PURPOSE_BOOKING, &token, Utc::now(), SECRET).unwrap();
        assert_eq!(verified, id);
    }

    #[test]
    fn expired_tokens_are_reported_as_expired() {
        let id = Uuid::new_v4();
        let token = mint(PURPOSE_BOOKING, id, Utc::now() - Duration::seconds(5), SECRET);
        let err = verify(PURPOSE_BOOKING, &token, Utc::now(), SECRET).unwrap_err();
        assert_eq!(err, LinkTokenError::Expired);
    }

    #[test]
    fn purposes_do_not_cross() {
        let id = Uuid::new_v4();
        let token = mint(PURPOSE_BOOKING, id, Utc::now() + Duration::hours(1), SECRET);
        let err = verify(PURPOSE_CONTRACT, &token, Utc::now(), SECRET).unwrap_err();
        assert_eq!(err, LinkTokenError::Invalid);
    }

    #[test]
    fn tampering_with_any_part_invalidates() {
        let id = Uuid::new_v4();
        let token = mint(PURPOSE_BOOKING, id, Utc::now() + Duration::hours(1), SECRET);

        let other_id = Uuid::new_v4();
        let mut parts: Vec<&str> = token.splitn(3, '.').collect();
        let swapped_id = other_id.to_string();
        parts[0] = &swapped_id;
        let forged = parts.join(".");
        assert_eq!(
            verify(PURPOSE_BOOKING, &forged, Utc::now(), SECRET).unwrap_err(),
            LinkTokenError::Invalid
        );

        // Stretching the expiry without re-signing must fail too.
        let mut parts: Vec<&str> = token.splitn(3, '.').collect();
        let later = (Utc::now() + Duration::days(30)).timestamp().to_string();
        parts[1] = &later;
        let forged = parts.join(".");
        assert_eq!(
            verify(PURPOSE_BOOKING, &forged, Utc::now(), SECRET).unwrap_err(),
            LinkTokenError::Invalid
        );
    }

    #[test]
    fn wrong_secret_invalidates() {
        let id = Uuid::new_v4();
        let token = mint(PURPOSE_BOOKING, id, Utc::now() + Duration::hours(1), SECRET);
        assert_eq!(
            verify(PURPOSE_BOOKING, &token, Utc::now(), "another-secret").unwrap_err(),
            LinkTokenError::Invalid
        );
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        for token in ["", "abc", "abc.def", "not-a-uuid.123.deadbeef"] {
            assert_eq!(
                verify(PURPOSE_BOOKING, token, Utc::now(), SECRET).unwrap_err(),
                LinkTokenError::Invalid
            );
        }
    }
}
