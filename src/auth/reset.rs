use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

use crate::users::model::PendingReset;

const RESET_TOKEN_BYTES: usize = 32;

/// Fresh reset token: the raw value for the user and the record to store.
pub struct IssuedReset {
    pub raw_token: String,
    pub pending: PendingReset,
}

pub fn hash_reset_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

pub fn issue_reset_token(now: OffsetDateTime, ttl: Duration) -> IssuedReset {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let raw_token = hex::encode(bytes);
    let pending = PendingReset {
        token_hash: hash_reset_token(&raw_token),
        expires_at: now + ttl,
    };
    IssuedReset { raw_token, pending }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_hash_is_sha256_of_raw_token() {
        let now = OffsetDateTime::now_utc();
        let issued = issue_reset_token(now, Duration::hours(1));
        assert_eq!(issued.raw_token.len(), RESET_TOKEN_BYTES * 2);
        assert_ne!(issued.raw_token, issued.pending.token_hash);
        assert_eq!(issued.pending.token_hash, hash_reset_token(&issued.raw_token));
        assert_eq!(issued.pending.expires_at, now + Duration::hours(1));
    }

    #[test]
    fn tokens_are_unique() {
        let now = OffsetDateTime::now_utc();
        let a = issue_reset_token(now, Duration::hours(1));
        let b = issue_reset_token(now, Duration::hours(1));
        assert_ne!(a.raw_token, b.raw_token);
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            hash_reset_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
