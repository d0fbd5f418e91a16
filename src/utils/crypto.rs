use hmac::{Hmac, Mac};
use rand::{thread_rng, Rng};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Checks a hex-encoded HMAC-SHA256 of `payload` in constant time.
pub fn verify_hmac_sha256_hex(secret: &str, payload: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let expected = hmac_sha256(secret.as_bytes(), payload);
    constant_time_eq(&expected, &signature)
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// `<epoch-ms>-<6 base36 chars>`, e.g. `1718000000000-k3x9q1`.
pub fn generate_record_id(timestamp_millis: i64) -> String {
    let mut rng = thread_rng();
    let suffix: String = (0..6)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();

    format!("{}-{}", timestamp_millis, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_verification() {
        let payload = br#"{"event":"checkout.completed"}"#;
        let signature = hex::encode(hmac_sha256(b"whsec_test", payload));

        assert!(verify_hmac_sha256_hex("whsec_test", payload, &signature));
        assert!(!verify_hmac_sha256_hex("whsec_other", payload, &signature));
        assert!(!verify_hmac_sha256_hex("whsec_test", b"tampered", &signature));
        assert!(!verify_hmac_sha256_hex("whsec_test", payload, "not-hex"));
    }

    #[test]
    fn test_record_id_format() {
        let id1 = generate_record_id(1718000000000);
        let id2 = generate_record_id(1718000000000);

        assert!(id1.starts_with("1718000000000-"));
        let suffix = &id1["1718000000000-".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));

        // 36^6 possibilities; a collision here would point at a broken RNG
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
