use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::StyleType;

pub fn get_file_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

/// Escapes an opaque user id for use inside an object key.
///
/// `[A-Za-z0-9_-]` pass through; every other byte becomes `.XX` (uppercase
/// hex). `.` is always escaped itself, so distinct ids never share a key.
pub fn storage_safe(user_id: &str) -> String {
    let mut encoded = String::with_capacity(user_id.len());
    for byte in user_id.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => encoded.push(byte as char),
            _ => encoded.push_str(&format!(".{:02X}", byte)),
        }
    }
    encoded
}

pub fn quota_key(user_id: &str) -> String {
    format!("quotas/{}.json", storage_safe(user_id))
}

pub fn history_key(user_id: &str) -> String {
    format!("history/{}.json", storage_safe(user_id))
}

pub fn upload_key(user_id: &str, now: DateTime<Utc>, mime_type: &str) -> String {
    format!(
        "uploads/{}/{}-{}.{}",
        storage_safe(user_id),
        now.timestamp_millis(),
        Uuid::new_v4().simple(),
        get_file_extension(mime_type)
    )
}

pub fn generated_key(user_id: &str, now: DateTime<Utc>, style: StyleType, mime_type: &str) -> String {
    format!(
        "generated/{}/{}-{}.{}",
        storage_safe(user_id),
        now.timestamp_millis(),
        style.as_str(),
        get_file_extension(mime_type)
    )
}

pub fn to_data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, general_purpose::STANDARD.encode(data))
}

/// Cuts `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_extensions() {
        assert_eq!(get_file_extension("image/jpeg"), "jpg");
        assert_eq!(get_file_extension("image/png"), "png");
        assert_eq!(get_file_extension("application/x-unknown-thing"), "bin");
    }

    #[test]
    fn test_keys_are_namespaced_and_sanitised() {
        let now = Utc.timestamp_millis_opt(1_718_000_000_000).unwrap();

        assert_eq!(quota_key("user_2abc"), "quotas/user_2abc.json");
        assert_eq!(history_key("../evil"), "history/.2E.2E.2Fevil.json");
        assert_eq!(
            generated_key("user_2abc", now, StyleType::Memorial, "image/png"),
            "generated/user_2abc/1718000000000-memorial.png"
        );
        assert!(upload_key("user_2abc", now, "image/jpeg").starts_with("uploads/user_2abc/1718000000000-"));
    }

    #[test]
    fn test_storage_safe_keeps_ids_apart() {
        let ids = ["alice.smith", "alice_smith", "alice@smith", "alice.2Esmith", "alice smith"];
        let keys: std::collections::HashSet<String> = ids.iter().map(|id| storage_safe(id)).collect();
        assert_eq!(keys.len(), ids.len());

        assert_eq!(storage_safe("user_2abc-X"), "user_2abc-X");
        assert_eq!(storage_safe("alice.smith"), "alice.2Esmith");
        assert_eq!(storage_safe("证"), ".E8.AF.81");
    }

    #[test]
    fn test_truncate_preview_respects_char_boundaries() {
        assert_eq!(truncate_preview("short", 10), "short");
        assert_eq!(truncate_preview("abcdef", 3), "abc…");
        assert_eq!(truncate_preview("证件照片生成", 2), "证件…");
    }

    #[test]
    fn test_data_url() {
        assert_eq!(to_data_url("image/png", b"hi"), "data:image/png;base64,aGk=");
    }
}
