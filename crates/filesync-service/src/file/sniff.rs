//! Best-effort content type detection from leading bytes.

/// Fallback for content nothing else recognizes.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Only this many leading bytes are inspected.
const SNIFF_LEN: usize = 512;

const MAGIC: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b\x08", "application/x-gzip"),
];

/// Guess a MIME type from the first bytes of `data`.
///
/// Empty and unrecognized binary content yields `application/octet-stream`.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    let head = &data[..data.len().min(SNIFF_LEN)];
    if head.is_empty() {
        return OCTET_STREAM;
    }

    if let Some(&(_, mime)) = MAGIC.iter().find(|(magic, _)| head.starts_with(magic)) {
        return mime;
    }
    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return "image/webp";
    }

    let text = trim_leading_whitespace(head);
    if starts_with_ignore_case(text, b"<!doctype html")
        || starts_with_ignore_case(text, b"<html")
        || starts_with_ignore_case(text, b"<head")
        || starts_with_ignore_case(text, b"<body")
    {
        return "text/html; charset=utf-8";
    }
    if text.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if looks_like_text(head) {
        return "text/plain; charset=utf-8";
    }
    OCTET_STREAM
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

fn starts_with_ignore_case(data: &[u8], prefix: &[u8]) -> bool {
    data.len() >= prefix.len() && data[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn looks_like_text(head: &[u8]) -> bool {
    let valid = match std::str::from_utf8(head) {
        Ok(_) => true,
        // A multi-byte character cut off by the sniff window is still text.
        Err(e) => e.error_len().is_none() && e.valid_up_to() + 4 > head.len(),
    };
    valid
        && !head
            .iter()
            .any(|b| matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_numbers() {
        assert_eq!(sniff_content_type(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), "image/png");
        assert_eq!(sniff_content_type(b"\xff\xd8\xff\xe0\0\x10JFIF"), "image/jpeg");
        assert_eq!(sniff_content_type(b"GIF89a\x01\0"), "image/gif");
        assert_eq!(sniff_content_type(b"%PDF-1.7\n"), "application/pdf");
        assert_eq!(sniff_content_type(b"PK\x03\x04\x14\0"), "application/zip");
        assert_eq!(sniff_content_type(b"RIFF\x24\0\0\0WEBPVP8 "), "image/webp");
    }

    #[test]
    fn test_markup_and_text() {
        assert_eq!(
            sniff_content_type(b"  <!DOCTYPE html><html></html>"),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            sniff_content_type(b"<?xml version=\"1.0\"?><a/>"),
            "text/xml; charset=utf-8"
        );
        assert_eq!(
            sniff_content_type("quarterly report, draft 2\n".as_bytes()),
            "text/plain; charset=utf-8"
        );
        assert_eq!(sniff_content_type("héllo wörld".as_bytes()), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_unknown_binary_and_empty() {
        assert_eq!(sniff_content_type(&[0x00, 0x01, 0x02, 0xfe]), OCTET_STREAM);
        assert_eq!(sniff_content_type(b""), OCTET_STREAM);
    }

    #[test]
    fn test_truncated_multibyte_at_window_edge() {
        let mut data = vec![b'a'; SNIFF_LEN - 1];
        data.extend_from_slice("é".as_bytes());
        assert_eq!(sniff_content_type(&data), "text/plain; charset=utf-8");
    }
}
