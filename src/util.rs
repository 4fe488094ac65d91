//! Cover image format sniffing.

/// Image formats found in FictionBook `<binary>` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    Bmp,
    /// Unknown/binary format
    Binary,
}

impl MediaFormat {
    /// Get the MIME type string for this format.
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Png => "image/png",
            MediaFormat::Gif => "image/gif",
            MediaFormat::WebP => "image/webp",
            MediaFormat::Bmp => "image/bmp",
            MediaFormat::Binary => "application/octet-stream",
        }
    }

    /// File extension used when writing the image out.
    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "jpg",
            MediaFormat::Png => "png",
            MediaFormat::Gif => "gif",
            MediaFormat::WebP => "webp",
            MediaFormat::Bmp => "bmp",
            MediaFormat::Binary => "bin",
        }
    }

    /// Map a declared `content-type` back to a format.
    pub fn from_mime_type(mime: &str) -> Self {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => MediaFormat::Jpeg,
            "image/png" => MediaFormat::Png,
            "image/gif" => MediaFormat::Gif,
            "image/webp" => MediaFormat::WebP,
            "image/bmp" | "image/x-ms-bmp" => MediaFormat::Bmp,
            _ => MediaFormat::Binary,
        }
    }
}

/// Detect an image format from its leading magic bytes.
pub fn detect_media_format(data: &[u8]) -> MediaFormat {
    match data {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => MediaFormat::Jpeg,
        // PNG: 89 50 4E 47 (.PNG)
        [0x89, b'P', b'N', b'G', ..] => MediaFormat::Png,
        [b'G', b'I', b'F', b'8', ..] => MediaFormat::Gif,
        // WebP: RIFF....WEBP
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => MediaFormat::WebP,
        [b'B', b'M', ..] => MediaFormat::Bmp,
        _ => MediaFormat::Binary,
    }
}

/// MIME type of recognized image bytes, `None` when unknown.
pub fn detect_mime_type(data: &[u8]) -> Option<&'static str> {
    match detect_media_format(data) {
        MediaFormat::Binary => None,
        other => Some(other.mime_type()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_media_format_by_magic_bytes() {
        assert_eq!(detect_media_format(&[0xFF, 0xD8, 0xFF, 0xE0]), MediaFormat::Jpeg);
        assert_eq!(
            detect_media_format(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            MediaFormat::Png
        );
        assert_eq!(detect_media_format(b"GIF89a"), MediaFormat::Gif);
        assert_eq!(detect_media_format(b"RIFF\0\0\0\0WEBPVP8 "), MediaFormat::WebP);
        assert_eq!(detect_media_format(b"BM\0\0"), MediaFormat::Bmp);
        assert_eq!(detect_media_format(b"plain text"), MediaFormat::Binary);
        assert_eq!(detect_media_format(&[]), MediaFormat::Binary);
    }

    #[test]
    fn test_detect_mime_type() {
        assert_eq!(detect_mime_type(b"GIF87a"), Some("image/gif"));
        assert_eq!(detect_mime_type(b"\x00\x01"), None);
    }

    #[test]
    fn test_mime_round_trip() {
        for format in [
            MediaFormat::Jpeg,
            MediaFormat::Png,
            MediaFormat::Gif,
            MediaFormat::WebP,
            MediaFormat::Bmp,
        ] {
            assert_eq!(MediaFormat::from_mime_type(format.mime_type()), format);
        }
        assert_eq!(MediaFormat::from_mime_type(" IMAGE/JPG "), MediaFormat::Jpeg);
        assert_eq!(MediaFormat::from_mime_type("text/plain"), MediaFormat::Binary);
    }
}
