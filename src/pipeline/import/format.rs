use serde::{Deserialize, Serialize};

/// Broad file categories an upload can fall into
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Image,
    Pdf,
    Unsupported,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// Container format recognised from magic bytes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SniffedFormat {
    Jpeg,
    Png,
    Tiff,
    Heic,
    Pdf,
    Unknown,
}

impl SniffedFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
            Self::Heic => "image/heic",
            Self::Pdf => "application/pdf",
            Self::Unknown => "application/octet-stream",
        }
    }

    pub fn category(&self) -> FileCategory {
        match self {
            Self::Jpeg | Self::Png | Self::Tiff | Self::Heic => FileCategory::Image,
            Self::Pdf => FileCategory::Pdf,
            Self::Unknown => FileCategory::Unsupported,
        }
    }

    /// Only JPEG and PNG go through the pixel-level quality gate.
    pub fn is_gateable(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

/// Result of format detection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormatDetection {
    pub format: SniffedFormat,
    pub mime_type: String,
    pub category: FileCategory,
    pub size_bytes: u64,
}

/// Identify the container from magic bytes (NOT the declared MIME type).
/// Uploaders mislabel files; headers don't lie.
pub fn sniff_format(bytes: &[u8]) -> SniffedFormat {
    match bytes {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => SniffedFormat::Pdf,
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => SniffedFormat::Jpeg,
        // PNG: full 8-byte signature
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, ..] => SniffedFormat::Png,
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => SniffedFormat::Tiff,
        // HEIC/HEIF: "ftyp" at offset 4
        _ if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" => SniffedFormat::Heic,
        _ => SniffedFormat::Unknown,
    }
}

pub fn detect_format(bytes: &[u8]) -> FormatDetection {
    let format = sniff_format(bytes);
    FormatDetection {
        format,
        mime_type: format.mime_type().to_string(),
        category: format.category(),
        size_bytes: bytes.len() as u64,
    }
}

/// MIME type as declared by the upload source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredType {
    Jpeg,
    Png,
    Pdf,
    Other(String),
}

impl DeclaredType {
    /// Case-insensitive; parameters such as `; charset=...` are ignored.
    pub fn parse(mime: &str) -> Self {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Self::Jpeg,
            "image/png" => Self::Png,
            "application/pdf" => Self::Pdf,
            _ => Self::Other(essence),
        }
    }

    pub fn is_raster(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }

    /// Whether sniffed bytes agree with the declaration.
    ///
    /// JPEG and PNG are interchangeable: both are decoded by content, and
    /// browsers routinely label one as the other.
    pub fn matches(&self, sniffed: SniffedFormat) -> bool {
        match self {
            Self::Jpeg | Self::Png => sniffed.is_gateable(),
            Self::Pdf => sniffed == SniffedFormat::Pdf,
            Self::Other(_) => false,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Pdf => "application/pdf",
            Self::Other(mime) => mime,
        }
    }
}
