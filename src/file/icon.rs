//! Extension-based file classification.

/// Glyph used for extensions not in the table.
pub const DEFAULT_ICON: &str = "📄";

/// Broad category of a file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Document,
    Text,
    Spreadsheet,
    Presentation,
    Image,
    Archive,
    Audio,
    Video,
    Python,
    JavaScript,
    Html,
    Css,
    Java,
    Native,
    Php,
    Ruby,
    Go,
    Rust,
    TypeScript,
    Data,
    Markdown,
    Other,
}

impl FileKind {
    /// Classify a lower- or mixed-case extension without the leading dot.
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_lowercase().as_str() {
            "pdf" => FileKind::Pdf,
            "doc" | "docx" | "odt" => FileKind::Document,
            "txt" | "rtf" => FileKind::Text,
            "xls" | "xlsx" | "ods" | "csv" => FileKind::Spreadsheet,
            "ppt" | "pptx" | "odp" => FileKind::Presentation,
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "ico" | "webp" => FileKind::Image,
            "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" => FileKind::Archive,
            "mp3" | "wav" | "ogg" | "flac" | "aac" | "m4a" => FileKind::Audio,
            "mp4" | "avi" | "mov" | "mkv" | "flv" | "wmv" | "webm" => FileKind::Video,
            "py" => FileKind::Python,
            "js" => FileKind::JavaScript,
            "html" => FileKind::Html,
            "css" => FileKind::Css,
            "java" => FileKind::Java,
            "c" | "cpp" => FileKind::Native,
            "php" => FileKind::Php,
            "rb" => FileKind::Ruby,
            "go" => FileKind::Go,
            "rs" => FileKind::Rust,
            "ts" => FileKind::TypeScript,
            "json" | "xml" | "yaml" | "log" => FileKind::Data,
            "md" => FileKind::Markdown,
            _ => FileKind::Other,
        }
    }

    /// Display glyph for this kind.
    pub fn icon(self) -> &'static str {
        match self {
            FileKind::Pdf | FileKind::Other => DEFAULT_ICON,
            FileKind::Document | FileKind::Markdown => "📝",
            FileKind::Text => "📃",
            FileKind::Spreadsheet => "📊",
            FileKind::Presentation => "📽️",
            FileKind::Image => "🖼️",
            FileKind::Archive => "🗜️",
            FileKind::Audio => "🎵",
            FileKind::Video => "🎬",
            FileKind::Python => "🐍",
            FileKind::JavaScript => "💛",
            FileKind::Html => "🌐",
            FileKind::Css => "🎨",
            FileKind::Java => "☕",
            FileKind::Native => "⚙️",
            FileKind::Php => "🐘",
            FileKind::Ruby => "💎",
            FileKind::Go | FileKind::TypeScript => "🔷",
            FileKind::Rust => "🦀",
            FileKind::Data => "📋",
        }
    }
}

/// Glyph for a file extension (without the dot), case-insensitive.
///
/// # Examples
///
/// ```
/// use docportal::file::classify_icon;
///
/// assert_eq!(classify_icon("PNG"), "🖼️");
/// assert_eq!(classify_icon("unknown"), "📄");
/// ```
pub fn classify_icon(extension: &str) -> &'static str {
    FileKind::from_extension(extension).icon()
}

/// Extension of a filename as used for classification (empty when none).
pub fn extension_of(filename: &str) -> &str {
    filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}
