//! Media kind detection for files found in the source tree.
//!
//! A recording folder typically holds the video itself plus subtitles,
//! thumbnails and assorted leftovers. Only some kinds are worth classifying;
//! the preprocessor uses [`MediaMapper`] to tell them apart.
//!
//! # Examples
//!
//! ```
//! use tvsort::media_kind::{MediaKind, MediaMapper};
//!
//! let mapper = MediaMapper::default();
//! assert_eq!(mapper.mime_to_kind("video/mp4"), Some(MediaKind::Video));
//! assert_eq!(mapper.extension_to_kind("SRT"), Some(MediaKind::Subtitle));
//! assert_eq!(mapper.classify(None, None), MediaKind::Other);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Bytes read from the start of a file for content sniffing.
const SNIFF_LEN: u64 = 8192;

/// Broad kind of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video containers (MP4, MKV, TS, ...)
    Video,
    /// Subtitle files (SRT, SMI, ASS, ...)
    Subtitle,
    /// Audio files
    Audio,
    /// Images such as thumbnails and posters
    Image,
    /// Anything else
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Subtitle => "subtitle",
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
            MediaKind::Other => "other",
        }
    }
}

/// Maps MIME types and file extensions to media kinds.
#[derive(Debug, Clone)]
pub struct MediaMapper {
    mime_map: HashMap<String, MediaKind>,
    extension_map: HashMap<String, MediaKind>,
}

impl MediaMapper {
    /// Creates a mapper with the standard mappings.
    pub fn new() -> Self {
        let mut mapper = Self {
            mime_map: HashMap::new(),
            extension_map: HashMap::new(),
        };
        mapper.populate_standard_mappings();
        mapper
    }

    fn populate_standard_mappings(&mut self) {
        for mime in [
            "video/mp4",
            "video/mpeg",
            "video/quicktime",
            "video/x-msvideo",
            "video/x-matroska",
            "video/webm",
            "video/x-flv",
            "video/x-ms-wmv",
            "video/mp2t",
        ] {
            self.add_mime_mapping(mime, MediaKind::Video);
        }
        for mime in [
            "audio/mpeg",
            "audio/x-wav",
            "audio/ogg",
            "audio/x-flac",
            "audio/aac",
            "audio/m4a",
        ] {
            self.add_mime_mapping(mime, MediaKind::Audio);
        }
        for mime in ["image/png", "image/jpeg", "image/gif", "image/webp", "image/bmp"] {
            self.add_mime_mapping(mime, MediaKind::Image);
        }

        for ext in [
            "mp4", "mkv", "avi", "ts", "tp", "m2ts", "mov", "wmv", "flv", "webm", "mpg", "mpeg",
            "m4v",
        ] {
            self.add_extension_mapping(ext, MediaKind::Video);
        }
        for ext in ["srt", "smi", "ass", "ssa", "sub", "vtt", "idx", "sup"] {
            self.add_extension_mapping(ext, MediaKind::Subtitle);
        }
        for ext in ["mp3", "aac", "flac", "m4a", "ogg", "wav"] {
            self.add_extension_mapping(ext, MediaKind::Audio);
        }
        for ext in ["jpg", "jpeg", "png", "gif", "webp", "bmp"] {
            self.add_extension_mapping(ext, MediaKind::Image);
        }
    }

    /// Adds a MIME type to kind mapping.
    pub fn add_mime_mapping(&mut self, mime: &str, kind: MediaKind) {
        self.mime_map.insert(mime.to_lowercase(), kind);
    }

    /// Adds a file extension to kind mapping.
    pub fn add_extension_mapping(&mut self, ext: &str, kind: MediaKind) {
        self.extension_map.insert(ext.to_lowercase(), kind);
    }

    pub fn mime_to_kind(&self, mime_type: &str) -> Option<MediaKind> {
        self.mime_map.get(&mime_type.to_lowercase()).copied()
    }

    pub fn extension_to_kind(&self, ext: &str) -> Option<MediaKind> {
        self.extension_map.get(&ext.to_lowercase()).copied()
    }

    /// Determines the kind given a sniffed MIME type and/or extension.
    ///
    /// The MIME type wins when it is recognised, then the extension,
    /// otherwise the file is [`MediaKind::Other`].
    pub fn classify(&self, mime_type: Option<&str>, ext: Option<&str>) -> MediaKind {
        if let Some(mime) = mime_type
            && let Some(kind) = self.mime_to_kind(mime)
        {
            return kind;
        }

        if let Some(extension) = ext
            && let Some(kind) = self.extension_to_kind(extension)
        {
            return kind;
        }

        MediaKind::Other
    }

    /// Detects the kind of a file on disk.
    ///
    /// Reads the first few kilobytes and sniffs them with `infer`; falls back
    /// to the extension when the content is not recognised.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn detect(&self, path: &Path) -> io::Result<MediaKind> {
        let mime = sniff_mime(path)?;
        let ext = path.extension().map(|e| e.to_string_lossy());
        Ok(self.classify(mime, ext.as_deref()))
    }
}

impl Default for MediaMapper {
    fn default() -> Self {
        Self::new()
    }
}

fn sniff_mime(path: &Path) -> io::Result<Option<&'static str>> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    file.take(SNIFF_LEN).read_to_end(&mut head)?;
    Ok(infer::get(&head).map(|kind| kind.mime_type()))
}
