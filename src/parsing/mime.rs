//! Mime guessing strategies. Neither ever fails: unknown or unreadable files get [`FALLBACK_MIME`].

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::utils::config::SNIFF_LEN;

/// Returned when a strategy cannot tell; routes the file to the default parser.
pub const FALLBACK_MIME: &str = "application/octet-stream";

pub trait MimeGuesser: Send + Sync {
    fn guess_mime(&self, path: &Path) -> String;
}

/// Mime from the file extension (`mime_guess` table).
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtensionMimeGuesser;

impl MimeGuesser for ExtensionMimeGuesser {
    fn guess_mime(&self, path: &Path) -> String {
        mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(FALLBACK_MIME)
            .to_string()
    }
}

/// Mime from the first bytes of the file (magic numbers via `infer`, then a UTF-8 text check).
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentMimeGuesser;

impl ContentMimeGuesser {
    pub fn guess_from_bytes(head: &[u8]) -> &'static str {
        if let Some(kind) = infer::get(head) {
            return kind.mime_type();
        }
        if !head.is_empty() && looks_like_text(head) {
            return "text/plain";
        }
        FALLBACK_MIME
    }
}

impl MimeGuesser for ContentMimeGuesser {
    fn guess_mime(&self, path: &Path) -> String {
        let mut head = Vec::with_capacity(SNIFF_LEN);
        let read = File::open(path).and_then(|f| f.take(SNIFF_LEN as u64).read_to_end(&mut head));
        match read {
            Ok(_) => Self::guess_from_bytes(&head).to_string(),
            Err(e) => {
                log::debug!("sniff {}: {}", path.display(), e);
                FALLBACK_MIME.to_string()
            }
        }
    }
}

/// Valid UTF-8 (a multi-byte char cut off by the sniff window is fine) without NUL bytes.
fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

/// Strategy named by the `MimeGuesser` directory option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MimeGuesserKind {
    Extension,
    Content,
}

impl MimeGuesserKind {
    /// `"extension"` selects the extension table; anything else sniffs content.
    pub fn from_option(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("extension") {
            Self::Extension
        } else {
            Self::Content
        }
    }

    pub fn build(self) -> Box<dyn MimeGuesser> {
        match self {
            Self::Extension => Box::new(ExtensionMimeGuesser),
            Self::Content => Box::new(ContentMimeGuesser),
        }
    }
}
