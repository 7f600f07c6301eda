//! Document loading: convention-based path resolution, encoding-aware text
//! decoding and delegation of binary formats to a [`TextExtractor`].

use std::borrow::Cow;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::GBK;
use tracing::{debug, info, warn};

use crate::config::DocumentSettings;
use crate::error::{Error, Result};
use crate::traits::TextExtractor;
use crate::types::Document;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Gbk,
}

/// Knobs for [`decode_text`].
#[derive(Debug, Clone, Copy)]
pub struct DecodeStrategy {
    /// The corpus is expected to contain Han characters near its start.
    pub expect_han: bool,
    /// How many leading characters the Han probe inspects.
    pub probe_chars: usize,
}

impl Default for DecodeStrategy {
    fn default() -> Self {
        Self { expect_han: true, probe_chars: 100 }
    }
}

impl From<&DocumentSettings> for DecodeStrategy {
    fn from(s: &DocumentSettings) -> Self {
        Self { expect_han: s.expect_han, probe_chars: s.probe_chars }
    }
}

/// Decode raw bytes as UTF-8, falling back to GBK.
///
/// UTF-8 is rejected when it is invalid, contains U+FFFD, or (with
/// `expect_han`) shows neither Han characters nor other non-ASCII letters in
/// the probe window while the GBK reading does show Han. Fails with
/// [`Error::Decode`] if neither encoding yields clean text.
pub fn decode_text(bytes: &[u8], strategy: &DecodeStrategy) -> Result<(String, TextEncoding)> {
    let bytes = bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(text) if !text.contains(char::REPLACEMENT_CHARACTER) => {
            if strategy.expect_han
                && !has_han(text, strategy.probe_chars)
                && !has_foreign_letters(text, strategy.probe_chars)
            {
                if let Some(alt) = decode_gbk(bytes) {
                    if has_han(&alt, strategy.probe_chars) {
                        debug!("utf-8 reading has no Han characters, GBK reading does");
                        return Ok((alt.into_owned(), TextEncoding::Gbk));
                    }
                }
            }
            Ok((text.to_string(), TextEncoding::Utf8))
        }
        _ => match decode_gbk(bytes) {
            Some(text) => Ok((text.into_owned(), TextEncoding::Gbk)),
            None => Err(Error::Decode("input is neither valid UTF-8 nor valid GBK".to_string())),
        },
    }
}

fn decode_gbk(bytes: &[u8]) -> Option<Cow<'_, str>> {
    GBK.decode_without_bom_handling_and_without_replacement(bytes)
        .filter(|text| !text.contains(char::REPLACEMENT_CHARACTER))
}

fn has_han(text: &str, probe_chars: usize) -> bool {
    text.chars().take(probe_chars).any(|c| ('\u{4E00}'..='\u{9FFF}').contains(&c))
}

/// Accented Latin, Cyrillic, kana and the like: valid UTF-8 that already reads as words.
fn has_foreign_letters(text: &str, probe_chars: usize) -> bool {
    text.chars().take(probe_chars).any(|c| !c.is_ascii() && c.is_alphabetic())
}

/// Resolve `<base>.txt`, else `<base>.pdf`. `None` means nothing to index.
pub fn resolve_document(base: &Path) -> Option<PathBuf> {
    for ext in ["txt", "pdf"] {
        let mut candidate = OsString::from(base.as_os_str());
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// PDF text through `pdf-extract`, returned verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| Error::Decode(format!("PDF text extraction failed: {}", e)))
    }
}

pub struct DocumentLoader {
    extractor: Box<dyn TextExtractor>,
    strategy: DecodeStrategy,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(Box::new(PdfTextExtractor), DecodeStrategy::default())
    }
}

impl DocumentLoader {
    pub fn new(extractor: Box<dyn TextExtractor>, strategy: DecodeStrategy) -> Self {
        Self { extractor, strategy }
    }

    /// PDF extraction plus the decode strategy from `[document]`.
    pub fn from_settings(settings: &DocumentSettings) -> Self {
        Self::new(Box::new(PdfTextExtractor), DecodeStrategy::from(settings))
    }

    pub fn load(&self, path: &Path) -> Result<Document> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let text = match extension.as_str() {
            "txt" => {
                let bytes = fs::read(path)?;
                let (text, encoding) = decode_text(&bytes, &self.strategy)?;
                if encoding != TextEncoding::Utf8 {
                    warn!(path = %path.display(), ?encoding, "decoded with fallback encoding");
                }
                text
            }
            "pdf" => {
                let bytes = fs::read(path)?;
                self.extractor.extract(&bytes)?
            }
            _ => return Err(Error::UnsupportedFormat { path: path.to_path_buf(), extension }),
        };
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        info!(path = %path.display(), chars = text.chars().count(), "loaded document");
        Ok(Document { source, path: path.to_path_buf(), text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy(expect_han: bool) -> DecodeStrategy {
        DecodeStrategy { expect_han, probe_chars: 100 }
    }

    #[test]
    fn utf8_is_preferred() {
        let (text, enc) = decode_text("请假超过30天需要书面申请".as_bytes(), &strategy(true)).unwrap();
        assert_eq!(enc, TextEncoding::Utf8);
        assert_eq!(text, "请假超过30天需要书面申请");
    }

    #[test]
    fn ascii_stays_utf8_even_when_han_expected() {
        let (text, enc) = decode_text(b"Employees receive 5 days of annual leave.", &strategy(true)).unwrap();
        assert_eq!(enc, TextEncoding::Utf8);
        assert_eq!(text, "Employees receive 5 days of annual leave.");
    }

    #[test]
    fn bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("员工手册".as_bytes());
        let (text, _) = decode_text(&bytes, &strategy(true)).unwrap();
        assert_eq!(text, "员工手册");
    }

    #[test]
    fn invalid_utf8_falls_back_to_gbk() {
        let (bytes, _, had_errors) = GBK.encode("员工请假制度");
        assert!(!had_errors);
        assert!(std::str::from_utf8(&bytes).is_err());
        let (text, enc) = decode_text(&bytes, &strategy(false)).unwrap();
        assert_eq!(enc, TextEncoding::Gbk);
        assert_eq!(text, "员工请假制度");
    }

    #[test]
    fn han_probe_prefers_gbk_reading_of_symbol_soup() {
        // C2 B1 C2 B1 is valid UTF-8 ("±±") and also two GBK Han characters.
        let bytes = b"\xC2\xB1\xC2\xB1";
        let (text, enc) = decode_text(bytes, &strategy(true)).unwrap();
        assert_eq!(enc, TextEncoding::Gbk);
        assert_eq!(text.chars().count(), 2);
        assert!(has_han(&text, 2));
        let (text, enc) = decode_text(bytes, &strategy(false)).unwrap();
        assert_eq!(enc, TextEncoding::Utf8);
        assert_eq!(text, "±±");
    }

    #[test]
    fn accented_utf8_is_kept_even_when_han_expected() {
        let input = "Résumé and café policy: employees receive 5 days of annual leave.";
        for expect_han in [true, false] {
            let (text, enc) = decode_text(input.as_bytes(), &strategy(expect_han)).unwrap();
            assert_eq!(enc, TextEncoding::Utf8);
            assert_eq!(text, input);
        }
    }

    #[test]
    fn strategy_follows_document_settings() {
        let settings = DocumentSettings { expect_han: false, probe_chars: 20, ..DocumentSettings::default() };
        let strategy = DecodeStrategy::from(&settings);
        assert!(!strategy.expect_han);
        assert_eq!(strategy.probe_chars, 20);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_text(&[0xFF, 0xFF, 0xFF], &strategy(true)).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rules.docx");
        std::fs::write(&path, b"x").unwrap();
        let err = DocumentLoader::default().load(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { ref extension, .. } if extension == "docx"));
    }
}
