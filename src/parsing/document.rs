//! Office documents, ebooks and PDFs: generic fields plus an extracted text `content`.
//!
//! `content_length` counts characters of extracted text, not bytes of the file.

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::engine::hashing::ChecksumAlgorithm;
use crate::types::ParsedDocument;

use super::FileParser;
use super::generic::generic_document;

const PDF_MIME_TYPES: &[&str] = &["application/pdf"];
const DOCX_MIME_TYPES: &[&str] =
    &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"];
const SPREADSHEET_MIME_TYPES: &[&str] =
    &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"];
const EBOOK_MIME_TYPES: &[&str] = &["application/epub+zip"];

/// Elements after which a line break goes into the extracted text.
const BLOCK_ELEMENTS: &[&[u8]] = &[
    b"p", b"div", b"br", b"li", b"tr", b"h1", b"h2", b"h3", b"h4", b"h5", b"h6", b"si",
];

macro_rules! content_parser {
    ($ty:ident, $name:literal, $mimes:expr, $extract:path) => {
        pub struct $ty {
            checksums: Vec<ChecksumAlgorithm>,
            content_length: usize,
            root: PathBuf,
        }

        impl $ty {
            pub fn new(
                checksums: Vec<ChecksumAlgorithm>,
                content_length: usize,
                root: PathBuf,
            ) -> Self {
                Self {
                    checksums,
                    content_length,
                    root,
                }
            }
        }

        impl FileParser for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn mime_types(&self) -> &[&'static str] {
                $mimes
            }

            fn parse(&self, path: &Path) -> Result<ParsedDocument> {
                let mut doc = generic_document(path, &self.root, &self.checksums)?;
                let content = $extract(path, self.content_length)?;
                doc.insert("content", truncate_chars(content.trim(), self.content_length));
                Ok(doc)
            }
        }
    };
}

content_parser!(PdfFileParser, "pdf", PDF_MIME_TYPES, pdf_text);
content_parser!(DocxParser, "docx", DOCX_MIME_TYPES, docx_text);
content_parser!(SpreadsheetParser, "spreadsheet", SPREADSHEET_MIME_TYPES, xlsx_text);
content_parser!(EbookParser, "ebook", EBOOK_MIME_TYPES, epub_text);

fn pdf_text(path: &Path, _limit: usize) -> Result<String> {
    pdf_extract::extract_text(path)
        .map_err(|e| anyhow::anyhow!("extract text from {}: {e:?}", path.display()))
}

fn docx_text(path: &Path, limit: usize) -> Result<String> {
    let xml = read_entry(&mut open_archive(path)?, "word/document.xml")?;
    xml_text(&xml, limit, false)
}

/// Cell strings live in the shared string table; numbers and formulas are not extracted.
fn xlsx_text(path: &Path, limit: usize) -> Result<String> {
    let mut archive = open_archive(path)?;
    if archive.index_for_name("xl/sharedStrings.xml").is_none() {
        return Ok(String::new());
    }
    let xml = read_entry(&mut archive, "xl/sharedStrings.xml")?;
    xml_text(&xml, limit, false)
}

/// Chapters in archive order. A chapter that is not well-formed contributes what was read
/// before the error.
fn epub_text(path: &Path, limit: usize) -> Result<String> {
    let mut archive = open_archive(path)?;
    let chapters: Vec<String> = archive
        .file_names()
        .filter(|name| {
            let lower = name.to_ascii_lowercase();
            lower.ends_with(".xhtml") || lower.ends_with(".html") || lower.ends_with(".htm")
        })
        .map(str::to_string)
        .collect();

    let mut out = String::new();
    let mut chars = 0;
    for name in chapters {
        if chars >= limit {
            break;
        }
        let xml = read_entry(&mut archive, &name)?;
        let text = xml_text(&xml, limit - chars, true).unwrap_or_else(|e| {
            log::debug!("{}: chapter {name}: {e}", path.display());
            String::new()
        });
        chars += text.chars().count();
        out.push_str(&text);
    }
    Ok(out)
}

fn open_archive(path: &Path) -> Result<zip::ZipArchive<File>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    zip::ZipArchive::new(file).with_context(|| format!("read archive {}", path.display()))
}

fn read_entry(archive: &mut zip::ZipArchive<File>, name: &str) -> Result<String> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("archive entry {name}"))?;
    let mut buf = Vec::with_capacity(entry.size().min(1 << 20) as usize);
    entry
        .read_to_end(&mut buf)
        .with_context(|| format!("read archive entry {name}"))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Character data of an XML document, one line per block element, stopping once `limit`
/// characters are collected.
///
/// OOXML text is the untrimmed content of `t` elements, joined as is since words are split
/// across runs. With `html` set, every text node counts, nodes are trimmed and space
/// separated, mismatched end tags are tolerated and a parse error keeps the text read so far.
fn xml_text(xml: &str, limit: usize, html: bool) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(html);
    reader.config_mut().check_end_names = !html;

    let mut out = String::new();
    let mut chars = 0;
    let mut hidden_depth = 0usize;
    let mut text_depth = 0usize;
    while chars < limit {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) if !html => return Err(e).context("malformed xml"),
            Err(_) => break,
        };
        match event {
            Event::Start(e) => {
                let name = e.local_name();
                if is_hidden(name.as_ref()) {
                    hidden_depth += 1;
                } else if name.as_ref() == b"t" {
                    text_depth += 1;
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                if is_hidden(name.as_ref()) {
                    hidden_depth = hidden_depth.saturating_sub(1);
                } else if name.as_ref() == b"t" {
                    text_depth = text_depth.saturating_sub(1);
                } else if is_block(name.as_ref()) {
                    chars += end_line(&mut out);
                }
            }
            Event::Empty(e) if is_block(e.local_name().as_ref()) => {
                chars += end_line(&mut out);
            }
            Event::Text(e) if hidden_depth == 0 && (html || text_depth > 0) => {
                let text = match e.unescape_with(html_entity) {
                    Ok(text) => text.into_owned(),
                    Err(_) => String::from_utf8_lossy(&*e).into_owned(),
                };
                if html && !out.is_empty() && !out.ends_with('\n') {
                    out.push(' ');
                    chars += 1;
                }
                chars += text.chars().count();
                out.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Named entities common in XHTML that XML itself does not define.
fn html_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "nbsp" => " ",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "copy" => "\u{a9}",
        _ => return None,
    })
}

fn is_block(local_name: &[u8]) -> bool {
    BLOCK_ELEMENTS.iter().any(|block| *block == local_name)
}

fn end_line(out: &mut String) -> usize {
    if out.is_empty() || out.ends_with('\n') {
        return 0;
    }
    out.push('\n');
    1
}

fn is_hidden(local_name: &[u8]) -> bool {
    matches!(local_name, b"script" | b"style" | b"head")
}

/// At most `max` characters of `s`.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((end, _)) => s[..end].to_string(),
        None => s.to_string(),
    }
}
