use anyhow::Result;
use sist::engine::tools::{glob_match, path_relative_to, should_include_in_walk};
use sist::engine::{ChecksumAlgorithm, checksum_file, parse_checksum_option};
use sist::parsing::{
    ContentMimeGuesser, ExtensionMimeGuesser, FALLBACK_MIME, FileParser, GenericFileParser,
    MimeGuesser, MimeGuesserKind, ParserRegistry, TextFileParser,
};
use sist::parsing::{DocxParser, EbookParser, PdfFileParser, PictureFileParser, SpreadsheetParser};
use std::io::Write;
use sist::search::{SearchIndex, SqliteIndex};
use sist::types::{DirOption, Directory, DocumentSummary, ParsedDocument};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// --- path_relative_to / walk filter ---

#[test]
fn test_path_relative_under_base() {
    let base = PathBuf::from("/foo/bar");
    let path = PathBuf::from("/foo/bar/baz/qux");
    assert_eq!(
        path_relative_to(&path, &base),
        Some(PathBuf::from("baz/qux"))
    );
}

#[test]
fn test_path_relative_not_under_base() {
    let base = PathBuf::from("/foo/bar");
    let path = PathBuf::from("/other/qux");
    assert_eq!(path_relative_to(&path, &base), None);
}

#[test]
fn test_glob_match_literal() {
    assert!(glob_match("node_modules", "node_modules"));
    assert!(!glob_match("node_modules", "node_module"));
}

#[test]
fn test_should_include_exclude_pattern_glob() {
    let root = PathBuf::from("/foo");
    let path = PathBuf::from("/foo/bar/baz.log");
    assert!(!should_include_in_walk(&path, &root, &["*.log".to_string()]));
    assert!(should_include_in_walk(&path, &root, &["*.txt".to_string()]));
}

// --- checksums ---

#[test]
fn test_checksum_option_parsing() {
    assert_eq!(
        parse_checksum_option("md5, SHA256,bogus,md5"),
        vec![ChecksumAlgorithm::Md5, ChecksumAlgorithm::Sha256]
    );
    assert!(parse_checksum_option("").is_empty());
}

#[test]
fn test_checksums_of_known_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("abc.txt");
    std::fs::write(&path, "abc").unwrap();
    let sums = checksum_file(
        &path,
        3,
        &[
            ChecksumAlgorithm::Md5,
            ChecksumAlgorithm::Sha1,
            ChecksumAlgorithm::Sha256,
        ],
    )
    .unwrap();
    assert_eq!(sums[0].1, "900150983cd24fb0d6963f7d28e17f72");
    assert_eq!(sums[1].1, "a9993e364706816aba3e25717850c26c9cd0d89d");
    assert_eq!(
        sums[2].1,
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

// --- mime guessing ---

#[test]
fn test_extension_guesser() {
    let g = ExtensionMimeGuesser;
    assert_eq!(g.guess_mime(Path::new("a/b.txt")), "text/plain");
    assert_eq!(g.guess_mime(Path::new("photo.png")), "image/png");
    assert_eq!(g.guess_mime(Path::new("no_extension")), FALLBACK_MIME);
}

#[test]
fn test_content_guesser() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("really_png.dat");
    std::fs::write(&png, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]).unwrap();
    let text = dir.path().join("notes.weird");
    std::fs::write(&text, "plain words").unwrap();

    let g = ContentMimeGuesser;
    assert_eq!(g.guess_mime(&png), "image/png");
    assert_eq!(g.guess_mime(&text), "text/plain");
    assert_eq!(g.guess_mime(&dir.path().join("missing")), FALLBACK_MIME);
    assert_eq!(ContentMimeGuesser::guess_from_bytes(&[0, 1, 2, 0]), FALLBACK_MIME);
}

#[test]
fn test_guesser_kind_from_option() {
    assert_eq!(MimeGuesserKind::from_option("content"), MimeGuesserKind::Content);
    assert_eq!(MimeGuesserKind::from_option(" Extension "), MimeGuesserKind::Extension);
    assert_eq!(MimeGuesserKind::from_option("magic"), MimeGuesserKind::Content);
}

// --- registry ---

struct Named(&'static str, bool);

impl FileParser for Named {
    fn name(&self) -> &'static str {
        self.0
    }
    fn mime_types(&self) -> &[&'static str] {
        &["text/plain"]
    }
    fn is_default(&self) -> bool {
        self.1
    }
    fn parse(&self, _path: &Path) -> Result<ParsedDocument> {
        Ok(ParsedDocument::new())
    }
}

#[test]
fn test_registry_needs_exactly_one_default() {
    assert!(ParserRegistry::new(vec![Arc::new(Named("a", false))]).is_err());
    assert!(
        ParserRegistry::new(vec![Arc::new(Named("a", true)), Arc::new(Named("b", true))]).is_err()
    );
    let reg = ParserRegistry::new(vec![Arc::new(Named("a", true)), Arc::new(Named("b", false))])
        .unwrap();
    assert_eq!(reg.lookup("text/plain").name(), "b");
    assert_eq!(reg.lookup("application/x-nothing").name(), "a");
    assert_eq!(reg.default_parser().name(), "a");
}

#[test]
fn test_registry_for_directory_follows_file_parsers_option() {
    let dir = Directory::new(
        "/data",
        true,
        vec![DirOption::new("FileParsers", "picture")],
        "data",
    );
    let reg = ParserRegistry::for_directory(&dir).unwrap();
    assert_eq!(reg.lookup("image/png").name(), "picture");
    assert_eq!(reg.lookup("text/plain").name(), "generic");

    let all = ParserRegistry::for_directory(&Directory::new("/data", true, vec![], "d")).unwrap();
    assert_eq!(all.lookup("text/plain").name(), "text");
    assert_eq!(all.lookup("application/pdf").name(), "pdf");
    assert_eq!(all.lookup("application/epub+zip").name(), "ebook");
    assert_eq!(
        all.lookup("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
            .name(),
        "docx"
    );
    assert_eq!(
        all.lookup("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
            .name(),
        "spreadsheet"
    );
}

// --- shipped parsers ---

#[test]
fn test_text_parser_fields() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("sub")).unwrap();
    let path = dir.path().join("sub").join("hello.txt");
    std::fs::write(&path, "hello world, this is long").unwrap();

    let parser = TextFileParser::new(vec![ChecksumAlgorithm::Md5], 11, dir.path().to_path_buf());
    let doc = parser.parse(&path).unwrap();
    assert_eq!(doc.get_text("path"), Some("sub"));
    assert_eq!(doc.get_text("name"), Some("hello"));
    assert_eq!(doc.get_text("extension"), Some("txt"));
    assert_eq!(doc.get_integer("size"), Some(25));
    assert_eq!(doc.get_text("content"), Some("hello world"));
    assert!(doc.contains_key("md5"));
    assert!(doc.contains_key("mtime"));
}

#[test]
fn test_generic_parser_rejects_directories() {
    let dir = tempfile::tempdir().unwrap();
    let parser = GenericFileParser::new(vec![], dir.path().to_path_buf());
    assert!(parser.parse(dir.path()).is_err());
}

#[test]
fn test_picture_parser_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("img.png");
    image::RgbImage::new(4, 3).save(&path).unwrap();
    let parser = PictureFileParser::new(vec![], dir.path().to_path_buf());
    let doc = parser.parse(&path).unwrap();
    assert_eq!(doc.get_integer("width"), Some(4));
    assert_eq!(doc.get_integer("height"), Some(3));
    assert_eq!(doc.get_text("path"), Some(""));
}

#[test]
fn test_generic_parser_trailing_dot_rebuilds_path() {
    let dir = tempfile::tempdir().unwrap();
    let parser = GenericFileParser::new(vec![], dir.path().to_path_buf());
    for file in ["foo.", "noext", "a.b.c"] {
        let path = dir.path().join(file);
        std::fs::write(&path, b"x").unwrap();
        let doc = parser.parse(&path).unwrap();
        let summary = DocumentSummary {
            path: doc.get_text("path").unwrap().to_string(),
            name: doc.get_text("name").unwrap().to_string(),
            extension: doc.get_text("extension").unwrap().to_string(),
            ..Default::default()
        };
        assert_eq!(summary.full_path(dir.path()), path, "{file}");
    }
}

#[test]
fn test_sqlite_index_returns_documents_unchanged() -> Result<()> {
    let index = SqliteIndex::open_in_memory()?;
    let mut doc = ParsedDocument::new();
    doc.insert("path", "a/b");
    doc.insert("name", "report");
    doc.insert("extension", "pdf");
    doc.insert("mime", "application/pdf");
    doc.insert("size", 1234_u64);
    doc.insert("ratio", 0.5_f64);
    doc.insert("md5", "0123abcd");
    index.index_batch(&[doc.clone()], 7)?;

    let stored = index.documents(7)?;
    assert_eq!(stored, vec![doc]);
    Ok(())
}

// --- document parsers ---

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    for (name, body) in entries {
        zip.start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Single page, one line of Helvetica text, with a correct xref table.
fn write_pdf(path: &Path, text: &str) {
    let stream = format!("BT /F1 24 Tf 72 700 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    std::fs::write(path, out).unwrap();
}

#[test]
fn test_pdf_parser_extracts_and_limits_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rabies.pdf");
    write_pdf(&path, "Rabies fact sheet");

    let doc = PdfFileParser::new(vec![], 2000, dir.path().to_path_buf())
        .parse(&path)
        .unwrap();
    assert_eq!(doc.get_text("name"), Some("rabies"));
    assert!(doc.get_text("content").unwrap().contains("Rabies"), "{doc:?}");

    let short = PdfFileParser::new(vec![], 6, dir.path().to_path_buf())
        .parse(&path)
        .unwrap();
    assert!(short.get_text("content").unwrap().chars().count() <= 6);
}

#[test]
fn test_pdf_parser_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, b"not a pdf at all").unwrap();
    let parser = PdfFileParser::new(vec![], 2000, dir.path().to_path_buf());
    assert!(parser.parse(&path).is_err());
}

#[test]
fn test_docx_parser_reads_paragraphs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.docx");
    write_zip(
        &path,
        &[(
            "word/document.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>First</w:t></w:r><w:r><w:t xml:space="preserve"> paragraph</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p></w:body></w:document>"#,
        )],
    );

    let doc = DocxParser::new(vec![], 2000, dir.path().to_path_buf())
        .parse(&path)
        .unwrap();
    assert_eq!(doc.get_text("extension"), Some("docx"));
    assert_eq!(doc.get_text("content"), Some("First paragraph\nSecond"));

    let short = DocxParser::new(vec![], 5, dir.path().to_path_buf())
        .parse(&path)
        .unwrap();
    assert_eq!(short.get_text("content"), Some("First"));
}

#[test]
fn test_docx_parser_rejects_archive_without_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.docx");
    write_zip(&path, &[("[Content_Types].xml", "<Types/>")]);
    let parser = DocxParser::new(vec![], 2000, dir.path().to_path_buf());
    assert!(parser.parse(&path).is_err());
}

#[test]
fn test_spreadsheet_parser_reads_shared_strings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("budget.xlsx");
    write_zip(
        &path,
        &[(
            "xl/sharedStrings.xml",
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2"><si><t>Rent</t></si><si><t>Groceries</t></si></sst>"#,
        )],
    );
    let doc = SpreadsheetParser::new(vec![], 2000, dir.path().to_path_buf())
        .parse(&path)
        .unwrap();
    assert_eq!(doc.get_text("content"), Some("Rent\nGroceries"));

    let numbers_only = dir.path().join("numbers.xlsx");
    write_zip(&numbers_only, &[("xl/workbook.xml", "<workbook/>")]);
    let doc = SpreadsheetParser::new(vec![], 2000, dir.path().to_path_buf())
        .parse(&numbers_only)
        .unwrap();
    assert_eq!(doc.get_text("content"), Some(""));
}

#[test]
fn test_ebook_parser_reads_chapters_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("novel.epub");
    write_zip(
        &path,
        &[
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", "<container/>"),
            (
                "OEBPS/ch1.xhtml",
                "<html><head><title>One</title></head><body><h1>Chapter 1</h1><p>It was a <i>dark</i> night.</p></body></html>",
            ),
            (
                "OEBPS/ch2.xhtml",
                "<html><body><p>Morning&nbsp;came.</p></body></html>",
            ),
        ],
    );

    let doc = EbookParser::new(vec![], 2000, dir.path().to_path_buf())
        .parse(&path)
        .unwrap();
    let content = doc.get_text("content").unwrap();
    assert!(content.starts_with("Chapter 1\nIt was a dark night."), "{content:?}");
    assert!(content.contains("Morning"), "{content:?}");
    assert!(!content.contains("One"), "{content:?}");

    let short = EbookParser::new(vec![], 9, dir.path().to_path_buf())
        .parse(&path)
        .unwrap();
    assert_eq!(short.get_text("content"), Some("Chapter 1"));
}
