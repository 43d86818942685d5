//! Minimal DOCX support: paragraph text out of `word/document.xml`, and a
//! plain rebuilt document for fingerprinted output.

use std::io::{Cursor, Read, Write};

use once_cell::sync::Lazy;
use regex::Regex;

use whisperprint_core::{Error, Result};

static RUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:br\s*/>|</w:p>").unwrap()
});

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Paragraph text of a DOCX archive, one paragraph per line.
pub fn extract(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::UnsupportedContent(format!("Invalid DOCX archive: {}", e)))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| Error::UnsupportedContent(format!("DOCX without document body: {}", e)))?
        .read_to_string(&mut xml)?;

    let mut text = String::new();
    for caps in RUN_RE.captures_iter(&xml) {
        match caps.get(1) {
            Some(run) => text.push_str(&unescape(run.as_str())),
            None => match caps.get(0).map(|m| m.as_str()) {
                Some(tag) if tag.starts_with("<w:tab") => text.push('\t'),
                _ => text.push('\n'),
            },
        }
    }
    Ok(text.trim_end_matches('\n').to_string())
}

/// Build a DOCX holding `text`, one paragraph per line.
pub fn build(text: &str) -> Result<Vec<u8>> {
    let mut body = String::new();
    for line in text.split('\n') {
        body.push_str("<w:p><w:r><w:t xml:space=\"preserve\">");
        body.push_str(&escape(line));
        body.push_str("</w:t></w:r></w:p>");
    }
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let zip_err = |e: zip::result::ZipError| Error::Internal(format!("DOCX write failed: {}", e));
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", RELS),
        ("word/document.xml", document.as_str()),
    ] {
        zip.start_file(name, zip::write::SimpleFileOptions::default())
            .map_err(zip_err)?;
        zip.write_all(content.as_bytes())?;
    }
    Ok(zip.finish().map_err(zip_err)?.into_inner())
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

static CHAR_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:x([0-9A-Fa-f]{1,6})|([0-9]{1,7}));").unwrap());

fn unescape(s: &str) -> String {
    let named = s
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'");
    let numeric = CHAR_REF_RE.replace_all(&named, |caps: &regex::Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    // `&amp;` last so "&amp;#8217;" stays a literal reference.
    numeric.replace("&amp;", "&")
}
