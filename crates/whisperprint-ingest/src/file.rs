//! File text extraction for uploaded documents.

use serde::Serialize;
use tracing::debug;

use crate::docx;
use whisperprint_core::{Error, Result};

/// Supported file types for text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    PlainText,
    Markdown,
    Code,
    Json,
    Docx,
    Pdf,
    Unknown,
}

impl FileType {
    /// Detect file type from extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" | "text" | "log" | "csv" => Self::PlainText,
            "md" | "mdx" => Self::Markdown,
            "py" | "js" | "ts" | "tsx" | "jsx" | "rs" | "go" | "java" | "cpp" | "c" | "h"
            | "hpp" | "cs" | "rb" | "php" | "swift" | "kt" | "scala" | "sh" | "bash" | "zsh"
            | "yaml" | "yml" | "toml" | "ini" | "cfg" | "conf" | "xml" | "html" | "css"
            | "scss" | "sql" => Self::Code,
            "json" => Self::Json,
            "docx" => Self::Docx,
            "pdf" => Self::Pdf,
            _ => Self::Unknown,
        }
    }

    pub fn from_filename(name: &str) -> Self {
        let ext = name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        Self::from_extension(ext)
    }

    /// Content type hint for the privacy checker.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Code | Self::Json => "code",
            _ => "text",
        }
    }
}

/// Text pulled out of an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub file_type: FileType,
}

/// A fingerprinted file ready to be written out.
#[derive(Debug, Clone)]
pub struct RenderedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Extract plain text from an uploaded file.
///
/// PDF and binary uploads fail with `Error::UnsupportedContent`.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<ExtractedText> {
    let file_type = FileType::from_filename(filename);
    let text = match file_type {
        FileType::PlainText | FileType::Markdown | FileType::Code => decode_utf8(filename, bytes)?,
        FileType::Json => extract_json(&decode_utf8(filename, bytes)?),
        FileType::Docx => docx::extract(bytes)?,
        FileType::Pdf => {
            return Err(Error::UnsupportedContent(format!(
                "{}: PDF text extraction is not supported, submit extracted text instead",
                filename
            )))
        }
        FileType::Unknown => {
            let content = decode_utf8(filename, bytes)?;
            if looks_binary(&content) {
                return Err(Error::UnsupportedContent(format!(
                    "{}: binary content",
                    filename
                )));
            }
            content
        }
    };
    debug!("Extracted {} chars from {} ({:?})", text.chars().count(), filename, file_type);
    Ok(ExtractedText { text, file_type })
}

/// Serialize fingerprinted text back into a file of the upload's kind.
///
/// Text formats keep their name. JSON becomes `<name>.txt` since carrier
/// characters between tokens would break the JSON grammar. DOCX is rebuilt
/// as a plain document with one paragraph per line.
pub fn render_fingerprinted(
    filename: &str,
    file_type: FileType,
    text: &str,
) -> Result<RenderedFile> {
    let filename = sanitize_filename(filename);
    match file_type {
        FileType::Docx => Ok(RenderedFile {
            bytes: docx::build(text)?,
            filename,
        }),
        FileType::Json => Ok(RenderedFile {
            filename: format!("{}.txt", filename),
            bytes: text.as_bytes().to_vec(),
        }),
        FileType::Pdf => Err(Error::UnsupportedContent(filename)),
        _ => Ok(RenderedFile {
            filename,
            bytes: text.as_bytes().to_vec(),
        }),
    }
}

/// Reduce an uploaded name to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "document.txt".to_string()
    } else {
        trimmed.to_string()
    }
}

fn decode_utf8(filename: &str, bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::UnsupportedContent(format!("{}: not valid UTF-8 text", filename)))
}

fn looks_binary(content: &str) -> bool {
    content
        .chars()
        .filter(|c| c.is_control() && *c != '\n' && *c != '\r' && *c != '\t')
        .count()
        > content.len() / 10
}

/// Text from a JSON document: every string value, one per line.
/// Falls back to the raw content when nothing textual is found.
fn extract_json(content: &str) -> String {
    fn collect(value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::String(s) if !s.trim().is_empty() => out.push(s.clone()),
            serde_json::Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
            serde_json::Value::Object(map) => map.values().for_each(|v| collect(v, out)),
            _ => {}
        }
    }

    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) => {
            let mut texts = Vec::new();
            collect(&value, &mut texts);
            if texts.is_empty() {
                content.to_string()
            } else {
                texts.join("\n")
            }
        }
        Err(_) => content.to_string(),
    }
}
