//! WhisperPrint Ingest: text extraction from uploads, fingerprinted file output.

pub mod docx;
pub mod file;

pub use file::{
    extract_text, render_fingerprinted, sanitize_filename, ExtractedText, FileType, RenderedFile,
};
