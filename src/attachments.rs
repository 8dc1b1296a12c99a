// ABOUTME: Decoding of files attached to chat messages
// ABOUTME: Images pass through as inline parts; PDF, Word and text files become extracted text
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Attachments
//!
//! Clients send `fileData` as base64, optionally wrapped in a `data:` URL, and
//! `fileType` as a MIME type. Documents are turned into text here so the model
//! dispatcher only ever sees text or inline images.

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;

use crate::errors::{AppError, AppResult};
use crate::llm::InlineImage;

const PDF_MIME: &str = "application/pdf";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const IMAGE_MIMES: &[&str] = &["image/png", "image/jpeg", "image/jpg", "image/webp", "image/heic", "image/heif"];

/// Characters of extracted text forwarded to the model
pub const MAX_DOCUMENT_CHARS: usize = 30_000;

static XML_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

/// A decoded attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// Image forwarded to the model as an inline part
    Image(InlineImage),
    /// Document reduced to its text
    Document {
        /// Extracted text, truncated to [`MAX_DOCUMENT_CHARS`]
        text: String,
        /// Pages counted against the monthly page budget
        pages: u32,
    },
}

impl Attachment {
    /// Pages charged against the document budget, `None` for images
    #[must_use]
    pub const fn document_pages(&self) -> Option<u32> {
        match self {
            Self::Document { pages, .. } => Some(*pages),
            Self::Image(_) => None,
        }
    }
}

/// Decode a base64 payload according to its declared MIME type
///
/// # Errors
///
/// Returns `InvalidFormat` when the payload cannot be decoded or parsed and
/// `UnsupportedMedia` for MIME types that are not handled.
pub fn decode(file_data: &str, file_type: &str) -> AppResult<Attachment> {
    let mime = normalize_mime(file_type);
    let payload = strip_data_url(file_data);

    if IMAGE_MIMES.contains(&mime.as_str()) {
        // Decoded only to validate; the inline part carries base64
        STANDARD
            .decode(payload)
            .map_err(|e| AppError::invalid_format(format!("Image is not valid base64: {e}")))?;
        let mime_type = if mime == "image/jpg" { "image/jpeg".to_owned() } else { mime };
        return Ok(Attachment::Image(InlineImage {
            mime_type,
            data: payload.to_owned(),
        }));
    }

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| AppError::invalid_format(format!("File is not valid base64: {e}")))?;

    let (text, pages) = match mime.as_str() {
        PDF_MIME => extract_pdf(&bytes)?,
        DOCX_MIME => (extract_docx(&bytes)?, 1),
        "text/plain" | "text/markdown" | "text/csv" => (String::from_utf8_lossy(&bytes).into_owned(), 1),
        _ => return Err(AppError::unsupported_media(file_type)),
    };

    if text.trim().is_empty() {
        return Err(AppError::invalid_format("No readable text found in the document"));
    }

    Ok(Attachment::Document {
        text: text.chars().take(MAX_DOCUMENT_CHARS).collect(),
        pages,
    })
}

fn normalize_mime(file_type: &str) -> String {
    file_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn strip_data_url(file_data: &str) -> &str {
    let trimmed = file_data.trim();
    if trimmed.starts_with("data:") {
        if let Some((_, payload)) = trimmed.split_once(";base64,") {
            return payload;
        }
    }
    trimmed
}

/// Text and page count of a PDF
fn extract_pdf(bytes: &[u8]) -> AppResult<(String, u32)> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| AppError::invalid_format(format!("Unreadable PDF: {e}")))?;
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let pages = u32::try_from(page_numbers.len()).unwrap_or(u32::MAX);

    let text = document
        .extract_text(&page_numbers)
        .map_err(|e| AppError::invalid_format(format!("Could not extract PDF text: {e}")))?;
    Ok((text, pages))
}

/// Paragraph text of a `.docx` file
fn extract_docx(bytes: &[u8]) -> AppResult<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::invalid_format(format!("Unreadable Word document: {e}")))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| AppError::invalid_format(format!("Word document has no body: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| AppError::invalid_format(format!("Word document body is not UTF-8: {e}")))?;

    Ok(docx_xml_to_text(&xml))
}

fn docx_xml_to_text(xml: &str) -> String {
    let with_breaks = xml.replace("</w:p>", "\n").replace("<w:tab/>", "\t");
    let Some(tag) = XML_TAG.as_ref() else {
        return with_breaks;
    };
    // &amp; goes last so escaped entities stay literal
    tag.replace_all(&with_breaks, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
