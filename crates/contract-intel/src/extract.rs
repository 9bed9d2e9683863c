//! Per-page PDF text extraction.
//!
//! `pdf-extract` is tried first; when it fails (or panics, which it does on
//! some malformed inputs) the document is re-read with `lopdf`. Page order
//! is preserved and empty pages are kept as empty strings so page numbers
//! stay aligned with the source PDF.

use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;

/// Extraction failure. Both libraries are reported so the log shows why
/// the fallback did not help either.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {primary}; fallback failed: {fallback}")]
    Unreadable { primary: String, fallback: String },

    #[error("PDF contains no pages")]
    NoPages,
}

/// Extract the raw text of every page, in reading order.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let primary = match primary_extract(bytes) {
        Ok(pages) if !pages.is_empty() => return Ok(pages),
        Ok(_) => "no pages returned".to_string(),
        Err(e) => e,
    };

    tracing::warn!(error = %primary, "pdf-extract failed, falling back to lopdf");

    match fallback_extract(bytes) {
        Ok(pages) if pages.is_empty() => Err(ExtractError::NoPages),
        Ok(pages) => Ok(pages),
        Err(fallback) => Err(ExtractError::Unreadable { primary, fallback }),
    }
}

fn primary_extract(bytes: &[u8]) -> Result<Vec<String>, String> {
    catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }))
    .map_err(|_| "pdf-extract panicked".to_string())?
    .map_err(|e| e.to_string())
}

fn fallback_extract(bytes: &[u8]) -> Result<Vec<String>, String> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;
    doc.get_pages()
        .keys()
        .map(|&number| doc.extract_text(&[number]).map_err(|e| e.to_string()))
        .collect()
}

/// Hand-built PDF fixtures for tests.
#[cfg(test)]
pub(crate) mod fixtures {
    /// A minimal PDF with one Helvetica text line per page.
    pub fn pdf_with_pages(lines: &[&str]) -> Vec<u8> {
        let n = lines.len();
        let font_id = 3 + 2 * n;
        let mut objects: Vec<String> = Vec::new();

        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
        objects.push(format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            n
        ));
        for (i, line) in lines.iter().enumerate() {
            let content_id = 4 + 2 * i;
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 {} 0 R >> >> >>",
                content_id, font_id
            ));
            let stream = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", line);
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                stream.len(),
                stream
            ));
        }
        objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj {}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_start
            )
            .as_bytes(),
        );
        out
    }
}
