//! Integration tests for multi-format document loading: DOCX extraction,
//! the two-pass PDF path with OCR rejection, and corrupt-input handling.

use ragcell::loader::load_document;
use ragcell::RagError;

/// Minimal valid PDF containing the short text "tiny test phrase".
/// Builds body then xref with correct byte offsets so PDF parsers accept
/// it. The text layer is tiny, which makes it look like a scanned
/// document to the loader's text-volume threshold.
fn minimal_pdf_with_short_text() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 44 >> stream\nBT /F1 12 Tf 100 700 Td (tiny test phrase) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o1).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o2).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o3).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o4).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o5).as_bytes());
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Minimal docx (ZIP) containing word/document.xml with the given phrase.
fn minimal_docx_with_text(phrase: &str) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            phrase
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[test]
fn docx_text_is_extracted() {
    let bytes = minimal_docx_with_text("office test phrase");
    let doc = load_document("report.docx", &bytes).unwrap();
    assert!(doc.text.contains("office test phrase"));
    assert_eq!(doc.source, "report.docx");
    assert_eq!(doc.file_size, bytes.len() as u64);
    assert_eq!(doc.content_length, doc.text.chars().count());
}

#[test]
fn docx_without_text_is_rejected_as_empty() {
    let bytes = minimal_docx_with_text("");
    let err = load_document("hollow.docx", &bytes).unwrap_err();
    assert!(matches!(err, RagError::EmptyDocument(_)));
}

#[test]
fn docx_missing_document_xml_is_extraction_error() {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("unrelated.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"nothing here").unwrap();
        zip.finish().unwrap();
    }
    let err = load_document("weird.docx", &buf).unwrap_err();
    assert!(matches!(err, RagError::Extraction { .. }));
}

#[test]
fn pdf_with_no_usable_text_layer_requires_ocr() {
    // The minimal PDF parses fine but carries far fewer non-whitespace
    // characters than the loader's threshold, the same shape as a scan.
    let bytes = minimal_pdf_with_short_text();
    let err = load_document("scan.pdf", &bytes).unwrap_err();
    assert!(
        matches!(err, RagError::OcrRequired { .. }),
        "expected OcrRequired, got: {:?}",
        err
    );
}

#[test]
fn corrupt_pdf_is_extraction_error_not_panic() {
    let err = load_document("broken.pdf", b"%PDF-1.4 truncated garbage").unwrap_err();
    assert!(matches!(
        err,
        RagError::Extraction { .. } | RagError::OcrRequired { .. }
    ));
}

#[test]
fn markdown_and_text_load_verbatim() {
    let doc = load_document("notes.md", "# Title\n\nBody text.".as_bytes()).unwrap();
    assert_eq!(doc.text, "# Title\n\nBody text.");

    let doc = load_document("plain.txt", "just words".as_bytes()).unwrap();
    assert_eq!(doc.text, "just words");
}
