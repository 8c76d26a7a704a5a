//! Word-processor (`.docx`) paragraph extraction.

use docx_rs::{read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild};

use regassist_core::error::{AssistError, Result};

/// Paragraph texts of a DOCX document in document order.
///
/// Only body paragraphs are returned; tables, headers and footers are not
/// walked. Empty paragraphs are kept as empty strings.
pub fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>> {
    let docx = read_docx(bytes)
        .map_err(|e| AssistError::Extraction(format!("Unreadable DOCX: {}", e)))?;

    Ok(docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(p) => Some(paragraph_text(p)),
            _ => None,
        })
        .collect())
}

/// All paragraph texts joined with `\n`.
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    Ok(docx_paragraphs(bytes)?.join("\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    RunChild::Break(_) => text.push('\n'),
                    _ => {}
                }
            }
        }
    }
    text
}
