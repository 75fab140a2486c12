use std::path::Path;

use paperchat_common::{Error, Result};
use tracing::debug;

/// Extract the full text of a saved document.
///
/// PDFs go through pdf-extract; plain-text formats are read as-is so the
/// pipeline can also be exercised without a PDF on hand.
pub fn extract_text(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let text = match ext.as_str() {
        "pdf" => {
            let bytes = std::fs::read(path)
                .map_err(|e| Error::Indexing(format!("failed to read {}: {e}", path.display())))?;
            pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| Error::Indexing(format!("failed to parse PDF: {e}")))?
        }
        "txt" | "md" | "markdown" => std::fs::read_to_string(path)
            .map_err(|e| Error::Indexing(format!("failed to read {}: {e}", path.display())))?,
        other => {
            return Err(Error::Indexing(format!(
                "unsupported file type: .{other}"
            )));
        }
    };

    debug!(
        "extracted {} characters from {}",
        text.len(),
        path.display()
    );

    if text.trim().is_empty() {
        return Err(Error::Indexing("document contains no extractable text".into()));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::extract_text;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "paperchat-doc-test-{}-{}-{}",
            std::process::id(),
            nanos,
            name
        ));
        fs::write(&path, contents).expect("failed to write temp file");
        path
    }

    #[test]
    fn reads_plain_text_files() {
        let path = temp_file("note.txt", "hello from a text file");
        let text = extract_text(&path).expect("extract should succeed");
        assert_eq!(text, "hello from a text file");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn rejects_unsupported_extensions() {
        let path = temp_file("image.png", "not really a png");
        let result = extract_text(&path);
        assert!(result.is_err());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn rejects_empty_documents() {
        let path = temp_file("empty.txt", "   \n  ");
        let result = extract_text(&path);
        assert!(result.is_err());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn invalid_pdf_is_an_indexing_error() {
        let path = temp_file("broken.pdf", "this is not a pdf");
        let result = extract_text(&path);
        assert!(result.is_err());
        let _ = fs::remove_file(path);
    }
}
