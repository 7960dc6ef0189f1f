use lopdf::{Document, Object, ObjectId};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{CleanupError, MergeError};

/// Concatenates PDF documents in the order they were added.
pub struct PdfMerger {
    documents: Vec<(PathBuf, Document)>,
}

impl PdfMerger {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub async fn add_pdf(&mut self, path: &Path) -> Result<(), MergeError> {
        let data = fs::read(path).await.map_err(|e| MergeError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let document = Document::load_mem(&data).map_err(|e| MergeError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        debug!("Loaded PDF with {} pages from {}", document.get_pages().len(), path.display());
        self.documents.push((path.to_path_buf(), document));

        Ok(())
    }

    /// Builds the merged document in memory and returns it with its page count.
    pub fn build(&self) -> Result<(Document, usize), MergeError> {
        let Some(((_, first), rest)) = self.documents.split_first() else {
            return Err(MergeError::NoInputs);
        };

        // Use the first document as the base
        let mut merged_doc = first.clone();
        let mut all_page_ids: Vec<ObjectId> = merged_doc.get_pages().into_values().collect();
        let mut max_id = merged_doc.max_id;

        for (path, document) in rest {
            debug!("Appending {} with {} pages", path.display(), document.get_pages().len());

            let mut doc_copy = document.clone();

            // Renumber objects to avoid conflicts
            doc_copy.renumber_objects_with(max_id + 1);
            max_id = doc_copy.max_id;

            all_page_ids.extend(doc_copy.get_pages().into_values());
            merged_doc.objects.extend(doc_copy.objects);
        }

        merged_doc.max_id = max_id;

        let pages_id = merged_doc
            .catalog()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|e| MergeError::Serialize(format!("base document has no page tree: {}", e)))?;

        for page_id in &all_page_ids {
            if let Ok(Object::Dictionary(page)) = merged_doc.get_object_mut(*page_id) {
                page.set("Parent", Object::Reference(pages_id));
            }
        }

        let page_count = all_page_ids.len();
        match merged_doc.get_object_mut(pages_id) {
            Ok(Object::Dictionary(pages_dict)) => {
                pages_dict.set(
                    "Kids",
                    Object::Array(all_page_ids.into_iter().map(Object::Reference).collect()),
                );
                pages_dict.set("Count", Object::Integer(page_count as i64));
            }
            _ => {
                return Err(MergeError::Serialize(
                    "page tree root is not a dictionary".to_string(),
                ))
            }
        }

        Ok((merged_doc, page_count))
    }

    /// Writes the merged document to `output_path` and returns its page count.
    pub async fn save(&self, output_path: &Path) -> Result<usize, MergeError> {
        info!("Merging {} documents", self.documents.len());
        let (mut merged_doc, page_count) = self.build()?;

        let mut data = Vec::new();
        merged_doc
            .save_to(&mut data)
            .map_err(|e| MergeError::Serialize(e.to_string()))?;

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| MergeError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(output_path, data)
            .await
            .map_err(|source| MergeError::Io {
                path: output_path.to_path_buf(),
                source,
            })?;

        info!(
            "Merged {} PDFs ({} pages) into {}",
            self.documents.len(),
            page_count,
            output_path.display()
        );
        Ok(page_count)
    }
}

impl Default for PdfMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// Merges `paths` in order into `destination`. Unreadable inputs are skipped.
pub async fn merge(paths: &[PathBuf], destination: &Path) -> Result<usize, MergeError> {
    if paths.is_empty() {
        return Err(MergeError::NoInputs);
    }

    let mut merger = PdfMerger::new();
    for path in paths {
        if let Err(e) = merger.add_pdf(path).await {
            warn!("{}", e);
        }
    }

    merger.save(destination).await
}

/// Removes the per-page artifacts and then the temporary directory.
/// Failures are logged and returned, never raised.
pub async fn cleanup(paths: &[PathBuf], temp_dir: &Path) -> Vec<CleanupError> {
    let mut failures = Vec::new();

    for path in paths {
        if let Err(source) = fs::remove_file(path).await {
            failures.push(CleanupError {
                path: path.clone(),
                source,
            });
        }
    }

    if let Err(source) = fs::remove_dir(temp_dir).await {
        failures.push(CleanupError {
            path: temp_dir.to_path_buf(),
            source,
        });
    }

    for failure in &failures {
        warn!("Cleanup: {}", failure);
    }
    debug!("Cleanup finished with {} failures", failures.len());
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    /// A minimal valid PDF with `pages` empty A4 pages.
    fn sample_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for _ in 0..pages {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut data = Vec::new();
        doc.save_to(&mut data).unwrap();
        data
    }

    async fn write_sample(dir: &Path, name: &str, pages: usize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, sample_pdf(pages)).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_merge_concatenates_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_sample(dir.path(), "page_1.pdf", 2).await;
        let second = write_sample(dir.path(), "page_2.pdf", 1).await;
        let output = dir.path().join("out").join("merged.pdf");

        let pages = merge(&[first, second], &output).await.unwrap();

        assert_eq!(pages, 3);
        let merged = Document::load(&output).unwrap();
        assert_eq!(merged.get_pages().len(), 3);
    }

    #[tokio::test]
    async fn test_merge_single_document() {
        let dir = tempfile::tempdir().unwrap();
        let only = write_sample(dir.path(), "page_1.pdf", 1).await;
        let output = dir.path().join("merged.pdf");

        assert_eq!(merge(&[only], &output).await.unwrap(), 1);
        assert_eq!(Document::load(&output).unwrap().get_pages().len(), 1);
    }

    #[tokio::test]
    async fn test_merge_skips_unreadable_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_sample(dir.path(), "page_1.pdf", 1).await;
        let bad = dir.path().join("page_2.pdf");
        fs::write(&bad, b"not a pdf").await.unwrap();
        let output = dir.path().join("merged.pdf");

        assert_eq!(merge(&[good, bad], &output).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_merge_without_inputs_fails() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("merged.pdf");

        assert!(matches!(merge(&[], &output).await, Err(MergeError::NoInputs)));

        let missing = dir.path().join("missing.pdf");
        assert!(matches!(merge(&[missing], &output).await, Err(MergeError::NoInputs)));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_cleanup_removes_files_and_directory() {
        let root = tempfile::tempdir().unwrap();
        let temp_dir = root.path().join("temp_pdfs");
        fs::create_dir_all(&temp_dir).await.unwrap();
        let a = write_sample(&temp_dir, "page_1.pdf", 1).await;
        let b = write_sample(&temp_dir, "page_2.pdf", 1).await;

        let failures = cleanup(&[a.clone(), b.clone()], &temp_dir).await;

        assert!(failures.is_empty());
        assert!(!a.exists());
        assert!(!temp_dir.exists());
    }

    #[tokio::test]
    async fn test_cleanup_reports_failures() {
        let root = tempfile::tempdir().unwrap();
        let temp_dir = root.path().join("temp_pdfs");
        fs::create_dir_all(&temp_dir).await.unwrap();
        let stray = write_sample(&temp_dir, "stray.pdf", 1).await;
        let missing = temp_dir.join("page_1.pdf");

        let failures = cleanup(&[missing.clone()], &temp_dir).await;

        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].path, missing);
        assert!(stray.exists());
    }
}
