use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Append-only store of local note bodies.
///
/// `query` does not rank anything yet: it returns the first `k` notes in
/// ingestion order until an embedding index backs it.
#[derive(Debug, Clone)]
pub struct NoteStore {
    persist_directory: PathBuf,
    documents: Vec<String>,
}

impl NoteStore {
    /// Creates `persist_directory` if needed.
    pub fn open(persist_directory: impl Into<PathBuf>) -> std::io::Result<Self> {
        let persist_directory = persist_directory.into();
        std::fs::create_dir_all(&persist_directory)?;
        Ok(Self {
            persist_directory,
            documents: Vec::new(),
        })
    }

    pub fn persist_directory(&self) -> &Path {
        &self.persist_directory
    }

    pub fn ingest<I, S>(&mut self, docs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.documents.len();
        self.documents.extend(docs.into_iter().map(Into::into));
        debug!("Ingested {} notes", self.documents.len() - before);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn query(&self, _query: &str, k: usize) -> Vec<String> {
        self.documents.iter().take(k).cloned().collect()
    }
}

/// Read every `.md` / `.txt` file under `dir`, sorted by path.
///
/// A missing directory yields no notes; unreadable files are skipped.
/// Symlinks are not followed and hidden entries are skipped. Ignore files are
/// not consulted.
pub fn load_dir(dir: impl AsRef<Path>) -> Vec<String> {
    let walker = WalkBuilder::new(dir.as_ref())
        .hidden(true)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .build();

    let mut paths: Vec<PathBuf> = walker
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| is_note(path))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| match std::fs::read_to_string(&path) {
            Ok(body) => Some(body),
            Err(err) => {
                warn!("Skipping note {}: {}", path.display(), err);
                None
            }
        })
        .collect()
}

fn is_note(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "md" | "txt"))
        .unwrap_or(false)
}
