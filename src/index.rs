use std::collections::HashMap;

use crate::trie::NameTrie;
use crate::FileMetadata;

/// Lower-cased extension with a single leading dot stripped. Empty when the
/// filename has no extension. Applied both to stored extensions and to the
/// caller's fileType argument, so `"TXT"`, `"txt"` and `".txt"` all address
/// the same bucket.
pub fn normalized_extension(raw: &str) -> String {
    let stripped = raw.strip_prefix('.').unwrap_or(raw);
    stripped.to_ascii_lowercase()
}

/// The three shared indices: filename trie, path→metadata map, and
/// normalized-extension→paths map. The path map is the sole authority during
/// filtering; the other two only produce candidates.
#[derive(Debug, Default)]
pub struct IndexSet {
    pub trie: NameTrie,
    pub path_map: HashMap<String, FileMetadata>,
    pub extension_map: HashMap<String, Vec<String>>,
}

impl IndexSet {
    /// Insert one file into all three indices. The caller holds the engine
    /// lock for the duration, so readers never observe a partial
    /// cross-index update.
    pub fn insert_file(&mut self, metadata: FileMetadata) {
        let path = metadata.path.clone();

        let ext_key = normalized_extension(&metadata.extension);
        if !ext_key.is_empty() {
            self.extension_map
                .entry(ext_key)
                .or_default()
                .push(path.clone());
        }

        self.trie.insert(&metadata.name, path.clone());
        self.path_map.insert(path, metadata);
    }
}
