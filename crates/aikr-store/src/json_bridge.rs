use std::fs;
use std::path::Path;

use aikr_core::{export_json, import_json};

use crate::error::{Result, StoreError};
use crate::store::Store;

impl Store {
    /// Import a versioned JSON memory image from a file, replacing the stored one.
    pub fn import_json_file(&self, path: &Path) -> Result<()> {
        let json = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.import_json_str(&json)
    }

    pub fn import_json_str(&self, json: &str) -> Result<()> {
        let snapshot =
            import_json(json).map_err(|e| StoreError::InvalidData(format!("invalid JSON: {e}")))?;
        self.save_snapshot(&snapshot)
    }

    pub fn export_json_file(&self, path: &Path) -> Result<()> {
        let json = self.export_json_string()?;
        fs::write(path, json).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn export_json_string(&self) -> Result<String> {
        let snapshot = self.load_snapshot()?;
        export_json(&snapshot)
            .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use aikr_core::{AtomStore, Memory, MemoryConfig, Punctuation, Term, TruthValue};

    fn make_memory() -> Memory {
        let mut memory =
            Memory::new(MemoryConfig::default(), Arc::new(AtomStore::new())).unwrap();
        memory
            .submit_term(
                &Term::inheritance("robin", "bird"),
                Punctuation::Belief,
                Some(TruthValue::new(1.0, 0.9)),
                None,
            )
            .unwrap();
        memory
            .submit_term(&Term::inheritance("robin", "animal"), Punctuation::Question, None, None)
            .unwrap();
        memory
    }

    #[test]
    fn test_import_export_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        store.save_memory(&make_memory()).unwrap();
        let exported = store.export_json_string().unwrap();

        let other = Store::open_in_memory().unwrap();
        other.import_json_str(&exported).unwrap();
        assert_eq!(other.load_snapshot().unwrap(), store.load_snapshot().unwrap());
        assert_eq!(other.export_json_string().unwrap(), exported);
    }

    #[test]
    fn test_import_invalid_json() {
        let store = Store::open_in_memory().unwrap();
        let err = store.import_json_str("{ not json").unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[test]
    fn test_import_missing_file() {
        let store = Store::open_in_memory().unwrap();
        let err = store
            .import_json_file(Path::new("/nonexistent/aikr/memory.json"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let store = Store::open_in_memory().unwrap();
        store.save_memory(&make_memory()).unwrap();
        store.export_json_file(&path).unwrap();

        let other = Store::open_in_memory().unwrap();
        other.import_json_file(&path).unwrap();
        assert_eq!(other.concept_count().unwrap(), store.concept_count().unwrap());
    }
}
