use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::NamedTempFile;

use crate::auth::token_data::TokenRecord;
use crate::error::Result;

/// In-memory token record mirrored to a single JSON file.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    record: Mutex<TokenRecord>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            record: Mutex::new(TokenRecord::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the token file, if any, and makes it the current record.
    pub fn load(&self) -> Result<Option<TokenRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        let mut record: TokenRecord = serde_json::from_str(&contents)?;
        if record.normalize() {
            log::warn!(
                "{} holds only one of access/refresh token, ignoring both",
                self.path.display()
            );
        }

        *self.lock() = record.clone();
        Ok(Some(record))
    }

    /// Overwrites the token file with `record`, then makes it current.
    pub fn save(&self, record: &TokenRecord) -> Result<()> {
        write_record(&self.path, record)?;
        *self.lock() = record.clone();
        Ok(())
    }

    pub fn current(&self) -> TokenRecord {
        self.lock().clone()
    }

    /// Applies `f` to a copy of the current record and persists the result.
    /// The in-memory record only changes once the file was written.
    pub fn update<F>(&self, f: F) -> Result<TokenRecord>
    where
        F: FnOnce(&mut TokenRecord),
    {
        let mut record = self.current();
        f(&mut record);
        self.save(&record)?;
        Ok(record)
    }

    fn lock(&self) -> MutexGuard<'_, TokenRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_record(path: &Path, record: &TokenRecord) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    // The temp file lives next to the target so the rename stays on one filesystem.
    // tempfile creates it readable by the owner only.
    let mut file = NamedTempFile::new_in(dir)?;
    let json_string = serde_json::to_string_pretty(record)?;
    file.write_all(json_string.as_bytes())?;
    file.flush()?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_record() -> TokenRecord {
        let mut record = TokenRecord::with_tokens("access", "refresh");
        record.user_id = Some("141981764".to_string());
        record.device_code = Some("device".to_string());
        record.user_code = Some("ABCD-EFGH".to_string());
        record.verification_uri = Some("https://www.twitch.tv/activate".to_string());
        record
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".tokens.json");

        let record = sample_record();
        TokenStore::new(&path).save(&record).unwrap();

        let fresh = TokenStore::new(&path);
        assert_eq!(fresh.load().unwrap(), Some(record.clone()));
        assert_eq!(fresh.current(), record);
    }

    #[test]
    fn test_load_without_file() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("missing.json"));

        assert_eq!(store.load().unwrap(), None);
        assert_eq!(store.current(), TokenRecord::default());
    }

    #[test]
    fn test_update_persists_before_returning() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");
        let store = TokenStore::new(&path);
        store.save(&sample_record()).unwrap();

        let updated = store.update(|record| record.set_tokens("B", "R2")).unwrap();
        assert_eq!(updated.tokens(), Some(("B", "R2")));

        let on_disk: TokenRecord =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, updated);
        assert_eq!(store.current(), updated);
    }

    #[test]
    fn test_save_overwrites_whole_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".tokens.json");
        let store = TokenStore::new(&path);

        store.save(&sample_record()).unwrap();
        store.save(&TokenRecord::with_tokens("B", "R2")).unwrap();

        let reloaded = TokenStore::new(&path).load().unwrap().unwrap();
        assert_eq!(reloaded, TokenRecord::with_tokens("B", "R2"));
        assert_eq!(reloaded.user_id, None);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".tokens.json");
        fs::write(&path, "not json").unwrap();

        assert!(TokenStore::new(&path).load().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join(".tokens.json");
        TokenStore::new(&path).save(&sample_record()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
