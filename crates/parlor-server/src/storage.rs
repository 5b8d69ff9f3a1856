//! Mute-list persistence.
//!
//! One flat text file per owner, one muted display-name per line, rewritten
//! wholesale on every mutation. Last writer wins, no append semantics.
//! Keying files by owner means concurrent sessions never clobber each
//! other's lists.

use std::{fs, path::PathBuf};

use parlor_core::{MuteStore, MuteStoreError};

/// File-backed [`MuteStore`] rooted at a configured directory.
pub struct FileMuteStore {
    dir: PathBuf,
}

impl FileMuteStore {
    /// Creates a store rooted at `dir`. The directory is created lazily on
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Maps an owner name onto a file inside the store directory.
    ///
    /// Display names are untrusted input; anything outside a conservative
    /// character set is replaced so a name can never escape the directory.
    fn path_for(&self, owner: &str) -> Result<PathBuf, MuteStoreError> {
        let key: String = owner
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if key.is_empty() {
            return Err(MuteStoreError::InvalidOwner(owner.to_string()));
        }
        Ok(self.dir.join(format!("{key}.txt")))
    }
}

impl MuteStore for FileMuteStore {
    fn persist(&self, owner: &str, names: &[String]) -> Result<(), MuteStoreError> {
        let path = self.path_for(owner)?;
        fs::create_dir_all(&self.dir)?;
        let mut contents = String::new();
        for name in names {
            contents.push_str(name);
            contents.push('\n');
        }
        fs::write(path, contents)?;
        Ok(())
    }
}
