use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::gaps::GapSet;
use crate::{Error, Result};

/// Persists one gap set per station as a JSON file under an injected root
/// directory. There is no global state; tests point a store at a temporary
/// directory.
///
/// Persistence is routine bookkeeping: [`GapStore::persist`] failures are
/// logged and swallowed, and [`GapStore::load`] treats a corrupt file like a
/// missing one, because the in-memory set remains authoritative either way.
/// Only [`GapStore::clear`], an explicit operator action, propagates errors.
#[derive(Clone, Debug)]
pub struct GapStore {
    root: PathBuf,
}

impl GapStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        GapStore { root: root.into() }
    }

    fn path(&self, station: &str) -> PathBuf {
        self.root.join(format!("{station}.json"))
    }

    /// Writes a point-in-time snapshot of `gaps` for `station`. The caller
    /// passes a snapshot copy when persistence runs on a timer, so a write in
    /// progress never observes a half-mutated set.
    pub fn persist(&self, station: &str, gaps: &GapSet) {
        if let Err(err) = self.try_persist(station, gaps) {
            warn!(station, error = %err, "gap state write failed; in-memory state remains authoritative");
        }
    }

    fn try_persist(&self, station: &str, gaps: &GapSet) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.path(station);
        let json = serde_json::to_vec_pretty(gaps).map_err(|err| Error::Persistence(err.to_string()))?;
        fs::write(&path, json)?;
        // Gap files are owner read/write only, never executable.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Loads the persisted gap set for `station`. A missing or undecodable
    /// file yields an empty set; this never errors.
    #[must_use]
    pub fn load(&self, station: &str) -> GapSet {
        let path = self.path(station);
        let dat = match fs::read(&path) {
            Ok(dat) => dat,
            Err(err) => {
                debug!(station, error = %err, "no persisted gap state, starting empty");
                return GapSet::new();
            }
        };
        match serde_json::from_slice(&dat) {
            Ok(gaps) => gaps,
            Err(err) => {
                warn!(station, error = %err, "persisted gap state undecodable, starting empty");
                GapSet::new()
            }
        }
    }

    /// Deletes the persisted state for `station`. Unlike `persist`/`load`
    /// this propagates I/O failures; a file that is already absent is fine.
    pub fn clear(&self, station: &str) -> Result<()> {
        match fs::remove_file(self.path(station)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Io(err)),
        }
    }
}
