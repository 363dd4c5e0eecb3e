//! Per-path claims that keep two vault operations off the same file.

use crate::error::{Result, VaultError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Paths currently owned by an in-flight hide or restore.
#[derive(Debug, Clone, Default)]
pub struct PathClaims {
    held: Arc<Mutex<HashSet<String>>>,
}

impl PathClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim every path in `paths` at once, or none of them.
    ///
    /// Fails with [`VaultError::Conflict`] when any path is already held.
    pub fn claim<I, S>(&self, paths: I) -> Result<ClaimGuard>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        let mut held = self.held.lock();
        if let Some(busy) = paths.iter().find(|p| held.contains(*p)) {
            return Err(VaultError::Conflict(format!(
                "{} is already being moved",
                busy
            )));
        }
        held.extend(paths.iter().cloned());
        Ok(ClaimGuard {
            held: Arc::clone(&self.held),
            paths,
        })
    }

    pub fn is_held(&self, path: &str) -> bool {
        self.held.lock().contains(path)
    }
}

/// Releases its paths on drop.
#[derive(Debug)]
pub struct ClaimGuard {
    held: Arc<Mutex<HashSet<String>>>,
    paths: Vec<String>,
}

impl ClaimGuard {
    /// Add one more path to this claim.
    pub fn extend(&mut self, path: impl Into<String>) -> Result<()> {
        let path = path.into();
        let mut held = self.held.lock();
        if !held.insert(path.clone()) {
            return Err(VaultError::Conflict(format!(
                "{} is already being moved",
                path
            )));
        }
        self.paths.push(path);
        Ok(())
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let mut held = self.held.lock();
        for path in &self.paths {
            held.remove(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_and_release() {
        let claims = PathClaims::new();
        let guard = claims.claim(["/a.jpg", "/vault/1_a.jpg"]).unwrap();
        assert!(claims.is_held("/a.jpg"));
        assert!(claims.claim(["/a.jpg"]).unwrap_err().is_conflict());
        // Partial overlap claims nothing.
        assert!(claims.claim(["/b.jpg", "/vault/1_a.jpg"]).is_err());
        assert!(!claims.is_held("/b.jpg"));

        drop(guard);
        assert!(!claims.is_held("/a.jpg"));
        assert!(claims.claim(["/a.jpg"]).is_ok());
    }

    #[test]
    fn test_extend() {
        let claims = PathClaims::new();
        let _other = claims.claim(["/vault/taken"]).unwrap();
        let mut guard = claims.claim(["/a.jpg"]).unwrap();
        guard.extend("/vault/1_a.jpg").unwrap();
        assert!(guard.extend("/vault/taken").is_err());
        drop(guard);
        assert!(!claims.is_held("/vault/1_a.jpg"));
        assert!(claims.is_held("/vault/taken"));
    }
}
