use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::types::CtxId;

/// Per-context audit log settings.
///
/// The engine core does not write audit records itself; a module does,
/// using the context's index path and taking the context's file lock
/// around each append. The index file is the only state shared across the
/// transactions of one context.
pub struct AuditLogSettings {
    owner: CtxId,
    index_path: Option<PathBuf>,
    enabled: bool,
    lock: Mutex<()>,
}

impl AuditLogSettings {
    pub(crate) fn new(owner: CtxId) -> Self {
        Self {
            owner,
            index_path: None,
            enabled: false,
            lock: Mutex::new(()),
        }
    }

    /// Settings for a child context: path and default flag are inherited,
    /// the file lock is the child's own.
    pub(crate) fn inherit(parent: &AuditLogSettings, owner: CtxId) -> Self {
        Self {
            owner,
            index_path: parent.index_path.clone(),
            enabled: parent.enabled,
            lock: Mutex::new(()),
        }
    }

    /// The context these settings belong to.
    pub fn owner(&self) -> CtxId {
        self.owner
    }

    pub fn index_path(&self) -> Option<&Path> {
        self.index_path.as_deref()
    }

    /// Point the audit index at `path`. Re-setting the current value is an
    /// idempotent no-op: the lock is not taken and nothing is rewritten.
    /// Returns whether the path changed.
    pub fn set_index_path(&mut self, path: Option<PathBuf>) -> bool {
        if self.index_path == path {
            return false;
        }
        self.index_path = path;
        true
    }

    /// Whether transactions in this context are audited by default.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Take the index file lock. The writing module holds this across one
    /// index append.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_to_same_path_is_a_no_op() {
        let mut settings = AuditLogSettings::new(CtxId(1));
        assert!(settings.set_index_path(Some(PathBuf::from("/var/log/ix"))));
        assert!(!settings.set_index_path(Some(PathBuf::from("/var/log/ix"))));
        assert!(settings.set_index_path(Some(PathBuf::from("/var/log/other"))));
        assert!(settings.set_index_path(None));
        assert!(!settings.set_index_path(None));
    }

    #[test]
    fn inherit_copies_settings_but_not_the_lock() {
        let mut parent = AuditLogSettings::new(CtxId(1));
        parent.set_index_path(Some(PathBuf::from("/var/log/ix")));
        parent.set_enabled(true);
        let child = AuditLogSettings::inherit(&parent, CtxId(2));
        assert_eq!(child.index_path(), Some(Path::new("/var/log/ix")));
        assert!(child.is_enabled());
        assert_eq!(child.owner(), CtxId(2));
        // both locks can be held at once
        let _p = parent.lock();
        let _c = child.lock();
    }
}
