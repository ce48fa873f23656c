//! Per-class command result cache
//!
//! Results are grouped under the class name a command was issued for, so
//! that a rename/delete/reload of that class can drop every stale reply
//! in one call. Lookup is a linear scan over the class bucket; buckets
//! stay short because only a handful of queries per class opt in to
//! caching.

use std::collections::HashMap;

/// A single cached command/result pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCommand {
    pub command: String,
    pub result: String,
}

/// Cache of command results keyed by class name
#[derive(Debug, Default)]
pub struct CommandCache {
    commands: HashMap<String, Vec<CachedCommand>>,
}

impl CommandCache {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Look up a prior result for `(class, command)`
    ///
    /// First exact command-text match in the class bucket wins.
    pub fn get(&self, class_name: &str, command: &str) -> Option<&str> {
        self.commands
            .get(class_name)?
            .iter()
            .find(|entry| entry.command == command)
            .map(|entry| entry.result.as_str())
    }

    /// Insert a result for `(class, command)`
    ///
    /// A bucket never holds two entries for the same command text. When
    /// the command is already present the existing entry is kept and the
    /// new result is discarded; updated results are therefore never
    /// cached until the class is invalidated. This mirrors the behavior
    /// callers depend on, questionable as it looks.
    pub fn put(&mut self, class_name: &str, command: &str, result: &str) {
        let bucket = self.commands.entry(class_name.to_string()).or_default();
        if bucket.iter().any(|entry| entry.command == command) {
            return;
        }
        bucket.push(CachedCommand {
            command: command.to_string(),
            result: result.to_string(),
        });
    }

    /// Drop every cached result for a class
    pub fn invalidate(&mut self, class_name: &str) {
        self.commands.remove(class_name);
    }

    /// Number of classes with at least one cached command
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_on_empty_cache() {
        let cache = CommandCache::new();
        assert_eq!(cache.get("A", "isPackage(A)"), None);
    }

    #[test]
    fn test_put_then_get() {
        let mut cache = CommandCache::new();
        cache.put("A", "isPackage(A)", "true");
        assert_eq!(cache.get("A", "isPackage(A)"), Some("true"));
        assert_eq!(cache.get("A", "isModel(A)"), None);
        assert_eq!(cache.get("B", "isPackage(A)"), None);
    }

    #[test]
    fn test_duplicate_put_keeps_first_result() {
        let mut cache = CommandCache::new();
        cache.put("A", "list(A)", "model A end A;");
        cache.put("A", "list(A)", "model A x; end A;");
        assert_eq!(cache.get("A", "list(A)"), Some("model A end A;"));
        // exactly one entry for the command
        assert_eq!(cache.commands.get("A").unwrap().len(), 1);
    }

    #[test]
    fn test_invalidate_drops_whole_class() {
        let mut cache = CommandCache::new();
        cache.put("A", "isPackage(A)", "true");
        cache.put("A", "list(A)", "model A end A;");
        cache.put("B", "isPackage(B)", "false");
        cache.invalidate("A");
        assert_eq!(cache.get("A", "isPackage(A)"), None);
        assert_eq!(cache.get("A", "list(A)"), None);
        assert_eq!(cache.get("B", "isPackage(B)"), Some("false"));
    }

    #[test]
    fn test_invalidate_missing_class_is_noop() {
        let mut cache = CommandCache::new();
        cache.invalidate("Nothing");
        assert!(cache.is_empty());
    }
}
