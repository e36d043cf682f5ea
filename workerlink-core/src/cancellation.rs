use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::error::{DuplicateTaskSnafu, WorkerResult};

/// Live cancellation tokens, keyed by work item id. Holds at most one entry per id.
#[derive(Debug, Default)]
pub struct CancellationTable {
    tokens: HashMap<String, CancellationToken>,
}

impl CancellationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the token for `id`, failing if one is already live. The caller keeps a clone to observe cancellation.
    pub fn insert(&mut self, id: &str) -> WorkerResult<CancellationToken> {
        if self.tokens.contains_key(id) {
            return DuplicateTaskSnafu { id }.fail();
        }
        let token = CancellationToken::new();
        self.tokens.insert(id.to_string(), token.clone());
        Ok(token)
    }

    pub fn lookup(&self, id: &str) -> Option<&CancellationToken> {
        self.tokens.get(id)
    }

    /// Marks the token for `id` cancelled. Returns `false` when there is no live token for it.
    pub fn cancel(&self, id: &str) -> bool {
        match self.lookup(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<CancellationToken> {
        self.tokens.remove(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.tokens.len()
    }
}

#[cfg(test)]
mod test {
    use crate::test::assert_send;
    use crate::WorkerError;

    use super::*;

    #[test]
    fn insert_rejects_live_duplicates() {
        let mut table = CancellationTable::new();
        let first = table.insert("a").unwrap();

        let err = table.insert("a").unwrap_err();
        assert!(matches!(err, WorkerError::DuplicateTask { id } if id == "a"));
        assert_eq!(table.len(), 1);
        assert!(!first.is_cancelled());
    }

    #[test]
    fn insert_allows_reuse_after_removal() {
        let mut table = CancellationTable::new();
        let stale = table.insert("a").unwrap();
        assert!(table.remove("a").is_some());

        let fresh = table.insert("a").unwrap();
        stale.cancel();
        assert!(!fresh.is_cancelled());
    }

    #[test]
    fn cancel_is_visible_through_the_shared_token() {
        let mut table = CancellationTable::new();
        let token = table.insert("a").unwrap();

        assert!(table.cancel("a"));
        assert!(token.is_cancelled());
        assert!(table.cancel("a"));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_of_unknown_ids_is_a_no_op() {
        let mut table = CancellationTable::new();
        let token = table.insert("a").unwrap();

        assert!(!table.cancel("b"));
        assert!(!token.is_cancelled());
        assert!(table.lookup("b").is_none());
    }

    #[test]
    fn assertions() {
        assert_send::<CancellationTable>();
    }
}
