//! Pagination options and mutation summaries.

use serde::{Deserialize, Serialize};

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque token for the next page; `None` on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            next_page_token,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), None)
    }

    pub fn has_next(&self) -> bool {
        self.next_page_token.is_some()
    }

    /// Convert the items, keeping the page token.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        let items = self.items.into_iter().map(f).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, self.next_page_token))
    }
}

/// Options for paged reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptions {
    /// Maximum number of documents in the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Token returned by the previous page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

impl FindOptions {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            page_token: None,
        }
    }

    pub fn page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }
}

/// Options for filtered delete/update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOptions {
    /// Allow the operation to run with an empty filter (whole collection).
    #[serde(default)]
    pub allow_empty_filter: bool,
}

impl MutationOptions {
    /// Opt in to whole-collection mutation.
    pub fn allow_empty_filter() -> Self {
        Self {
            allow_empty_filter: true,
        }
    }
}

/// Outcome of an upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
}

impl UpsertSummary {
    pub fn total(&self) -> u64 {
        self.inserted + self.updated + self.unchanged
    }

    /// True when the call changed nothing in the store.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0
    }
}

impl std::ops::AddAssign for UpsertSummary {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
    }
}

/// Outcome of a filtered update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationSummary {
    pub matched: u64,
    pub modified: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_summary_accumulates() {
        let mut total = UpsertSummary::default();
        total += UpsertSummary { inserted: 2, updated: 1, unchanged: 0 };
        total += UpsertSummary { inserted: 0, updated: 0, unchanged: 3 };
        assert_eq!(total.total(), 6);
        assert!(!total.is_noop());
        assert!(UpsertSummary { inserted: 0, updated: 0, unchanged: 4 }.is_noop());
    }

    #[test]
    fn test_page_try_map_keeps_token() {
        let page = Page::new(vec![1, 2], Some("next".to_string()));
        let mapped: Page<String> = page.try_map(|n| Ok::<_, ()>(n.to_string())).unwrap();
        assert_eq!(mapped.items, vec!["1", "2"]);
        assert!(mapped.has_next());
    }

    #[test]
    fn test_mutation_options_default_is_guarded() {
        assert!(!MutationOptions::default().allow_empty_filter);
        assert!(MutationOptions::allow_empty_filter().allow_empty_filter);
    }
}
