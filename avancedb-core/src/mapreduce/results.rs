//! `MapReduceResults`: wraps a view's sorted row vector with the query
//! options (`limit`/`skip`/`descending`) that shape what a caller actually
//! iterates, exposed as a single `iter()` method rather than a raw
//! begin/end pair, since Rust's `Iterator` already gives a single-consumer,
//! non-thread-safe view.

use std::cmp::Ordering;

use crate::collation;
use crate::options::ViewQueryOptions;
use crate::value::ScriptValue;

/// One row of a view's output: an emitted `(key, value)` pair and, for
/// map-only (non-reduced) rows, the document that emitted it. Reduced rows
/// have no single originating document, so `doc_id` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub key: ScriptValue,
    pub value: ScriptValue,
    pub doc_id: Option<String>,
}

impl ViewRow {
    pub fn new(key: ScriptValue, value: ScriptValue, doc_id: Option<String>) -> Self {
        ViewRow { key, value, doc_id }
    }

    /// CouchDB collation order, ties broken by `doc_id` ascending.
    pub fn cmp_collated(&self, other: &Self) -> Ordering {
        collation::compare_values(&self.key, &other.key).then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

/// The sorted output of a view, with the options that govern how a caller
/// walks it. Not thread-safe; built once by the executor, then consumed by
/// a single caller.
pub struct MapReduceResults {
    rows: Vec<ViewRow>,
    limit: Option<usize>,
    skip: usize,
    descending: bool,
}

impl MapReduceResults {
    pub fn new(rows: Vec<ViewRow>, options: &ViewQueryOptions) -> Self {
        MapReduceResults {
            rows,
            limit: options.limit,
            skip: options.skip,
            descending: options.descending,
        }
    }

    /// Total row count before skip/limit are applied — what CouchDB calls
    /// `total_rows`.
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = Some(limit);
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    pub fn set_skip(&mut self, skip: usize) {
        self.skip = skip;
    }

    pub fn descending(&self) -> bool {
        self.descending
    }

    pub fn set_descending(&mut self, descending: bool) {
        self.descending = descending;
    }

    /// Applies `descending` (reversing iteration order), then `skip`, then
    /// `limit`, over the underlying sorted rows.
    pub fn iter(&self) -> impl Iterator<Item = &ViewRow> {
        let ordered: Box<dyn Iterator<Item = &ViewRow>> = if self.descending {
            Box::new(self.rows.iter().rev())
        } else {
            Box::new(self.rows.iter())
        };
        let skipped = ordered.skip(self.skip);
        let limit = self.limit;
        skipped
            .enumerate()
            .take_while(move |(i, _)| match limit {
                Some(l) => *i < l,
                None => true,
            })
            .map(|(_, row)| row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> Vec<ViewRow> {
        (0..n)
            .map(|i| ViewRow::new(json!(i), json!(1), Some(format!("{i:08}"))))
            .collect()
    }

    #[test]
    fn limit_zero_yields_no_rows() {
        let results = MapReduceResults::new(rows(10), &ViewQueryOptions::new().with_limit(0));
        assert_eq!(results.iter().count(), 0);
        assert_eq!(results.total_rows(), 10);
    }

    #[test]
    fn skip_past_end_yields_no_rows() {
        let results = MapReduceResults::new(rows(10), &ViewQueryOptions::new().with_skip(100));
        assert_eq!(results.iter().count(), 0);
    }

    #[test]
    fn descending_reverses_before_skip_and_limit() {
        let results = MapReduceResults::new(
            rows(5),
            &ViewQueryOptions::new().with_descending(true).with_skip(1).with_limit(2),
        );
        let keys: Vec<_> = results.iter().map(|r| r.key.clone()).collect();
        assert_eq!(keys, vec![json!(3), json!(2)]);
    }

    #[test]
    fn set_limit_and_skip_override_construction_options() {
        let mut results = MapReduceResults::new(rows(5), &ViewQueryOptions::new());
        results.set_limit(2);
        results.set_skip(1);
        let keys: Vec<_> = results.iter().map(|r| r.key.clone()).collect();
        assert_eq!(keys, vec![json!(1), json!(2)]);
    }
}
