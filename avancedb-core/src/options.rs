//! Tunable constants (`DatabaseConfig`) and query-option structs
//! (`PostAllDocumentsOptions`): plain structs, a `Default` impl, and
//! `with_*` builder methods — no external configuration-file crate, since
//! there is no file-based configuration surface in this core (that
//! belongs to the REST/CLI layer).

/// Tunables left as implementation constants rather than hardcoded.
#[derive(Debug, Clone, Copy)]
pub struct DatabaseConfig {
    /// Number of document-collection shards. Must be a power of two.
    pub shard_count: usize,
    /// Lazy Flat Set unsorted-buffer cap, per shard.
    pub max_unsorted_entries: usize,
    /// Lazy Flat Set nursery cap, per shard.
    pub max_nursery_entries: usize,
    /// Map/reduce worker thread count.
    pub worker_threads: usize,
    /// Bound on the map/reduce task queue (absorbs the fan-out without
    /// blocking `Post`).
    pub task_queue_depth: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            shard_count: 64,
            max_unsorted_entries: 16,
            max_nursery_entries: 1024,
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            task_queue_depth: 4096,
        }
    }
}

impl DatabaseConfig {
    pub fn with_shard_count(mut self, n: usize) -> Self {
        assert!(n.is_power_of_two(), "shard_count must be a power of two");
        self.shard_count = n;
        self
    }

    pub fn with_lfs_caps(mut self, max_unsorted: usize, max_nursery: usize) -> Self {
        self.max_unsorted_entries = max_unsorted;
        self.max_nursery_entries = max_nursery;
        self
    }

    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n.max(1);
        self
    }
}

/// Options recognized when constructing `PostAllDocumentsOptions` from a
/// query-string map (`limit`, `skip`, `descending`, `include_docs`,
/// `startkey`, `endkey`, `key`), plus the POST-form `keys` array.
#[derive(Debug, Clone, Default)]
pub struct PostAllDocumentsOptions {
    pub limit: Option<usize>,
    pub skip: usize,
    pub descending: bool,
    pub include_docs: bool,
    pub startkey: Option<String>,
    pub endkey: Option<String>,
    pub key: Option<String>,
    pub keys: Option<Vec<String>>,
}

impl PostAllDocumentsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Builds options from a query-string-style map of string values, the
    /// shape the REST layer (out of scope here) would hand the core.
    pub fn from_query_map(
        params: &std::collections::HashMap<String, String>,
    ) -> crate::error::Result<Self> {
        use crate::error::AvanceError;

        let parse_usize = |key: &str| -> crate::error::Result<Option<usize>> {
            match params.get(key) {
                None => Ok(None),
                Some(v) => v
                    .parse::<usize>()
                    .map(Some)
                    .map_err(|_| AvanceError::InvalidArgument(format!("{key} must be a non-negative integer: {v}"))),
            }
        };

        let limit = parse_usize("limit")?;
        let skip = parse_usize("skip")?.unwrap_or(0);
        let descending = match params.get("descending").map(String::as_str) {
            None => false,
            Some("true") => true,
            Some("false") => false,
            Some(other) => {
                return Err(AvanceError::InvalidArgument(format!(
                    "descending must be true or false: {other}"
                )))
            }
        };
        let include_docs = matches!(params.get("include_docs").map(String::as_str), Some("true"));

        Ok(PostAllDocumentsOptions {
            limit,
            skip,
            descending,
            include_docs,
            startkey: params.get("startkey").cloned(),
            endkey: params.get("endkey").cloned(),
            key: params.get("key").cloned(),
            keys: None,
        })
    }
}

/// View-query options: how a `MapReduceResults` is walked once a view has
/// been computed. Distinct from `PostAllDocumentsOptions` — a view query
/// additionally carries `reduce`/`group_level`, and its `keys` concept
/// operates over emitted keys rather than document ids.
#[derive(Debug, Clone, Default)]
pub struct ViewQueryOptions {
    pub limit: Option<usize>,
    pub skip: usize,
    pub descending: bool,
    /// Whether to run the view's reduce function, if it has one. Ignored
    /// when the task has no reduce source.
    pub reduce: bool,
    /// `None` groups every row into a single reduce output (CouchDB's
    /// `group=false`); `Some(n)` groups by the first `n` elements of an
    /// array key (or the whole key, for non-array keys) — CouchDB's
    /// `group_level=n`.
    pub group_level: Option<usize>,
}

impl ViewQueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    pub fn with_reduce(mut self, reduce: bool) -> Self {
        self.reduce = reduce;
        self
    }

    pub fn with_group_level(mut self, group_level: usize) -> Self {
        self.group_level = Some(group_level);
        self
    }
}
