//! A `MapReduceTask`: the map (and optional reduce) source for one view
//! call, plus its query options.

use crate::options::ViewQueryOptions;

/// Wraps `source` as an immediately-invoked function expression, so every
/// `ScriptRuntime` implementation compiles the same text regardless of
/// whether the task was built from a freshly-typed map function or
/// round-tripped through a design document.
pub fn wrap_source(source: &str) -> String {
    format!("(function() {{ return {source}; }})();")
}

/// One view evaluation request: map source (always present), optional
/// reduce source, and the query options that shape the final result.
#[derive(Debug, Clone)]
pub struct MapReduceTask {
    map_source: String,
    reduce_source: Option<String>,
    pub options: ViewQueryOptions,
}

impl MapReduceTask {
    /// `map_source`/`reduce_source` are the raw function bodies as a design
    /// document would store them (e.g. `"function(doc){ emit(doc._id, 1); }"`);
    /// this constructor applies the `(function(){ return ...; })();` wrap.
    pub fn new(map_source: impl Into<String>, options: ViewQueryOptions) -> Self {
        MapReduceTask {
            map_source: wrap_source(&map_source.into()),
            reduce_source: None,
            options,
        }
    }

    pub fn with_reduce(mut self, reduce_source: impl Into<String>) -> Self {
        self.reduce_source = Some(wrap_source(&reduce_source.into()));
        self
    }

    /// The wrapped map source, ready to hand to `ScriptRuntime::compile`.
    pub fn wrapped_map_source(&self) -> &str {
        &self.map_source
    }

    /// The wrapped reduce source, if this task has one.
    pub fn wrapped_reduce_source(&self) -> Option<&str> {
        self.reduce_source.as_deref()
    }

    pub fn has_reduce(&self) -> bool {
        self.reduce_source.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_source_produces_an_immediately_invoked_function_expression() {
        assert_eq!(
            wrap_source("function(doc){ emit(doc._id, 1); }"),
            "(function() { return function(doc){ emit(doc._id, 1); }; })();"
        );
    }

    #[test]
    fn task_wraps_both_map_and_reduce_sources() {
        let task = MapReduceTask::new("function(doc){ emit(doc._id, 1); }", ViewQueryOptions::new())
            .with_reduce("function(keys, values){ return sum(values); }");
        assert!(task.wrapped_map_source().starts_with("(function() { return function(doc)"));
        assert!(task
            .wrapped_reduce_source()
            .unwrap()
            .starts_with("(function() { return function(keys"));
        assert!(task.has_reduce());
    }
}
