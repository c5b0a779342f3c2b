//! The embedded JavaScript engine is treated as an opaque runtime offering
//! "compile source → callable", "call with arguments", and "register
//! native callback" — the executor never reaches into a specific engine's
//! marshaling machinery (`DefineFunction`, dynamic-object proxies, private
//! pointers, and the like); that belongs entirely to whatever concrete
//! `ScriptRuntime` a real engine integration supplies.
//!
//! `call_map` takes the current document as an explicit per-call argument
//! rather than routing it through a shared mutable variable the `emit`
//! closure reads back out of — there is no captured iteration state to
//! get wrong across threads.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AvanceError, Result};
use crate::value::ScriptValue;

/// A compiled map or reduce function handle, opaque to the executor.
/// Produced by `ScriptRuntime::compile` and passed back into `call_map`/
/// `call_reduce` on the same runtime instance that produced it — runtimes
/// are thread-affine, so a `Compiled` handle from one worker's runtime is
/// never passed to another's.
pub type Compiled = Arc<dyn Any + Send + Sync>;

/// The contract the map/reduce executor needs from an embedded script
/// engine. One instance lives per pool worker thread, created lazily on
/// first use and reused across tasks; implementations are not required to
/// be `Sync`, only `Send` (they move to the worker thread once, at
/// creation, and never leave it).
pub trait ScriptRuntime: Send {
    /// Compiles `source` — already wrapped by the caller as
    /// `(function() { return <source>; })();` — into a callable handle.
    /// Implementations may cache by source text; the executor does not
    /// assume compilation is free.
    fn compile(&mut self, source: &str) -> Result<Compiled>;

    /// Invokes a compiled map function once against `doc`, routing every
    /// `emit(key, value)` call the function makes to `emit`.
    fn call_map(
        &mut self,
        compiled: &Compiled,
        doc: &ScriptValue,
        emit: &mut dyn FnMut(ScriptValue, ScriptValue),
    ) -> Result<()>;

    /// Invokes a compiled reduce function over one group of rows sharing a
    /// key (or, when `rereduce` is set, over the per-group outputs of a
    /// prior reduce pass).
    fn call_reduce(
        &mut self,
        compiled: &Compiled,
        keys: &[ScriptValue],
        values: &[ScriptValue],
        rereduce: bool,
    ) -> Result<ScriptValue>;
}

type MapClosure = dyn Fn(&ScriptValue, &mut dyn FnMut(ScriptValue, ScriptValue)) + Send + Sync;
type ReduceClosure = dyn Fn(&[ScriptValue], &[ScriptValue], bool) -> ScriptValue + Send + Sync;

/// A `ScriptRuntime` that "compiles" source by looking it up in a registry
/// of native Rust closures rather than parsing and running real JavaScript.
/// This is the reference runtime the crate's own tests run the executor
/// against, and a usable default for an embedder that wants native-Rust
/// views instead of a JS engine; a production CouchDB-compatible deployment
/// plugs a real engine (SpiderMonkey, QuickJS, ...) in behind the same
/// trait instead.
#[derive(Clone, Default)]
pub struct NativeClosureRuntime {
    map_fns: HashMap<String, Arc<MapClosure>>,
    reduce_fns: HashMap<String, Arc<ReduceClosure>>,
}

impl NativeClosureRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a native map implementation for the raw (unwrapped) map
    /// source text a `MapReduceTask` was built from.
    pub fn register_map<F>(&mut self, raw_source: impl AsRef<str>, f: F)
    where
        F: Fn(&ScriptValue, &mut dyn FnMut(ScriptValue, ScriptValue)) + Send + Sync + 'static,
    {
        self.map_fns
            .insert(crate::mapreduce::task::wrap_source(raw_source.as_ref()), Arc::new(f));
    }

    /// Registers a native reduce implementation for the raw reduce source.
    pub fn register_reduce<F>(&mut self, raw_source: impl AsRef<str>, f: F)
    where
        F: Fn(&[ScriptValue], &[ScriptValue], bool) -> ScriptValue + Send + Sync + 'static,
    {
        self.reduce_fns
            .insert(crate::mapreduce::task::wrap_source(raw_source.as_ref()), Arc::new(f));
    }
}

impl ScriptRuntime for NativeClosureRuntime {
    fn compile(&mut self, source: &str) -> Result<Compiled> {
        if let Some(f) = self.map_fns.get(source) {
            return Ok(Arc::new(f.clone()) as Compiled);
        }
        if let Some(f) = self.reduce_fns.get(source) {
            return Ok(Arc::new(f.clone()) as Compiled);
        }
        Err(AvanceError::InvalidArgument(format!(
            "no native implementation registered for map/reduce source: {source}"
        )))
    }

    fn call_map(
        &mut self,
        compiled: &Compiled,
        doc: &ScriptValue,
        emit: &mut dyn FnMut(ScriptValue, ScriptValue),
    ) -> Result<()> {
        let f = compiled
            .downcast_ref::<Arc<MapClosure>>()
            .ok_or_else(|| AvanceError::Internal("compiled handle is not a map function".into()))?;
        f(doc, emit);
        Ok(())
    }

    fn call_reduce(
        &mut self,
        compiled: &Compiled,
        keys: &[ScriptValue],
        values: &[ScriptValue],
        rereduce: bool,
    ) -> Result<ScriptValue> {
        let f = compiled
            .downcast_ref::<Arc<ReduceClosure>>()
            .ok_or_else(|| AvanceError::Internal("compiled handle is not a reduce function".into()))?;
        Ok(f(keys, values, rereduce))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compile_fails_for_unregistered_source() {
        let mut rt = NativeClosureRuntime::new();
        assert!(rt.compile("(function() { return function(doc){}; })();").is_err());
    }

    #[test]
    fn registered_map_round_trips_through_compile_and_call() {
        let mut rt = NativeClosureRuntime::new();
        rt.register_map("function(doc){ emit(doc._id, 1); }", |doc, emit| {
            emit(doc["_id"].clone(), json!(1));
        });

        let compiled = rt
            .compile(&crate::mapreduce::task::wrap_source(
                "function(doc){ emit(doc._id, 1); }",
            ))
            .unwrap();

        let mut seen = Vec::new();
        rt.call_map(&compiled, &json!({"_id": "x"}), &mut |k, v| seen.push((k, v)))
            .unwrap();
        assert_eq!(seen, vec![(json!("x"), json!(1))]);
    }
}
