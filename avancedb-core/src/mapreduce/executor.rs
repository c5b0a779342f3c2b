//! The map/reduce executor: fans map evaluation across a database's shard
//! snapshot, merges each shard's locally-sorted emissions into one
//! globally sorted run, and optionally reduces grouped rows.
//!
//! One map task is posted per shard; the join waits on a
//! `crossbeam::sync::WaitGroup` rather than polling an atomic counter.
//! The merge phase runs a doubling-`step` pass over adjacent sorted runs,
//! absorbing an odd tail at the end. Each level merges pairs of owned
//! `Vec<ViewRow>` runs into a new run, rather than an in-place merge over
//! raw offsets into one shared array — this needs no `unsafe` aliasing of
//! disjoint slices across threads and still completes in `ceil(log2 S)`
//! synchronization barriers.

use std::sync::{Arc, Mutex};

use crossbeam::sync::WaitGroup;

use crate::document::Document;
use crate::error::AvanceError;
use crate::mapreduce::pool::MapReduceThreadPool;
use crate::mapreduce::results::{MapReduceResults, ViewRow};
use crate::mapreduce::task::MapReduceTask;
use crate::value::ScriptValue;
use crate::{log_debug, log_trace};

/// The number of rows a single `call_reduce` invocation is given directly;
/// beyond that, a group's values are reduced in batches and the per-batch
/// outputs combined with a final `rereduce=true` pass.
const REREDUCE_BATCH_SIZE: usize = 1024;

/// Owns a `MapReduceThreadPool` and runs `MapReduceTask`s against a
/// database's shard snapshots.
pub struct MapReduceExecutor {
    pool: MapReduceThreadPool,
}

/// The result of a view call: the computed, option-shaped rows, plus any
/// per-shard map/reduce failures captured along the way. A failing map
/// call aborts only its own shard's remaining documents (the task
/// contributes whatever it had emitted before the failure); every other
/// shard's task runs to completion independently, and the failure is
/// reported here rather than silently dropped or aborting the whole view.
pub struct MapReduceOutcome {
    pub results: MapReduceResults,
    pub errors: Vec<AvanceError>,
}

impl MapReduceExecutor {
    pub fn new(pool: MapReduceThreadPool) -> Self {
        MapReduceExecutor { pool }
    }

    pub fn pool(&self) -> &MapReduceThreadPool {
        &self.pool
    }

    /// Runs `task` across `shard_snapshots` (one document array per shard,
    /// as produced by `Database::shard_snapshots`).
    pub fn execute(&self, task: &MapReduceTask, shard_snapshots: Vec<Vec<Document>>) -> MapReduceOutcome {
        let shard_count = shard_snapshots.len();
        log_debug!("executing map/reduce task over {shard_count} shards");

        let (mut runs, mut errors) = self.run_map_phase(task, shard_snapshots);

        while runs.len() > 1 {
            runs = self.merge_level(runs);
        }
        let merged = runs.into_iter().next().unwrap_or_default();
        log_trace!("map/merge phases produced {} rows", merged.len());

        let final_rows = if task.has_reduce() && task.options.reduce {
            let (rows, reduce_errors) = self.run_reduce_phase(task, merged);
            errors.extend(reduce_errors);
            rows
        } else {
            merged
        };

        MapReduceOutcome {
            results: MapReduceResults::new(final_rows, &task.options),
            errors,
        }
    }

    /// Map phase: one map task per shard, fanned out to the pool; each
    /// task sorts its own emissions before handing them back. The join
    /// is the `wg.wait()` below.
    fn run_map_phase(
        &self,
        task: &MapReduceTask,
        shard_snapshots: Vec<Vec<Document>>,
    ) -> (Vec<Vec<ViewRow>>, Vec<AvanceError>) {
        let shard_count = shard_snapshots.len();
        let collected: Arc<Mutex<Vec<(usize, Vec<ViewRow>, Option<AvanceError>)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(shard_count)));
        let wg = WaitGroup::new();

        for (shard_idx, docs) in shard_snapshots.into_iter().enumerate() {
            let wg = wg.clone();
            let collected = Arc::clone(&collected);
            let map_source = task.wrapped_map_source().to_string();

            self.pool
                .post(move |rt| {
                    let (rows, err) = run_map_on_shard(rt, shard_idx, &map_source, &docs);
                    collected.lock().unwrap().push((shard_idx, rows, err));
                    drop(wg);
                })
                .expect("map/reduce queue accepts fan-out tasks");
        }
        wg.wait();

        let mut collected = Arc::try_unwrap(collected)
            .expect("all map tasks have completed and dropped their clone")
            .into_inner()
            .unwrap();
        collected.sort_by_key(|(idx, _, _)| *idx);

        let mut errors = Vec::new();
        let mut runs = Vec::with_capacity(collected.len());
        for (_, rows, err) in collected {
            if let Some(e) = err {
                errors.push(e);
            }
            runs.push(rows);
        }
        (runs, errors)
    }

    /// One pairwise-merge level. Pairs of adjacent runs merge concurrently;
    /// an odd run out carries forward unmerged to the next level, where it
    /// is paired again — the tail is absorbed naturally, reached in the
    /// same `ceil(log2 S)` rounds without needing to track it specially.
    fn merge_level(&self, mut runs: Vec<Vec<ViewRow>>) -> Vec<Vec<ViewRow>> {
        let leftover = if runs.len() % 2 == 1 { runs.pop() } else { None };
        let pair_count = runs.len() / 2;

        let merged: Arc<Mutex<Vec<(usize, Vec<ViewRow>)>>> = Arc::new(Mutex::new(Vec::with_capacity(pair_count)));
        let wg = WaitGroup::new();

        let mut iter = runs.into_iter();
        for pair_idx in 0..pair_count {
            let a = iter.next().expect("pair_count only counts full pairs");
            let b = iter.next().expect("pair_count only counts full pairs");
            let wg = wg.clone();
            let merged = Arc::clone(&merged);

            self.pool
                .post(move |_rt| {
                    let m = merge_sorted_runs(a, b);
                    merged.lock().unwrap().push((pair_idx, m));
                    drop(wg);
                })
                .expect("map/reduce queue accepts merge tasks");
        }
        wg.wait();

        let mut merged = Arc::try_unwrap(merged)
            .expect("all merge tasks have completed and dropped their clone")
            .into_inner()
            .unwrap();
        merged.sort_by_key(|(idx, _)| *idx);

        let mut out: Vec<Vec<ViewRow>> = merged.into_iter().map(|(_, v)| v).collect();
        if let Some(tail) = leftover {
            out.push(tail);
        }
        out
    }

    /// Reduce phase: groups adjacent rows by key (or by the first
    /// `group_level` elements of an array key) and reduces each group. A
    /// group whose reduce call fails contributes no row, and its error is
    /// returned alongside the successfully-reduced rows rather than
    /// swallowed — mirroring the map phase's "other shards continue"
    /// partial-result contract.
    fn run_reduce_phase(&self, task: &MapReduceTask, rows: Vec<ViewRow>) -> (Vec<ViewRow>, Vec<AvanceError>) {
        let reduce_source = task
            .wrapped_reduce_source()
            .expect("caller checked has_reduce before calling run_reduce_phase")
            .to_string();
        let group_level = task.options.group_level;

        let groups = group_rows(rows, group_level);
        let wg = WaitGroup::new();
        let results: Arc<Mutex<Vec<(usize, std::result::Result<ViewRow, AvanceError>)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(groups.len())));

        for (group_idx, group) in groups.into_iter().enumerate() {
            let wg = wg.clone();
            let results = Arc::clone(&results);
            let reduce_source = reduce_source.clone();

            self.pool
                .post(move |rt| {
                    let row = reduce_one_group(rt, &reduce_source, group_idx, group);
                    results.lock().unwrap().push((group_idx, row));
                    drop(wg);
                })
                .expect("map/reduce queue accepts reduce tasks");
        }
        wg.wait();

        let mut results = Arc::try_unwrap(results)
            .expect("all reduce tasks have completed and dropped their clone")
            .into_inner()
            .unwrap();
        results.sort_by_key(|(idx, _)| *idx);

        let mut rows = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for (_, result) in results.drain(..) {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => errors.push(e),
            }
        }
        (rows, errors)
    }
}

fn run_map_on_shard(
    rt: &mut dyn crate::runtime::ScriptRuntime,
    shard_idx: usize,
    map_source: &str,
    docs: &[Document],
) -> (Vec<ViewRow>, Option<AvanceError>) {
    let compiled = match rt.compile(map_source) {
        Ok(c) => c,
        Err(e) => {
            return (
                Vec::new(),
                Some(AvanceError::ViewEvaluationError {
                    shard: shard_idx,
                    doc_id: String::new(),
                    message: e.to_string(),
                }),
            )
        }
    };

    let mut rows: Vec<ViewRow> = Vec::new();
    for doc in docs {
        let doc_id = doc.id().to_string();
        let proxy = doc.script_value();

        let emit_rows = &mut rows;
        let mut emit = |key: ScriptValue, value: ScriptValue| {
            emit_rows.push(ViewRow::new(key, value, Some(doc_id.clone())));
        };

        if let Err(e) = rt.call_map(&compiled, &proxy, &mut emit) {
            return (
                rows,
                Some(AvanceError::ViewEvaluationError {
                    shard: shard_idx,
                    doc_id,
                    message: e.to_string(),
                }),
            );
        }
    }

    rows.sort_by(ViewRow::cmp_collated);
    (rows, None)
}

fn merge_sorted_runs(a: Vec<ViewRow>, b: Vec<ViewRow>) -> Vec<ViewRow> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let mut a = a.into_iter().peekable();
    let mut b = b.into_iter().peekable();

    loop {
        match (a.peek(), b.peek()) {
            (Some(x), Some(y)) => {
                if x.cmp_collated(y) != std::cmp::Ordering::Greater {
                    merged.push(a.next().unwrap());
                } else {
                    merged.push(b.next().unwrap());
                }
            }
            (Some(_), None) => merged.push(a.next().unwrap()),
            (None, Some(_)) => merged.push(b.next().unwrap()),
            (None, None) => break,
        }
    }
    merged
}

/// Truncates an array key to its first `n` elements for grouping purposes;
/// a non-array key, or `n` at least as long as the key, compares whole.
fn group_key(key: &ScriptValue, group_level: Option<usize>) -> ScriptValue {
    match (key.as_array(), group_level) {
        (Some(arr), Some(n)) if n < arr.len() => ScriptValue::Array(arr[..n].to_vec()),
        _ => key.clone(),
    }
}

fn group_rows(rows: Vec<ViewRow>, group_level: Option<usize>) -> Vec<Vec<ViewRow>> {
    match group_level {
        None => {
            // CouchDB's `group=false`: every row collapses into one group.
            if rows.is_empty() {
                Vec::new()
            } else {
                vec![rows]
            }
        }
        Some(level) => {
            let mut groups: Vec<Vec<ViewRow>> = Vec::new();
            let mut current_key: Option<ScriptValue> = None;
            for row in rows {
                let key = group_key(&row.key, Some(level));
                match (&current_key, groups.last_mut()) {
                    (Some(ck), Some(last)) if *ck == key => last.push(row),
                    _ => {
                        groups.push(vec![row]);
                        current_key = Some(key);
                    }
                }
            }
            groups
        }
    }
}

/// Reduces one group of rows sharing a key. A failure to compile or run the
/// reduce function is reported as a `ViewEvaluationError` tagged with
/// `group_idx` (there is no single shard a reduced row belongs to) rather
/// than silently standing in a `null` row — a legitimately-`null`-valued
/// reduce result must stay distinguishable from a failed one.
fn reduce_one_group(
    rt: &mut dyn crate::runtime::ScriptRuntime,
    reduce_source: &str,
    group_idx: usize,
    group: Vec<ViewRow>,
) -> std::result::Result<ViewRow, AvanceError> {
    let row_key = group.first().map(|r| r.key.clone()).unwrap_or(ScriptValue::Null);

    let to_view_error = |e: AvanceError| AvanceError::ViewEvaluationError {
        shard: group_idx,
        doc_id: row_key.to_string(),
        message: e.to_string(),
    };

    let compiled = rt.compile(reduce_source).map_err(to_view_error)?;

    if group.len() <= REREDUCE_BATCH_SIZE {
        let keys: Vec<ScriptValue> = group.iter().map(|r| r.key.clone()).collect();
        let values: Vec<ScriptValue> = group.iter().map(|r| r.value.clone()).collect();
        let reduced = rt.call_reduce(&compiled, &keys, &values, false).map_err(to_view_error)?;
        return Ok(ViewRow::new(row_key, reduced, None));
    }

    // A group larger than the batch size reduces in chunks, then rereduces
    // the per-chunk outputs.
    let mut batch_outputs = Vec::new();
    for chunk in group.chunks(REREDUCE_BATCH_SIZE) {
        let keys: Vec<ScriptValue> = chunk.iter().map(|r| r.key.clone()).collect();
        let values: Vec<ScriptValue> = chunk.iter().map(|r| r.value.clone()).collect();
        batch_outputs.push(rt.call_reduce(&compiled, &keys, &values, false).map_err(to_view_error)?);
    }
    let reduced = rt
        .call_reduce(&compiled, &[], &batch_outputs, true)
        .map_err(to_view_error)?;
    Ok(ViewRow::new(row_key, reduced, None))
}
