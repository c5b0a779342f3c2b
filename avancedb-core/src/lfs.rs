//! The Lazy Flat Set (LFS): an ordered set tuned for high insert rates,
//! amortizing sort cost across three zones — `unsorted` (an append
//! buffer), `nursery` (a capped sorted buffer), and `main` (the fully
//! sorted, deduplicated bulk of the set). See `shard.rs` for the
//! mutex-guarded collection wrapper around it.

use std::cmp::Ordering;

/// An ordered set maintained as three zones to amortize sort cost. `T`
/// supplies both the total order and the equality the set dedups on (for
/// `Document`, equality and order are both id-based — see `document.rs`).
#[derive(Debug)]
pub struct LazyFlatSet<T: Ord + Clone> {
    main: Vec<T>,
    nursery: Vec<T>,
    unsorted: Vec<T>,
    max_unsorted: usize,
    max_nursery: usize,
}

impl<T: Ord + Clone> LazyFlatSet<T> {
    pub fn new(max_unsorted: usize, max_nursery: usize) -> Self {
        LazyFlatSet {
            main: Vec::new(),
            nursery: Vec::new(),
            unsorted: Vec::new(),
            max_unsorted,
            max_nursery,
        }
    }

    pub fn len(&self) -> usize {
        self.main.len() + self.nursery.len() + self.unsorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Places `v` in the set, replacing any existing value equal to it.
    ///
    /// At most one unsorted→nursery cascade, and at most one nursery→main
    /// cascade, happen per call — never more, regardless of how far over
    /// either cap the buffer has drifted (it can't drift past the cap by
    /// more than one element, since every insert checks it after the
    /// fact).
    pub fn insert(&mut self, v: T) {
        if let Ok(idx) = self.main.binary_search(&v) {
            self.main[idx] = v;
            return;
        }
        if let Ok(idx) = self.nursery.binary_search(&v) {
            self.nursery[idx] = v;
            return;
        }
        if let Some(idx) = self.unsorted.iter().position(|x| x == &v) {
            self.unsorted[idx] = v;
            return;
        }

        self.unsorted.push(v);
        if self.unsorted.len() > self.max_unsorted {
            self.flush_unsorted();
        }
    }

    /// Removes any value equal to `v`. Returns the count removed (0 or 1).
    pub fn erase(&mut self, v: &T) -> usize {
        if let Ok(idx) = self.main.binary_search(v) {
            self.main.remove(idx);
            return 1;
        }
        if let Ok(idx) = self.nursery.binary_search(v) {
            self.nursery.remove(idx);
            return 1;
        }
        if let Some(idx) = self.unsorted.iter().position(|x| x == v) {
            self.unsorted.swap_remove(idx);
            return 1;
        }
        0
    }

    /// Returns the first value (by the set's order) for which `cmp` — a
    /// comparator of "candidate vs. sought key" — reports `Equal`. `main`
    /// and `nursery` are binary-searched; `unsorted` is scanned linearly.
    pub fn find_by<F>(&self, mut cmp: F) -> Option<&T>
    where
        F: FnMut(&T) -> Ordering,
    {
        if let Ok(idx) = self.main.binary_search_by(|x| cmp(x)) {
            return self.main.get(idx);
        }
        if let Ok(idx) = self.nursery.binary_search_by(|x| cmp(x)) {
            return self.nursery.get(idx);
        }
        self.unsorted.iter().find(|x| cmp(x) == Ordering::Equal)
    }

    /// Materializes the set. If `sort` is true the result is globally
    /// sorted with every element appearing exactly once; otherwise the
    /// zones are concatenated as-is (still exactly-once, order
    /// unspecified within `unsorted`).
    pub fn copy(&self, sort: bool) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.main.iter().cloned());
        out.extend(self.nursery.iter().cloned());
        out.extend(self.unsorted.iter().cloned());
        if sort {
            out.sort();
        }
        out
    }

    /// Iterates the set in sorted order over a consistent snapshot. The
    /// caller (the shard mutex, in practice) must have serialized writes
    /// for the duration of iteration.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &T> {
        let mut refs: Vec<&T> = Vec::with_capacity(self.len());
        refs.extend(self.main.iter());
        refs.extend(self.nursery.iter());
        refs.extend(self.unsorted.iter());
        refs.sort();
        refs.into_iter()
    }

    fn flush_unsorted(&mut self) {
        let mut batch = std::mem::take(&mut self.unsorted);
        batch.sort();
        dedup_keep_last(&mut batch);

        merge_into(&mut self.nursery, batch);

        if self.nursery.len() > self.max_nursery {
            self.flush_nursery();
        }
    }

    fn flush_nursery(&mut self) {
        let batch = std::mem::take(&mut self.nursery);
        merge_into(&mut self.main, batch);
    }
}

/// Collapses runs of adjacent equal elements (post-sort) to their last
/// occurrence, matching the set's "newest write wins" replace semantics.
fn dedup_keep_last<T: Eq>(v: &mut Vec<T>) {
    let mut out: Vec<T> = Vec::with_capacity(v.len());
    for item in v.drain(..) {
        match out.last_mut() {
            Some(last) if *last == item => *last = item,
            _ => out.push(item),
        }
    }
    *v = out;
}

/// Two-way merges `incoming` into `target` (both sorted). On an id
/// collision — which the call sites above prevent by construction, since
/// every id lives in exactly one zone at a time — `incoming` wins, since
/// it is the more recently written copy.
fn merge_into<T: Ord>(target: &mut Vec<T>, incoming: Vec<T>) {
    let mut merged = Vec::with_capacity(target.len() + incoming.len());
    let mut existing = std::mem::take(target).into_iter().peekable();
    let mut incoming = incoming.into_iter().peekable();

    loop {
        match (existing.peek(), incoming.peek()) {
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Less => merged.push(existing.next().unwrap()),
                Ordering::Greater => merged.push(incoming.next().unwrap()),
                Ordering::Equal => {
                    existing.next();
                    merged.push(incoming.next().unwrap());
                }
            },
            (Some(_), None) => merged.push(existing.next().unwrap()),
            (None, Some(_)) => merged.push(incoming.next().unwrap()),
            (None, None) => break,
        }
    }

    *target = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(max_unsorted: usize, max_nursery: usize) -> LazyFlatSet<i32> {
        LazyFlatSet::new(max_unsorted, max_nursery)
    }

    #[test]
    fn insert_then_erase_returns_to_prior_contents() {
        let mut s = set(4, 8);
        for v in [5, 1, 9, 2, 7] {
            s.insert(v);
        }
        let before = s.copy(true);
        s.insert(100);
        s.erase(&100);
        assert_eq!(s.copy(true), before);
    }

    #[test]
    fn sorted_materialization_is_insertion_order_invariant() {
        let mut ascending = set(3, 6);
        for v in 0..20 {
            ascending.insert(v);
        }
        let mut descending = set(3, 6);
        for v in (0..20).rev() {
            descending.insert(v);
        }
        let mut shuffled_order = vec![7, 2, 19, 0, 14, 3, 18, 1, 5, 6, 4, 8, 9, 10, 11, 12, 13, 15, 16, 17];
        let mut shuffled = set(3, 6);
        for v in shuffled_order.drain(..) {
            shuffled.insert(v);
        }

        let expected: Vec<i32> = (0..20).collect();
        assert_eq!(ascending.copy(true), expected);
        assert_eq!(descending.copy(true), expected);
        assert_eq!(shuffled.copy(true), expected);
    }

    #[test]
    fn replacing_by_equal_value_keeps_set_size() {
        #[derive(Debug, Clone)]
        struct Kv(i32, i32);
        impl PartialEq for Kv {
            fn eq(&self, o: &Self) -> bool {
                self.0 == o.0
            }
        }
        impl Eq for Kv {}
        impl PartialOrd for Kv {
            fn partial_cmp(&self, o: &Self) -> Option<Ordering> {
                Some(self.cmp(o))
            }
        }
        impl Ord for Kv {
            fn cmp(&self, o: &Self) -> Ordering {
                self.0.cmp(&o.0)
            }
        }

        let mut s: LazyFlatSet<Kv> = set(2, 4);
        s.insert(Kv(1, 100));
        s.insert(Kv(1, 200));
        s.insert(Kv(1, 300));
        assert_eq!(s.len(), 1);
        let out = s.copy(true);
        assert_eq!(out[0].1, 300);
    }

    #[test]
    fn max_unsorted_zero_behaves_like_a_plain_sorted_set() {
        let mut s = set(0, 0);
        for v in [4, 2, 8, 1, 3] {
            s.insert(v);
        }
        assert_eq!(s.copy(true), vec![1, 2, 3, 4, 8]);
    }

    #[test]
    fn find_by_locates_values_across_all_zones() {
        let mut s = set(1, 2);
        for v in 0..10 {
            s.insert(v);
        }
        for target in 0..10 {
            let found = s.find_by(|x| x.cmp(&target));
            assert_eq!(found, Some(&target));
        }
        assert_eq!(s.find_by(|x| x.cmp(&99)), None);
    }

    #[test]
    fn erase_on_missing_value_is_a_no_op() {
        let mut s = set(2, 4);
        s.insert(1);
        assert_eq!(s.erase(&42), 0);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn copy_unsorted_still_contains_every_element_exactly_once() {
        let mut s = set(2, 4);
        for v in [9, 1, 5, 3, 7, 2, 8, 6, 4, 0] {
            s.insert(v);
        }
        let mut out = s.copy(false);
        out.sort();
        assert_eq!(out, (0..10).collect::<Vec<_>>());
    }
}
