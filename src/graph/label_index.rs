//! Label-prefix index over the vertex table.
//!
//! Maps each distinct non-empty vertex label to the ids carrying it, in
//! insertion order. Backed by a `BTreeMap` so prefix lookups are a
//! contiguous range scan in lexicographic order. Maintained incrementally
//! by `Graph::add_vertex` — never rebuilt.

use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Default, Clone)]
pub struct LabelIndex {
    buckets: BTreeMap<String, Vec<i64>>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self { buckets: BTreeMap::new() }
    }

    /// Append `id` to the bucket for `label`, creating the bucket if absent.
    /// Empty labels are never indexed.
    pub fn insert(&mut self, label: &str, id: i64) {
        if label.is_empty() {
            return;
        }
        self.buckets.entry(label.to_string()).or_default().push(id);
    }

    /// Ids under exactly `label`, in insertion order.
    pub fn get(&self, label: &str) -> Option<&[i64]> {
        self.buckets.get(label).map(|v| v.as_slice())
    }

    /// All (label, ids) buckets whose label starts with `prefix`, in
    /// lexicographic label order. An empty prefix iterates every bucket.
    pub fn prefix_iter<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a [i64])> + 'a {
        self.buckets
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(label, _)| label.starts_with(prefix))
            .map(|(label, ids)| (label.as_str(), ids.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_insertion_order() {
        let mut index = LabelIndex::new();
        index.insert("call", 3);
        index.insert("call", 1);
        index.insert("call", 2);
        assert_eq!(index.get("call"), Some(&[3, 1, 2][..]));
    }

    #[test]
    fn test_empty_label_is_not_indexed() {
        let mut index = LabelIndex::new();
        index.insert("", 1);
        assert!(index.is_empty());
    }

    #[test]
    fn test_prefix_iter_is_lexicographic() {
        let mut index = LabelIndex::new();
        index.insert("store", 1);
        index.insert("call", 2);
        index.insert("cast", 3);
        index.insert("catch", 4);

        let labels: Vec<&str> = index.prefix_iter("ca").map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["call", "cast", "catch"]);

        let all: Vec<&str> = index.prefix_iter("").map(|(l, _)| l).collect();
        assert_eq!(all, vec!["call", "cast", "catch", "store"]);
    }

    #[test]
    fn test_prefix_iter_no_match() {
        let mut index = LabelIndex::new();
        index.insert("call", 1);
        assert_eq!(index.prefix_iter("x").count(), 0);
    }
}
