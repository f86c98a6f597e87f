//! Top-K data structures: the bounded result heap and the query scanner.
use crate::data::Element;
use crate::matrix::Accessor;
use crate::metric::Metric;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A scanned candidate: dataset id and exact distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub id: u32,
    pub dist: f32,
    /// Push sequence number; ties on distance keep the first-seen entry.
    seq: u32,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist.total_cmp(&other.dist).then(self.seq.cmp(&other.seq))
    }
}

/// At most `k` nearest candidates, kept in a max-heap keyed by distance.
///
/// `push` entries while scanning, then [`gen_topk`](TopK::gen_topk) once to
/// turn the heap into a distance-ascending list.
#[derive(Debug, Clone, Default)]
pub struct TopK {
    k: usize,
    seq: u32,
    heap: BinaryHeap<Neighbor>,
    list: Vec<Neighbor>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        TopK {
            k,
            seq: 0,
            heap: BinaryHeap::with_capacity(k + 1),
            list: Vec::new(),
        }
    }

    pub fn reset(&mut self, k: usize) {
        self.k = k;
        self.seq = 0;
        self.heap.clear();
        self.list.clear();
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.heap.len().max(self.list.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offer a candidate. Kept if the heap is under capacity or the
    /// distance is strictly smaller than the current maximum.
    pub fn push(&mut self, id: u32, dist: f32) {
        if self.k == 0 {
            return;
        }
        let n = Neighbor {
            id,
            dist,
            seq: self.seq,
        };
        self.seq += 1;
        if self.heap.len() < self.k {
            self.heap.push(n);
        } else if dist < self.max_dist() {
            self.heap.pop();
            self.heap.push(n);
        }
    }

    /// The largest distance currently kept.
    ///
    /// # Panics
    ///
    /// Panics if nothing has been pushed; asking an empty heap for its
    /// maximum is a programming error.
    pub fn max_dist(&self) -> f32 {
        self.heap.peek().expect("max_dist on empty TopK").dist
    }

    /// Drain the heap into the distance-ascending result list.
    pub fn gen_topk(&mut self) {
        self.list.extend(self.heap.drain());
        self.list.sort_unstable();
    }

    /// The finalized results, ascending by distance.
    pub fn topk(&self) -> &[Neighbor] {
        &self.list
    }

    /// Fraction of `ground` ids present here, Laplace-smoothed as
    /// `(matched + 1) / (k + 1)`.
    pub fn recall(&self, ground: &TopK) -> f32 {
        let matched = self
            .list
            .iter()
            .filter(|n| ground.list.iter().any(|g| g.id == n.id))
            .count();
        (matched + 1) as f32 / (self.k + 1) as f32
    }
}

/// Scans candidate ids for one query: dedups, computes the exact distance
/// and maintains the [`TopK`]. This is the object passed into the index
/// query interface.
#[derive(Debug)]
pub struct Scanner<'a, T: Element> {
    accessor: Accessor<'a, T>,
    metric: Metric,
    k: usize,
    topk: TopK,
    query: Vec<T>,
    cnt: u32,
}

impl<'a, T: Element> Scanner<'a, T> {
    pub fn new(accessor: Accessor<'a, T>, metric: Metric, k: usize) -> Self {
        Scanner {
            accessor,
            metric,
            k,
            topk: TopK::new(k),
            query: Vec::new(),
            cnt: 0,
        }
    }

    /// Prepare for a new query. Must be invoked before each query.
    pub fn reset(&mut self, query: &[T]) {
        self.query.clear();
        self.query.extend_from_slice(query);
        self.accessor.reset();
        self.topk.reset(self.k);
        self.cnt = 0;
    }

    /// Consider a candidate id. Each distinct id costs exactly one
    /// distance computation per query.
    pub fn visit(&mut self, id: u32) {
        if self.accessor.mark(id) {
            self.cnt += 1;
            let dist = self.metric.dist(&self.query, self.accessor.vec(id));
            self.topk.push(id, dist);
        }
    }

    /// Number of distinct ids visited for the current query.
    pub fn cnt(&self) -> u32 {
        self.cnt
    }

    pub fn topk(&self) -> &TopK {
        &self.topk
    }

    pub fn topk_mut(&mut self) -> &mut TopK {
        &mut self.topk
    }
}
