#![cfg(test)]
use crate::data::Element;
use crate::prelude::*;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::path::Path;

fn gaussian_matrix(size: usize, dim: usize, seed: u64) -> Matrix<f32> {
    let mut rng = create_rng(seed);
    let data: Vec<f32> = (0..size * dim).map(|_| StandardNormal.sample(&mut rng)).collect();
    Matrix::from_vec(data, size, dim).unwrap()
}

fn unsigned_matrix(size: usize, dim: usize, c: u32, seed: u64) -> Matrix<u32> {
    let mut rng = create_rng(seed);
    let data: Vec<u32> = (0..size * dim).map(|_| rng.gen_range(0..c)).collect();
    Matrix::from_vec(data, size, dim).unwrap()
}

fn query_results<T: Element, I: HashIndex<T>>(
    index: &I,
    data: &Matrix<T>,
    metric: Metric,
    k: usize,
    queries: &[u32],
) -> Vec<Vec<(u32, f32)>> {
    let mut scanner = Scanner::new(data.accessor(), metric, k);
    queries
        .iter()
        .map(|&q| {
            index.query(data.row(q), &mut scanner);
            scanner.topk().topk().iter().map(|n| (n.id, n.dist)).collect()
        })
        .collect()
}

/// Save, load into a fresh index, and require identical results on a
/// handful of queries.
fn assert_roundtrip<T, I>(index: &I, fresh: &mut I, data: &Matrix<T>, metric: Metric, dir: &Path)
where
    T: Element,
    I: HashIndex<T>,
{
    let queries = [0u32, 3, 7, 11];
    let path = dir.join("index.bin");
    index.save(&path).unwrap();
    fresh.load(&path).unwrap();
    let before = query_results(index, data, metric, 10, &queries);
    let after = query_results(fresh, data, metric, 10, &queries);
    assert_eq!(before, after);

    // and a second save produces identical bytes
    let path2 = dir.join("index2.bin");
    fresh.save(&path2).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), std::fs::read(&path2).unwrap());
}

#[test]
fn test_rbs_roundtrip() {
    let data = unsigned_matrix(200, 10, 5, 1);
    let param = RbsParam { m: 521, l: 5, d: 10, n: 20, c: 5 };
    let mut index = RbsLsh::new(param, 7);
    index.hash(&data).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut fresh = RbsLsh::default();
    assert_roundtrip(&index, &mut fresh, &data, Metric::new(10, MetricKind::L1), dir.path());
}

#[test]
fn test_rhp_roundtrip() {
    let data = gaussian_matrix(200, 16, 2);
    let param = RhpParam { m: 521, l: 5, d: 16, n: 6 };
    let mut index: RhpLsh<f32> = RhpLsh::new(param, 7);
    index.hash(&data).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut fresh = RhpLsh::default();
    assert_roundtrip(&index, &mut fresh, &data, Metric::new(16, MetricKind::L2), dir.path());
}

#[test]
fn test_th_roundtrip() {
    let data = gaussian_matrix(200, 32, 3);
    let param = ThParam {
        m: 521,
        l: 4,
        d: 32,
        n: 12,
        max: 2.0,
        min: -2.0,
        per_bit_thresholds: false,
    };
    let mut index: ThLsh<f32> = ThLsh::new(param, 7);
    index.hash(&data).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut fresh = ThLsh::default();
    assert_roundtrip(&index, &mut fresh, &data, Metric::new(32, MetricKind::L2), dir.path());
}

#[test]
fn test_psd_roundtrip() {
    let data = gaussian_matrix(200, 16, 4);
    let param = PsdParam {
        m: 521,
        l: 5,
        d: 16,
        kind: StableKind::Gaussian,
        w: 0.5,
    };
    let mut index: PsdLsh<f32> = PsdLsh::new(param, 7);
    index.hash(&data).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut fresh = PsdLsh::default();
    assert_roundtrip(&index, &mut fresh, &data, Metric::new(16, MetricKind::L2), dir.path());
}

#[test]
fn test_sh_roundtrip() {
    let data = gaussian_matrix(300, 8, 5);
    let param = ShParam { m: 127, l: 2, d: 8, n: 4, s: 100 };
    let mut index: ShLsh<f32> = ShLsh::new(param, 7);
    index.train(&data).unwrap();
    index.hash(&data).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut fresh = ShLsh::default();
    assert_roundtrip(&index, &mut fresh, &data, Metric::new(8, MetricKind::L2), dir.path());
}

#[test]
fn test_itq_roundtrip() {
    let data = gaussian_matrix(300, 8, 6);
    let param = ItqParam { m: 127, l: 2, d: 8, n: 4, i: 20 };
    let mut index: ItqLsh<f32> = ItqLsh::new(param, 7);
    index.train(&data).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut fresh = ItqLsh::default();
    assert_roundtrip(&index, &mut fresh, &data, Metric::new(8, MetricKind::L2), dir.path());
}

#[test]
fn test_dbq_roundtrip() {
    let data = gaussian_matrix(300, 8, 7);
    let param = DbqParam { m: 127, l: 2, d: 8, n: 4, i: 20 };
    let mut index: DbqLsh<f32> = DbqLsh::new(param, 7);
    index.train(&data).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut fresh = DbqLsh::default();
    assert_roundtrip(&index, &mut fresh, &data, Metric::new(8, MetricKind::L2), dir.path());
}

#[test]
fn test_kdbq_roundtrip() {
    let data = gaussian_matrix(300, 8, 8);
    let param = KdbqParam { m: 127, l: 2, d: 8, n: 4, i: 20 };
    let mut index: KdbqLsh<f32> = KdbqLsh::new(param, 7);
    index.train(&data).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut fresh = KdbqLsh::default();
    assert_roundtrip(&index, &mut fresh, &data, Metric::new(8, MetricKind::L2), dir.path());
}

#[test]
fn test_fixed_seed_persists_identically() {
    let data = unsigned_matrix(100, 10, 5, 9);
    let param = RbsParam { m: 521, l: 5, d: 10, n: 20, c: 5 };
    let dir = tempfile::tempdir().unwrap();
    let paths = [dir.path().join("a.bin"), dir.path().join("b.bin")];
    for path in &paths {
        let mut index = RbsLsh::new(param, 1234);
        index.hash(&data).unwrap();
        index.save(path).unwrap();
    }
    assert_eq!(
        std::fs::read(&paths[0]).unwrap(),
        std::fs::read(&paths[1]).unwrap()
    );
}

#[test]
fn test_scanner_counts_distinct_candidates_once() {
    // every row identical: all rows collide in every table, so the
    // distinct candidate set is the whole dataset even though each id is
    // produced L times
    let data = Matrix::from_vec(vec![1.0f32; 50 * 4], 50, 4).unwrap();
    let param = RhpParam { m: 97, l: 6, d: 4, n: 4 };
    let mut index: RhpLsh<f32> = RhpLsh::new(param, 3);
    index.hash(&data).unwrap();
    let mut scanner = Scanner::new(data.accessor(), Metric::new(4, MetricKind::L2), 5);
    index.query(data.row(0), &mut scanner);
    assert_eq!(scanner.cnt(), 50);
}

#[test]
fn test_query_finds_itself() {
    let data = unsigned_matrix(500, 10, 5, 12);
    let param = RbsParam { m: 521, l: 5, d: 10, n: 20, c: 5 };
    let mut index = RbsLsh::new(param, 5);
    index.hash(&data).unwrap();
    let mut scanner = Scanner::new(data.accessor(), Metric::new(10, MetricKind::L1), 10);
    index.query(data.row(42), &mut scanner);
    let first = &scanner.topk().topk()[0];
    assert_eq!(first.id, 42);
    assert_eq!(first.dist, 0.0);
}

#[test]
fn test_sh_near_duplicate_query_returns_original() {
    let data = gaussian_matrix(400, 8, 21);
    let param = ShParam { m: 127, l: 3, d: 8, n: 4, s: 120 };
    let mut index: ShLsh<f32> = ShLsh::new(param, 11);
    index.train(&data).unwrap();
    index.hash(&data).unwrap();

    let target = 33u32;
    let x = data.row(target).to_vec();
    // largest perturbation that leaves every table's bit pattern intact
    let mut perturbed = x.clone();
    for &eps in &[1e-3f32, 1e-5, 1e-7, 0.0] {
        let candidate: Vec<f32> = x.iter().map(|v| v + eps).collect();
        if (0..3).all(|k| index.hash_key(k, &candidate) == index.hash_key(k, &x)) {
            perturbed = candidate;
            break;
        }
    }
    let mut scanner = Scanner::new(data.accessor(), Metric::new(8, MetricKind::L2), 10);
    index.query(&perturbed, &mut scanner);
    assert!(scanner.topk().topk().iter().any(|n| n.id == target));
}

#[test]
fn test_more_tables_do_not_hurt_recall() {
    let k = 10;
    let mean_recall = |l: u32| {
        let mut total = 0.0f32;
        let mut runs = 0;
        for seed in 1..=5u64 {
            let data = unsigned_matrix(400, 10, 5, seed);
            let metric = Metric::new(10, MetricKind::L1);
            let param = RbsParam { m: 521, l, d: 10, n: 20, c: 5 };
            let mut index = RbsLsh::new(param, seed + 100);
            index.hash(&data).unwrap();
            let mut scanner = Scanner::new(data.accessor(), metric, k);
            for q in (0..400u32).step_by(20) {
                // exact answers by linear scan, excluding the query itself
                let mut ground = TopK::new(k);
                for id in 0..400u32 {
                    if id != q {
                        ground.push(id, metric.dist(data.row(q), data.row(id)));
                    }
                }
                ground.gen_topk();
                index.query(data.row(q), &mut scanner);
                total += scanner.topk().recall(&ground);
                runs += 1;
            }
        }
        total / runs as f32
    };
    let few = mean_recall(1);
    let many = mean_recall(8);
    assert!(
        many + 0.05 >= few,
        "recall dropped with more tables: {} -> {}",
        few,
        many
    );
}

#[test]
fn test_linear_scan_ground_truth_sanity() {
    let data = gaussian_matrix(200, 6, 17);
    let metric = Metric::new(6, MetricKind::L2);
    let q = 5u32;
    let mut ground = TopK::new(20);
    for id in 0..200u32 {
        if id != q {
            ground.push(id, metric.dist(data.row(q), data.row(id)));
        }
    }
    ground.gen_topk();
    let list = ground.topk();
    assert_eq!(list.len(), 20);
    assert!(list.iter().all(|n| n.id != q));
    assert!(list.windows(2).all(|w| w[0].dist <= w[1].dist));
}
