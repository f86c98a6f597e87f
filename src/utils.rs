use fnv::FnvHashSet;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Seed 0 draws from OS entropy, any other value gives a reproducible
/// stream. Every index family routes its randomness through this.
pub fn create_rng(seed: u64) -> SmallRng {
    if seed == 0 {
        SmallRng::from_entropy()
    } else {
        SmallRng::seed_from_u64(seed)
    }
}

/// Draw `n` pairwise-distinct integers uniformly from `[0, upper)`,
/// in draw order.
pub(crate) fn sample_distinct<R: Rng>(rng: &mut R, n: usize, upper: u32) -> Vec<u32> {
    assert!(n as u64 <= upper as u64);
    let mut seen = FnvHashSet::default();
    let mut out = Vec::with_capacity(n);
    while out.len() != n {
        let target = rng.gen_range(0..upper);
        if seen.insert(target) {
            out.push(target);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sample_distinct() {
        let mut rng = create_rng(1);
        let ids = sample_distinct(&mut rng, 100, 100);
        let set: FnvHashSet<u32> = ids.iter().copied().collect();
        assert_eq!(set.len(), 100);
        assert!(ids.iter().all(|&i| i < 100));
    }

    #[test]
    fn test_create_rng_deterministic() {
        let a: Vec<u32> = create_rng(7).sample_iter(rand::distributions::Standard).take(8).collect();
        let b: Vec<u32> = create_rng(7).sample_iter(rand::distributions::Standard).take(8).collect();
        assert_eq!(a, b);
    }
}
