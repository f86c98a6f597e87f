//! Re-export of the public api of lshbox.
pub use crate::{
    error::{Error, Result},
    eval::Benchmark,
    lsh::{
        dbq::{DbqLsh, DbqParam},
        itq::{ItqLsh, ItqParam},
        kdbq::{KdbqLsh, KdbqParam},
        psd::{PsdLsh, PsdParam, StableKind},
        rbs::{RbsLsh, RbsParam},
        rhp::{RhpLsh, RhpParam},
        sh::{ShLsh, ShParam},
        th::{ThLsh, ThParam},
        HashIndex,
    },
    matrix::{Accessor, Matrix},
    metric::{Metric, MetricKind},
    topk::{Neighbor, Scanner, TopK},
    utils::create_rng,
};
