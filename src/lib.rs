//! # lshbox-rs
//!
//! Locality-Sensitive Hashing indexes for approximate nearest neighbor
//! search over fixed-dimension numeric vectors under L1 or L2 distance.
//!
//! A dataset is loaded once into a [`Matrix`](matrix::Matrix); an index
//! family hashes every row into `L` bucket tables; a query gathers the
//! matching buckets, and a [`Scanner`](topk::Scanner) reconciles the
//! candidates with exact distances into a bounded
//! [`TopK`](topk::TopK).
//!
//! # Example
//!
//! ```
//! use lshbox::prelude::*;
//!
//! let data = Matrix::from_vec(vec![0.0f32, 0.0, 1.0, 1.0, 10.0, 10.0], 3, 2).unwrap();
//! let param = RhpParam { m: 521, l: 5, d: 2, n: 4 };
//! let mut lsh = RhpLsh::new(param, 1);
//! lsh.hash(&data).unwrap();
//!
//! let metric = Metric::new(2, MetricKind::L2);
//! let mut scanner = Scanner::new(data.accessor(), metric, 2);
//! lsh.query(&[0.1f32, 0.1], &mut scanner);
//! assert!(scanner.topk().topk().len() <= 2);
//! ```
pub mod data;
pub mod error;
pub mod eval;
mod io;
pub mod lsh;
pub mod matrix;
pub mod metric;
pub mod prelude;
pub mod table;
pub mod topk;
pub mod utils;

pub use crate::error::{Error, Result};
pub use crate::lsh::HashIndex;
pub use crate::matrix::Matrix;
pub use crate::metric::{Metric, MetricKind};
pub use crate::topk::{Scanner, TopK};
