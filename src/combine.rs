//!
//! Independent-to-joint responsibilities
//!
//! Two per-sample class probability matrices over the same sites are combined into
//! the joint distribution under independence of the samples,
//! `J[r, i * b + j] = A[r, i] * B[r, j]`.
//!
//! The product is taken in log space:
//!
//! ```text
//! log J[r, i * b + j] = log A[r, i] + log B[r, j]
//! ```
//!
use crate::common::Responsibilities;
use anyhow::{ensure, Result};
use ndarray::{concatenate, ArrayView2, Axis};

///
/// Joint `(n x a*b)` responsibilities of `a: (n x a)` (first sample) and `b: (n x b)`.
///
pub fn joint_responsibilities(a: ArrayView2<f64>, b: ArrayView2<f64>) -> Result<Responsibilities> {
    ensure!(
        a.nrows() == b.nrows(),
        "cannot combine responsibilities of {} and {} rows",
        a.nrows(),
        b.nrows()
    );
    let log_a = a.mapv(f64::ln);
    let log_b = b.mapv(f64::ln);

    let blocks: Vec<_> = log_a
        .axis_iter(Axis(1))
        .map(|column| &log_b + &column.insert_axis(Axis(1)))
        .collect();
    let views: Vec<_> = blocks.iter().map(|block| block.view()).collect();

    let log_joint = if views.is_empty() {
        log_b.slice_move(ndarray::s![.., 0..0])
    } else {
        concatenate(Axis(1), &views)?
    };
    Ok(log_joint.mapv(f64::exp))
}

//
// tests
//
