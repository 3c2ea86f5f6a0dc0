//! IRR root finding.

mod irr_solver;

pub use irr_solver::*;
