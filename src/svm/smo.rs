//! Sequential minimal optimization for the C-SVC dual problem
//!
//! ```text
//! min  ½ αᵀQα − eᵀα   s.t.  yᵀα = 0,  0 ≤ αᵢ ≤ C,   Qᵢⱼ = yᵢyⱼK(xᵢ, xⱼ)
//! ```
//!
//! Working pairs are chosen by maximal violation with second-order gain over a
//! fully precomputed kernel matrix.

use ndarray::prelude::*;

const TAU: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct DualSolution {
    pub alpha: Vec<f64>,
    pub rho: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl DualSolution {
    /// `αᵢyᵢ` for every training sample.
    pub fn dual_coefficients(&self, y: &[f64]) -> Vec<f64> {
        self.alpha.iter().zip(y).map(|(a, y)| a * y).collect()
    }
}

struct Solver<'a> {
    kernel: ArrayView2<'a, f64>,
    y: &'a [f64],
    c: f64,
    alpha: Vec<f64>,
    gradient: Vec<f64>,
}

impl Solver<'_> {
    #[inline]
    fn q(&self, i: usize, j: usize) -> f64 {
        self.y[i] * self.y[j] * self.kernel[[i, j]]
    }

    fn is_upper_bound(&self, i: usize) -> bool {
        self.alpha[i] >= self.c
    }

    fn is_lower_bound(&self, i: usize) -> bool {
        self.alpha[i] <= 0.0
    }

    fn select_working_set(&self, tolerance: f64) -> Option<(usize, usize)> {
        let n = self.y.len();
        let mut g_max = f64::NEG_INFINITY;
        let mut i = None;
        for t in 0..n {
            if self.y[t] > 0.0 {
                if !self.is_upper_bound(t) && -self.gradient[t] >= g_max {
                    g_max = -self.gradient[t];
                    i = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.gradient[t] >= g_max {
                g_max = self.gradient[t];
                i = Some(t);
            }
        }
        let i = i?;

        let mut g_max2 = f64::NEG_INFINITY;
        let mut obj_diff_min = f64::INFINITY;
        let mut j = None;
        for t in 0..n {
            let (grad_diff, quad_coef) = if self.y[t] > 0.0 {
                if self.is_lower_bound(t) {
                    continue;
                }
                g_max2 = g_max2.max(self.gradient[t]);
                (
                    g_max + self.gradient[t],
                    self.q(i, i) + self.q(t, t) - 2.0 * self.y[i] * self.q(i, t),
                )
            } else {
                if self.is_upper_bound(t) {
                    continue;
                }
                g_max2 = g_max2.max(-self.gradient[t]);
                (
                    g_max - self.gradient[t],
                    self.q(i, i) + self.q(t, t) + 2.0 * self.y[i] * self.q(i, t),
                )
            };
            if grad_diff > 0.0 {
                let obj_diff = -(grad_diff * grad_diff) / quad_coef.max(TAU);
                if obj_diff <= obj_diff_min {
                    obj_diff_min = obj_diff;
                    j = Some(t);
                }
            }
        }

        if g_max + g_max2 < tolerance {
            return None;
        }
        j.map(|j| (i, j))
    }

    fn update_pair(&mut self, i: usize, j: usize) {
        let c = self.c;
        let (old_i, old_j) = (self.alpha[i], self.alpha[j]);
        let (mut ai, mut aj) = (old_i, old_j);

        if self.y[i] != self.y[j] {
            let quad = (self.q(i, i) + self.q(j, j) + 2.0 * self.q(i, j)).max(TAU);
            let delta = (-self.gradient[i] - self.gradient[j]) / quad;
            let diff = ai - aj;
            ai += delta;
            aj += delta;
            if diff > 0.0 {
                if aj < 0.0 {
                    aj = 0.0;
                    ai = diff;
                }
            } else if ai < 0.0 {
                ai = 0.0;
                aj = -diff;
            }
            if diff > 0.0 {
                if ai > c {
                    ai = c;
                    aj = c - diff;
                }
            } else if aj > c {
                aj = c;
                ai = c + diff;
            }
        } else {
            let quad = (self.q(i, i) + self.q(j, j) - 2.0 * self.q(i, j)).max(TAU);
            let delta = (self.gradient[i] - self.gradient[j]) / quad;
            let sum = ai + aj;
            ai -= delta;
            aj += delta;
            if sum > c {
                if ai > c {
                    ai = c;
                    aj = sum - c;
                }
            } else if aj < 0.0 {
                aj = 0.0;
                ai = sum;
            }
            if sum > c {
                if aj > c {
                    aj = c;
                    ai = sum - c;
                }
            } else if ai < 0.0 {
                ai = 0.0;
                aj = sum;
            }
        }

        self.alpha[i] = ai;
        self.alpha[j] = aj;
        let (delta_i, delta_j) = (ai - old_i, aj - old_j);
        for k in 0..self.y.len() {
            self.gradient[k] += self.q(i, k) * delta_i + self.q(j, k) * delta_j;
        }
    }

    fn rho(&self) -> f64 {
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;
        let mut free = 0usize;
        let mut free_sum = 0.0;
        for t in 0..self.y.len() {
            let yg = self.y[t] * self.gradient[t];
            if self.is_upper_bound(t) {
                if self.y[t] < 0.0 {
                    upper = upper.min(yg);
                } else {
                    lower = lower.max(yg);
                }
            } else if self.is_lower_bound(t) {
                if self.y[t] > 0.0 {
                    upper = upper.min(yg);
                } else {
                    lower = lower.max(yg);
                }
            } else {
                free += 1;
                free_sum += yg;
            }
        }
        if free > 0 {
            free_sum / free as f64
        } else {
            (upper + lower) / 2.0
        }
    }
}

/// Solve the dual over a precomputed kernel matrix; `y` holds ±1 labels.
pub fn solve(
    kernel: ArrayView2<f64>,
    y: &[f64],
    c: f64,
    tolerance: f64,
    max_iterations: usize,
) -> DualSolution {
    let n = y.len();
    debug_assert_eq!(kernel.dim(), (n, n));
    let mut solver = Solver {
        kernel: kernel.reborrow(),
        y,
        c,
        alpha: vec![0.0; n],
        gradient: vec![-1.0; n],
    };

    let mut iterations = 0;
    let mut converged = false;
    while iterations < max_iterations {
        match solver.select_working_set(tolerance) {
            Some((i, j)) => solver.update_pair(i, j),
            None => {
                converged = true;
                break;
            }
        }
        iterations += 1;
    }

    let rho = solver.rho();
    DualSolution {
        alpha: solver.alpha,
        rho,
        iterations,
        converged,
    }
}
