//! Monotonic-shape constraint on a spanwise design variable.
//!
//! Applies the decrease-root-to-tip rule used for chord / twist / thickness
//! distributions.  Spanwise arrays follow the mesh convention: a symmetric
//! half-wing runs tip → root, a full wing runs left tip → root → right tip.
//! The output is the vector of consecutive differences, sign-adjusted per
//! half so that `output[i] ≤ 0` reads "the variable does not grow moving
//! root → tip" on every side of the wing.

use crate::types::{
    ConstraintEvaluator, IoSpec, PartialBlock, PortSpec, SpanMode, SparsityPattern,
    SurfaceDescriptor, WingconError,
};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────
//  Configuration record
// ─────────────────────────────────────────────────────────────

/// Caller-side configuration for [`MonotonicityEvaluator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonotonicConfig {
    /// Name of the spanwise variable to constrain (chord, twist, ...).
    /// The semantics are opaque here; the name only labels the ports.
    pub var_name: String,
    /// Number of spanwise values N (N ≥ 2).
    pub size: usize,
}

// ─────────────────────────────────────────────────────────────
//  Evaluator
// ─────────────────────────────────────────────────────────────

/// Consecutive-difference monotonicity measure with a constant banded
/// Jacobian, built once per configuration.
///
/// Every evaluation is a pure function of the input vector; the instance
/// itself never mutates after [`configure`](Self::configure).
#[derive(Debug, Clone)]
pub struct MonotonicityEvaluator {
    var_name: String,
    con_name: String,
    mode: SpanMode,
    /// Per-row sign of the difference operator (the tipward half of a full
    /// wing is negated).  Read by both the baked coefficients and the
    /// forward pass.
    row_signs: Vec<f64>,
    io: IoSpec,
    pattern: SparsityPattern,
}

impl MonotonicityEvaluator {
    /// One-time configuration: validates inputs, registers the ports and
    /// bakes the ±1 coefficient pattern.
    ///
    /// Output row `i` depends on input columns `i` and `i + 1` with
    /// coefficients `+s_i` and `−s_i`, two triplets per row in row-major
    /// order.  For a full wing `s_i` flips to −1 from row `(N−1)/2` on;
    /// that single row rule covers both the even-N and odd-N placements of
    /// the flip boundary.
    pub fn configure(
        config: &MonotonicConfig,
        surface: &SurfaceDescriptor,
    ) -> Result<Self, WingconError> {
        if config.var_name.is_empty() {
            return Err(WingconError::Config("var_name must not be empty".into()));
        }
        if config.size < 2 {
            return Err(WingconError::Config(format!(
                "need at least 2 spanwise values to difference, got size = {}",
                config.size,
            )));
        }
        surface.validate()?;

        let size_in = config.size;
        let size_out = size_in - 1;
        let mode = SpanMode::from_surface(surface.symmetry, size_in);
        let row_signs: Vec<f64> = (0..size_out).map(|i| mode.row_sign(i)).collect();

        let mut rows = Vec::with_capacity(2 * size_out);
        let mut cols = Vec::with_capacity(2 * size_out);
        let mut coeffs = Vec::with_capacity(2 * size_out);
        for (i, &sign) in row_signs.iter().enumerate() {
            rows.push(i);
            cols.push(i);
            coeffs.push(sign);
            rows.push(i);
            cols.push(i + 1);
            coeffs.push(-sign);
        }

        let con_name = format!("monotonic_{}", config.var_name);

        let io = IoSpec {
            inputs: vec![PortSpec {
                name: config.var_name.clone(),
                len: size_in,
                units: None,
                default: None,
            }],
            output: PortSpec {
                name: con_name.clone(),
                len: size_out,
                units: None,
                default: None,
            },
        };

        let pattern = SparsityPattern {
            blocks: vec![PartialBlock {
                of: con_name.clone(),
                wrt: config.var_name.clone(),
                shape: (size_out, size_in),
                rows,
                cols,
                constant: Some(coeffs),
            }],
        };

        Ok(Self {
            var_name: config.var_name.clone(),
            con_name,
            mode,
            row_signs,
            io,
            pattern,
        })
    }

    /// Name of the constrained variable (also the input port name).
    pub fn var_name(&self) -> &str {
        &self.var_name
    }

    /// Output port name, `monotonic_<var_name>`.
    pub fn con_name(&self) -> &str {
        &self.con_name
    }

    /// Spanwise mode selected at configuration time.
    pub fn mode(&self) -> SpanMode {
        self.mode
    }
}

impl ConstraintEvaluator for MonotonicityEvaluator {
    fn io(&self) -> &IoSpec {
        &self.io
    }

    fn sparsity(&self) -> &SparsityPattern {
        &self.pattern
    }

    /// `output[i] = s_i · (x[i] − x[i+1])`.
    fn evaluate(&self, inputs: &[&[f64]], output: &mut [f64]) -> Result<(), WingconError> {
        self.io.check_inputs(inputs)?;
        self.io.check_output(output)?;
        let x = inputs[0];
        for (i, out) in output.iter_mut().enumerate() {
            *out = self.row_signs[i] * (x[i] - x[i + 1]);
        }
        Ok(())
    }

    /// The Jacobian is constant: copy the coefficients baked at
    /// configuration time.
    fn derive(&self, inputs: &[&[f64]], values: &mut [f64]) -> Result<(), WingconError> {
        self.io.check_inputs(inputs)?;
        self.pattern.write_constants(values)
    }
}
