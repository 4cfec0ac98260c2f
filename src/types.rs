use ndarray::Array3;
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use std::fmt;
use std::fmt::Debug;

// ─────────────────────────────────────────────────────────────
//  Error type
// ─────────────────────────────────────────────────────────────

/// Unified error type for all fallible operations in the crate.
///
/// Every function in the public API returns `Result<T, WingconError>`
/// instead of panicking.  Malformed configuration fails here, at
/// configuration time; evaluation itself only fails on buffer shapes
/// that contradict the registered ports.
#[derive(Debug)]
pub enum WingconError {
    /// Invalid configuration value (empty variable name, size < 2, ...).
    Config(String),
    /// Shape mismatch in mesh, port, or buffer dimensions.
    Shape(String),
}

impl fmt::Display for WingconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Shape(msg) => write!(f, "shape error: {msg}"),
        }
    }
}

impl std::error::Error for WingconError {}

// ─────────────────────────────────────────────────────────────
//  Surface descriptor  (immutable after construction)
// ─────────────────────────────────────────────────────────────

/// Wing surface description supplied once at configuration time.
///
/// `mesh` holds two chordwise mesh lines × N spanwise stations × xyz.
/// Spanwise indexing follows the mesh convention of the surrounding
/// framework: a symmetric half-wing runs tip → root (the root is the
/// mirror plane at the last station), a full wing runs
/// left tip → root → right tip with the root at the middle station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceDescriptor {
    /// `true` ⇒ the mesh models a half-wing mirrored at the root.
    pub symmetry: bool,
    /// 2 × N × 3 mesh coordinates.
    pub mesh: Array3<f64>,
}

impl SurfaceDescriptor {
    /// Number of spanwise stations N.
    pub fn span_stations(&self) -> usize {
        self.mesh.shape()[1]
    }

    /// Shape check: mesh must be 2 × N × 3 with N ≥ 2.  Evaluator
    /// constructors call this so malformed descriptors fail at
    /// configuration time, never during evaluation.
    pub fn validate(&self) -> Result<(), WingconError> {
        let shape = self.mesh.shape();
        if shape[0] != 2 || shape[2] != 3 {
            return Err(WingconError::Shape(format!(
                "mesh must be 2 x N x 3, got {} x {} x {}",
                shape[0], shape[1], shape[2],
            )));
        }
        if shape[1] < 2 {
            return Err(WingconError::Shape(format!(
                "mesh needs at least 2 spanwise stations, got {}",
                shape[1],
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
//  Spanwise mode  (chosen once from the symmetry flag)
// ─────────────────────────────────────────────────────────────

/// Spanwise interpretation of a constrained variable, fixed at
/// configuration time from the surface's symmetry flag.
///
/// The variant pins the per-row sign of the difference operator; the baked
/// sparsity coefficients and the forward pass both read that sign, so no
/// symmetry branch runs during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanMode {
    /// Half-wing mirrored at the root: the variable must not grow moving
    /// root → tip, which in tip → root index order means differences ≤ 0.
    SymmetricHalfWing,
    /// Full wing with the root at the middle station: the variable must
    /// not grow moving outboard on either side.  `flip_row` is the first
    /// output row whose difference is negated (the rootward boundary of
    /// the right half).
    FullWingSplit { flip_row: usize },
}

impl SpanMode {
    /// Select the variant for an input of length `size_in`.
    pub fn from_surface(symmetry: bool, size_in: usize) -> Self {
        if symmetry {
            Self::SymmetricHalfWing
        } else {
            Self::FullWingSplit {
                flip_row: (size_in - 1) / 2,
            }
        }
    }

    /// Sign applied to output row `row` of the difference operator.
    pub fn row_sign(&self, row: usize) -> f64 {
        match self {
            Self::SymmetricHalfWing => 1.0,
            Self::FullWingSplit { flip_row } => {
                if row < *flip_row {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Port registration
// ─────────────────────────────────────────────────────────────

/// One registered port: flattened length plus the metadata a host uses to
/// seed and label it.
#[derive(Debug, Clone)]
pub struct PortSpec {
    pub name: String,
    /// Flattened length of the port value.
    pub len: usize,
    /// Unit label, if the quantity is dimensional.
    pub units: Option<&'static str>,
    /// Value the host seeds an unconnected port with.  `None` means zeros.
    pub default: Option<Vec<f64>>,
}

impl PortSpec {
    /// Materialise the seed value (zeros unless a default was registered).
    pub fn seed(&self) -> Vec<f64> {
        match &self.default {
            Some(v) => v.clone(),
            None => vec![0.0; self.len],
        }
    }
}

/// Full port registration produced by a one-time configuration step.
/// Input buffers bind positionally in `inputs` order.
#[derive(Debug, Clone)]
pub struct IoSpec {
    pub inputs: Vec<PortSpec>,
    pub output: PortSpec,
}

impl IoSpec {
    /// Look up an input port by name.
    pub fn input(&self, name: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Check host-bound input buffers against the registered ports.
    pub fn check_inputs(&self, inputs: &[&[f64]]) -> Result<(), WingconError> {
        if inputs.len() != self.inputs.len() {
            return Err(WingconError::Shape(format!(
                "expected {} input buffers, got {}",
                self.inputs.len(),
                inputs.len(),
            )));
        }
        for (spec, buf) in self.inputs.iter().zip(inputs) {
            if buf.len() != spec.len {
                return Err(WingconError::Shape(format!(
                    "input '{}' expects length {}, got {}",
                    spec.name,
                    spec.len,
                    buf.len(),
                )));
            }
        }
        Ok(())
    }

    /// Check the host-bound output buffer length.
    pub fn check_output(&self, output: &[f64]) -> Result<(), WingconError> {
        if output.len() != self.output.len {
            return Err(WingconError::Shape(format!(
                "output '{}' expects length {}, got {}",
                self.output.name,
                self.output.len,
                output.len(),
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
//  Sparse Jacobian layout  (fixed at configuration time)
// ─────────────────────────────────────────────────────────────

/// One (output port, input port) Jacobian block in coordinate form.
///
/// `rows` index the output port, `cols` the flattened input port; both
/// arrays and `shape` never change after configuration.  `constant` holds
/// the values of a block that is input-independent; `None` marks a block
/// whose values `derive` recomputes on every call.
#[derive(Debug, Clone)]
pub struct PartialBlock {
    /// Output port this block differentiates.
    pub of: String,
    /// Input port this block differentiates with respect to.
    pub wrt: String,
    /// Dense shape: (output length, flattened input length).
    pub shape: (usize, usize),
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub constant: Option<Vec<f64>>,
}

impl PartialBlock {
    /// Number of declared nonzeros.
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    /// Assemble the block as a CSC matrix from values in triplet order.
    pub fn to_csc(&self, values: &[f64]) -> Result<CsMat<f64>, WingconError> {
        if values.len() != self.nnz() {
            return Err(WingconError::Shape(format!(
                "block d({})/d({}) declares {} entries, got {} values",
                self.of,
                self.wrt,
                self.nnz(),
                values.len(),
            )));
        }
        let mut tri = TriMat::new(self.shape);
        for ((&r, &c), &v) in self.rows.iter().zip(&self.cols).zip(values) {
            tri.add_triplet(r, c, v);
        }
        Ok(tri.to_csc())
    }
}

/// Fixed Jacobian sparsity of a configured evaluator: one coordinate block
/// per (output, input) pair, in declaration order.  A flat values buffer of
/// length `nnz()` covers the blocks back to back in that order.
#[derive(Debug, Clone)]
pub struct SparsityPattern {
    pub blocks: Vec<PartialBlock>,
}

impl SparsityPattern {
    /// Total nonzero count across all blocks.
    pub fn nnz(&self) -> usize {
        self.blocks.iter().map(|b| b.nnz()).sum()
    }

    /// Block differentiating with respect to the named input, if declared.
    pub fn block(&self, wrt: &str) -> Option<&PartialBlock> {
        self.blocks.iter().find(|b| b.wrt == wrt)
    }

    /// Slice of a flat values buffer belonging to the named block.
    pub fn values_of<'a>(&self, wrt: &str, values: &'a [f64]) -> Option<&'a [f64]> {
        let mut offset = 0;
        for b in &self.blocks {
            if b.wrt == wrt {
                return values.get(offset..offset + b.nnz());
            }
            offset += b.nnz();
        }
        None
    }

    /// Write all configuration-time constants into a flat values buffer.
    /// Cells of input-dependent blocks are zeroed for the caller to
    /// overwrite.
    pub fn write_constants(&self, values: &mut [f64]) -> Result<(), WingconError> {
        if values.len() != self.nnz() {
            return Err(WingconError::Shape(format!(
                "jacobian values buffer expects length {}, got {}",
                self.nnz(),
                values.len(),
            )));
        }
        values.fill(0.0);
        let mut offset = 0;
        for b in &self.blocks {
            if let Some(constant) = &b.constant {
                values[offset..offset + constant.len()].copy_from_slice(constant);
            }
            offset += b.nnz();
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
//  Evaluator trait  (the contract a host graph drives)
// ─────────────────────────────────────────────────────────────

/// Contract between a configured constraint evaluator and the host
/// differentiable-computation graph.
///
/// A node is configured once — port shapes and Jacobian sparsity are fixed
/// for its lifetime — then `evaluate` and `derive` run repeatedly as the
/// optimiser iterates.  Input buffers bind positionally in `io().inputs`
/// order; `derive` writes Jacobian values in `sparsity()` triplet order.
/// Calls take `&self` and keep scratch state local, so one configured
/// instance may serve concurrent evaluations with distinct buffers.
pub trait ConstraintEvaluator: Debug + Send + Sync {
    /// Registered ports.
    fn io(&self) -> &IoSpec;

    /// Fixed Jacobian sparsity.
    fn sparsity(&self) -> &SparsityPattern;

    /// Forward evaluation: write the constraint vector for `inputs`.
    ///
    /// Numeric domains are not validated; degenerate geometry propagates
    /// as ordinary floats.
    fn evaluate(&self, inputs: &[&[f64]], output: &mut [f64]) -> Result<(), WingconError>;

    /// Jacobian values for `inputs`, flat in pattern order.  Constant
    /// blocks are copies of the configuration-time bake.
    fn derive(&self, inputs: &[&[f64]], values: &mut [f64]) -> Result<(), WingconError>;
}

// ─────────────────────────────────────────────────────────────
//  Feasibility helper
// ─────────────────────────────────────────────────────────────

/// Largest positive entry of a constraint vector.  Zero when the
/// `output ≤ 0` convention is satisfied everywhere.  Enforcing the
/// inequality is the caller's job; this only measures it.
pub fn max_violation(output: &[f64]) -> f64 {
    output.iter().fold(0.0_f64, |m, &g| m.max(g))
}
