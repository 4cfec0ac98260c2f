//! Spar-clearance constraint: the tubular spar must fit inside the wing.
//!
//! For every FEM segment the signal is twice the spar radius minus the
//! locally available thickness, approximated as thickness-to-chord ratio
//! times the mean chordwise panel length of the two bracketing stations.
//! `output[i] ≤ 0` means the spar fits at segment i.

use crate::types::{
    ConstraintEvaluator, IoSpec, PartialBlock, PortSpec, SparsityPattern, SurfaceDescriptor,
    WingconError,
};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────
//  Sensitivity mode
// ─────────────────────────────────────────────────────────────

/// Jacobian coverage declared by the spar evaluator.
///
/// The legacy tool declared only the radius partial and left the mesh and
/// thickness-ratio partials undeclared even though both are non-zero,
/// which an optimizer quietly pays for in convergence.  `Complete`
/// finishes the Jacobian; `RadiusOnly` reproduces the legacy coverage for
/// parity runs against that tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensitivityMode {
    /// Declare and compute the mesh, t_over_c and radius partials.
    #[default]
    Complete,
    /// Declare only the constant d(tube_in_wing)/d(radius) diagonal.
    RadiusOnly,
}

// ─────────────────────────────────────────────────────────────
//  Evaluator
// ─────────────────────────────────────────────────────────────

/// Tube-inside-wing clearance with an analytic sparse Jacobian, built once
/// per configuration.
#[derive(Debug, Clone)]
pub struct SparClearanceEvaluator {
    ny: usize,
    mode: SensitivityMode,
    io: IoSpec,
    pattern: SparsityPattern,
}

impl SparClearanceEvaluator {
    /// One-time configuration from the wing surface.  The mesh port seeds
    /// with the surface mesh itself (flattened in C order); the sparsity
    /// blocks depend on the chosen sensitivity mode.
    pub fn configure(
        surface: &SurfaceDescriptor,
        mode: SensitivityMode,
    ) -> Result<Self, WingconError> {
        surface.validate()?;
        let ny = surface.span_stations();
        let n_seg = ny - 1;
        let mesh_len = 2 * ny * 3;

        let io = IoSpec {
            inputs: vec![
                PortSpec {
                    name: "mesh".into(),
                    len: mesh_len,
                    units: Some("m"),
                    default: Some(surface.mesh.iter().copied().collect()),
                },
                PortSpec {
                    name: "t_over_c".into(),
                    len: n_seg,
                    units: None,
                    default: None,
                },
                PortSpec {
                    name: "radius".into(),
                    len: n_seg,
                    units: Some("m"),
                    default: None,
                },
            ],
            output: PortSpec {
                name: "tube_in_wing".into(),
                len: n_seg,
                units: Some("m"),
                default: None,
            },
        };

        // d(tube_in_wing)/d(radius) is the constant diagonal 2.
        let diag: Vec<usize> = (0..n_seg).collect();
        let radius_block = PartialBlock {
            of: "tube_in_wing".into(),
            wrt: "radius".into(),
            shape: (n_seg, n_seg),
            rows: diag.clone(),
            cols: diag.clone(),
            constant: Some(vec![2.0; n_seg]),
        };

        let blocks = match mode {
            SensitivityMode::RadiusOnly => vec![radius_block],
            SensitivityMode::Complete => {
                // Segment i sees the mesh points of stations i and i + 1
                // on both chordwise lines, x and z only: 8 entries per row.
                let mut mesh_rows = Vec::with_capacity(8 * n_seg);
                let mut mesh_cols = Vec::with_capacity(8 * n_seg);
                for i in 0..n_seg {
                    for j in [i, i + 1] {
                        for s in 0..2 {
                            for d in [0, 2] {
                                mesh_rows.push(i);
                                mesh_cols.push(flat_mesh_index(ny, s, j, d));
                            }
                        }
                    }
                }
                let mesh_block = PartialBlock {
                    of: "tube_in_wing".into(),
                    wrt: "mesh".into(),
                    shape: (n_seg, mesh_len),
                    rows: mesh_rows,
                    cols: mesh_cols,
                    constant: None,
                };
                let toc_block = PartialBlock {
                    of: "tube_in_wing".into(),
                    wrt: "t_over_c".into(),
                    shape: (n_seg, n_seg),
                    rows: diag.clone(),
                    cols: diag,
                    constant: None,
                };
                vec![mesh_block, toc_block, radius_block]
            }
        };

        Ok(Self {
            ny,
            mode,
            io,
            pattern: SparsityPattern { blocks },
        })
    }

    /// Sensitivity mode selected at configuration time.
    pub fn mode(&self) -> SensitivityMode {
        self.mode
    }

    /// Number of spanwise stations N.
    pub fn span_stations(&self) -> usize {
        self.ny
    }
}

impl ConstraintEvaluator for SparClearanceEvaluator {
    fn io(&self) -> &IoSpec {
        &self.io
    }

    fn sparsity(&self) -> &SparsityPattern {
        &self.pattern
    }

    /// `output[i] = 2·radius[i] − t_over_c[i] · ½ (c[i] + c[i+1])` where
    /// `c[j]` is the in-plane (x, z) distance between the two chordwise
    /// mesh points at station j.  Degenerate zero-length chords are not
    /// screened; they propagate as ordinary floats.
    fn evaluate(&self, inputs: &[&[f64]], output: &mut [f64]) -> Result<(), WingconError> {
        self.io.check_inputs(inputs)?;
        self.io.check_output(output)?;
        let (mesh, t_over_c, radius) = (inputs[0], inputs[1], inputs[2]);

        let (_, _, mut c_in) = station_chord(mesh, self.ny, 0);
        for (i, out) in output.iter_mut().enumerate() {
            let (_, _, c_out) = station_chord(mesh, self.ny, i + 1);
            *out = 2.0 * radius[i] - t_over_c[i] * 0.5 * (c_in + c_out);
            c_in = c_out;
        }
        Ok(())
    }

    /// Values buffer layout in `Complete` mode: mesh block (8 per row),
    /// then the t_over_c diagonal, then the constant radius diagonal; in
    /// `RadiusOnly` mode just the radius diagonal.
    fn derive(&self, inputs: &[&[f64]], values: &mut [f64]) -> Result<(), WingconError> {
        self.io.check_inputs(inputs)?;
        self.pattern.write_constants(values)?;
        if self.mode == SensitivityMode::RadiusOnly {
            return Ok(());
        }

        let (mesh, t_over_c) = (inputs[0], inputs[1]);
        let n_seg = self.ny - 1;

        let mut inboard = station_chord(mesh, self.ny, 0);
        for i in 0..n_seg {
            let outboard = station_chord(mesh, self.ny, i + 1);
            let scale = -0.5 * t_over_c[i];

            // d(output[i])/d(mesh[s,j,·]) = −½ t/c · dc_j/d(mesh[s,j,·]);
            // the first chordwise line carries +Δ/c, the second −Δ/c.
            let base = 8 * i;
            for (k, &(dx, dz, c)) in [inboard, outboard].iter().enumerate() {
                values[base + 4 * k] = scale * dx / c;
                values[base + 4 * k + 1] = scale * dz / c;
                values[base + 4 * k + 2] = -scale * dx / c;
                values[base + 4 * k + 3] = -scale * dz / c;
            }

            // d(output[i])/d(t_over_c[i]) = −½ (c_i + c_{i+1})
            values[8 * n_seg + i] = -0.5 * (inboard.2 + outboard.2);

            inboard = outboard;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
//  Mesh geometry helpers
// ─────────────────────────────────────────────────────────────

/// Flat index of `mesh[s, j, d]` in C order.
#[inline]
fn flat_mesh_index(ny: usize, s: usize, j: usize, d: usize) -> usize {
    s * ny * 3 + j * 3 + d
}

/// In-plane (x, z) offsets between the two chordwise mesh lines at station
/// `j`, and the resulting panel length.
#[inline]
fn station_chord(mesh: &[f64], ny: usize, j: usize) -> (f64, f64, f64) {
    let fore = j * 3;
    let aft = (ny + j) * 3;
    let dx = mesh[fore] - mesh[aft];
    let dz = mesh[fore + 2] - mesh[aft + 2];
    (dx, dz, (dx * dx + dz * dz).sqrt())
}
