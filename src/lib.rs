//! **wingcon** — spanwise geometric constraint evaluators with hand-coded
//! sparse Jacobians, for gradient-based wing design.
//!
//! Two independent leaf components, configured once and then driven by a
//! host differentiable-computation graph:
//!
//! 1. **Monotonicity** (`monotonic`): a named spanwise variable must not
//!    grow from root to tip; reports sign-adjusted consecutive differences
//!    with a constant ±1 banded Jacobian.
//! 2. **Spar clearance** (`spar`): a tubular spar must fit inside the local
//!    wing thickness; reports the per-segment excess diameter with a
//!    diagonal radius Jacobian, optionally completed with the mesh and
//!    thickness-ratio partials.
//!
//! Shared plumbing (`types`): the error type, port registration records,
//! the coordinate-form sparsity pattern, and the `ConstraintEvaluator`
//! trait the host drives.  Both outputs follow the `value ≤ 0 ⇒ satisfied`
//! convention; attaching the inequality is the caller's job.

pub mod types;
pub mod monotonic;
pub mod spar;
