use thiserror::Error;

/// Errors raised while turning frequency-domain coefficients into
/// time-domain models.
#[derive(Error, Debug)]
pub enum BemError {
    /// Grid or kernel too short for the requested operation.
    #[error("insufficient data: need at least {needed} samples, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Grid is not strictly monotonic.
    #[error("frequency grid is not strictly monotonic at index {index}")]
    NonMonotonicGrid { index: usize },

    /// Interpolation target lies outside the source grid.
    #[error("value {value} outside interpolation range [{min}, {max}]")]
    OutOfBounds { value: f64, min: f64, max: f64 },

    /// Array dimensions disagree.
    #[error("shape mismatch for {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Kernel is zero after removing its mean, so no fit quality exists.
    #[error("degenerate coefficient: kernel has zero variation")]
    DegenerateCoefficient,

    /// Requested state-space order outside `[2, max]`.
    #[error("state space order {order} outside [2, {max}]")]
    InvalidOrder { order: usize, max: usize },

    #[error("not implemented: {0}")]
    Unimplemented(&'static str),

    /// Bilinear transform could not invert `dt/2 (I + a)`.
    #[error("singular matrix in bilinear transform at order {order}")]
    SingularMatrix { order: usize },

    /// Matrix factorization did not converge.
    #[error("decomposition failed: {0}")]
    Decomposition(String),

    #[error("field `{0}` has not been initialized")]
    UninitializedField(&'static str),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type BemResult<T> = Result<T, BemError>;
