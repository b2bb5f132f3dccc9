use thiserror::Error;

/// Errors raised while fitting
///
/// `InsufficientData` and `FitConvergenceFailure` never leave the robust Gaussian estimator,
/// they select its naive-moment fallback. The remaining variants are returned to callers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not enough data to fit a Gaussian: need at least {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Gaussian fit failed: {0}")]
    FitConvergenceFailure(String),

    #[error("degenerate regression: {0}")]
    DegenerateRegression(String),

    #[error("input lengths differ: x has {x}, y has {y}, uncertainties have {uncertainty}")]
    LengthMismatch {
        x: usize,
        y: usize,
        uncertainty: usize,
    },

    #[error("profile inputs differ in length: {covariate} covariate values, {values} values")]
    ProfileLengthMismatch { covariate: usize, values: usize },

    #[error("uncertainty at index {index} must be finite and non-zero, got {value}")]
    InvalidUncertainty { index: usize, value: f64 },

    #[error("no observations supplied")]
    EmptyInput,

    #[error("bin count must be positive")]
    InvalidBinCount,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] toml::de::Error),
}
