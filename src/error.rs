/// Errors returned by the annotation store and the midline pipeline.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TethermapError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("insufficient points: need at least {required}, got {found}")]
    InsufficientPoints { required: usize, found: usize },
    #[error("degenerate curve: {0}")]
    DegenerateCurve(String),
    #[error("ill-conditioned spline system: {0}")]
    IllConditioned(String),
}

pub type Result<T> = std::result::Result<T, TethermapError>;
