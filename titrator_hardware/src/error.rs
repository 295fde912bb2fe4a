use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("serial link error: {0}")]
    Serial(String),
    #[error("device timeout")]
    Timeout,
    #[error("syringe move to {requested} steps outside 0..={max}")]
    SyringeRange { requested: i64, max: u32 },
    #[error("invalid volume {0} L")]
    InvalidVolume(f64),
    #[error("unparseable meter response: {0}")]
    Parse(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
