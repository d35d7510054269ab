use std::io;
use std::path::PathBuf;
use thiserror::Error;
use mr_data::MrDataError;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error(transparent)]
    Data(#[from] MrDataError),
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("acquisition model is already set up")]
    AlreadySetUp,
    #[error("acquisition model has not been set up")]
    NotSetUp,
    #[error("{0} received data before it was configured")]
    NotConfigured(&'static str),
    #[error("coil sensitivity maps are required for {0}-coil data")]
    MissingCoilMaps(usize),
    #[error("noise covariance is not positive definite")]
    SingularNoiseCovariance,
    #[error("reconstructor has no input data")]
    NoInput,
    #[error("reconstructor output is not available, call process first")]
    OutputNotReady,
    #[error("unknown gadget class `{0}`")]
    UnknownGadget(String),
    #[error("{class} has no property `{key}`")]
    UnknownProperty { class: &'static str, key: String },
    #[error("invalid value `{value}` for property `{key}`")]
    InvalidPropertyValue { key: String, value: String },
    #[error("a gadget with id `{0}` is already in the chain")]
    DuplicateGadget(String),
    #[error("no gadget with id `{0}` in the chain")]
    NoSuchGadget(String),
    #[error("gadget {id}: {source}")]
    Chain { id: String, source: Box<ReconError> },
    #[error("settings could not be parsed: {0}")]
    Config(#[from] toml::de::Error),
    #[error("settings could not be serialized: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
    #[error("{} not found", .0.display())]
    FileNotFound(PathBuf),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ReconError>;
