pub mod error;
pub mod recon_config;
pub mod preprocess;
pub mod gadget;
pub mod chain;
pub mod reconstructor;
pub mod acquisition_model;
pub mod engine;

pub use acquisition_model::AcquisitionModel;
pub use chain::{preprocess_acquisition_data, ChainOutput, GadgetChain};
pub use engine::{DirectEngine, Engine, EngineKind, GadgetEngine};
pub use error::{ReconError, Result};
pub use reconstructor::{FullySampledReconstructor, ImagesReconstructor, ReconState, Reconstructor};
