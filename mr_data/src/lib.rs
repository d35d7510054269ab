pub mod error;
pub mod encoding;
pub mod acquisition;
pub mod raw_file;
pub mod image;
pub mod image_store;
pub mod cfl;
pub mod kspace;
pub mod coil;
pub mod phantom;

pub use error::{MrDataError, Result};
pub use encoding::{EncodingParameters, MatrixSize, Trajectory};
pub use acquisition::{Acquisition, AcquisitionData, AcquisitionFlag, AcquisitionHeader, ImageKey};
pub use image::{Image, ImageData, ImageHeader, ImageType, InfoValue};
pub use coil::{CoilImageData, CoilSensitivityData};
