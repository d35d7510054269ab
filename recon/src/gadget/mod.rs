//! Streaming reconstruction stages. A gadget receives messages one at a time,
//! may hold on to them, and pushes whatever it produces onto `out`.
use ndarray::Array5;
use num_complex::Complex32;
use mr_data::{Acquisition, AcquisitionHeader, EncodingParameters, Image, ImageHeader};
use crate::error::{ReconError, Result};

pub mod noise_adjust;
pub mod asymmetric_echo;
pub mod remove_oversampling;
pub mod accumulate_trigger;
pub mod bucket_to_buffer;
pub mod simple_recon;
pub mod image_array_split;
pub mod extract;

pub use noise_adjust::NoiseAdjustGadget;
pub use asymmetric_echo::AsymmetricEchoAdjustROGadget;
pub use remove_oversampling::RemoveROOversamplingGadget;
pub use accumulate_trigger::{AcquisitionAccumulateTriggerGadget, EncodingDimension};
pub use bucket_to_buffer::BucketToBufferGadget;
pub use simple_recon::{CoilCombine, SimpleReconGadget};
pub use image_array_split::ImageArraySplitGadget;
pub use extract::ExtractGadget;

/// readouts collected between two triggers
#[derive(Clone,Debug,Default,PartialEq)]
pub struct Bucket {
    pub acquisitions:Vec<Acquisition>,
}

/// gridded k-space for one image key. `data` is (n, coil, e2, e1, readout)
/// where n runs over the slices (and segments) sharing the buffer, each
/// described by the header at the same position of `headers`
#[derive(Clone,Debug,PartialEq)]
pub struct ReconBuffer {
    pub headers:Vec<AcquisitionHeader>,
    pub data:Array5<Complex32>,
}

/// reconstructed images of one buffer, (n, channel, z, y, x)
#[derive(Clone,Debug,PartialEq)]
pub struct ImageArray {
    pub headers:Vec<ImageHeader>,
    pub data:Array5<Complex32>,
}

#[derive(Clone,Debug,PartialEq)]
pub enum Message {
    Acquisition(Acquisition),
    Bucket(Bucket),
    Buffer(ReconBuffer),
    ImageArray(ImageArray),
    Image(Image),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Acquisition(_) => "acquisition",
            Message::Bucket(_) => "bucket",
            Message::Buffer(_) => "buffer",
            Message::ImageArray(_) => "image array",
            Message::Image(_) => "image",
        }
    }
}

pub trait Gadget {
    fn class_name(&self) -> &'static str;
    fn set_property(&mut self,key:&str,value:&str) -> Result<()>;
    /// called once per run, in chain order, before any message arrives.
    /// gadgets that change the geometry update `encoding` for the stages after them
    fn configure(&mut self,_encoding:&mut EncodingParameters) -> Result<()> {
        Ok(())
    }
    fn process(&mut self,msg:Message,out:&mut Vec<Message>) -> Result<()>;
    fn close(&mut self,_out:&mut Vec<Message>) -> Result<()> {
        Ok(())
    }
}

pub const GADGET_CLASSES:[&str;8] = [
    "NoiseAdjustGadget",
    "AsymmetricEchoAdjustROGadget",
    "RemoveROOversamplingGadget",
    "AcquisitionAccumulateTriggerGadget",
    "BucketToBufferGadget",
    "SimpleReconGadget",
    "ImageArraySplitGadget",
    "ExtractGadget",
];

pub fn create(class:&str) -> Result<Box<dyn Gadget>> {
    let g:Box<dyn Gadget> = match class {
        "NoiseAdjustGadget" => Box::new(NoiseAdjustGadget::new()),
        "AsymmetricEchoAdjustROGadget" => Box::new(AsymmetricEchoAdjustROGadget::new()),
        "RemoveROOversamplingGadget" => Box::new(RemoveROOversamplingGadget::new()),
        "AcquisitionAccumulateTriggerGadget" => Box::new(AcquisitionAccumulateTriggerGadget::new()),
        "BucketToBufferGadget" => Box::new(BucketToBufferGadget::new()),
        "SimpleReconGadget" => Box::new(SimpleReconGadget::new()),
        "ImageArraySplitGadget" => Box::new(ImageArraySplitGadget::new()),
        "ExtractGadget" => Box::new(ExtractGadget::new()),
        _=> return Err(ReconError::UnknownGadget(class.to_string()))
    };
    Ok(g)
}

pub(crate) fn parse_bool(key:&str,value:&str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _=> Err(invalid(key,value))
    }
}

pub(crate) fn parse_u16(key:&str,value:&str) -> Result<u16> {
    value.trim().parse().map_err(|_| invalid(key,value))
}

pub(crate) fn invalid(key:&str,value:&str) -> ReconError {
    ReconError::InvalidPropertyValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

pub(crate) fn unknown(class:&'static str,key:&str) -> ReconError {
    ReconError::UnknownProperty {
        class,
        key: key.to_string(),
    }
}

pub(crate) fn pass(msg:Message,out:&mut Vec<Message>) -> Result<()> {
    out.push(msg);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_class_can_be_created(){
        for class in GADGET_CLASSES {
            assert_eq!(create(class).unwrap().class_name(),class);
        }
        assert!(matches!(create("FooGadget"),Err(ReconError::UnknownGadget(_))));
    }

    #[test]
    fn property_values_are_checked(){
        assert!(parse_bool("k","TRUE").unwrap());
        assert!(!parse_bool("k","off").unwrap());
        assert!(parse_bool("k","maybe").is_err());
        assert_eq!(parse_u16("k"," 3 ").unwrap(),3);
        assert!(parse_u16("k","-1").is_err());
        let mut g = create("SimpleReconGadget").unwrap();
        assert!(matches!(g.set_property("colour","red"),Err(ReconError::UnknownProperty{..})));
    }
}
