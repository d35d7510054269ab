use std::str::FromStr;
use ndarray::{s, Array4, Axis};
use num_complex::Complex32;
use log::debug;
use mr_data::{coil, kspace, EncodingParameters, ImageHeader};
use crate::error::{ReconError, Result};
use crate::gadget::{invalid, parse_u16, pass, unknown, Gadget, ImageArray, Message};

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum CoilCombine {
    /// weighted by sensitivity maps estimated from the coil images themselves
    Adaptive,
    Rss,
    None,
}

impl FromStr for CoilCombine {
    type Err = String;
    fn from_str(s:&str) -> std::result::Result<Self,Self::Err> {
        match s.trim() {
            "adaptive" => Ok(CoilCombine::Adaptive),
            "rss" => Ok(CoilCombine::Rss),
            "none" => Ok(CoilCombine::None),
            _=> Err(s.to_string())
        }
    }
}

/// Inverse transforms every k-space buffer, crops it to the recon matrix
/// and combines the coils.
pub struct SimpleReconGadget {
    coil_combine:CoilCombine,
    image_series_index:u16,
    csm_smoothness:u32,
    encoding:Option<EncodingParameters>,
    image_index:u16,
}

impl SimpleReconGadget {
    pub fn new() -> Self {
        Self {
            coil_combine:CoilCombine::Adaptive,
            image_series_index:0,
            csm_smoothness:coil::DEFAULT_SMOOTHNESS,
            encoding:None,
            image_index:0,
        }
    }

    fn combine(&self,coil_images:Array4<Complex32>) -> Array4<Complex32> {
        if coil_images.shape()[0] == 1 {
            return coil_images
        }
        match self.coil_combine {
            CoilCombine::Adaptive => {
                let maps = coil::estimate_maps(&coil_images,self.csm_smoothness);
                coil::combine(&coil_images,&maps)
            }
            CoilCombine::Rss => coil::rss(&coil_images),
            CoilCombine::None => coil_images,
        }
    }
}

impl Gadget for SimpleReconGadget {
    fn class_name(&self) -> &'static str {
        "SimpleReconGadget"
    }

    fn set_property(&mut self,key:&str,value:&str) -> Result<()> {
        match key {
            "coil_combine" => self.coil_combine = value.parse().map_err(|_| invalid(key,value))?,
            "image_series_index" => self.image_series_index = parse_u16(key,value)?,
            "csm_smoothness" => self.csm_smoothness = parse_u16(key,value)? as u32,
            _=> return Err(unknown(self.class_name(),key))
        }
        Ok(())
    }

    fn configure(&mut self,encoding:&mut EncodingParameters) -> Result<()> {
        self.encoding = Some(encoding.clone());
        self.image_index = 0;
        Ok(())
    }

    fn process(&mut self,msg:Message,out:&mut Vec<Message>) -> Result<()> {
        let buffer = match msg {
            Message::Buffer(buffer) => buffer,
            other => return pass(other,out)
        };
        let encoding = self.encoding.as_ref().ok_or(ReconError::NotConfigured(self.class_name()))?;
        let recon = encoding.recon_matrix();
        let mut images = Vec::<Array4<Complex32>>::with_capacity(buffer.headers.len());
        let mut headers = Vec::<ImageHeader>::with_capacity(buffer.headers.len());
        for (n,acq_head) in buffer.headers.iter().enumerate() {
            let k = buffer.data.slice(s![n,..,..,..,..]).to_owned();
            let combined = self.combine(kspace::kspace_to_images(k,recon));
            let mut head = ImageHeader::from_acquisition(acq_head,encoding);
            head.channels = combined.shape()[0] as u16;
            head.image_index = self.image_index + 1 + n as u16;
            head.image_series_index = self.image_series_index;
            headers.push(head);
            images.push(combined);
        }
        self.image_index += headers.len() as u16;
        let views:Vec<_> = images.iter().map(|i| i.view()).collect();
        let data = ndarray::stack(Axis(0),&views)
            .map_err(|e| ReconError::DimensionMismatch(format!("images of one buffer differ in shape: {}",e)))?;
        debug!("reconstructed {} images",headers.len());
        out.push(Message::ImageArray(ImageArray{headers,data}));
        Ok(())
    }
}
