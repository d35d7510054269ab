//! Forward and backward projection between complex images and cartesian
//! k-space readouts.
//!
//! forward:  image -> coil weighting -> zero pad to the encoded matrix -> FFT -> sampling
//! backward: gridding (lines summed) -> inverse FFT -> crop -> conj(coil map) weighted sum
//!
//! The transforms are centered and orthonormal and the crop is the adjoint of
//! the pad, so backward is the exact adjoint of forward. It is only an inverse
//! for fully sampled data with each line acquired once and maps normalised to
//! unit root-sum-of-squares.
use std::collections::BTreeMap;
use ndarray::{s, Array4};
use num_complex::Complex32;
use log::{debug, info};
use mr_data::{kspace, Acquisition, AcquisitionData, CoilSensitivityData, EncodingParameters};
use mr_data::{Image, ImageData, ImageHeader, ImageKey, MrDataError, Trajectory};
use crate::error::{ReconError, Result};

struct Binding {
    encoding:EncodingParameters,
    template:AcquisitionData,
    image_headers:Vec<ImageHeader>,
    image_index:BTreeMap<ImageKey,usize>,
    channels:usize,
}

#[derive(Default)]
pub struct AcquisitionModel {
    binding:Option<Binding>,
    csm:Option<CoilSensitivityData>,
}

impl AcquisitionModel {

    pub fn new() -> Self {
        Self::default()
    }

    /// bind the readout geometry of `acq` to the image geometry of `images`.
    /// This can only happen once per model
    pub fn set_up(&mut self,acq:&AcquisitionData,images:&ImageData) -> Result<()> {
        if self.binding.is_some() {
            return Err(ReconError::AlreadySetUp)
        }
        let encoding = acq.encoding().clone();
        if encoding.trajectory != Trajectory::Cartesian {
            return Err(MrDataError::UnsupportedTrajectory.into())
        }
        let recon = encoding.recon_matrix();
        let encoded = encoding.encoded_matrix();
        let channels = acq.channels();

        let mut image_index = BTreeMap::<ImageKey,usize>::new();
        for (i,img) in images.iter().enumerate() {
            if img.matrix_size() != recon.to_array() {
                return Err(ReconError::DimensionMismatch(format!(
                    "image {} has matrix size {:?}, the recon matrix is {:?}",i,img.matrix_size(),recon.to_array()
                )))
            }
            if img.head.channels != 1 {
                return Err(ReconError::DimensionMismatch(format!(
                    "image {} has {} channels, coil combined images are expected",i,img.head.channels
                )))
            }
            if image_index.insert(img.image_key(),i).is_some() {
                return Err(ReconError::DimensionMismatch(format!(
                    "image {} repeats the image key {:?}",i,img.image_key()
                )))
            }
        }
        for a in acq.imaging() {
            kspace::check_readout(a,encoded,channels)
                .map_err(|e| ReconError::DimensionMismatch(e.to_string()))?;
            if !image_index.contains_key(&a.head.image_key()) {
                return Err(ReconError::DimensionMismatch(format!(
                    "no image for readouts with key {:?}",a.head.image_key()
                )))
            }
        }
        let binding = Binding {
            encoding,
            template:acq.with_zero_data(),
            image_headers:images.iter().map(|img| img.head.clone()).collect(),
            image_index,
            channels,
        };
        if let Some(csm) = &self.csm {
            check_maps(&binding,csm)?;
        }
        info!("acquisition model set up: {} readouts, {} images, {} coils",acq.number(),images.number(),channels);
        self.binding = Some(binding);
        Ok(())
    }

    pub fn is_set_up(&self) -> bool {
        self.binding.is_some()
    }

    pub fn set_coil_sensitivity_maps(&mut self,csm:CoilSensitivityData) -> Result<()> {
        if let Some(b) = &self.binding {
            check_maps(b,&csm)?;
        }
        self.csm = Some(csm);
        Ok(())
    }

    pub fn coil_sensitivity_maps(&self) -> Option<&CoilSensitivityData> {
        self.csm.as_ref()
    }

    /// simulated readouts of `images` with the headers of the bound acquisitions
    pub fn forward(&self,images:&ImageData) -> Result<AcquisitionData> {
        let b = self.binding()?;
        self.check_images(b,images)?;
        let encoded = b.encoding.encoded_matrix();
        let mut kspaces = Vec::<Array4<Complex32>>::with_capacity(images.number());
        for img in images.iter() {
            let coil_images = self.weight(b,img)?;
            kspaces.push(kspace::images_to_kspace(&coil_images,encoded));
        }
        let mut out = b.template.clone();
        for a in out.iter_mut().filter(|a| a.is_imaging()) {
            let i = b.image_index[&a.head.image_key()];
            a.data = kspace::sample(&kspaces[i],a.head.idx.kspace_encode_step_1,a.head.idx.kspace_encode_step_2);
        }
        debug!("forward projection of {} images",images.number());
        Ok(out)
    }

    /// images with the bound image headers from readouts laid out like the bound acquisitions
    pub fn backward(&self,acq:&AcquisitionData) -> Result<ImageData> {
        let b = self.binding()?;
        self.check_acquisitions(b,acq)?;
        let encoded = b.encoding.encoded_matrix();
        let recon = b.encoding.recon_matrix();
        let mut by_image = vec![Vec::<&Acquisition>::new();b.image_headers.len()];
        for a in acq.imaging() {
            by_image[b.image_index[&a.head.image_key()]].push(a);
        }
        let mut images = ImageData::default();
        for (head,readouts) in b.image_headers.iter().zip(by_image) {
            let k = kspace::grid(readouts,encoded,b.channels,false)?;
            let coil_images = kspace::kspace_to_images(k,recon);
            let data = self.combine(b,head.slice,coil_images)?;
            images.push(Image::new(head.clone(),data)?);
        }
        debug!("backward projection of {} readouts",acq.number());
        Ok(images)
    }

    fn binding(&self) -> Result<&Binding> {
        self.binding.as_ref().ok_or(ReconError::NotSetUp)
    }

    fn weight(&self,b:&Binding,img:&Image) -> Result<Array4<Complex32>> {
        let img3 = img.data.slice(s![0,..,..,..]);
        match &self.csm {
            Some(csm) => {
                let mut coil_images = csm.map(img.head.slice)?.clone();
                for mut c in coil_images.outer_iter_mut() {
                    c *= &img3;
                }
                Ok(coil_images)
            }
            None if b.channels == 1 => Ok(img.data.clone()),
            None => Err(ReconError::MissingCoilMaps(b.channels)),
        }
    }

    fn combine(&self,b:&Binding,slice:u16,coil_images:Array4<Complex32>) -> Result<Array4<Complex32>> {
        match &self.csm {
            Some(csm) => Ok(mr_data::coil::combine(&coil_images,csm.map(slice)?)),
            None if b.channels == 1 => Ok(coil_images),
            None => Err(ReconError::MissingCoilMaps(b.channels)),
        }
    }

    fn check_images(&self,b:&Binding,images:&ImageData) -> Result<()> {
        if images.number() != b.image_headers.len() {
            return Err(ReconError::DimensionMismatch(format!(
                "{} images given, the model is set up for {}",images.number(),b.image_headers.len()
            )))
        }
        for (i,(img,head)) in images.iter().zip(b.image_headers.iter()).enumerate() {
            if img.matrix_size() != head.matrix_size || img.head.channels != 1 || img.image_key() != head.image_key() {
                return Err(ReconError::DimensionMismatch(format!(
                    "image {} does not match the image the model was set up with",i
                )))
            }
        }
        Ok(())
    }

    fn check_acquisitions(&self,b:&Binding,acq:&AcquisitionData) -> Result<()> {
        if acq.number() != b.template.number() {
            return Err(ReconError::DimensionMismatch(format!(
                "{} readouts given, the model is set up for {}",acq.number(),b.template.number()
            )))
        }
        for (i,(a,t)) in acq.iter().zip(b.template.iter()).enumerate() {
            if a.data.shape() != t.data.shape() || a.head.idx != t.head.idx || a.is_imaging() != t.is_imaging() {
                return Err(ReconError::DimensionMismatch(format!(
                    "readout {} does not match the readout the model was set up with",i
                )))
            }
        }
        Ok(())
    }
}

fn check_maps(b:&Binding,csm:&CoilSensitivityData) -> Result<()> {
    if csm.coils() != b.channels {
        return Err(ReconError::DimensionMismatch(format!(
            "{} coil maps for {}-coil data",csm.coils(),b.channels
        )))
    }
    let recon = b.encoding.recon_matrix();
    if csm.matrix_size() != Some(recon) {
        return Err(ReconError::DimensionMismatch(format!(
            "coil maps of size {:?}, the recon matrix is {:?}",csm.matrix_size(),recon
        )))
    }
    for head in &b.image_headers {
        csm.map(head.slice)?;
    }
    Ok(())
}
