use std::collections::BTreeMap;
use log::info;
use mr_data::{coil, kspace, AcquisitionData, Image, ImageData, ImageHeader, ImageKey, Trajectory};
use mr_data::MrDataError;
use crate::chain::{GadgetChain, StageReport};
use crate::error::{ReconError, Result};
use crate::gadget::Gadget;
use crate::recon_config::{ChainSettings, Config};

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum ReconState {
    Idle,
    InputSet,
    OutputAvailable,
}

pub trait Reconstructor {
    fn set_input(&mut self,acq:&AcquisitionData);
    /// runs synchronously, leaving the output available on success
    fn process(&mut self) -> Result<()>;
    fn get_output(&self) -> Result<&ImageData>;
    fn state(&self) -> ReconState;
}

#[derive(Default)]
struct Slots {
    input:Option<AcquisitionData>,
    output:Option<ImageData>,
}

impl Slots {
    fn set_input(&mut self,acq:&AcquisitionData) {
        self.input = Some(acq.clone());
        self.output = None;
    }

    fn input(&self) -> Result<&AcquisitionData> {
        self.input.as_ref().ok_or(ReconError::NoInput)
    }

    fn output(&self) -> Result<&ImageData> {
        self.output.as_ref().ok_or(ReconError::OutputNotReady)
    }

    fn state(&self) -> ReconState {
        match (&self.input,&self.output) {
            (_,Some(_)) => ReconState::OutputAvailable,
            (Some(_),None) => ReconState::InputSet,
            (None,None) => ReconState::Idle,
        }
    }
}

/// Direct reconstruction of fully sampled cartesian data: every image key is
/// gridded (repeated lines averaged), inverse transformed, cropped to the
/// recon matrix and coil combined with maps estimated from its own coil images.
pub struct FullySampledReconstructor {
    csm_smoothness:u32,
    slots:Slots,
}

impl FullySampledReconstructor {
    pub fn new() -> Self {
        Self::with_smoothness(coil::DEFAULT_SMOOTHNESS)
    }

    pub fn with_smoothness(csm_smoothness:u32) -> Self {
        Self {
            csm_smoothness,
            slots:Slots::default(),
        }
    }
}

impl Reconstructor for FullySampledReconstructor {
    fn set_input(&mut self,acq:&AcquisitionData) {
        self.slots.set_input(acq);
    }

    fn process(&mut self) -> Result<()> {
        let acq = self.slots.input()?;
        let images = reconstruct_fully_sampled(acq,self.csm_smoothness)?;
        info!("fully sampled reconstruction produced {} images",images.number());
        self.slots.output = Some(images);
        Ok(())
    }

    fn get_output(&self) -> Result<&ImageData> {
        self.slots.output()
    }

    fn state(&self) -> ReconState {
        self.slots.state()
    }
}

pub fn reconstruct_fully_sampled(acq:&AcquisitionData,csm_smoothness:u32) -> Result<ImageData> {
    let encoding = acq.encoding();
    if encoding.trajectory != Trajectory::Cartesian {
        return Err(MrDataError::UnsupportedTrajectory.into())
    }
    let encoded = encoding.encoded_matrix();
    let recon = encoding.recon_matrix();
    let channels = acq.channels();
    let mut by_key = BTreeMap::<ImageKey,Vec<&mr_data::Acquisition>>::new();
    for a in acq.imaging() {
        by_key.entry(a.head.image_key()).or_default().push(a);
    }
    let mut images = ImageData::default();
    for (n,readouts) in by_key.values().enumerate() {
        let k = kspace::grid(readouts.iter().copied(),encoded,channels,true)?;
        let coil_images = kspace::kspace_to_images(k,recon);
        let data = match channels {
            1 => coil_images,
            _=> coil::combine(&coil_images,&coil::estimate_maps(&coil_images,csm_smoothness))
        };
        let mut head = ImageHeader::from_acquisition(&readouts[0].head,encoding);
        head.image_index = n as u16 + 1;
        images.push(Image::new(head,data)?);
    }
    Ok(images)
}

/// Reconstruction by a gadget chain. Without further configuration the chain
/// is oversampling removal, accumulation per repetition, buffering per slice,
/// simple reconstruction, image array splitting and magnitude extraction.
pub struct ImagesReconstructor {
    chain:GadgetChain,
    report:Vec<StageReport>,
    slots:Slots,
}

impl ImagesReconstructor {
    pub fn new() -> Result<Self> {
        Ok(Self::from_chain(ChainSettings::default().build()?))
    }

    pub fn empty() -> Self {
        Self::from_chain(GadgetChain::new())
    }

    pub fn from_chain(chain:GadgetChain) -> Self {
        Self {
            chain,
            report:vec![],
            slots:Slots::default(),
        }
    }

    pub fn add_gadget(&mut self,id:&str,gadget:Box<dyn Gadget>) -> Result<()> {
        self.chain.add_gadget(id,gadget)
    }

    pub fn set_gadget_property(&mut self,id:&str,key:&str,value:&str) -> Result<()> {
        self.chain.set_property(id,key,value)
    }

    pub fn chain(&self) -> &GadgetChain {
        &self.chain
    }

    pub fn report(&self) -> &[StageReport] {
        &self.report
    }
}

impl Reconstructor for ImagesReconstructor {
    fn set_input(&mut self,acq:&AcquisitionData) {
        self.slots.set_input(acq);
    }

    fn process(&mut self) -> Result<()> {
        let acq = self.slots.input.as_ref().ok_or(ReconError::NoInput)?;
        let out = self.chain.run(acq)?;
        self.report = out.report;
        self.slots.output = Some(out.images);
        Ok(())
    }

    fn get_output(&self) -> Result<&ImageData> {
        self.slots.output()
    }

    fn state(&self) -> ReconState {
        self.slots.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mr_data::phantom::{simulate, PhantomSettings};
    use mr_data::ImageType;
    use crate::chain::preprocess_acquisition_data;

    fn data() -> AcquisitionData {
        let p = PhantomSettings {matrix:16,coils:3,slices:2,noise_scans:4,..PhantomSettings::default()};
        preprocess_acquisition_data(&simulate(&p).unwrap()).unwrap()
    }

    #[test]
    fn output_requires_processing(){
        let mut r = FullySampledReconstructor::new();
        assert_eq!(r.state(),ReconState::Idle);
        assert!(matches!(r.process(),Err(ReconError::NoInput)));
        r.set_input(&data());
        assert_eq!(r.state(),ReconState::InputSet);
        assert!(matches!(r.get_output(),Err(ReconError::OutputNotReady)));
        r.process().unwrap();
        assert_eq!(r.state(),ReconState::OutputAvailable);
        let out = r.get_output().unwrap();
        assert_eq!(out.number(),2);
        assert_eq!(out.image(1).unwrap().head.slice,1);
        assert_eq!(out.image(0).unwrap().matrix_size(),[16,16,1]);
        // new input invalidates the old output
        r.set_input(&data());
        assert!(r.get_output().is_err());
    }

    #[test]
    fn chain_and_direct_paths_agree_in_magnitude(){
        let d = data();
        let mut direct = FullySampledReconstructor::new();
        direct.set_input(&d);
        direct.process().unwrap();
        let mut chain = ImagesReconstructor::new().unwrap();
        chain.set_input(&d);
        chain.process().unwrap();
        let a = direct.get_output().unwrap();
        let b = chain.get_output().unwrap();
        assert_eq!(a.number(),b.number());
        for (x,y) in a.iter().zip(b.iter()) {
            assert_eq!(y.head.image_type,ImageType::Magnitude.code());
            assert_eq!(x.image_key(),y.image_key());
            x.data.iter().zip(y.data.iter()).for_each(|(p,q)| assert!((p.norm() - q.re).abs() < 1e-4));
        }
        assert_eq!(chain.report().len(),6);
    }

    #[test]
    fn gadgets_can_be_added_one_by_one(){
        let mut r = ImagesReconstructor::empty();
        for (id,class) in [("g1","AcquisitionAccumulateTriggerGadget"),("g2","BucketToBufferGadget"),("g3","SimpleReconGadget"),("g4","ImageArraySplitGadget")] {
            r.add_gadget(id,crate::gadget::create(class).unwrap()).unwrap();
        }
        r.set_gadget_property("g2","split_slices","true").unwrap();
        r.set_input(&data());
        r.process().unwrap();
        assert_eq!(r.get_output().unwrap().number(),2);
        assert_eq!(r.chain().gadget_ids(),vec!["g1","g2","g3","g4"]);
    }
}
