//! The reconstruction back ends. Both offer the same pre-processing and a
//! fully sampled reconstructor producing complex, coil combined images; one
//! runs everything as gadget chains, the other calls the routines directly.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use mr_data::AcquisitionData;
use crate::chain::{preprocess_acquisition_data, GadgetChain};
use crate::error::Result;
use crate::preprocess;
use crate::recon_config::{PreprocessSettings, ReconSettings};
use crate::reconstructor::{FullySampledReconstructor, ImagesReconstructor, Reconstructor};

pub trait Engine {
    fn name(&self) -> &'static str;
    fn preprocess(&self,acq:&AcquisitionData) -> Result<AcquisitionData>;
    fn reconstructor(&self) -> Result<Box<dyn Reconstructor>>;
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,ValueEnum,Serialize,Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Gadgets,
    Direct,
}

impl EngineKind {
    pub fn engine(&self,settings:&ReconSettings) -> Box<dyn Engine> {
        match self {
            EngineKind::Gadgets => Box::new(GadgetEngine::new(settings)),
            EngineKind::Direct => Box::new(DirectEngine::new(settings)),
        }
    }
}

pub struct GadgetEngine {
    preprocessing:PreprocessSettings,
    csm_smoothness:u32,
}

impl GadgetEngine {
    pub fn new(settings:&ReconSettings) -> Self {
        Self {
            preprocessing:settings.preprocessing.clone(),
            csm_smoothness:settings.csm_smoothness,
        }
    }

    /// the fully sampled reconstruction as a chain: one bucket per repetition,
    /// one buffer per slice, adaptive coil combination and complex output
    pub fn fully_sampled_chain(&self) -> Result<GadgetChain> {
        let mut chain = GadgetChain::new();
        chain.add("accumulate","AcquisitionAccumulateTriggerGadget")?;
        chain.set_property("accumulate","trigger_dimension","repetition")?;
        chain.add("buffer","BucketToBufferGadget")?;
        chain.set_property("buffer","split_slices","true")?;
        chain.add("recon","SimpleReconGadget")?;
        chain.set_property("recon","csm_smoothness",&self.csm_smoothness.to_string())?;
        chain.add("split","ImageArraySplitGadget")?;
        chain.add("extract","ExtractGadget")?;
        chain.set_property("extract","extract_magnitude","false")?;
        chain.set_property("extract","extract_complex","true")?;
        Ok(chain)
    }
}

impl Engine for GadgetEngine {
    fn name(&self) -> &'static str {
        "gadgets"
    }

    fn preprocess(&self,acq:&AcquisitionData) -> Result<AcquisitionData> {
        let p = &self.preprocessing;
        if p.noise_adjust && p.asymmetric_echo && p.remove_oversampling {
            return preprocess_acquisition_data(acq)
        }
        let mut chain = GadgetChain::new();
        if p.noise_adjust {
            chain.add("noise_adjust","NoiseAdjustGadget")?;
        }
        if p.asymmetric_echo {
            chain.add("asymmetric_echo","AsymmetricEchoAdjustROGadget")?;
        }
        if p.remove_oversampling {
            chain.add("remove_oversampling","RemoveROOversamplingGadget")?;
        }
        Ok(chain.run(acq)?.into_acquisition_data())
    }

    fn reconstructor(&self) -> Result<Box<dyn Reconstructor>> {
        Ok(Box::new(ImagesReconstructor::from_chain(self.fully_sampled_chain()?)))
    }
}

pub struct DirectEngine {
    preprocessing:PreprocessSettings,
    csm_smoothness:u32,
}

impl DirectEngine {
    pub fn new(settings:&ReconSettings) -> Self {
        Self {
            preprocessing:settings.preprocessing.clone(),
            csm_smoothness:settings.csm_smoothness,
        }
    }
}

impl Engine for DirectEngine {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn preprocess(&self,acq:&AcquisitionData) -> Result<AcquisitionData> {
        preprocess::preprocess(acq,&self.preprocessing)
    }

    fn reconstructor(&self) -> Result<Box<dyn Reconstructor>> {
        Ok(Box::new(FullySampledReconstructor::with_smoothness(self.csm_smoothness)))
    }
}
