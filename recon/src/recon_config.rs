use std::collections::BTreeMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::chain::GadgetChain;
use crate::engine::EngineKind;
use crate::error::Result;

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct PreprocessSettings {
    pub noise_adjust:bool,
    pub asymmetric_echo:bool,
    pub remove_oversampling:bool,
}

impl Config for PreprocessSettings {
    fn default() -> Self {
        Self {
            noise_adjust: true,
            asymmetric_echo: true,
            remove_oversampling: true,
        }
    }
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct GadgetSettings {
    pub id:String,
    pub class:String,
    #[serde(default)]
    pub properties:BTreeMap<String,String>,
}

impl GadgetSettings {
    pub fn new(id:&str,class:&str) -> Self {
        Self {
            id: id.to_string(),
            class: class.to_string(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self,key:&str,value:&str) -> Self {
        self.properties.insert(key.to_string(),value.to_string());
        self
    }
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct ChainSettings {
    pub gadgets:Vec<GadgetSettings>,
}

impl Config for ChainSettings {
    fn default() -> Self {
        Self {
            gadgets: vec![
                GadgetSettings::new("g1","RemoveROOversamplingGadget"),
                GadgetSettings::new("g2","AcquisitionAccumulateTriggerGadget")
                    .with_property("trigger_dimension","repetition"),
                GadgetSettings::new("g3","BucketToBufferGadget")
                    .with_property("split_slices","true"),
                GadgetSettings::new("g4","SimpleReconGadget"),
                GadgetSettings::new("g5","ImageArraySplitGadget"),
                GadgetSettings::new("g6","ExtractGadget"),
            ]
        }
    }
}

impl ChainSettings {
    /// create every gadget in order and apply its properties
    pub fn build(&self) -> Result<GadgetChain> {
        let mut chain = GadgetChain::new();
        for g in &self.gadgets {
            chain.add(&g.id,&g.class)?;
            for (key,value) in &g.properties {
                chain.set_property(&g.id,key,value)?;
            }
        }
        Ok(chain)
    }
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct ReconSettings {
    pub engine:EngineKind,
    pub csm_smoothness:u32,
    pub preprocessing:PreprocessSettings,
    pub chain:ChainSettings,
}

impl Config for ReconSettings {
    fn default() -> Self {
        Self {
            engine: EngineKind::Gadgets,
            csm_smoothness: mr_data::coil::DEFAULT_SMOOTHNESS,
            preprocessing: PreprocessSettings::default(),
            chain: ChainSettings::default(),
        }
    }
}

impl ConfigFile for ReconSettings {

    fn to_file(&self, filename: &Path) -> Result<()> {
        let t = toml::to_string_pretty(&self)?;
        utils::write_to_file(filename,&Self::file_ext(),&t)?;
        Ok(())
    }
    fn from_file(filename: &Path) -> Result<Self> {
        let t = utils::read_to_string(filename,&Self::file_ext())?;
        Ok(toml::from_str(&t)?)
    }
    fn file_ext() -> String {
        String::from("toml")
    }

}

pub trait Config {
    fn default() -> Self;
}

pub trait ConfigFile: Sized {
    fn to_file(&self, filename:&Path) -> Result<()>;
    fn from_file(filename:&Path) -> Result<Self>;
    fn file_ext() -> String;
}
