use log::{debug, info, warn};
use mr_data::{Acquisition, AcquisitionData, EncodingParameters, ImageData};
use crate::error::{ReconError, Result};
use crate::gadget::{self, Gadget, Message};

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct StageReport {
    pub id:String,
    pub class:&'static str,
    pub messages:usize,
}

pub struct ChainOutput {
    pub encoding:EncodingParameters,
    pub acquisitions:Vec<Acquisition>,
    pub images:ImageData,
    pub report:Vec<StageReport>,
}

impl ChainOutput {
    pub fn into_acquisition_data(self) -> AcquisitionData {
        AcquisitionData::new(self.encoding,self.acquisitions)
    }
}

/// A fixed, ordered sequence of gadgets. Every readout is streamed through
/// the stages in the order they were added; at the end of the input each
/// stage is closed in turn and its remaining output flows through the stages
/// after it.
#[derive(Default)]
pub struct GadgetChain {
    stages:Vec<(String,Box<dyn Gadget>)>,
}

impl GadgetChain {
    pub fn new() -> Self {
        Self {
            stages:vec![],
        }
    }

    /// noise prewhitening, partial echo zero filling and readout oversampling removal
    pub fn preprocessing() -> Result<Self> {
        let mut chain = Self::new();
        chain.add("noise_adjust","NoiseAdjustGadget")?;
        chain.add("asymmetric_echo","AsymmetricEchoAdjustROGadget")?;
        chain.add("remove_oversampling","RemoveROOversamplingGadget")?;
        Ok(chain)
    }

    pub fn add_gadget(&mut self,id:&str,gadget:Box<dyn Gadget>) -> Result<()> {
        if self.stages.iter().any(|(i,_)| i == id) {
            return Err(ReconError::DuplicateGadget(id.to_string()))
        }
        self.stages.push((id.to_string(),gadget));
        Ok(())
    }

    pub fn add(&mut self,id:&str,class:&str) -> Result<()> {
        let g = gadget::create(class)?;
        self.add_gadget(id,g)
    }

    pub fn set_property(&mut self,id:&str,key:&str,value:&str) -> Result<()> {
        let (_,g) = self.stages.iter_mut()
            .find(|(i,_)| i == id)
            .ok_or(ReconError::NoSuchGadget(id.to_string()))?;
        g.set_property(key,value)
    }

    pub fn gadget_ids(&self) -> Vec<&str> {
        self.stages.iter().map(|(id,_)| id.as_str()).collect()
    }

    pub fn class_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|(_,g)| g.class_name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn run(&mut self,acq:&AcquisitionData) -> Result<ChainOutput> {
        let mut encoding = acq.encoding().clone();
        for (id,g) in self.stages.iter_mut() {
            g.configure(&mut encoding).map_err(|e| stage_error(id,e))?;
        }
        let mut report:Vec<StageReport> = self.stages.iter().map(|(id,g)| StageReport {
            id:id.clone(),
            class:g.class_name(),
            messages:0,
        }).collect();
        let mut sink = Vec::<Message>::new();

        for a in acq.iter() {
            let out = self.stream(0,vec![Message::Acquisition(a.clone())],&mut report)?;
            sink.extend(out);
        }
        for i in 0..self.stages.len() {
            let mut flushed = vec![];
            let (id,g) = &mut self.stages[i];
            g.close(&mut flushed).map_err(|e| stage_error(id,e))?;
            report[i].messages += flushed.len();
            let out = self.stream(i+1,flushed,&mut report)?;
            sink.extend(out);
        }

        let mut acquisitions = vec![];
        let mut images = ImageData::default();
        for msg in sink {
            match msg {
                Message::Acquisition(a) => acquisitions.push(a),
                Message::Image(img) => images.push(img),
                other => warn!("chain ended with an unconsumed {}",other.kind()),
            }
        }
        for r in &report {
            debug!("{} ({}) emitted {} messages",r.id,r.class,r.messages);
        }
        info!("gadget chain produced {} readouts and {} images",acquisitions.len(),images.number());
        Ok(ChainOutput{encoding,acquisitions,images,report})
    }

    fn stream(&mut self,start:usize,mut msgs:Vec<Message>,report:&mut [StageReport]) -> Result<Vec<Message>> {
        for (i,(id,g)) in self.stages.iter_mut().enumerate().skip(start) {
            if msgs.is_empty() {
                break
            }
            let mut out = vec![];
            for m in msgs {
                g.process(m,&mut out).map_err(|e| stage_error(id,e))?;
            }
            report[i].messages += out.len();
            msgs = out;
        }
        Ok(msgs)
    }
}

fn stage_error(id:&str,e:ReconError) -> ReconError {
    ReconError::Chain {
        id: id.to_string(),
        source: Box::new(e),
    }
}

/// noise prewhitening, partial echo zero filling and readout oversampling
/// removal, run as a gadget chain
pub fn preprocess_acquisition_data(acq:&AcquisitionData) -> Result<AcquisitionData> {
    let mut chain = GadgetChain::preprocessing()?;
    Ok(chain.run(acq)?.into_acquisition_data())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mr_data::phantom::{simulate, PhantomSettings};
    use crate::recon_config::{ChainSettings, Config};

    fn data() -> AcquisitionData {
        let p = PhantomSettings {
            matrix:16,
            coils:2,
            slices:2,
            repetitions:2,
            noise_scans:4,
            ..PhantomSettings::default()
        };
        simulate(&p).unwrap()
    }

    #[test]
    fn ids_must_be_unique(){
        let mut c = GadgetChain::new();
        c.add("a","ExtractGadget").unwrap();
        assert!(matches!(c.add("a","SimpleReconGadget"),Err(ReconError::DuplicateGadget(_))));
        assert!(matches!(c.set_property("b","x","y"),Err(ReconError::NoSuchGadget(_))));
        assert!(c.add("b","NotAGadget").is_err());
        assert_eq!(c.len(),1);
    }

    #[test]
    fn preprocessing_drops_noise_and_oversampling(){
        let d = data();
        let p = preprocess_acquisition_data(&d).unwrap();
        assert_eq!(p.number(),d.number() - 4);
        assert_eq!(p.encoding().encoded_matrix().x,16);
        assert!(p.iter().all(|a| a.samples() == 16 && !a.is_noise()));
    }

    #[test]
    fn default_chain_reports_every_stage(){
        let mut chain = ChainSettings::default().build().unwrap();
        let out = chain.run(&data()).unwrap();
        // one magnitude image per repetition and slice
        assert_eq!(out.images.number(),4);
        assert!(out.acquisitions.is_empty());
        let counts:Vec<usize> = out.report.iter().map(|r| r.messages).collect();
        assert_eq!(counts,vec![68,2,4,4,4,4]);
        assert_eq!(out.report[3].class,"SimpleReconGadget");
    }

    #[test]
    fn readouts_wider_than_the_noise_scans_are_an_error(){
        let mut d = data();
        let mut head = mr_data::AcquisitionHeader::default();
        head.active_channels = 3;
        head.number_of_samples = 32;
        d.push(Acquisition::new(head,ndarray::Array2::zeros((3,32))).unwrap());
        match preprocess_acquisition_data(&d) {
            Err(ReconError::Chain{id,source}) => {
                assert_eq!(id,"noise_adjust");
                assert!(matches!(*source,ReconError::DimensionMismatch(_)));
            }
            other => panic!("expected a noise_adjust error, got {:?}",other.map(|a| a.number()))
        }
    }

    #[test]
    fn a_chain_can_be_run_twice(){
        let mut chain = ChainSettings::default().build().unwrap();
        let d = data();
        let first = chain.run(&d).unwrap();
        let second = chain.run(&d).unwrap();
        assert_eq!(first.images,second.images);
    }
}
