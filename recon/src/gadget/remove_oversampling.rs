use log::{debug, warn};
use mr_data::EncodingParameters;
use crate::error::Result;
use crate::gadget::{pass, unknown, Gadget, Message};
use crate::preprocess::{remove_oversampling_from_encoding, remove_readout_oversampling};

/// Halves the readout field of view when the encoded readout is twice the
/// recon matrix. Readouts of any other length are passed through.
pub struct RemoveROOversamplingGadget {
    encoded_x:usize,
    active:bool,
}

impl RemoveROOversamplingGadget {
    pub fn new() -> Self {
        Self {
            encoded_x:0,
            active:false,
        }
    }
}

impl Gadget for RemoveROOversamplingGadget {
    fn class_name(&self) -> &'static str {
        "RemoveROOversamplingGadget"
    }

    fn set_property(&mut self,key:&str,_value:&str) -> Result<()> {
        Err(unknown(self.class_name(),key))
    }

    fn configure(&mut self,encoding:&mut EncodingParameters) -> Result<()> {
        self.encoded_x = encoding.encoded_matrix().x;
        self.active = encoding.has_readout_oversampling();
        match self.active {
            true => {
                remove_oversampling_from_encoding(encoding);
                debug!("removing readout oversampling, {} -> {} samples",self.encoded_x,encoding.encoded_matrix().x);
            }
            false => warn!("encoded readout is not oversampled, nothing to remove"),
        }
        Ok(())
    }

    fn process(&mut self,msg:Message,out:&mut Vec<Message>) -> Result<()> {
        match msg {
            Message::Acquisition(mut acq) => {
                if self.active && acq.samples() == self.encoded_x {
                    remove_readout_oversampling(&mut acq);
                }
                out.push(Message::Acquisition(acq));
                Ok(())
            }
            other => pass(other,out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mr_data::phantom::{simulate, PhantomSettings};

    #[test]
    fn readouts_and_encoding_are_halved(){
        let p = PhantomSettings {matrix:8,coils:2,noise_scans:0,..PhantomSettings::default()};
        let d = simulate(&p).unwrap();
        let mut encoding = d.encoding().clone();
        let mut g = RemoveROOversamplingGadget::new();
        g.configure(&mut encoding).unwrap();
        assert_eq!(encoding.encoded_matrix().x,8);
        assert!(!encoding.has_readout_oversampling());
        let mut out = vec![];
        g.process(Message::Acquisition(d.iter().next().unwrap().clone()),&mut out).unwrap();
        match &out[0] {
            Message::Acquisition(a) => {
                assert_eq!(a.samples(),8);
                assert_eq!(a.head.number_of_samples,8);
            }
            _=> panic!("expected an acquisition")
        }
    }
}
