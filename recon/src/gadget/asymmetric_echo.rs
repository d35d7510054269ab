use log::debug;
use mr_data::EncodingParameters;
use crate::error::Result;
use crate::gadget::{pass, unknown, Gadget, Message};
use crate::preprocess::adjust_asymmetric_echo;

pub struct AsymmetricEchoAdjustROGadget {
    encoded_x:usize,
    adjusted:usize,
}

impl AsymmetricEchoAdjustROGadget {
    pub fn new() -> Self {
        Self {
            encoded_x:0,
            adjusted:0,
        }
    }
}

impl Gadget for AsymmetricEchoAdjustROGadget {
    fn class_name(&self) -> &'static str {
        "AsymmetricEchoAdjustROGadget"
    }

    fn set_property(&mut self,key:&str,_value:&str) -> Result<()> {
        Err(unknown(self.class_name(),key))
    }

    fn configure(&mut self,encoding:&mut EncodingParameters) -> Result<()> {
        self.encoded_x = encoding.encoded_matrix().x;
        self.adjusted = 0;
        Ok(())
    }

    fn process(&mut self,msg:Message,out:&mut Vec<Message>) -> Result<()> {
        match msg {
            Message::Acquisition(mut acq) => {
                if adjust_asymmetric_echo(&mut acq,self.encoded_x)? {
                    self.adjusted += 1;
                }
                out.push(Message::Acquisition(acq));
                Ok(())
            }
            other => pass(other,out)
        }
    }

    fn close(&mut self,_out:&mut Vec<Message>) -> Result<()> {
        debug!("{} partial echo readouts zero filled",self.adjusted);
        Ok(())
    }
}
