use ndarray::Array2;
use num_complex::Complex32;
use log::{debug, warn};
use mr_data::{Acquisition, EncodingParameters};
use crate::error::Result;
use crate::gadget::{parse_bool, pass, unknown, Gadget, Message};
use crate::preprocess::{noise_covariance, prewhiten, whitening_matrix};

/// Holds back the noise scans at the start of the stream, then prewhitens
/// every imaging readout with the inverse cholesky factor of their covariance.
/// Noise scans are not passed on.
pub struct NoiseAdjustGadget {
    perform_noise_adjust:bool,
    noise:Vec<Acquisition>,
    whitener:Option<Array2<Complex32>>,
    ready:bool,
}

impl NoiseAdjustGadget {
    pub fn new() -> Self {
        Self {
            perform_noise_adjust:true,
            noise:vec![],
            whitener:None,
            ready:false,
        }
    }

    fn prepare(&mut self) -> Result<()> {
        self.ready = true;
        if !self.perform_noise_adjust {
            return Ok(())
        }
        let channels = match self.noise.first() {
            Some(n) => n.channels(),
            None => {
                warn!("no noise scans before the first imaging readout, data will not be prewhitened");
                return Ok(())
            }
        };
        if let Some(cov) = noise_covariance(&self.noise,channels)? {
            self.whitener = Some(whitening_matrix(&cov)?);
            debug!("noise prewhitening from {} scans",self.noise.len());
        }
        self.noise.clear();
        Ok(())
    }
}

impl Gadget for NoiseAdjustGadget {
    fn class_name(&self) -> &'static str {
        "NoiseAdjustGadget"
    }

    fn set_property(&mut self,key:&str,value:&str) -> Result<()> {
        match key {
            "perform_noise_adjust" => self.perform_noise_adjust = parse_bool(key,value)?,
            _=> return Err(unknown(self.class_name(),key))
        }
        Ok(())
    }

    fn configure(&mut self,_encoding:&mut EncodingParameters) -> Result<()> {
        self.noise.clear();
        self.whitener = None;
        self.ready = false;
        Ok(())
    }

    fn process(&mut self,msg:Message,out:&mut Vec<Message>) -> Result<()> {
        match msg {
            Message::Acquisition(mut acq) => {
                if acq.is_noise() {
                    if !self.ready {
                        self.noise.push(acq);
                    }
                    return Ok(())
                }
                if !self.ready {
                    self.prepare()?;
                }
                if let Some(w) = &self.whitener {
                    prewhiten(&mut acq,w)?;
                }
                out.push(Message::Acquisition(acq));
                Ok(())
            }
            other => pass(other,out)
        }
    }
}
