use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use log::debug;
use mr_data::Acquisition;
use mr_data::acquisition::EncodingCounters;
use mr_data::EncodingParameters;
use crate::error::Result;
use crate::gadget::{invalid, pass, unknown, Bucket, Gadget, Message};

/// an encoding counter used to trigger or sort buckets
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum EncodingDimension {
    None,
    KspaceEncodeStep1,
    KspaceEncodeStep2,
    Average,
    Slice,
    Contrast,
    Phase,
    Repetition,
    Set,
    Segment,
}

impl EncodingDimension {
    pub fn counter(&self,idx:&EncodingCounters) -> Option<u16> {
        match self {
            EncodingDimension::None => None,
            EncodingDimension::KspaceEncodeStep1 => Some(idx.kspace_encode_step_1),
            EncodingDimension::KspaceEncodeStep2 => Some(idx.kspace_encode_step_2),
            EncodingDimension::Average => Some(idx.average),
            EncodingDimension::Slice => Some(idx.slice),
            EncodingDimension::Contrast => Some(idx.contrast),
            EncodingDimension::Phase => Some(idx.phase),
            EncodingDimension::Repetition => Some(idx.repetition),
            EncodingDimension::Set => Some(idx.set),
            EncodingDimension::Segment => Some(idx.segment),
        }
    }
}

impl FromStr for EncodingDimension {
    type Err = String;
    fn from_str(s:&str) -> std::result::Result<Self,Self::Err> {
        Ok(match s.trim() {
            "" | "none" => EncodingDimension::None,
            "kspace_encode_step_1" => EncodingDimension::KspaceEncodeStep1,
            "kspace_encode_step_2" => EncodingDimension::KspaceEncodeStep2,
            "average" => EncodingDimension::Average,
            "slice" => EncodingDimension::Slice,
            "contrast" => EncodingDimension::Contrast,
            "phase" => EncodingDimension::Phase,
            "repetition" => EncodingDimension::Repetition,
            "set" => EncodingDimension::Set,
            "segment" => EncodingDimension::Segment,
            _=> return Err(s.to_string())
        })
    }
}

impl fmt::Display for EncodingDimension {
    fn fmt(&self,f:&mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EncodingDimension::None => "none",
            EncodingDimension::KspaceEncodeStep1 => "kspace_encode_step_1",
            EncodingDimension::KspaceEncodeStep2 => "kspace_encode_step_2",
            EncodingDimension::Average => "average",
            EncodingDimension::Slice => "slice",
            EncodingDimension::Contrast => "contrast",
            EncodingDimension::Phase => "phase",
            EncodingDimension::Repetition => "repetition",
            EncodingDimension::Set => "set",
            EncodingDimension::Segment => "segment",
        };
        write!(f,"{}",s)
    }
}

/// Collects readouts into buckets. Whenever the trigger counter of a readout
/// differs from the one before it, everything held so far is emitted, one
/// bucket per value of the sorting counter. Whatever is left goes out on close.
pub struct AcquisitionAccumulateTriggerGadget {
    trigger_dimension:EncodingDimension,
    sorting_dimension:EncodingDimension,
    last:Option<u16>,
    buckets:BTreeMap<u16,Vec<Acquisition>>,
    emitted:usize,
}

impl AcquisitionAccumulateTriggerGadget {
    pub fn new() -> Self {
        Self {
            trigger_dimension:EncodingDimension::None,
            sorting_dimension:EncodingDimension::None,
            last:None,
            buckets:BTreeMap::new(),
            emitted:0,
        }
    }

    fn emit(&mut self,out:&mut Vec<Message>) {
        for (_,acquisitions) in std::mem::take(&mut self.buckets) {
            if !acquisitions.is_empty() {
                out.push(Message::Bucket(Bucket{acquisitions}));
                self.emitted += 1;
            }
        }
    }
}

impl Gadget for AcquisitionAccumulateTriggerGadget {
    fn class_name(&self) -> &'static str {
        "AcquisitionAccumulateTriggerGadget"
    }

    fn set_property(&mut self,key:&str,value:&str) -> Result<()> {
        let dim = || value.parse::<EncodingDimension>().map_err(|_| invalid(key,value));
        match key {
            "trigger_dimension" => self.trigger_dimension = dim()?,
            "sorting_dimension" => self.sorting_dimension = dim()?,
            _=> return Err(unknown(self.class_name(),key))
        }
        Ok(())
    }

    fn configure(&mut self,_encoding:&mut EncodingParameters) -> Result<()> {
        self.last = None;
        self.buckets.clear();
        self.emitted = 0;
        debug!("triggering on {}, sorting on {}",self.trigger_dimension,self.sorting_dimension);
        Ok(())
    }

    fn process(&mut self,msg:Message,out:&mut Vec<Message>) -> Result<()> {
        match msg {
            Message::Acquisition(acq) => {
                if let Some(value) = self.trigger_dimension.counter(&acq.head.idx) {
                    if self.last.is_some_and(|last| last != value) {
                        self.emit(out);
                    }
                    self.last = Some(value);
                }
                let sort = self.sorting_dimension.counter(&acq.head.idx).unwrap_or(0);
                self.buckets.entry(sort).or_default().push(acq);
                Ok(())
            }
            other => pass(other,out)
        }
    }

    fn close(&mut self,out:&mut Vec<Message>) -> Result<()> {
        self.emit(out);
        debug!("{} buckets emitted",self.emitted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mr_data::AcquisitionHeader;
    use ndarray::Array2;

    fn readout(rep:u16,slice:u16) -> Message {
        let mut head = AcquisitionHeader::default();
        head.active_channels = 1;
        head.number_of_samples = 2;
        head.idx.repetition = rep;
        head.idx.slice = slice;
        Message::Acquisition(Acquisition::new(head,Array2::zeros((1,2))).unwrap())
    }

    fn run(trigger:&str,sorting:&str) -> Vec<usize> {
        let mut g = AcquisitionAccumulateTriggerGadget::new();
        g.set_property("trigger_dimension",trigger).unwrap();
        g.set_property("sorting_dimension",sorting).unwrap();
        let mut encoding = EncodingParameters::cartesian_2d(2,2,100.0,1);
        g.configure(&mut encoding).unwrap();
        let mut out = vec![];
        for (rep,slice) in [(0,0),(0,1),(0,0),(1,0),(1,1)] {
            g.process(readout(rep,slice),&mut out).unwrap();
        }
        g.close(&mut out).unwrap();
        out.iter().map(|m| match m {
            Message::Bucket(b) => b.acquisitions.len(),
            _=> 0
        }).collect()
    }

    #[test]
    fn trigger_dimension_sets_the_bucket_boundaries(){
        assert_eq!(run("none",""),vec![5]);
        assert_eq!(run("repetition","none"),vec![3,2]);
        assert_eq!(run("repetition","slice"),vec![2,1,1,1]);
        assert_eq!(run("slice","none"),vec![1,1,2,1]);
    }

    #[test]
    fn unknown_dimensions_are_rejected(){
        let mut g = AcquisitionAccumulateTriggerGadget::new();
        assert!(g.set_property("trigger_dimension","sideways").is_err());
        assert!(g.set_property("trigger","slice").is_err());
        assert_eq!("set".parse::<EncodingDimension>().unwrap().to_string(),"set");
    }
}
