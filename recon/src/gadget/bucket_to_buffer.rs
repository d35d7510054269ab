use std::collections::BTreeMap;
use ndarray::{s, Array5};
use log::debug;
use mr_data::{kspace, Acquisition, EncodingParameters, ImageKey, MatrixSize};
use crate::error::{ReconError, Result};
use crate::gadget::{parse_bool, pass, unknown, Gadget, Message, ReconBuffer};

/// Grids the readouts of a bucket into one k-space buffer per image key.
/// Unless `split_slices` is set, the slices of an image key share a buffer
/// along its first dimension, as do segments unless `ignore_segment` is set.
/// Lines acquired more than once are averaged.
pub struct BucketToBufferGadget {
    split_slices:bool,
    ignore_segment:bool,
    encoded:Option<MatrixSize>,
}

impl BucketToBufferGadget {
    pub fn new() -> Self {
        Self {
            split_slices:false,
            ignore_segment:false,
            encoded:None,
        }
    }

    fn buffer_key(&self,acq:&Acquisition) -> (ImageKey,(u16,u16)) {
        let mut key = acq.head.image_key();
        let slice = key.slice;
        let segment = match self.ignore_segment {
            true => 0,
            false => acq.head.idx.segment
        };
        match self.split_slices {
            true => (key,(0,segment)),
            false => {
                key.slice = 0;
                (key,(slice,segment))
            }
        }
    }
}

impl Gadget for BucketToBufferGadget {
    fn class_name(&self) -> &'static str {
        "BucketToBufferGadget"
    }

    fn set_property(&mut self,key:&str,value:&str) -> Result<()> {
        match key {
            "split_slices" => self.split_slices = parse_bool(key,value)?,
            "ignore_segment" => self.ignore_segment = parse_bool(key,value)?,
            _=> return Err(unknown(self.class_name(),key))
        }
        Ok(())
    }

    fn configure(&mut self,encoding:&mut EncodingParameters) -> Result<()> {
        self.encoded = Some(encoding.encoded_matrix());
        Ok(())
    }

    fn process(&mut self,msg:Message,out:&mut Vec<Message>) -> Result<()> {
        let bucket = match msg {
            Message::Bucket(bucket) => bucket,
            other => return pass(other,out)
        };
        let encoded = self.encoded.ok_or(ReconError::NotConfigured(self.class_name()))?;
        let (nz,ny,nx) = encoded.shape();
        let mut groups = BTreeMap::<ImageKey,BTreeMap<(u16,u16),Vec<Acquisition>>>::new();
        let mut skipped = 0;
        for acq in bucket.acquisitions {
            if !acq.is_imaging() {
                skipped += 1;
                continue
            }
            let (key,entry) = self.buffer_key(&acq);
            groups.entry(key).or_default().entry(entry).or_default().push(acq);
        }
        if skipped > 0 {
            debug!("{} non-imaging readouts left out of the buffers",skipped);
        }
        for (_,entries) in groups {
            let channels = entries.values()
                .flat_map(|acqs| acqs.first())
                .map(|a| a.channels())
                .next()
                .unwrap_or(1);
            let mut data = Array5::zeros((entries.len(),channels,nz,ny,nx));
            let mut headers = Vec::with_capacity(entries.len());
            for (n,acqs) in entries.values().enumerate() {
                let k = kspace::grid(acqs,encoded,channels,true)?;
                data.slice_mut(s![n,..,..,..,..]).assign(&k);
                if let Some(first) = acqs.first() {
                    headers.push(first.head.clone());
                }
            }
            out.push(Message::Buffer(ReconBuffer{headers,data}));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gadget::Bucket;
    use mr_data::phantom::{simulate, PhantomSettings};

    fn buffers(split_slices:bool) -> Vec<ReconBuffer> {
        let p = PhantomSettings {
            matrix:8,
            coils:2,
            slices:3,
            noise_scans:2,
            readout_oversampling:false,
            ..PhantomSettings::default()
        };
        let d = simulate(&p).unwrap();
        let mut encoding = d.encoding().clone();
        let mut g = BucketToBufferGadget::new();
        g.set_property("split_slices",&split_slices.to_string()).unwrap();
        g.configure(&mut encoding).unwrap();
        let mut out = vec![];
        let bucket = Bucket{acquisitions:d.iter().cloned().collect()};
        g.process(Message::Bucket(bucket),&mut out).unwrap();
        out.into_iter().map(|m| match m {
            Message::Buffer(b) => b,
            _=> panic!("expected a buffer")
        }).collect()
    }

    #[test]
    fn slices_share_a_buffer_unless_split(){
        let shared = buffers(false);
        assert_eq!(shared.len(),1);
        assert_eq!(shared[0].data.shape(),&[3,2,1,8,8]);
        assert_eq!(shared[0].headers.iter().map(|h| h.idx.slice).collect::<Vec<_>>(),vec![0,1,2]);
        let split = buffers(true);
        assert_eq!(split.len(),3);
        assert!(split.iter().all(|b| b.data.shape() == [1,2,1,8,8]));
        // the same k-space either way
        assert_eq!(split[1].data.slice(s![0,..,..,..,..]),shared[0].data.slice(s![1,..,..,..,..]));
    }
}
