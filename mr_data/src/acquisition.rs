use std::collections::BTreeSet;
use std::path::Path;
use ndarray::Array2;
use num_complex::{Complex32, Complex64};
use crate::encoding::EncodingParameters;
use crate::error::{MrDataError, Result};
use crate::raw_file;

/// acquisition flag bits (1-based bit numbers as recorded by the scanner)
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum AcquisitionFlag {
    FirstInEncodeStep1 = 1,
    LastInEncodeStep1 = 2,
    FirstInSlice = 7,
    LastInSlice = 8,
    FirstInRepetition = 13,
    LastInRepetition = 14,
    IsNoiseMeasurement = 19,
    IsParallelCalibration = 20,
    IsParallelCalibrationAndImaging = 21,
    IsReverse = 22,
    IsNavigationData = 23,
    LastInMeasurement = 25,
}

impl AcquisitionFlag {
    pub fn mask(&self) -> u64 {
        1u64 << (*self as u64 - 1)
    }
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub struct EncodingCounters {
    pub kspace_encode_step_1:u16,
    pub kspace_encode_step_2:u16,
    pub average:u16,
    pub slice:u16,
    pub contrast:u16,
    pub phase:u16,
    pub repetition:u16,
    pub set:u16,
    pub segment:u16,
}

/// the counters that separate one image from another. Ordered so that
/// a sorted set of keys runs repetition-major, then slice
#[derive(Clone,Copy,Debug,Default,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct ImageKey {
    pub repetition:u16,
    pub slice:u16,
    pub contrast:u16,
    pub phase:u16,
    pub set:u16,
}

#[derive(Clone,Debug,PartialEq)]
pub struct AcquisitionHeader {
    pub version:u16,
    pub flags:u64,
    pub measurement_uid:u32,
    pub scan_counter:u32,
    pub acquisition_time_stamp:u32,
    pub number_of_samples:u16,
    pub active_channels:u16,
    pub discard_pre:u16,
    pub discard_post:u16,
    pub center_sample:u16,
    pub sample_time_us:f32,
    pub position:[f32;3],
    pub read_dir:[f32;3],
    pub phase_dir:[f32;3],
    pub slice_dir:[f32;3],
    pub patient_table_position:[f32;3],
    pub idx:EncodingCounters,
}

impl Default for AcquisitionHeader {
    fn default() -> Self {
        Self {
            version:1,
            flags:0,
            measurement_uid:0,
            scan_counter:0,
            acquisition_time_stamp:0,
            number_of_samples:0,
            active_channels:0,
            discard_pre:0,
            discard_post:0,
            center_sample:0,
            sample_time_us:0.0,
            position:[0.0;3],
            read_dir:[1.0,0.0,0.0],
            phase_dir:[0.0,1.0,0.0],
            slice_dir:[0.0,0.0,1.0],
            patient_table_position:[0.0;3],
            idx:EncodingCounters::default(),
        }
    }
}

impl AcquisitionHeader {
    pub fn is_flag_set(&self,flag:AcquisitionFlag) -> bool {
        self.flags & flag.mask() != 0
    }
    pub fn set_flag(&mut self,flag:AcquisitionFlag) {
        self.flags |= flag.mask();
    }
    pub fn clear_flag(&mut self,flag:AcquisitionFlag) {
        self.flags &= !flag.mask();
    }
    pub fn image_key(&self) -> ImageKey {
        ImageKey {
            repetition:self.idx.repetition,
            slice:self.idx.slice,
            contrast:self.idx.contrast,
            phase:self.idx.phase,
            set:self.idx.set,
        }
    }
}

/// a single readout. Data is laid out (channel, sample)
#[derive(Clone,Debug,PartialEq)]
pub struct Acquisition {
    pub head:AcquisitionHeader,
    pub data:Array2<Complex32>,
}

impl Acquisition {
    pub fn new(head:AcquisitionHeader,data:Array2<Complex32>) -> Result<Self> {
        let shape = data.shape();
        if shape[0] != head.active_channels as usize || shape[1] != head.number_of_samples as usize {
            return Err(MrDataError::ShapeMismatch(format!(
                "header declares {}x{} samples but data is {}x{}",
                head.active_channels,head.number_of_samples,shape[0],shape[1]
            )))
        }
        Ok(Self {head,data})
    }

    pub fn is_noise(&self) -> bool {
        self.head.is_flag_set(AcquisitionFlag::IsNoiseMeasurement)
    }

    pub fn is_imaging(&self) -> bool {
        !self.is_noise()
            && !self.head.is_flag_set(AcquisitionFlag::IsNavigationData)
            && (!self.head.is_flag_set(AcquisitionFlag::IsParallelCalibration)
                || self.head.is_flag_set(AcquisitionFlag::IsParallelCalibrationAndImaging))
    }

    pub fn channels(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn samples(&self) -> usize {
        self.data.shape()[1]
    }
}

#[derive(Clone,Debug,PartialEq)]
pub struct AcquisitionData {
    encoding:EncodingParameters,
    acquisitions:Vec<Acquisition>,
}

impl AcquisitionData {

    pub fn new(encoding:EncodingParameters,acquisitions:Vec<Acquisition>) -> Self {
        Self {
            encoding,
            acquisitions
        }
    }

    pub fn read(path:&Path) -> Result<Self> {
        raw_file::read(path)
    }

    pub fn write(&self,path:&Path) -> Result<()> {
        raw_file::write(self,path)
    }

    pub fn encoding(&self) -> &EncodingParameters {
        &self.encoding
    }

    pub fn set_encoding(&mut self,encoding:EncodingParameters) {
        self.encoding = encoding;
    }

    pub fn number(&self) -> usize {
        self.acquisitions.len()
    }

    pub fn acquisition(&self,index:usize) -> Result<&Acquisition> {
        self.acquisitions.get(index).ok_or(MrDataError::OutOfRange{index,len:self.acquisitions.len()})
    }

    pub fn iter(&self) -> std::slice::Iter<'_,Acquisition> {
        self.acquisitions.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_,Acquisition> {
        self.acquisitions.iter_mut()
    }

    pub fn push(&mut self,acq:Acquisition) {
        self.acquisitions.push(acq);
    }

    pub fn into_parts(self) -> (EncodingParameters,Vec<Acquisition>) {
        (self.encoding,self.acquisitions)
    }

    pub fn imaging(&self) -> impl Iterator<Item=&Acquisition> {
        self.acquisitions.iter().filter(|a| a.is_imaging())
    }

    pub fn norm(&self) -> f64 {
        self.acquisitions.iter()
            .flat_map(|a| a.data.iter())
            .map(|z| z.norm_sqr() as f64)
            .sum::<f64>()
            .sqrt()
    }

    /// sum of conj(self) * other over every sample
    pub fn dot(&self,other:&AcquisitionData) -> Result<Complex64> {
        self.check_same_shape(other)?;
        let mut acc = Complex64::new(0.0,0.0);
        for (a,b) in self.acquisitions.iter().zip(other.acquisitions.iter()) {
            for (x,y) in a.data.iter().zip(b.data.iter()) {
                acc += Complex64::new(x.re as f64,-x.im as f64)*Complex64::new(y.re as f64,y.im as f64);
            }
        }
        Ok(acc)
    }

    pub fn difference(&self,other:&AcquisitionData) -> Result<AcquisitionData> {
        self.check_same_shape(other)?;
        let mut out = self.clone();
        out.acquisitions.iter_mut().zip(other.acquisitions.iter()).for_each(|(a,b)| a.data -= &b.data);
        Ok(out)
    }

    pub fn with_zero_data(&self) -> AcquisitionData {
        let mut out = self.clone();
        out.acquisitions.iter_mut().for_each(|a| a.data.fill(Complex32::new(0.0,0.0)));
        out
    }

    /// stable sort by (repetition, slice, k-space encode step 1)
    pub fn sort(&mut self) {
        self.acquisitions.sort_by_key(sort_key);
    }

    pub fn is_sorted(&self) -> bool {
        self.acquisitions.windows(2).all(|w| sort_key(&w[0]) <= sort_key(&w[1]))
    }

    pub fn image_keys(&self) -> Vec<ImageKey> {
        let keys:BTreeSet<ImageKey> = self.imaging().map(|a| a.head.image_key()).collect();
        keys.into_iter().collect()
    }

    pub fn slices(&self) -> Vec<u16> {
        let s:BTreeSet<u16> = self.imaging().map(|a| a.head.idx.slice).collect();
        s.into_iter().collect()
    }

    /// number of receiver channels of the imaging readouts
    pub fn channels(&self) -> usize {
        self.imaging().next().map(|a| a.channels()).unwrap_or(self.encoding.receiver_channels as usize)
    }

    fn check_same_shape(&self,other:&AcquisitionData) -> Result<()> {
        if self.acquisitions.len() != other.acquisitions.len() {
            return Err(MrDataError::ShapeMismatch(format!(
                "{} acquisitions vs {}",self.acquisitions.len(),other.acquisitions.len()
            )))
        }
        for (i,(a,b)) in self.acquisitions.iter().zip(other.acquisitions.iter()).enumerate() {
            if a.data.shape() != b.data.shape() {
                return Err(MrDataError::ShapeMismatch(format!(
                    "acquisition {} is {:?} vs {:?}",i,a.data.shape(),b.data.shape()
                )))
            }
        }
        Ok(())
    }
}

fn sort_key(acq:&Acquisition) -> (u16,u16,u16) {
    (acq.head.idx.repetition,acq.head.idx.slice,acq.head.idx.kspace_encode_step_1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readout(rep:u16,slice:u16,e1:u16,value:f32) -> Acquisition {
        let mut head = AcquisitionHeader::default();
        head.number_of_samples = 4;
        head.active_channels = 2;
        head.idx.repetition = rep;
        head.idx.slice = slice;
        head.idx.kspace_encode_step_1 = e1;
        Acquisition::new(head,Array2::from_elem((2,4),Complex32::new(value,0.0))).unwrap()
    }

    fn data() -> AcquisitionData {
        let e = EncodingParameters::cartesian_2d(4,4,200.0,2);
        AcquisitionData::new(e,vec![
            readout(1,0,2,1.0),
            readout(0,1,0,2.0),
            readout(0,0,3,3.0),
            readout(0,0,1,4.0),
            readout(1,0,0,5.0),
            readout(0,0,1,6.0),
        ])
    }

    #[test]
    fn sort_orders_by_repetition_slice_step(){
        let mut d = data();
        assert!(!d.is_sorted());
        d.sort();
        assert!(d.is_sorted());
        let keys:Vec<(u16,u16,u16)> = d.iter().map(sort_key).collect();
        assert_eq!(keys,vec![(0,0,1),(0,0,1),(0,0,3),(0,1,0),(1,0,0),(1,0,2)]);
        // equal keys keep their relative order
        assert_eq!(d.acquisition(0).unwrap().data[[0,0]].re,4.0);
        assert_eq!(d.acquisition(1).unwrap().data[[0,0]].re,6.0);
    }

    #[test]
    fn sort_is_idempotent(){
        let mut once = data();
        once.sort();
        let mut twice = once.clone();
        twice.sort();
        assert_eq!(once,twice);
    }

    #[test]
    fn norm_and_dot_agree(){
        let d = data();
        let n = d.norm();
        let dd = d.dot(&d).unwrap();
        assert!((n*n - dd.re).abs() < 1e-6);
        assert!(dd.im.abs() < 1e-9);
        assert_eq!(d.with_zero_data().norm(),0.0);
        assert!(d.difference(&d).unwrap().norm() < 1e-12);
    }

    #[test]
    fn mismatched_data_is_rejected(){
        let d = data();
        let mut e = data();
        e.push(readout(2,0,0,1.0));
        assert!(d.dot(&e).is_err());
        assert!(Acquisition::new(AcquisitionHeader::default(),Array2::zeros((1,3))).is_err());
    }

    #[test]
    fn image_keys_are_distinct_and_ordered(){
        let d = data();
        let keys = d.image_keys();
        assert_eq!(keys.len(),3);
        assert_eq!((keys[0].repetition,keys[0].slice),(0,0));
        assert_eq!((keys[1].repetition,keys[1].slice),(0,1));
        assert_eq!((keys[2].repetition,keys[2].slice),(1,0));
        assert_eq!(d.slices(),vec![0,1]);
    }

    #[test]
    fn noise_flag_excludes_from_imaging(){
        let mut a = readout(0,0,0,1.0);
        assert!(a.is_imaging());
        a.head.set_flag(AcquisitionFlag::IsNoiseMeasurement);
        assert!(a.is_noise());
        assert!(!a.is_imaging());
        a.head.clear_flag(AcquisitionFlag::IsNoiseMeasurement);
        assert!(a.is_imaging());
        assert_eq!(AcquisitionFlag::IsNoiseMeasurement.mask(),1 << 18);
    }
}
