use std::fmt;
use std::path::Path;
use std::str::FromStr;
use ndarray::{Array4, ArrayView4};
use num_complex::{Complex32, Complex64};
use crate::acquisition::{AcquisitionHeader, ImageKey};
use crate::encoding::EncodingParameters;
use crate::error::{MrDataError, Result};
use crate::{cfl, image_store};

pub const DATA_TYPE_CXFLOAT:u16 = 7;

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum ImageType {
    Magnitude = 1,
    Phase = 2,
    Real = 3,
    Imag = 4,
    Complex = 5,
}

impl ImageType {
    pub fn code(&self) -> u16 {
        *self as u16
    }
}

#[derive(Clone,Debug,PartialEq)]
pub struct ImageHeader {
    pub version:u16,
    pub flags:u64,
    pub data_type:u16,
    pub channels:u16,
    pub slice:u16,
    pub repetition:u16,
    pub contrast:u16,
    pub phase:u16,
    pub set:u16,
    pub average:u16,
    pub image_type:u16,
    pub image_index:u16,
    pub image_series_index:u16,
    pub matrix_size:[u16;3],
    pub field_of_view:[f32;3],
    pub position:[f32;3],
    pub read_dir:[f32;3],
    pub phase_dir:[f32;3],
    pub slice_dir:[f32;3],
    pub patient_table_position:[f32;3],
    pub acquisition_time_stamp:u32,
}

impl Default for ImageHeader {
    fn default() -> Self {
        Self {
            version:1,
            flags:0,
            data_type:DATA_TYPE_CXFLOAT,
            channels:1,
            slice:0,
            repetition:0,
            contrast:0,
            phase:0,
            set:0,
            average:0,
            image_type:ImageType::Complex.code(),
            image_index:0,
            image_series_index:0,
            matrix_size:[1,1,1],
            field_of_view:[0.0;3],
            position:[0.0;3],
            read_dir:[1.0,0.0,0.0],
            phase_dir:[0.0,1.0,0.0],
            slice_dir:[0.0,0.0,1.0],
            patient_table_position:[0.0;3],
            acquisition_time_stamp:0,
        }
    }
}

impl ImageHeader {
    /// header for a coil-combined image of the readouts `acq` belongs to
    pub fn from_acquisition(acq:&AcquisitionHeader,encoding:&EncodingParameters) -> Self {
        Self {
            slice:acq.idx.slice,
            repetition:acq.idx.repetition,
            contrast:acq.idx.contrast,
            phase:acq.idx.phase,
            set:acq.idx.set,
            average:acq.idx.average,
            matrix_size:encoding.recon_matrix().to_array(),
            field_of_view:encoding.recon_space.field_of_view_mm.to_array(),
            position:acq.position,
            read_dir:acq.read_dir,
            phase_dir:acq.phase_dir,
            slice_dir:acq.slice_dir,
            patient_table_position:acq.patient_table_position,
            acquisition_time_stamp:acq.acquisition_time_stamp,
            ..Self::default()
        }
    }

    pub fn image_key(&self) -> ImageKey {
        ImageKey {
            repetition:self.repetition,
            slice:self.slice,
            contrast:self.contrast,
            phase:self.phase,
            set:self.set,
        }
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum ImageField {
    Version,
    Flags,
    DataType,
    Channels,
    Slice,
    Repetition,
    Contrast,
    Phase,
    Set,
    Average,
    ImageType,
    ImageIndex,
    ImageSeriesIndex,
    MatrixSize,
    FieldOfView,
    PatientTablePosition,
}

impl FromStr for ImageField {
    type Err = MrDataError;
    fn from_str(s:&str) -> Result<Self> {
        Ok(match s {
            "version" => ImageField::Version,
            "flags" => ImageField::Flags,
            "data_type" => ImageField::DataType,
            "channels" => ImageField::Channels,
            "slice" => ImageField::Slice,
            "repetition" => ImageField::Repetition,
            "contrast" => ImageField::Contrast,
            "phase" => ImageField::Phase,
            "set" => ImageField::Set,
            "average" => ImageField::Average,
            "image_type" => ImageField::ImageType,
            "image_index" => ImageField::ImageIndex,
            "image_series_index" => ImageField::ImageSeriesIndex,
            "matrix_size" => ImageField::MatrixSize,
            "field_of_view" => ImageField::FieldOfView,
            "patient_table_position" => ImageField::PatientTablePosition,
            _=> return Err(MrDataError::UnknownInfoKey(s.to_string()))
        })
    }
}

#[derive(Clone,Copy,Debug,PartialEq)]
pub enum InfoValue {
    Int(u64),
    Triple([f32;3]),
}

impl fmt::Display for InfoValue {
    fn fmt(&self,f:&mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::Int(v) => write!(f,"{}",v),
            InfoValue::Triple(v) => write!(f,"({}, {}, {})",v[0],v[1],v[2]),
        }
    }
}

/// one complex image. Data is laid out (channel, z, y, x)
#[derive(Clone,Debug,PartialEq)]
pub struct Image {
    pub head:ImageHeader,
    pub data:Array4<Complex32>,
}

impl Image {
    pub fn new(head:ImageHeader,data:Array4<Complex32>) -> Result<Self> {
        let s = data.shape();
        let m = head.matrix_size;
        if s[0] != head.channels as usize || s[1] != m[2] as usize || s[2] != m[1] as usize || s[3] != m[0] as usize {
            return Err(MrDataError::ShapeMismatch(format!(
                "header declares {} channels of {:?} but data is {:?}",head.channels,m,s
            )))
        }
        Ok(Self {head,data})
    }

    pub fn info(&self,field:ImageField) -> InfoValue {
        let h = &self.head;
        match field {
            ImageField::Version => InfoValue::Int(h.version as u64),
            ImageField::Flags => InfoValue::Int(h.flags),
            ImageField::DataType => InfoValue::Int(h.data_type as u64),
            ImageField::Channels => InfoValue::Int(h.channels as u64),
            ImageField::Slice => InfoValue::Int(h.slice as u64),
            ImageField::Repetition => InfoValue::Int(h.repetition as u64),
            ImageField::Contrast => InfoValue::Int(h.contrast as u64),
            ImageField::Phase => InfoValue::Int(h.phase as u64),
            ImageField::Set => InfoValue::Int(h.set as u64),
            ImageField::Average => InfoValue::Int(h.average as u64),
            ImageField::ImageType => InfoValue::Int(h.image_type as u64),
            ImageField::ImageIndex => InfoValue::Int(h.image_index as u64),
            ImageField::ImageSeriesIndex => InfoValue::Int(h.image_series_index as u64),
            ImageField::MatrixSize => InfoValue::Triple(h.matrix_size.map(|v| v as f32)),
            ImageField::FieldOfView => InfoValue::Triple(h.field_of_view),
            ImageField::PatientTablePosition => InfoValue::Triple(h.patient_table_position),
        }
    }

    pub fn info_by_name(&self,key:&str) -> Result<InfoValue> {
        Ok(self.info(key.parse()?))
    }

    pub fn matrix_size(&self) -> [u16;3] {
        self.head.matrix_size
    }

    pub fn patient_table_position(&self) -> [f32;3] {
        self.head.patient_table_position
    }

    pub fn image_key(&self) -> ImageKey {
        self.head.image_key()
    }
}

#[derive(Clone,Debug,Default,PartialEq)]
pub struct ImageData {
    images:Vec<Image>,
}

impl ImageData {

    pub fn new(images:Vec<Image>) -> Self {
        Self {images}
    }

    pub fn number(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn image(&self,index:usize) -> Result<&Image> {
        self.images.get(index).ok_or(MrDataError::OutOfRange{index,len:self.images.len()})
    }

    pub fn image_as_array(&self,index:usize) -> Result<ArrayView4<'_,Complex32>> {
        Ok(self.image(index)?.data.view())
    }

    pub fn iter(&self) -> std::slice::Iter<'_,Image> {
        self.images.iter()
    }

    pub fn push(&mut self,image:Image) {
        self.images.push(image);
    }

    pub fn into_images(self) -> Vec<Image> {
        self.images
    }

    pub fn get_info(&self,key:&str) -> Result<Vec<InfoValue>> {
        let field:ImageField = key.parse()?;
        Ok(self.images.iter().map(|img| img.info(field)).collect())
    }

    pub fn norm(&self) -> f64 {
        self.images.iter()
            .flat_map(|img| img.data.iter())
            .map(|z| z.norm_sqr() as f64)
            .sum::<f64>()
            .sqrt()
    }

    /// sum of conj(self) * other over every voxel
    pub fn dot(&self,other:&ImageData) -> Result<Complex64> {
        self.check_same_shape(other)?;
        let mut acc = Complex64::new(0.0,0.0);
        for (a,b) in self.images.iter().zip(other.images.iter()) {
            for (x,y) in a.data.iter().zip(b.data.iter()) {
                acc += Complex64::new(x.re as f64,-x.im as f64)*Complex64::new(y.re as f64,y.im as f64);
            }
        }
        Ok(acc)
    }

    pub fn difference(&self,other:&ImageData) -> Result<ImageData> {
        self.check_same_shape(other)?;
        let mut out = self.clone();
        out.images.iter_mut().zip(other.images.iter()).for_each(|(a,b)| a.data -= &b.data);
        Ok(out)
    }

    /// copy the voxel data of `other` into self. Headers are left alone
    pub fn fill(&mut self,other:&ImageData) -> Result<()> {
        self.check_same_shape(other)?;
        self.images.iter_mut().zip(other.images.iter()).for_each(|(a,b)| a.data.assign(&b.data));
        Ok(())
    }

    pub fn write(&self,path:&Path,group:&str) -> Result<()> {
        image_store::append_group(path,group,self)
    }

    pub fn read_group(path:&Path,group:&str) -> Result<Self> {
        image_store::read_group(path,group)
    }

    /// write image `index`, channel 0, as a BART cfl/hdr pair
    pub fn export_cfl(&self,index:usize,cfl_base:&Path) -> Result<()> {
        let img = self.image(index)?;
        cfl::write_cfl_image(img,cfl_base)
    }

    fn check_same_shape(&self,other:&ImageData) -> Result<()> {
        if self.images.len() != other.images.len() {
            return Err(MrDataError::ShapeMismatch(format!(
                "{} images vs {}",self.images.len(),other.images.len()
            )))
        }
        for (i,(a,b)) in self.images.iter().zip(other.images.iter()).enumerate() {
            if a.data.shape() != b.data.shape() {
                return Err(MrDataError::ShapeMismatch(format!(
                    "image {} is {:?} vs {:?}",i,a.data.shape(),b.data.shape()
                )))
            }
        }
        Ok(())
    }
}
