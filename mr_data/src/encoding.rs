use serde::{Deserialize, Serialize};

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize)]
pub struct MatrixSize {
    pub x:usize,
    pub y:usize,
    pub z:usize,
}

impl MatrixSize {
    pub fn new(x:usize,y:usize,z:usize) -> Self {
        Self {x,y,z}
    }
    pub fn numel(&self) -> usize {
        self.x*self.y*self.z
    }
    /// (z,y,x), the order used for array shapes
    pub fn shape(&self) -> (usize,usize,usize) {
        (self.z,self.y,self.x)
    }
    pub fn to_array(&self) -> [u16;3] {
        [self.x as u16,self.y as u16,self.z as u16]
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct FieldOfView {
    pub x:f32,
    pub y:f32,
    pub z:f32,
}

impl FieldOfView {
    pub fn to_array(&self) -> [f32;3] {
        [self.x,self.y,self.z]
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct EncodingSpace {
    pub matrix_size:MatrixSize,
    pub field_of_view_mm:FieldOfView,
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq,Serialize,Deserialize)]
pub struct Limit {
    pub minimum:u16,
    pub maximum:u16,
    pub center:u16,
}

impl Limit {
    pub fn new(maximum:u16,center:u16) -> Self {
        Self {minimum:0,maximum,center}
    }
    pub fn count(&self) -> usize {
        (self.maximum - self.minimum) as usize + 1
    }
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq,Serialize,Deserialize)]
pub struct EncodingLimits {
    pub kspace_encoding_step_1:Limit,
    pub kspace_encoding_step_2:Limit,
    pub average:Limit,
    pub slice:Limit,
    pub contrast:Limit,
    pub phase:Limit,
    pub repetition:Limit,
    pub set:Limit,
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize)]
pub enum Trajectory {
    Cartesian,
    Radial,
    Spiral,
}

/// acquisition parameters shared by every readout of a data set
#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct EncodingParameters {
    pub trajectory:Trajectory,
    pub receiver_channels:u16,
    pub encoded_space:EncodingSpace,
    pub recon_space:EncodingSpace,
    pub encoding_limits:EncodingLimits,
}

impl EncodingParameters {
    pub fn cartesian_2d(nx:usize,ny:usize,fov_mm:f32,channels:u16) -> Self {
        let space = EncodingSpace {
            matrix_size:MatrixSize::new(nx,ny,1),
            field_of_view_mm:FieldOfView{x:fov_mm,y:fov_mm,z:5.0},
        };
        let mut limits = EncodingLimits::default();
        limits.kspace_encoding_step_1 = Limit::new((ny as u16).saturating_sub(1),(ny/2) as u16);
        Self {
            trajectory:Trajectory::Cartesian,
            receiver_channels:channels,
            encoded_space:space,
            recon_space:space,
            encoding_limits:limits,
        }
    }

    pub fn has_readout_oversampling(&self) -> bool {
        self.encoded_space.matrix_size.x == 2*self.recon_space.matrix_size.x
    }

    pub fn encoded_matrix(&self) -> MatrixSize {
        self.encoded_space.matrix_size
    }

    pub fn recon_matrix(&self) -> MatrixSize {
        self.recon_space.matrix_size
    }
}
