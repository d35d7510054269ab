//! Simulated multi-coil cartesian acquisitions of a Shepp-Logan phantom.
//!
//! Readouts are written slice-interleaved (repetition, encode step, slice) as
//! a 2D multi-slice scan would acquire them, with optional readout
//! oversampling, partial echo, correlated receiver noise and noise scans.
use std::f32::consts::PI;
use ndarray::{s, Array2, Array4};
use num_complex::Complex32;
use rand::prelude::*;
use log::info;
use crate::acquisition::{Acquisition, AcquisitionData, AcquisitionFlag, AcquisitionHeader};
use crate::encoding::{EncodingParameters, Limit, MatrixSize};
use crate::error::{MrDataError, Result};
use crate::kspace;

const SLICE_THICKNESS_MM:f32 = 5.0;

/// (intensity, semi-axis a, semi-axis b, x0, y0, rotation in degrees)
const SHEPP_LOGAN:[(f32,f32,f32,f32,f32,f32);10] = [
    (1.0,0.69,0.92,0.0,0.0,0.0),
    (-0.8,0.6624,0.874,0.0,-0.0184,0.0),
    (-0.2,0.11,0.31,0.22,0.0,-18.0),
    (-0.2,0.16,0.41,-0.22,0.0,18.0),
    (0.1,0.21,0.25,0.0,0.35,0.0),
    (0.1,0.046,0.046,0.0,0.1,0.0),
    (0.1,0.046,0.046,0.0,-0.1,0.0),
    (0.1,0.046,0.023,-0.08,-0.605,0.0),
    (0.1,0.023,0.023,0.0,-0.606,0.0),
    (0.1,0.023,0.046,0.06,-0.605,0.0),
];

#[derive(Clone,Debug)]
pub struct PhantomSettings {
    pub matrix:usize,
    pub coils:u16,
    pub slices:u16,
    pub repetitions:u16,
    pub readout_oversampling:bool,
    /// samples dropped from the start of every readout
    pub partial_echo_samples:usize,
    pub noise_scans:usize,
    pub noise_level:f32,
    pub fov_mm:f32,
    pub seed:u64,
}

impl Default for PhantomSettings {
    fn default() -> Self {
        Self {
            matrix:64,
            coils:4,
            slices:1,
            repetitions:1,
            readout_oversampling:true,
            partial_echo_samples:0,
            noise_scans:8,
            noise_level:0.01,
            fov_mm:256.0,
            seed:42,
        }
    }
}

impl PhantomSettings {
    pub fn encoding(&self) -> EncodingParameters {
        let n = self.matrix;
        let mut e = EncodingParameters::cartesian_2d(n,n,self.fov_mm,self.coils);
        e.recon_space.field_of_view_mm.z = SLICE_THICKNESS_MM;
        e.encoded_space.field_of_view_mm.z = SLICE_THICKNESS_MM;
        if self.readout_oversampling {
            e.encoded_space.matrix_size.x = 2*n;
            e.encoded_space.field_of_view_mm.x = 2.0*self.fov_mm;
        }
        e.encoding_limits.slice = Limit::new(self.slices.saturating_sub(1),self.slices/2);
        e.encoding_limits.repetition = Limit::new(self.repetitions.saturating_sub(1),0);
        e
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg:String| Err(MrDataError::InvalidSettings(msg));
        if self.matrix == 0 || self.coils == 0 || self.slices == 0 || self.repetitions == 0 {
            return invalid(format!(
                "matrix, coils, slices and repetitions must be positive (got {}, {}, {}, {})",
                self.matrix,self.coils,self.slices,self.repetitions
            ))
        }
        let readout = if self.readout_oversampling {2*self.matrix} else {self.matrix};
        if readout > u16::MAX as usize {
            return invalid(format!("readout of {} samples does not fit a header",readout))
        }
        if self.partial_echo_samples > readout/2 {
            return invalid(format!(
                "partial echo of {} samples cuts past the echo center of a {} sample readout",
                self.partial_echo_samples,readout
            ))
        }
        Ok(())
    }
}

/// complex Shepp-Logan phantom with a gentle linear phase, shape (y,x)
pub fn shepp_logan(nx:usize,ny:usize) -> Array2<Complex32> {
    Array2::from_shape_fn((ny,nx),|(iy,ix)| {
        let x = (2.0*ix as f32 - nx as f32)/nx as f32;
        let y = (2.0*iy as f32 - ny as f32)/ny as f32;
        let mut v = 0.0f32;
        for &(a,sa,sb,x0,y0,phi) in SHEPP_LOGAN.iter() {
            let (sin,cos) = (phi*PI/180.0).sin_cos();
            let xr = (x - x0)*cos + (y - y0)*sin;
            let yr = -(x - x0)*sin + (y - y0)*cos;
            if (xr/sa).powi(2) + (yr/sb).powi(2) <= 1.0 {
                v += a;
            }
        }
        Complex32::from_polar(v,0.4*x)
    })
}

/// smooth gaussian receive profiles arranged in a ring around the object, shape (coil,z=1,y,x)
pub fn coil_profiles(coils:u16,nx:usize,ny:usize) -> Array4<Complex32> {
    Array4::from_shape_fn((coils as usize,1,ny,nx),|(c,_,iy,ix)| {
        let theta = 2.0*PI*(c as f32)/(coils as f32);
        let (cy,cx) = (1.2*theta.sin(),1.2*theta.cos());
        let x = (2.0*ix as f32 - nx as f32)/nx as f32;
        let y = (2.0*iy as f32 - ny as f32)/ny as f32;
        let d2 = (x - cx).powi(2) + (y - cy).powi(2);
        Complex32::from_polar((-d2/2.0).exp(),theta + 0.3*(x*cx + y*cy))
    })
}

pub fn simulate(p:&PhantomSettings) -> Result<AcquisitionData> {
    p.validate()?;
    let encoding = p.encoding();
    let encoded = encoding.encoded_matrix();
    let recon = encoding.recon_matrix();
    let channels = p.coils as usize;
    let mut rng = StdRng::seed_from_u64(p.seed);
    let mixing = noise_mixing(channels);
    let n_samples = encoded.x - p.partial_echo_samples;
    let profiles = coil_profiles(p.coils,encoded.x,encoded.y);

    let mut acquisitions = Vec::<Acquisition>::new();
    let mut counter = 0u32;
    let mut template = AcquisitionHeader::default();
    template.active_channels = p.coils;
    template.sample_time_us = 5.0;
    template.measurement_uid = p.seed as u32;

    for _ in 0..p.noise_scans {
        let mut head = template.clone();
        head.number_of_samples = encoded.x as u16;
        head.center_sample = (encoded.x/2) as u16;
        head.scan_counter = counter;
        head.acquisition_time_stamp = counter;
        head.set_flag(AcquisitionFlag::IsNoiseMeasurement);
        let data = correlated_noise(&mut rng,&mixing,encoded.x,p.noise_level);
        acquisitions.push(Acquisition::new(head,data)?);
        counter += 1;
    }

    let object = shepp_logan(recon.x,recon.y).insert_axis(ndarray::Axis(0));
    for rep in 0..p.repetitions {
        // one k-space per slice for this repetition
        let kspaces:Vec<Array4<Complex32>> = (0..p.slices).map(|slice| {
            let scale = (1.0 - 0.1*slice as f32)*(1.0 + 0.05*rep as f32);
            let img = object.mapv(|z| z*scale).insert_axis(ndarray::Axis(0));
            let img = kspace::resize_center(&img,MatrixSize::new(encoded.x,encoded.y,1));
            let mut coil_images = profiles.clone();
            let img3 = img.slice(s![0,..,..,..]).to_owned();
            for mut c in coil_images.outer_iter_mut() {
                c *= &img3;
            }
            kspace::images_to_kspace(&coil_images,encoded)
        }).collect();
        for e1 in 0..encoded.y {
            for slice in 0..p.slices {
                let mut head = template.clone();
                head.number_of_samples = n_samples as u16;
                head.center_sample = (encoded.x/2 - p.partial_echo_samples) as u16;
                head.scan_counter = counter;
                head.acquisition_time_stamp = counter;
                head.idx.kspace_encode_step_1 = e1 as u16;
                head.idx.slice = slice;
                head.idx.repetition = rep;
                let z = (slice as f32 - (p.slices as f32 - 1.0)/2.0)*SLICE_THICKNESS_MM;
                head.position = [0.0,0.0,z];
                head.patient_table_position = [0.0,0.0,-1000.0 + z];
                if e1 == 0 {
                    head.set_flag(AcquisitionFlag::FirstInSlice);
                }
                if e1 == encoded.y - 1 {
                    head.set_flag(AcquisitionFlag::LastInSlice);
                    if slice == p.slices - 1 {
                        head.set_flag(AcquisitionFlag::LastInRepetition);
                        if rep == p.repetitions - 1 {
                            head.set_flag(AcquisitionFlag::LastInMeasurement);
                        }
                    }
                }
                let line = kspaces[slice as usize].slice(s![..,0,e1,p.partial_echo_samples..]).to_owned();
                let data = line + correlated_noise(&mut rng,&mixing,n_samples,p.noise_level);
                acquisitions.push(Acquisition::new(head,data)?);
                counter += 1;
            }
        }
    }
    info!("simulated {} readouts ({} coils, {} slices, {} repetitions)",acquisitions.len(),channels,p.slices,p.repetitions);
    Ok(AcquisitionData::new(encoding,acquisitions))
}

fn noise_mixing(channels:usize) -> Array2<f32> {
    Array2::from_shape_fn((channels,channels),|(i,j)| {
        match (i,j) {
            (i,j) if i == j => 1.0,
            (i,j) if i == j + 1 => 0.3,
            _=> 0.0
        }
    })
}

fn correlated_noise(rng:&mut StdRng,mixing:&Array2<f32>,samples:usize,level:f32) -> Array2<Complex32> {
    let channels = mixing.shape()[0];
    if level == 0.0 {
        return Array2::zeros((channels,samples))
    }
    let white = Array2::from_shape_fn((channels,samples),|_| gaussian(rng)*level);
    let mut out = Array2::<Complex32>::zeros((channels,samples));
    for i in 0..channels {
        for j in 0..=i {
            let m = mixing[[i,j]];
            if m != 0.0 {
                let mut row = out.slice_mut(s![i,..]);
                row.zip_mut_with(&white.slice(s![j,..]),|o,w| *o += *w*m);
            }
        }
    }
    out
}

fn gaussian(rng:&mut StdRng) -> Complex32 {
    let u1:f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2:f32 = rng.gen();
    let r = (-2.0*u1.ln()).sqrt()/2.0f32.sqrt();
    Complex32::from_polar(r,2.0*PI*u2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> PhantomSettings {
        PhantomSettings {
            matrix:16,
            coils:3,
            slices:2,
            repetitions:2,
            noise_scans:4,
            ..PhantomSettings::default()
        }
    }

    #[test]
    fn readout_counts_and_shapes(){
        let p = small();
        let d = simulate(&p).unwrap();
        assert_eq!(d.number(),4 + 2*2*16);
        assert_eq!(d.iter().filter(|a| a.is_noise()).count(),4);
        let a = d.imaging().next().unwrap();
        assert_eq!(a.samples(),32);
        assert_eq!(a.channels(),3);
        assert_eq!(a.head.center_sample,16);
        assert!(d.encoding().has_readout_oversampling());
        // slice interleaved, so not yet in sorted order
        assert!(!d.is_sorted());
    }

    #[test]
    fn simulation_is_deterministic(){
        let p = small();
        assert_eq!(simulate(&p).unwrap(),simulate(&p).unwrap());
    }

    #[test]
    fn partial_echo_shortens_readouts(){
        let p = PhantomSettings {partial_echo_samples:6,..small()};
        let d = simulate(&p).unwrap();
        let a = d.imaging().next().unwrap();
        assert_eq!(a.samples(),26);
        assert_eq!(a.head.center_sample,10);
    }

    #[test]
    fn phantom_has_structure(){
        let img = shepp_logan(32,32);
        assert!(img[[16,16]].norm() > 0.0);
        assert_eq!(img[[0,0]].norm(),0.0);
        let e = coil_profiles(4,8,8).map(|z| z.norm_sqr()).sum_axis(ndarray::Axis(0));
        assert!(e.iter().all(|v| *v > 0.0));
    }

    #[test]
    fn empty_or_inconsistent_settings_are_rejected(){
        let bad = [
            PhantomSettings {slices:0,..small()},
            PhantomSettings {repetitions:0,..small()},
            PhantomSettings {matrix:0,..small()},
            PhantomSettings {coils:0,..small()},
            PhantomSettings {matrix:8,partial_echo_samples:40,..small()},
            PhantomSettings {matrix:40000,..small()},
        ];
        for p in bad.iter() {
            assert!(matches!(simulate(p),Err(MrDataError::InvalidSettings(_))),"{:?}",p);
        }
        // cutting right up to the echo center is allowed
        let p = PhantomSettings {matrix:8,partial_echo_samples:8,noise_scans:0,slices:1,repetitions:1,..small()};
        let a = simulate(&p).unwrap();
        assert_eq!(a.imaging().next().unwrap().head.center_sample,0);
    }
}
