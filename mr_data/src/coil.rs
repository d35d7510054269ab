use std::collections::BTreeMap;
use ndarray::{s, Array4, Axis};
use num_complex::Complex32;
use log::{debug, info};
use crate::acquisition::AcquisitionData;
use crate::encoding::{MatrixSize, Trajectory};
use crate::error::{MrDataError, Result};
use crate::kspace;

/// default number of 3x3 smoothing passes applied before normalisation
pub const DEFAULT_SMOOTHNESS:u32 = 1;

/// relative root-sum-of-squares level below which a voxel has no sensitivity
const RSS_THRESHOLD:f32 = 1e-6;

#[derive(Clone,Debug,Default,PartialEq)]
pub struct CoilImageData {
    images:BTreeMap<u16,Array4<Complex32>>,
}

impl CoilImageData {

    /// grid every imaging readout of each slice (duplicate lines averaged over
    /// repetitions, averages and contrasts) and transform to image space
    pub fn calculate(acq:&AcquisitionData) -> Result<Self> {
        let encoding = acq.encoding();
        if encoding.trajectory != Trajectory::Cartesian {
            return Err(MrDataError::UnsupportedTrajectory)
        }
        let channels = acq.channels();
        let mut images = BTreeMap::<u16,Array4<Complex32>>::new();
        for slice in acq.slices() {
            let readouts = acq.imaging().filter(|a| a.head.idx.slice == slice);
            let k = kspace::grid(readouts,encoding.encoded_matrix(),channels,true)?;
            images.insert(slice,kspace::kspace_to_images(k,encoding.recon_matrix()));
        }
        debug!("computed coil images for {} slices",images.len());
        Ok(Self {images})
    }

    pub fn insert(&mut self,slice:u16,images:Array4<Complex32>) {
        self.images.insert(slice,images);
    }

    pub fn slices(&self) -> Vec<u16> {
        self.images.keys().cloned().collect()
    }

    pub fn coil_images(&self,slice:u16) -> Option<&Array4<Complex32>> {
        self.images.get(&slice)
    }

    pub fn iter(&self) -> impl Iterator<Item=(&u16,&Array4<Complex32>)> {
        self.images.iter()
    }
}

#[derive(Clone,Debug,PartialEq)]
pub struct CoilSensitivityData {
    smoothness:u32,
    maps:BTreeMap<u16,Array4<Complex32>>,
}

impl Default for CoilSensitivityData {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHNESS)
    }
}

impl CoilSensitivityData {

    pub fn new(smoothness:u32) -> Self {
        Self {
            smoothness,
            maps:BTreeMap::new(),
        }
    }

    pub fn from_maps(maps:BTreeMap<u16,Array4<Complex32>>) -> Self {
        Self {
            smoothness:0,
            maps,
        }
    }

    pub fn calculate(&mut self,acq:&AcquisitionData) -> Result<()> {
        let images = CoilImageData::calculate(acq)?;
        self.calculate_from_images(&images)
    }

    pub fn calculate_from_images(&mut self,images:&CoilImageData) -> Result<()> {
        self.maps.clear();
        for (slice,coil_images) in images.iter() {
            self.maps.insert(*slice,estimate_maps(coil_images,self.smoothness));
        }
        info!("estimated sensitivity maps for {} slices ({} coils)",self.maps.len(),self.coils());
        Ok(())
    }

    pub fn smoothness(&self) -> u32 {
        self.smoothness
    }

    pub fn map(&self,slice:u16) -> Result<&Array4<Complex32>> {
        self.maps.get(&slice).ok_or(MrDataError::NoCoilMap(slice))
    }

    pub fn slices(&self) -> Vec<u16> {
        self.maps.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn coils(&self) -> usize {
        self.maps.values().next().map(|m| m.shape()[0]).unwrap_or(0)
    }

    pub fn matrix_size(&self) -> Option<MatrixSize> {
        self.maps.values().next().map(|m| {
            let s = m.shape();
            MatrixSize::new(s[3],s[2],s[1])
        })
    }
}

/// smooth each coil image then divide by the root-sum-of-squares over coils,
/// so that the squared magnitudes of the maps sum to one wherever they are defined
pub fn estimate_maps(coil_images:&Array4<Complex32>,smoothness:u32) -> Array4<Complex32> {
    let mut smoothed = coil_images.clone();
    for _ in 0..smoothness {
        smoothed = smooth(&smoothed);
    }
    let rss = smoothed.map(|z| z.norm_sqr()).sum_axis(Axis(0)).mapv(f32::sqrt);
    let max = rss.iter().cloned().fold(0.0f32,f32::max);
    let threshold = RSS_THRESHOLD*max;
    let mut maps = smoothed;
    for mut coil in maps.outer_iter_mut() {
        coil.zip_mut_with(&rss,|z,&r| {
            *z = match r > threshold {
                true => *z/r,
                false => Complex32::new(0.0,0.0)
            }
        });
    }
    maps
}

/// sum over coils of conj(map) * image, returned with a single channel
pub fn combine(coil_images:&Array4<Complex32>,maps:&Array4<Complex32>) -> Array4<Complex32> {
    let s = coil_images.shape();
    let mut out = Array4::<Complex32>::zeros((1,s[1],s[2],s[3]));
    {
        let mut o = out.slice_mut(s![0,..,..,..]);
        for (img,map) in coil_images.outer_iter().zip(maps.outer_iter()) {
            ndarray::Zip::from(&mut o).and(&img).and(&map).for_each(|o,&i,&m| *o += m.conj()*i);
        }
    }
    out
}

pub fn rss(coil_images:&Array4<Complex32>) -> Array4<Complex32> {
    coil_images.map(|z| z.norm_sqr())
        .sum_axis(Axis(0))
        .mapv(|v| Complex32::new(v.sqrt(),0.0))
        .insert_axis(Axis(0))
}

/// 3x3 in-plane box filter, averaging over the neighbours that exist at the edges
fn smooth(img:&Array4<Complex32>) -> Array4<Complex32> {
    let (nc,nz,ny,nx) = img.dim();
    Array4::from_shape_fn((nc,nz,ny,nx),|(c,z,y,x)| {
        let mut acc = Complex32::new(0.0,0.0);
        let mut n = 0.0f32;
        for yy in y.saturating_sub(1)..=(y+1).min(ny-1) {
            for xx in x.saturating_sub(1)..=(x+1).min(nx-1) {
                acc += img[[c,z,yy,xx]];
                n += 1.0;
            }
        }
        acc/n
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coil_images() -> Array4<Complex32> {
        Array4::from_shape_fn((3,1,6,6),|(c,_,y,x)| {
            let w = 1.0 + (c as f32)*0.5 + (x as f32)*0.1;
            Complex32::from_polar(w*(1.0 + y as f32),0.3*c as f32)
        })
    }

    #[test]
    fn maps_are_normalised(){
        let maps = estimate_maps(&coil_images(),1);
        for z in 0..1 {
            for y in 0..6 {
                for x in 0..6 {
                    let e:f32 = (0..3).map(|c| maps[[c,z,y,x]].norm_sqr()).sum();
                    assert!((e-1.0).abs() < 1e-4);
                }
            }
        }
    }

    #[test]
    fn unsmoothed_combination_is_rss(){
        let imgs = coil_images();
        let maps = estimate_maps(&imgs,0);
        let combined = combine(&imgs,&maps);
        let r = rss(&imgs);
        assert_eq!(combined.shape(),&[1,1,6,6]);
        combined.iter().zip(r.iter()).for_each(|(a,b)| assert!((a-b).norm() < 1e-3));
    }

    #[test]
    fn empty_voxels_have_no_sensitivity(){
        let mut imgs = coil_images();
        imgs.slice_mut(s![..,..,0,0]).fill(Complex32::new(0.0,0.0));
        let maps = estimate_maps(&imgs,0);
        assert_eq!(maps[[0,0,0,0]],Complex32::new(0.0,0.0));
        let mut csm = CoilSensitivityData::from_maps(BTreeMap::from([(0u16,maps)]));
        assert_eq!(csm.coils(),3);
        assert_eq!(csm.matrix_size(),Some(MatrixSize::new(6,6,1)));
        assert!(csm.map(1).is_err());
        let mut coil_data = CoilImageData::default();
        coil_data.insert(2,imgs);
        csm.calculate_from_images(&coil_data).unwrap();
        assert_eq!(csm.slices(),vec![2]);
    }
}
