//! Cartesian k-space gridding. K-space and coil image arrays are laid out
//! (coil, e2/z, e1/y, readout/x)
use ndarray::{s, Array2, Array4};
use num_complex::Complex32;
use utils::{cfftn, FftDirection};
use crate::acquisition::Acquisition;
use crate::encoding::MatrixSize;
use crate::error::{MrDataError, Result};

const SPATIAL_AXES:[usize;3] = [1,2,3];

pub fn check_readout(acq:&Acquisition,encoded:MatrixSize,channels:usize) -> Result<()> {
    let idx = &acq.head.idx;
    if acq.samples() != encoded.x {
        return Err(MrDataError::ShapeMismatch(format!(
            "readout has {} samples, encoded matrix x is {}",acq.samples(),encoded.x
        )))
    }
    if acq.channels() != channels {
        return Err(MrDataError::ShapeMismatch(format!(
            "readout has {} channels, expected {}",acq.channels(),channels
        )))
    }
    if idx.kspace_encode_step_1 as usize >= encoded.y || idx.kspace_encode_step_2 as usize >= encoded.z {
        return Err(MrDataError::ShapeMismatch(format!(
            "encode step ({},{}) outside the encoded matrix {}x{}",
            idx.kspace_encode_step_1,idx.kspace_encode_step_2,encoded.y,encoded.z
        )))
    }
    Ok(())
}

/// place readouts on the cartesian grid. Readouts landing on the same line are
/// summed, or averaged when `average` is set
pub fn grid<'a,I>(readouts:I,encoded:MatrixSize,channels:usize,average:bool) -> Result<Array4<Complex32>>
    where I:IntoIterator<Item=&'a Acquisition> {
    let (nz,ny,nx) = encoded.shape();
    let mut kspace = Array4::<Complex32>::zeros((channels,nz,ny,nx));
    let mut hits = Array2::<u32>::zeros((nz,ny));
    for acq in readouts {
        check_readout(acq,encoded,channels)?;
        let e1 = acq.head.idx.kspace_encode_step_1 as usize;
        let e2 = acq.head.idx.kspace_encode_step_2 as usize;
        let mut line = kspace.slice_mut(s![..,e2,e1,..]);
        line += &acq.data;
        hits[[e2,e1]] += 1;
    }
    if average {
        for ((e2,e1),&n) in hits.indexed_iter() {
            if n > 1 {
                let mut line = kspace.slice_mut(s![..,e2,e1,..]);
                line.mapv_inplace(|z| z/(n as f32));
            }
        }
    }
    Ok(kspace)
}

pub fn sample(kspace:&Array4<Complex32>,acq_e1:u16,acq_e2:u16) -> Array2<Complex32> {
    kspace.slice(s![..,acq_e2 as usize,acq_e1 as usize,..]).to_owned()
}

/// inverse transform of every coil followed by a centered resize to `recon`
pub fn kspace_to_images(mut kspace:Array4<Complex32>,recon:MatrixSize) -> Array4<Complex32> {
    cfftn(&mut kspace,&SPATIAL_AXES,FftDirection::Inverse);
    resize_center(&kspace,recon)
}

pub fn images_to_kspace(images:&Array4<Complex32>,encoded:MatrixSize) -> Array4<Complex32> {
    let mut kspace = resize_center(images,encoded);
    cfftn(&mut kspace,&SPATIAL_AXES,FftDirection::Forward);
    kspace
}

/// crop or zero pad the spatial axes around their centers. Cropping and
/// padding between the same two sizes are adjoint to each other
pub fn resize_center(arr:&Array4<Complex32>,target:MatrixSize) -> Array4<Complex32> {
    let shape = arr.shape();
    let (tz,ty,tx) = target.shape();
    if shape[1] == tz && shape[2] == ty && shape[3] == tx {
        return arr.clone()
    }
    let mut out = Array4::<Complex32>::zeros((shape[0],tz,ty,tx));
    let z = overlap(shape[1],tz);
    let y = overlap(shape[2],ty);
    let x = overlap(shape[3],tx);
    out.slice_mut(s![..,z.1..z.1+z.2,y.1..y.1+y.2,x.1..x.1+x.2])
        .assign(&arr.slice(s![..,z.0..z.0+z.2,y.0..y.0+y.2,x.0..x.0+x.2]));
    out
}

/// (source offset, destination offset, length) keeping index n/2 aligned with m/2
fn overlap(n:usize,m:usize) -> (usize,usize,usize) {
    match n >= m {
        true => (n/2 - m/2,0,m),
        false => (0,m/2 - n/2,n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::AcquisitionHeader;

    fn line(e1:u16,value:f32) -> Acquisition {
        let mut head = AcquisitionHeader::default();
        head.number_of_samples = 4;
        head.active_channels = 2;
        head.idx.kspace_encode_step_1 = e1;
        Acquisition::new(head,Array2::from_elem((2,4),Complex32::new(value,0.0))).unwrap()
    }

    #[test]
    fn duplicate_lines_are_averaged(){
        let m = MatrixSize::new(4,4,1);
        let acqs = vec![line(1,1.0),line(1,3.0),line(2,5.0)];
        let summed = grid(&acqs,m,2,false).unwrap();
        let averaged = grid(&acqs,m,2,true).unwrap();
        assert_eq!(summed[[0,0,1,0]].re,4.0);
        assert_eq!(averaged[[1,0,1,3]].re,2.0);
        assert_eq!(averaged[[0,0,2,2]].re,5.0);
        assert_eq!(averaged[[0,0,0,0]].re,0.0);
        assert_eq!(sample(&averaged,2,0),Array2::from_elem((2,4),Complex32::new(5.0,0.0)));
    }

    #[test]
    fn readouts_outside_the_matrix_are_rejected(){
        let m = MatrixSize::new(4,4,1);
        assert!(grid(&[line(4,1.0)],m,2,false).is_err());
        assert!(grid(&[line(0,1.0)],MatrixSize::new(8,4,1),2,false).is_err());
        assert!(grid(&[line(0,1.0)],m,3,false).is_err());
    }

    #[test]
    fn crop_and_pad_are_adjoint(){
        let big = Array4::from_shape_fn((1,1,6,8),|(_,_,y,x)| Complex32::new(x as f32,y as f32));
        let small = Array4::from_shape_fn((1,1,3,4),|(_,_,y,x)| Complex32::new(1.0,(x*y) as f32));
        let cropped = resize_center(&big,MatrixSize::new(4,3,1));
        let padded = resize_center(&small,MatrixSize::new(8,6,1));
        let lhs:Complex32 = cropped.iter().zip(small.iter()).map(|(a,b)| a.conj()*b).sum();
        let rhs:Complex32 = big.iter().zip(padded.iter()).map(|(a,b)| a.conj()*b).sum();
        assert!((lhs-rhs).norm() < 1e-4);
        // the center sample stays the center sample
        assert_eq!(cropped[[0,0,1,2]],big[[0,0,3,4]]);
    }

    #[test]
    fn images_round_trip_through_kspace(){
        let m = MatrixSize::new(8,6,1);
        let img = Array4::from_shape_fn((2,1,6,8),|(c,_,y,x)| Complex32::new((x+c) as f32,y as f32));
        let k = images_to_kspace(&img,m);
        let back = kspace_to_images(k,m);
        img.iter().zip(back.iter()).for_each(|(a,b)| assert!((a-b).norm() < 1e-4));
    }
}
