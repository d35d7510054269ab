use std::path::Path;
use std::fs::File;
use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use ndarray::{Array, Axis, Dimension};
use rustfft::{Fft, FftPlanner};
use num_complex::Complex;

/// direction of a centered fourier transform. Forward goes from image space to k-space
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum FftDirection {
    Forward,
    Inverse,
}

pub fn read_to_string(filepath:&Path,extension:&str) -> io::Result<String> {
    let p = filepath.with_extension(extension);
    let mut f = File::open(&p)?;
    let mut s = String::new();
    f.read_to_string(&mut s)?;
    Ok(s)
}

pub fn write_to_file(filepath:&Path,extension:&str,string:&str) -> io::Result<()> {
    let p = filepath.with_extension(extension);
    let mut f = File::create(p)?;
    f.write_all(string.as_bytes())
}

pub fn vec_to_string<T>(vec:&[T]) -> String
    where T:std::string::ToString {
    let vstr:Vec<String> = vec.iter().map(|num| num.to_string()).collect();
    vstr.join(" ")
}

pub fn timestamp_string() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("{}.{:03}",d.as_secs(),d.subsec_millis()),
        Err(_) => String::from("0.000")
    }
}

/// centered, orthonormal fourier transform of every lane along `axis`.
/// the zero frequency sits at index n/2 on both sides of the transform, so
/// forward followed by inverse is the identity and each is the adjoint of the other
pub fn cfft_axis<D:Dimension>(arr:&mut Array<Complex<f32>,D>,axis:usize,direction:FftDirection) {
    let n = arr.shape()[axis];
    if n < 2 {
        return
    }
    let mut planner = FftPlanner::<f32>::new();
    let fft = match direction {
        FftDirection::Forward => planner.plan_fft_forward(n),
        FftDirection::Inverse => planner.plan_fft_inverse(n),
    };
    let scale = 1.0/(n as f32).sqrt();
    let mut temp = vec![Complex::<f32>::new(0.0,0.0);n];
    for mut lane in arr.lanes_mut(Axis(axis)) {
        temp.iter_mut().zip(lane.iter()).for_each(|(t,v)| *t = *v);
        centered_transform(fft.as_ref(),&mut temp);
        lane.iter_mut().zip(temp.iter()).for_each(|(v,t)| *v = *t*scale);
    }
}

/// centered transform over several axes, applied in the order given
pub fn cfftn<D:Dimension>(arr:&mut Array<Complex<f32>,D>,axes:&[usize],direction:FftDirection) {
    for &axis in axes {
        cfft_axis(arr,axis,direction);
    }
}

fn centered_transform(fft:&dyn Fft<f32>,line:&mut [Complex<f32>]) {
    let n = line.len();
    // ifftshift
    line.rotate_left(n/2);
    fft.process(line);
    // fftshift
    line.rotate_right(n/2);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    #[test]
    fn forward_then_inverse_is_identity(){
        let mut a = Array2::<Complex<f32>>::from_shape_fn((6,5),|(i,j)| Complex::new(i as f32 - 2.0,(j*j) as f32));
        let orig = a.clone();
        cfftn(&mut a,&[0,1],FftDirection::Forward);
        cfftn(&mut a,&[0,1],FftDirection::Inverse);
        a.iter().zip(orig.iter()).for_each(|(x,y)| assert!((x-y).norm() < 1e-4));
    }

    #[test]
    fn transform_preserves_energy(){
        let mut a = Array1::<Complex<f32>>::from_shape_fn(16,|i| Complex::new((i as f32).sin(),0.5));
        let e0:f32 = a.iter().map(|z| z.norm_sqr()).sum();
        cfft_axis(&mut a,0,FftDirection::Forward);
        let e1:f32 = a.iter().map(|z| z.norm_sqr()).sum();
        assert!((e0-e1).abs() < 1e-3*e0);
    }

    #[test]
    fn constant_maps_to_center(){
        let mut a = Array1::<Complex<f32>>::from_elem(8,Complex::new(1.0,0.0));
        cfft_axis(&mut a,0,FftDirection::Forward);
        assert!((a[4].re - (8.0f32).sqrt()).abs() < 1e-4);
        assert!(a[0].norm() < 1e-4);
    }

    #[test]
    fn joined_with_spaces(){
        assert_eq!(vec_to_string(&[1,2,3]),"1 2 3");
    }
}
