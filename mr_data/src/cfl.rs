//! BART `.cfl/.hdr` export, handy for looking at images with external viewers
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use byteorder::{ByteOrder, LittleEndian};
use ndarray::{s, Array3};
use num_complex::Complex32;
use crate::error::Result;
use crate::image::Image;

fn write_cfl_header(vol:&Array3<Complex32>,cfl_base:&Path) -> Result<()> {
    let shape = vol.shape();
    let (hdr,_) = cfl_base_decode(cfl_base);
    let mut hdr = File::create(hdr)?;
    let hdr_str = format!("# Dimensions\n{} {} {} 1 1\n",shape[2],shape[1],shape[0]);
    hdr.write_all(hdr_str.as_bytes())?;
    Ok(())
}

/// channel 0 of `image` as a (z,y,x) complex volume
pub fn write_cfl_image(image:&Image,cfl_base:&Path) -> Result<()> {
    let vol = image.data.slice(s![0,..,..,..]).to_owned();
    write_cfl_vol(&vol,cfl_base)
}

fn write_cfl_vol(complex_volume:&Array3<Complex32>,cfl_base:&Path) -> Result<()> {
    let flat = complex_vol_to_vec(complex_volume);
    write_data(&flat,cfl_base)?;
    write_cfl_header(complex_volume,cfl_base)
}

fn write_data(flat:&[f32],cfl_base:&Path) -> Result<()> {
    let (_,cfl) = cfl_base_decode(cfl_base);
    let mut byte_buff:Vec<u8> = vec![0;flat.len()*4];
    LittleEndian::write_f32_into(flat,&mut byte_buff);
    let mut cfl = File::create(cfl)?;
    cfl.write_all(&byte_buff)?;
    Ok(())
}

fn complex_vol_to_vec(vol:&Array3<Complex32>) -> Vec<f32> {
    // logical (row major) order regardless of the memory layout
    let flat:Vec<Complex32> = vol.iter().cloned().collect();
    let mut cfl_flat:Vec<f32> = vec![0.0;flat.len()*2];
    flat.iter().enumerate().for_each(|(i,c_val)|{
        cfl_flat[2*i] = c_val.re;
        cfl_flat[2*i+1] = c_val.im;
    });
    cfl_flat
}

fn cfl_base_decode(cfl_base:&Path) -> (PathBuf,PathBuf) {
    (cfl_base.with_extension("hdr"),cfl_base.with_extension("cfl"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use ndarray::Array4;
    use crate::image::ImageHeader;

    fn get_dims(cfl_base:&Path) -> Vec<usize> {
        let (hdr,_) = cfl_base_decode(cfl_base);
        let mut s = String::new();
        File::open(hdr).unwrap().read_to_string(&mut s).unwrap();
        let lines:Vec<&str> = s.lines().collect();
        let i = lines.iter().position(|l| *l == "# Dimensions").unwrap();
        lines[i+1].split_whitespace().flat_map(|str| str.parse()).collect()
    }

    fn to_complex_volume(cfl_base:&Path) -> Array3<Complex32> {
        let (_,cfl) = cfl_base_decode(cfl_base);
        let mut buf = Vec::<u8>::new();
        File::open(cfl).unwrap().read_to_end(&mut buf).unwrap();
        let mut v:Vec<f32> = vec![0.0;buf.len()/4];
        LittleEndian::read_f32_into(&buf,&mut v);
        let dims = get_dims(cfl_base);
        let complex_arr:Vec<Complex32> = v.chunks_exact(2).map(|p| Complex32::new(p[0],p[1])).collect();
        Array3::from_shape_vec((dims[2],dims[1],dims[0]),complex_arr).unwrap()
    }

    #[test]
    fn image_export_reads_back(){
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("img");
        let mut head = ImageHeader::default();
        head.matrix_size = [4,3,2];
        let data = Array4::from_shape_fn((1,2,3,4),|(_,z,y,x)| Complex32::new(x as f32,(y*10+z) as f32));
        let img = Image::new(head,data).unwrap();
        write_cfl_image(&img,&base).unwrap();
        assert_eq!(get_dims(&base),vec![4,3,2,1,1]);
        let vol = to_complex_volume(&base);
        assert_eq!(vol,img.data.slice(s![0,..,..,..]).to_owned());
        assert!((vol[[1,2,3]].norm() - Complex32::new(3.0,21.0).norm()).abs() < 1e-6);
    }
}
