//! Append-only image store. A store holds named groups of images so a series
//! of reconstructions can be written to the same file, each under its own
//! group (typically a timestamp).
//!
//! Layout (little endian): magic `MRIM`, u16 format version, then group
//! records of u16 name length, name bytes, u32 image count and for each
//! image a fixed header followed by `channels*z*y*x` (re,im) f32 pairs.
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array4;
use log::info;
use crate::error::{MrDataError, Result};
use crate::image::{Image, ImageData, ImageHeader};
use crate::raw_file::{read_f32x3, read_samples, sample_count, write_f32x3, write_samples};

pub const MAGIC:&[u8;4] = b"MRIM";
pub const FORMAT_VERSION:u16 = 1;

pub fn append_group(path:&Path,group:&str,images:&ImageData) -> Result<()> {
    let exists = path.exists();
    let mut f = OpenOptions::new().read(true).write(true).create(true).open(path)?;
    match exists {
        true => {
            check_preamble(&mut f,path)?;
            f.seek(SeekFrom::End(0))?;
        }
        false => {
            f.write_all(MAGIC)?;
            f.write_u16::<LittleEndian>(FORMAT_VERSION)?;
        }
    }
    let mut w = BufWriter::new(f);
    let name = group.as_bytes();
    w.write_u16::<LittleEndian>(name.len() as u16)?;
    w.write_all(name)?;
    w.write_u32::<LittleEndian>(images.number() as u32)?;
    for img in images.iter() {
        write_header(&mut w,&img.head)?;
        write_samples(&mut w,img.data.iter())?;
    }
    w.flush()?;
    info!("appended {} images to group `{}` of {:?}",images.number(),group,path);
    Ok(())
}

pub fn read_group(path:&Path,group:&str) -> Result<ImageData> {
    let mut found = None;
    visit_groups(path,|name,images| {
        if name == group {
            found = Some(images);
        }
    })?;
    found.ok_or(MrDataError::GroupNotFound(group.to_string()))
}

pub fn list_groups(path:&Path) -> Result<Vec<String>> {
    let mut names = Vec::<String>::new();
    visit_groups(path,|name,_| names.push(name.to_string()))?;
    Ok(names)
}

fn visit_groups<F:FnMut(&str,ImageData)>(path:&Path,mut visit:F) -> Result<()> {
    let mut f = File::open(path)?;
    check_preamble(&mut f,path)?;
    let mut r = BufReader::new(f);
    loop {
        let name_len = match r.read_u16::<LittleEndian>() {
            Ok(n) => n as usize,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into())
        };
        let mut name = vec![0u8;name_len];
        r.read_exact(&mut name)?;
        let name = String::from_utf8_lossy(&name).to_string();
        let n = r.read_u32::<LittleEndian>()? as usize;
        let mut images = ImageData::default();
        for _ in 0..n {
            let head = read_header(&mut r)?;
            let m = head.matrix_size;
            let shape = (head.channels as usize,m[2] as usize,m[1] as usize,m[0] as usize);
            let samples = read_samples(&mut r,sample_count(&[shape.0,shape.1,shape.2,shape.3])?)?;
            let data = Array4::from_shape_vec(shape,samples)
                .map_err(|e| MrDataError::ShapeMismatch(e.to_string()))?;
            images.push(Image::new(head,data)?);
        }
        visit(&name,images);
    }
    Ok(())
}

fn check_preamble(f:&mut File,path:&Path) -> Result<()> {
    let mut magic = [0u8;4];
    f.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(MrDataError::BadMagic{path:path.display().to_string(),expected:"image store"})
    }
    let version = f.read_u16::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(MrDataError::UnsupportedVersion(version))
    }
    Ok(())
}

fn write_header<W:Write>(w:&mut W,h:&ImageHeader) -> Result<()> {
    w.write_u16::<LittleEndian>(h.version)?;
    w.write_u64::<LittleEndian>(h.flags)?;
    for v in [h.data_type,h.channels,h.slice,h.repetition,h.contrast,h.phase,h.set,h.average,
              h.image_type,h.image_index,h.image_series_index] {
        w.write_u16::<LittleEndian>(v)?;
    }
    for v in h.matrix_size {
        w.write_u16::<LittleEndian>(v)?;
    }
    write_f32x3(w,&h.field_of_view)?;
    write_f32x3(w,&h.position)?;
    write_f32x3(w,&h.read_dir)?;
    write_f32x3(w,&h.phase_dir)?;
    write_f32x3(w,&h.slice_dir)?;
    write_f32x3(w,&h.patient_table_position)?;
    w.write_u32::<LittleEndian>(h.acquisition_time_stamp)?;
    Ok(())
}

fn read_header<R:Read>(r:&mut R) -> Result<ImageHeader> {
    let version = r.read_u16::<LittleEndian>()?;
    let flags = r.read_u64::<LittleEndian>()?;
    let mut v = [0u16;11];
    r.read_u16_into::<LittleEndian>(&mut v)?;
    let mut matrix_size = [0u16;3];
    r.read_u16_into::<LittleEndian>(&mut matrix_size)?;
    Ok(ImageHeader {
        version,
        flags,
        data_type:v[0],
        channels:v[1],
        slice:v[2],
        repetition:v[3],
        contrast:v[4],
        phase:v[5],
        set:v[6],
        average:v[7],
        image_type:v[8],
        image_index:v[9],
        image_series_index:v[10],
        matrix_size,
        field_of_view:read_f32x3(r)?,
        position:read_f32x3(r)?,
        read_dir:read_f32x3(r)?,
        phase_dir:read_f32x3(r)?,
        slice_dir:read_f32x3(r)?,
        patient_table_position:read_f32x3(r)?,
        acquisition_time_stamp:r.read_u32::<LittleEndian>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex32;

    fn series(n:usize,value:f32) -> ImageData {
        let images = (0..n).map(|i| {
            let mut head = ImageHeader::default();
            head.matrix_size = [3,2,1];
            head.slice = i as u16;
            head.image_index = i as u16 + 1;
            Image::new(head,Array4::from_elem((1,1,2,3),Complex32::new(value,i as f32))).unwrap()
        }).collect();
        ImageData::new(images)
    }

    #[test]
    fn groups_are_appended_in_order(){
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mrim");
        let first = series(2,1.0);
        let second = series(3,2.0);
        first.write(&path,"Mon Oct 12 10:00:00 2026").unwrap();
        second.write(&path,"Mon Oct 12 10:05:00 2026").unwrap();
        assert_eq!(list_groups(&path).unwrap(),vec!["Mon Oct 12 10:00:00 2026","Mon Oct 12 10:05:00 2026"]);
        assert_eq!(ImageData::read_group(&path,"Mon Oct 12 10:05:00 2026").unwrap(),second);
        assert_eq!(ImageData::read_group(&path,"Mon Oct 12 10:00:00 2026").unwrap(),first);
        assert!(matches!(ImageData::read_group(&path,"nope"),Err(MrDataError::GroupNotFound(_))));
    }

    #[test]
    fn oversized_image_records_are_an_error(){
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.mrim");
        let mut buf = Vec::<u8>::new();
        buf.extend_from_slice(MAGIC);
        buf.write_u16::<LittleEndian>(FORMAT_VERSION).unwrap();
        buf.write_u16::<LittleEndian>(1).unwrap();
        buf.extend_from_slice(b"g");
        buf.write_u32::<LittleEndian>(u32::MAX).unwrap();
        let mut head = ImageHeader::default();
        head.channels = u16::MAX;
        head.matrix_size = [u16::MAX;3];
        write_header(&mut buf,&head).unwrap();
        std::fs::write(&path,&buf).unwrap();
        assert!(matches!(ImageData::read_group(&path,"g"),Err(MrDataError::Io(_))));
        assert!(list_groups(&path).is_err());
    }

    #[test]
    fn appending_to_a_foreign_file_fails(){
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign.bin");
        std::fs::write(&path,b"MRKS\x01\x00").unwrap();
        assert!(series(1,1.0).write(&path,"g").is_err());
    }
}
