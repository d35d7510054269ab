//! Raw k-space container.
//!
//! Layout (all little endian):
//! - 4 byte magic `MRKS`, u16 format version
//! - u32 length + JSON text of the [EncodingParameters]
//! - u32 acquisition count
//! - per acquisition a fixed [ACQ_HEADER_SIZE] byte header followed by
//!   `channels * samples` interleaved (re,im) f32 pairs, channel-major
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array2;
use num_complex::Complex32;
use log::{debug, info};
use crate::acquisition::{Acquisition, AcquisitionData, AcquisitionHeader, EncodingCounters};
use crate::encoding::EncodingParameters;
use crate::error::{MrDataError, Result};

pub const MAGIC:&[u8;4] = b"MRKS";
pub const FORMAT_VERSION:u16 = 1;
pub const ACQ_HEADER_SIZE:usize = 114;
const SAMPLE_CHUNK:usize = 4096;

pub fn write(data:&AcquisitionData,path:&Path) -> Result<()> {
    let f = File::create(path)?;
    let mut w = BufWriter::new(f);
    w.write_all(MAGIC)?;
    w.write_u16::<LittleEndian>(FORMAT_VERSION)?;
    let json = serde_json::to_vec(data.encoding())?;
    w.write_u32::<LittleEndian>(json.len() as u32)?;
    w.write_all(&json)?;
    w.write_u32::<LittleEndian>(data.number() as u32)?;
    for acq in data.iter() {
        write_header(&mut w,&acq.head)?;
        write_samples(&mut w,acq.data.iter())?;
    }
    w.flush()?;
    info!("wrote {} acquisitions to {:?}",data.number(),path);
    Ok(())
}

pub fn read(path:&Path) -> Result<AcquisitionData> {
    let f = File::open(path)?;
    let mut r = BufReader::new(f);
    let mut magic = [0u8;4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(MrDataError::BadMagic{path:path.display().to_string(),expected:"raw k-space"})
    }
    let version = r.read_u16::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(MrDataError::UnsupportedVersion(version))
    }
    let json_len = r.read_u32::<LittleEndian>()? as u64;
    let mut json = Vec::<u8>::new();
    (&mut r).take(json_len).read_to_end(&mut json)?;
    if json.len() as u64 != json_len {
        return Err(MrDataError::ShapeMismatch(format!(
            "encoding header of {} bytes is truncated at {}",json_len,json.len()
        )))
    }
    let encoding:EncodingParameters = serde_json::from_slice(&json)?;
    let n = r.read_u32::<LittleEndian>()? as usize;
    debug!("{:?}: {} acquisitions",path,n);
    let mut acquisitions = Vec::<Acquisition>::new();
    for _ in 0..n {
        let head = read_header(&mut r)?;
        let shape = (head.active_channels as usize,head.number_of_samples as usize);
        let samples = read_samples(&mut r,sample_count(&[shape.0,shape.1])?)?;
        let data = Array2::from_shape_vec(shape,samples)
            .map_err(|e| MrDataError::ShapeMismatch(e.to_string()))?;
        acquisitions.push(Acquisition::new(head,data)?);
    }
    info!("read {} acquisitions from {:?}",n,path);
    Ok(AcquisitionData::new(encoding,acquisitions))
}

pub(crate) fn write_samples<'a,W:Write>(w:&mut W,samples:impl Iterator<Item=&'a Complex32>) -> Result<()> {
    for z in samples {
        w.write_f32::<LittleEndian>(z.re)?;
        w.write_f32::<LittleEndian>(z.im)?;
    }
    Ok(())
}

pub(crate) fn sample_count(dims:&[usize]) -> Result<usize> {
    dims.iter().try_fold(1usize,|n,&d| n.checked_mul(d))
        .ok_or_else(|| MrDataError::ShapeMismatch(format!("record dimensions {:?} are too large",dims)))
}

/// reads in chunks so a corrupt count runs into the end of the file
/// before it can drive a large allocation
pub(crate) fn read_samples<R:Read>(r:&mut R,n:usize) -> Result<Vec<Complex32>> {
    let mut samples = Vec::<Complex32>::new();
    let mut floats = vec![0f32;2*SAMPLE_CHUNK];
    let mut left = n;
    while left > 0 {
        let m = left.min(SAMPLE_CHUNK);
        r.read_f32_into::<LittleEndian>(&mut floats[..2*m])?;
        samples.extend(floats[..2*m].chunks_exact(2).map(|p| Complex32::new(p[0],p[1])));
        left -= m;
    }
    Ok(samples)
}

pub(crate) fn write_f32x3<W:Write>(w:&mut W,v:&[f32;3]) -> Result<()> {
    for x in v {
        w.write_f32::<LittleEndian>(*x)?;
    }
    Ok(())
}

pub(crate) fn read_f32x3<R:Read>(r:&mut R) -> Result<[f32;3]> {
    let mut v = [0f32;3];
    r.read_f32_into::<LittleEndian>(&mut v)?;
    Ok(v)
}

fn write_header<W:Write>(w:&mut W,h:&AcquisitionHeader) -> Result<()> {
    w.write_u16::<LittleEndian>(h.version)?;
    w.write_u64::<LittleEndian>(h.flags)?;
    w.write_u32::<LittleEndian>(h.measurement_uid)?;
    w.write_u32::<LittleEndian>(h.scan_counter)?;
    w.write_u32::<LittleEndian>(h.acquisition_time_stamp)?;
    w.write_u16::<LittleEndian>(h.number_of_samples)?;
    w.write_u16::<LittleEndian>(h.active_channels)?;
    w.write_u16::<LittleEndian>(h.discard_pre)?;
    w.write_u16::<LittleEndian>(h.discard_post)?;
    w.write_u16::<LittleEndian>(h.center_sample)?;
    w.write_f32::<LittleEndian>(h.sample_time_us)?;
    write_f32x3(w,&h.position)?;
    write_f32x3(w,&h.read_dir)?;
    write_f32x3(w,&h.phase_dir)?;
    write_f32x3(w,&h.slice_dir)?;
    write_f32x3(w,&h.patient_table_position)?;
    let idx = &h.idx;
    for c in [idx.kspace_encode_step_1,idx.kspace_encode_step_2,idx.average,idx.slice,
              idx.contrast,idx.phase,idx.repetition,idx.set,idx.segment] {
        w.write_u16::<LittleEndian>(c)?;
    }
    Ok(())
}

fn read_header<R:Read>(r:&mut R) -> Result<AcquisitionHeader> {
    let version = r.read_u16::<LittleEndian>()?;
    let flags = r.read_u64::<LittleEndian>()?;
    let measurement_uid = r.read_u32::<LittleEndian>()?;
    let scan_counter = r.read_u32::<LittleEndian>()?;
    let acquisition_time_stamp = r.read_u32::<LittleEndian>()?;
    let number_of_samples = r.read_u16::<LittleEndian>()?;
    let active_channels = r.read_u16::<LittleEndian>()?;
    let discard_pre = r.read_u16::<LittleEndian>()?;
    let discard_post = r.read_u16::<LittleEndian>()?;
    let center_sample = r.read_u16::<LittleEndian>()?;
    let sample_time_us = r.read_f32::<LittleEndian>()?;
    let position = read_f32x3(r)?;
    let read_dir = read_f32x3(r)?;
    let phase_dir = read_f32x3(r)?;
    let slice_dir = read_f32x3(r)?;
    let patient_table_position = read_f32x3(r)?;
    let mut c = [0u16;9];
    r.read_u16_into::<LittleEndian>(&mut c)?;
    Ok(AcquisitionHeader {
        version,
        flags,
        measurement_uid,
        scan_counter,
        acquisition_time_stamp,
        number_of_samples,
        active_channels,
        discard_pre,
        discard_post,
        center_sample,
        sample_time_us,
        position,
        read_dir,
        phase_dir,
        slice_dir,
        patient_table_position,
        idx:EncodingCounters {
            kspace_encode_step_1:c[0],
            kspace_encode_step_2:c[1],
            average:c[2],
            slice:c[3],
            contrast:c[4],
            phase:c[5],
            repetition:c[6],
            set:c[7],
            segment:c[8],
        },
    })
}
