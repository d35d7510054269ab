//! Readout level corrections applied before reconstruction: receiver noise
//! prewhitening, partial echo zero filling and removal of 2x readout oversampling.
use ndarray::{s, Array2, Axis};
use num_complex::{Complex32, Complex64};
use log::{info, warn};
use mr_data::{Acquisition, AcquisitionData, EncodingParameters};
use utils::{cfft_axis, FftDirection};
use crate::error::{ReconError, Result};
use crate::recon_config::PreprocessSettings;

/// sample covariance of the receiver noise, channels x channels.
/// None when no noise samples are available
pub fn noise_covariance<'a,I>(noise:I,channels:usize) -> Result<Option<Array2<Complex64>>>
    where I:IntoIterator<Item=&'a Acquisition> {
    let mut cov = Array2::<Complex64>::zeros((channels,channels));
    let mut n_samples = 0usize;
    for acq in noise {
        if acq.channels() != channels {
            return Err(ReconError::DimensionMismatch(format!(
                "noise scan has {} channels, expected {}",acq.channels(),channels
            )))
        }
        for sample in acq.data.axis_iter(Axis(1)) {
            for i in 0..channels {
                let si = to_c64(sample[i]);
                for j in 0..channels {
                    cov[[i,j]] += si*to_c64(sample[j]).conj();
                }
            }
        }
        n_samples += acq.samples();
    }
    if n_samples == 0 {
        return Ok(None)
    }
    cov.mapv_inplace(|z| z/(n_samples as f64));
    Ok(Some(cov))
}

/// inverse of the lower cholesky factor of `cov`. Applying it to the channel
/// axis of a readout leaves uncorrelated noise of unit variance
pub fn whitening_matrix(cov:&Array2<Complex64>) -> Result<Array2<Complex32>> {
    let n = cov.shape()[0];
    let mut l = Array2::<Complex64>::zeros((n,n));
    for j in 0..n {
        let d = cov[[j,j]].re - (0..j).map(|k| l[[j,k]].norm_sqr()).sum::<f64>();
        if d <= 0.0 || !d.is_finite() {
            return Err(ReconError::SingularNoiseCovariance)
        }
        let ljj = d.sqrt();
        l[[j,j]] = Complex64::new(ljj,0.0);
        for i in j+1..n {
            let mut acc = cov[[i,j]];
            for k in 0..j {
                acc -= l[[i,k]]*l[[j,k]].conj();
            }
            l[[i,j]] = acc/ljj;
        }
    }
    // forward substitution, one column of the inverse at a time
    let mut w = Array2::<Complex64>::zeros((n,n));
    for col in 0..n {
        for i in 0..n {
            let mut acc = match i == col {
                true => Complex64::new(1.0,0.0),
                false => Complex64::new(0.0,0.0)
            };
            for k in 0..i {
                acc -= l[[i,k]]*w[[k,col]];
            }
            w[[i,col]] = acc/l[[i,i]];
        }
    }
    Ok(w.mapv(|z| Complex32::new(z.re as f32,z.im as f32)))
}

pub fn prewhiten(acq:&mut Acquisition,whitener:&Array2<Complex32>) -> Result<()> {
    if whitener.shape()[1] != acq.channels() {
        return Err(ReconError::DimensionMismatch(format!(
            "readout has {} channels, the noise scans had {}",acq.channels(),whitener.shape()[1]
        )))
    }
    acq.data = whitener.dot(&acq.data);
    Ok(())
}

/// zero fill the start of a partial echo readout so that the echo sits at
/// encoded_x/2. Returns false when the readout needed no adjustment
pub fn adjust_asymmetric_echo(acq:&mut Acquisition,encoded_x:usize) -> Result<bool> {
    let n = acq.samples();
    let center = acq.head.center_sample as usize;
    let target = encoded_x/2;
    if n >= encoded_x || center >= target {
        return Ok(false)
    }
    let offset = target - center;
    if offset + n > encoded_x {
        return Err(ReconError::DimensionMismatch(format!(
            "readout of {} samples centered at {} does not fit {} encoded samples",n,center,encoded_x
        )))
    }
    let mut data = Array2::<Complex32>::zeros((acq.channels(),encoded_x));
    data.slice_mut(s![..,offset..offset+n]).assign(&acq.data);
    acq.data = data;
    acq.head.number_of_samples = encoded_x as u16;
    acq.head.center_sample = target as u16;
    Ok(true)
}

pub fn remove_readout_oversampling(acq:&mut Acquisition) {
    let n = acq.samples();
    if n < 2 {
        return
    }
    let keep = n/2;
    let start = n/2 - keep/2;
    let mut profile = acq.data.clone();
    cfft_axis(&mut profile,1,FftDirection::Inverse);
    let mut cropped = profile.slice(s![..,start..start+keep]).to_owned();
    cfft_axis(&mut cropped,1,FftDirection::Forward);
    acq.data = cropped;
    acq.head.number_of_samples = keep as u16;
    acq.head.center_sample /= 2;
}

pub fn remove_oversampling_from_encoding(encoding:&mut EncodingParameters) {
    if encoding.has_readout_oversampling() {
        encoding.encoded_space.matrix_size.x = encoding.recon_space.matrix_size.x;
        encoding.encoded_space.field_of_view_mm.x = encoding.recon_space.field_of_view_mm.x;
    }
}

/// the corrections selected in `settings` applied to every readout with plain function calls
pub fn preprocess(acq:&AcquisitionData,settings:&PreprocessSettings) -> Result<AcquisitionData> {
    let channels = acq.channels();
    let whitener = match settings.noise_adjust {
        true => match noise_covariance(acq.iter().filter(|a| a.is_noise()),channels)? {
            Some(cov) => Some(whitening_matrix(&cov)?),
            None => {
                warn!("no noise scans found, skipping noise prewhitening");
                None
            }
        }
        false => None
    };
    let (mut encoding,acquisitions) = acq.clone().into_parts();
    let encoded_x = encoding.encoded_matrix().x;
    let oversampled = settings.remove_oversampling && encoding.has_readout_oversampling();
    let mut out = Vec::<Acquisition>::with_capacity(acquisitions.len());
    for mut a in acquisitions {
        if a.is_noise() && settings.noise_adjust {
            continue
        }
        if let Some(w) = &whitener {
            prewhiten(&mut a,w)?;
        }
        if settings.asymmetric_echo {
            adjust_asymmetric_echo(&mut a,encoded_x)?;
        }
        if oversampled {
            remove_readout_oversampling(&mut a);
        }
        out.push(a);
    }
    if oversampled {
        remove_oversampling_from_encoding(&mut encoding);
    }
    info!("pre-processed {} of {} readouts",out.len(),acq.number());
    Ok(AcquisitionData::new(encoding,out))
}

fn to_c64(z:Complex32) -> Complex64 {
    Complex64::new(z.re as f64,z.im as f64)
}
