use num_complex::{Complex32, Complex64};
use rand::prelude::*;
use mr_data::{AcquisitionData, CoilImageData, CoilSensitivityData, ImageData};
use mr_data::phantom::{simulate, PhantomSettings};
use recon::{preprocess_acquisition_data, AcquisitionModel, FullySampledReconstructor, ImagesReconstructor, Reconstructor};
use recon::recon_config::{ChainSettings, Config};

fn phantom(repetitions:u16) -> AcquisitionData {
    let p = PhantomSettings {
        matrix:24,
        coils:4,
        slices:2,
        repetitions,
        noise_scans:6,
        ..PhantomSettings::default()
    };
    simulate(&p).unwrap()
}

/// pre-processed data, its reconstruction and an acquisition model with maps
fn model() -> (AcquisitionData,ImageData,AcquisitionModel) {
    let mut processed = preprocess_acquisition_data(&phantom(1)).unwrap();
    let mut recon = FullySampledReconstructor::new();
    recon.set_input(&processed);
    recon.process().unwrap();
    let images = recon.get_output().unwrap().clone();
    processed.sort();
    let mut csm = CoilSensitivityData::default();
    csm.calculate(&processed).unwrap();
    let mut m = AcquisitionModel::new();
    m.set_up(&processed,&images).unwrap();
    m.set_coil_sensitivity_maps(csm).unwrap();
    (processed,images,m)
}

fn random_value(rng:&mut StdRng) -> Complex32 {
    Complex32::new(rng.gen_range(-1.0..1.0),rng.gen_range(-1.0..1.0))
}

#[test]
fn backward_is_the_adjoint_of_forward(){
    let (acq,images,m) = model();
    let mut rng = StdRng::seed_from_u64(7);
    let x = ImageData::new(images.iter().map(|img| {
        let mut img = img.clone();
        img.data.mapv_inplace(|_| random_value(&mut rng));
        img
    }).collect());
    let mut y = acq.with_zero_data();
    for a in y.iter_mut() {
        a.data.mapv_inplace(|_| random_value(&mut rng));
    }
    let lhs:Complex64 = m.forward(&x).unwrap().dot(&y).unwrap();
    let rhs:Complex64 = x.dot(&m.backward(&y).unwrap()).unwrap();
    assert!((lhs - rhs).norm() < 1e-3*lhs.norm().max(1.0), "{} vs {}",lhs,rhs);
}

#[test]
fn fully_sampled_round_trip_recovers_the_images(){
    let (_,images,m) = model();
    let back = m.backward(&m.forward(&images).unwrap()).unwrap();
    assert_eq!(back.number(),images.number());
    let csm = m.coil_sensitivity_maps().unwrap();
    for (b,i) in back.iter().zip(images.iter()) {
        assert_eq!(b.matrix_size(),i.matrix_size());
        let maps = csm.map(i.head.slice).unwrap();
        let weight = maps.map(|z| z.norm_sqr()).sum_axis(ndarray::Axis(0));
        for ((idx,w),(p,q)) in weight.indexed_iter().zip(b.data.iter().zip(i.data.iter())) {
            if (w - 1.0).abs() < 1e-3 {
                assert!((p - q).norm() < 1e-3*(1.0 + q.norm()),"voxel {:?}: {} vs {}",idx,p,q);
            }
        }
    }
}

#[test]
fn forward_projection_norm_is_deterministic(){
    let (_,images,m) = model();
    let first = m.forward(&images).unwrap().norm();
    let second = m.forward(&images).unwrap().norm();
    assert_eq!(first,second);
    assert!(first > 0.0);
}

#[test]
fn coil_images_give_the_same_maps(){
    let processed = preprocess_acquisition_data(&phantom(1)).unwrap();
    let mut direct = CoilSensitivityData::default();
    direct.calculate(&processed).unwrap();
    let mut from_images = CoilSensitivityData::default();
    from_images.calculate_from_images(&CoilImageData::calculate(&processed).unwrap()).unwrap();
    assert_eq!(direct,from_images);
}

#[test]
fn sorting_is_idempotent(){
    let mut d = phantom(2);
    assert!(!d.is_sorted());
    d.sort();
    let once = d.clone();
    d.sort();
    assert_eq!(d,once);
    let keys:Vec<(u16,u16,u16)> = d.imaging()
        .map(|a| (a.head.idx.repetition,a.head.idx.slice,a.head.idx.kspace_encode_step_1))
        .collect();
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn output_is_unavailable_before_processing(){
    let mut r = ImagesReconstructor::new().unwrap();
    r.set_input(&phantom(1));
    assert!(r.get_output().is_err());
    let mut f = FullySampledReconstructor::new();
    f.set_input(&phantom(1));
    assert!(f.get_output().is_err());
}

#[test]
fn trigger_dimension_changes_grouping_not_stage_order(){
    let mut d = phantom(2);
    d.sort();
    let run = |trigger:&str| {
        let mut settings = ChainSettings::default();
        settings.gadgets[1].properties.insert("trigger_dimension".to_string(),trigger.to_string());
        let mut r = ImagesReconstructor::from_chain(settings.build().unwrap());
        r.set_input(&d);
        r.process().unwrap();
        let classes = r.chain().class_names();
        let buckets = r.report()[1].messages;
        (classes,buckets,r.get_output().unwrap().number())
    };
    let (by_rep,rep_buckets,rep_images) = run("repetition");
    let (by_slice,slice_buckets,slice_images) = run("slice");
    assert_eq!(by_rep,by_slice);
    assert_eq!(by_rep,vec![
        "RemoveROOversamplingGadget",
        "AcquisitionAccumulateTriggerGadget",
        "BucketToBufferGadget",
        "SimpleReconGadget",
        "ImageArraySplitGadget",
        "ExtractGadget",
    ]);
    assert_eq!(rep_buckets,2);
    assert_eq!(slice_buckets,4);
    // the same images either way, grouped differently on the way
    assert_eq!(rep_images,4);
    assert_eq!(slice_images,4);
}

#[test]
fn images_and_raw_data_survive_the_file_formats(){
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("scan.mrk");
    let d = phantom(1);
    d.write(&raw).unwrap();
    assert_eq!(AcquisitionData::read(&raw).unwrap(),d);

    let mut r = ImagesReconstructor::new().unwrap();
    r.set_input(&d);
    r.process().unwrap();
    let images = r.get_output().unwrap();
    let store = dir.path().join("output1.mrim");
    images.write(&store,"first").unwrap();
    images.write(&store,"second").unwrap();
    assert_eq!(mr_data::image_store::list_groups(&store).unwrap(),vec!["first","second"]);
    assert_eq!(&ImageData::read_group(&store,"second").unwrap(),images);
}
