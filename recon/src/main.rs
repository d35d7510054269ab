use std::path::{Path, PathBuf};
use clap::Parser;
use flexi_logger::Logger;
use log::{info, warn};
use mr_data::{AcquisitionData, CoilSensitivityData, ImageData};
use mr_data::phantom::{simulate, PhantomSettings};
use recon::{AcquisitionModel, EngineKind, ImagesReconstructor, ReconError, Reconstructor, Result};
use recon::recon_config::{Config, ConfigFile, ReconSettings};

const DEFAULT_RAW_FILE:&str = "simulated_MR_2D_cartesian.mrk";

const INFO_FIELDS:[&str;9] = [
    "version", "flags", "data_type", "channels",
    "slice", "repetition",
    "image_type", "image_index", "image_series_index",
];

#[derive(clap::Parser,Debug)]
#[command(version, about = "MR acquisition model and gadget chain reconstruction")]
pub struct ReconArgs {
    #[command(subcommand)]
    pub action: ReconAction,
}

#[derive(clap::Subcommand,Debug)]
pub enum ReconAction {
    /// compute coil sensitivity maps and project images into acquisition space and back
    Model(ModelArgs),
    /// reconstruct images with a gadget chain and append them to an image store
    Chain(ChainArgs),
    /// write simulated multi-coil cartesian raw data
    Phantom(PhantomArgs),
    /// write the default reconstruction settings to edit for a new protocol
    NewConfig(NewConfigArgs),
}

#[derive(Clone,clap::Args,Debug)]
pub struct ModelArgs {
    /// raw data file
    #[clap(long,short,default_value = DEFAULT_RAW_FILE)]
    file:PathBuf,
    /// path to data files
    #[clap(long,short,default_value = ".")]
    path:PathBuf,
    /// write the sorted, pre-processed acquisition data here and stop
    #[clap(long,short)]
    output:Option<PathBuf>,
    /// reconstruction engine. Overrides the engine of the settings file (default gadgets)
    #[clap(long,short,value_enum)]
    engine:Option<EngineKind>,
    /// reconstruction settings (toml)
    #[clap(long,short)]
    config:Option<PathBuf>,
    /// export the first back projected image as a BART cfl/hdr pair
    #[clap(long)]
    cfl:Option<PathBuf>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct ChainArgs {
    /// raw data file
    #[clap(long,short,default_value = DEFAULT_RAW_FILE)]
    file:PathBuf,
    /// path to data files
    #[clap(long,short,default_value = ".")]
    path:PathBuf,
    /// image store the reconstructed images are appended to
    #[clap(long,short,default_value = "output1.mrim")]
    output:PathBuf,
    /// group name in the image store. Defaults to the current time
    #[clap(long,short)]
    group:Option<String>,
    /// reconstruction settings (toml) holding the gadget chain
    #[clap(long,short)]
    config:Option<PathBuf>,
    /// export each image as a BART cfl/hdr pair named <base>_<index>
    #[clap(long)]
    cfl:Option<PathBuf>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct PhantomArgs {
    /// raw data file to write
    #[clap(long,short,default_value = DEFAULT_RAW_FILE)]
    output:PathBuf,
    /// recon matrix size (square)
    #[clap(long,default_value_t = 64)]
    matrix:usize,
    #[clap(long,default_value_t = 4)]
    coils:u16,
    #[clap(long,default_value_t = 1)]
    slices:u16,
    #[clap(long,default_value_t = 1)]
    repetitions:u16,
    /// number of noise-only readouts at the start of the scan
    #[clap(long,default_value_t = 8)]
    noise_scans:usize,
    /// standard deviation of the receiver noise
    #[clap(long,default_value_t = 0.01)]
    noise_level:f32,
    /// samples dropped from the start of every readout
    #[clap(long,default_value_t = 0)]
    partial_echo:usize,
    /// acquire the readout without 2x oversampling
    #[clap(long)]
    no_oversampling:bool,
    #[clap(long,default_value_t = 42)]
    seed:u64,
}

#[derive(Clone,clap::Args,Debug)]
pub struct NewConfigArgs {
    /// where to write the settings. The extension is always .toml
    output_config:PathBuf,
}

fn main() {
    let _logger = match Logger::try_with_env_or_str("info").and_then(|l| l.start()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("logging disabled: {}",e);
            None
        }
    };
    let args = ReconArgs::parse();
    let result = match args.action {
        ReconAction::Model(args) => model(args),
        ReconAction::Chain(args) => chain(args),
        ReconAction::Phantom(args) => phantom(args),
        ReconAction::NewConfig(args) => ReconSettings::default().to_file(&args.output_config),
    };
    match result {
        Ok(()) => println!("done"),
        Err(e) => {
            println!("??? {}",e);
            std::process::exit(1);
        }
    }
}

fn settings(config:Option<&Path>) -> Result<ReconSettings> {
    match config {
        Some(c) => {
            info!("loading settings from {:?}",c);
            ReconSettings::from_file(c)
        }
        None => Ok(ReconSettings::default())
    }
}

fn existing_filepath(path:&Path,file:&Path) -> Result<PathBuf> {
    let p = path.join(file);
    match p.exists() {
        true => Ok(p),
        false => Err(ReconError::FileNotFound(p))
    }
}

fn model(args:ModelArgs) -> Result<()> {
    let settings = settings(args.config.as_deref())?;
    let engine = args.engine.unwrap_or(settings.engine).engine(&settings);
    info!("using the {} engine",engine.name());

    let input_file = existing_filepath(&args.path,&args.file)?;
    let acq_data = AcquisitionData::read(&input_file)?;
    println!("---\n acquisition data norm: {:e}",acq_data.norm());

    println!("---\n pre-processing acquisition data...");
    let mut processed_data = engine.preprocess(&acq_data)?;
    println!("---\n processed acquisition data norm: {:e}",processed_data.norm());

    let mut recon = engine.reconstructor()?;
    recon.set_input(&processed_data);
    recon.process()?;
    let complex_images = recon.get_output()?.clone();
    println!("---\n reconstructed images norm: {:e}",complex_images.norm());

    print_image_info(&complex_images)?;

    // sorted by repetition, then slice, then k-space encode step 1
    println!("---\n sorting acquisition data...");
    processed_data.sort();
    if let Some(output) = &args.output {
        processed_data.write(output)?;
        info!("sorted acquisition data written to {:?}",output);
        return Ok(())
    }

    println!("---\n computing coil sensitivity maps...");
    let mut csms = CoilSensitivityData::new(settings.csm_smoothness);
    csms.calculate(&processed_data)?;

    let mut acq_model = AcquisitionModel::new();
    acq_model.set_up(&processed_data,&complex_images)?;
    acq_model.set_coil_sensitivity_maps(csms)?;

    let simulated_acq_data = acq_model.forward(&complex_images)?;
    println!("---\n reconstructed images forward projection norm {:e}",simulated_acq_data.norm());

    let backprojected_data = acq_model.backward(&simulated_acq_data)?;
    if let Some(cfl) = &args.cfl {
        backprojected_data.export_cfl(0,cfl)?;
    }

    let diff = backprojected_data.difference(&complex_images)?;
    println!("norm of backprojected_data - complex_images: {:.6}",diff.norm());
    let mut filled = complex_images.clone();
    filled.fill(&backprojected_data)?;
    let diff = backprojected_data.difference(&filled)?;
    println!("norm of backprojected_data - complex_images: {:.6}",diff.norm());
    Ok(())
}

fn print_image_info(images:&ImageData) -> Result<()> {
    for (i,image) in images.iter().enumerate() {
        println!("--- image {}",i);
        for field in INFO_FIELDS {
            println!("{} {}",field,image.info_by_name(field)?);
        }
        println!("matrix size: {}",utils::vec_to_string(&image.matrix_size()));
        println!("patient_table_position: {}",utils::vec_to_string(&image.patient_table_position()));
    }
    let ind = images.get_info("image_index")?;
    println!("image indices:\n{}",utils::vec_to_string(&ind));
    let ptp = images.get_info("patient_table_position")?;
    println!("patient table positions:\n{}",utils::vec_to_string(&ptp));
    Ok(())
}

fn chain(args:ChainArgs) -> Result<()> {
    let settings = settings(args.config.as_deref())?;
    let input_file = existing_filepath(&args.path,&args.file)?;
    let input_data = AcquisitionData::read(&input_file)?;

    let mut recon = ImagesReconstructor::from_chain(settings.chain.build()?);
    println!("gadget chain: {}",recon.chain().class_names().join(" -> "));
    recon.set_input(&input_data);
    recon.process()?;
    for stage in recon.report() {
        println!("{} ({}): {} messages",stage.id,stage.class,stage.messages);
    }

    let images = recon.get_output()?;
    if images.is_empty() {
        warn!("the chain produced no images");
    }
    for i in 0..images.number() {
        let data = images.image_as_array(i)?;
        println!("image {}: {:?}",i,data.shape());
        if let Some(base) = &args.cfl {
            let name = format!("{}_{}",base.file_name().and_then(|n| n.to_str()).unwrap_or("image"),i);
            images.export_cfl(i,&base.with_file_name(name))?;
        }
    }

    let group = args.group.unwrap_or_else(utils::timestamp_string);
    println!("appending {:?}...",args.output);
    images.write(&args.output,&group)?;
    info!("{} images written to group {}",images.number(),group);
    Ok(())
}

fn phantom(args:PhantomArgs) -> Result<()> {
    let p = PhantomSettings {
        matrix:args.matrix,
        coils:args.coils,
        slices:args.slices,
        repetitions:args.repetitions,
        readout_oversampling:!args.no_oversampling,
        partial_echo_samples:args.partial_echo,
        noise_scans:args.noise_scans,
        noise_level:args.noise_level,
        seed:args.seed,
        ..PhantomSettings::default()
    };
    let data = simulate(&p)?;
    data.write(&args.output)?;
    println!("{} readouts written to {:?}",data.number(),args.output);
    Ok(())
}
