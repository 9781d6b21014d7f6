use std::error::Error;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

use log::info;
use pdd_serve::artifacts::ArtifactPaths;
use pdd_serve::{preprocess, service, ChannelLayout, Classifier, ImageSize, Timer};

#[derive(StructOpt, Debug)]
#[structopt(
    name = "pdd-classify",
    about = "CLI app to classify a plant leaf image with a local TensorFlow SavedModel"
)]
struct CmdArgs {
    #[structopt(help = "Export directory of TensorFlow SavedModel")]
    export_dir: PathBuf,

    #[structopt(help = "Path to the class names file, one per line")]
    labels_path: PathBuf,

    #[structopt(help = "Image file or http(s) URL to classify")]
    image: String,

    #[structopt(long, default_value = "256", help = "Model input size, e.g. 256 or 224x224")]
    size: ImageSize,

    #[structopt(long, default_value = "channels_last", help = "channels_last or channels_first")]
    layout: ChannelLayout,
}

fn read_image(source: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let t = Timer::start(&format!("Fetching image from {}", source));
        let data = reqwest::blocking::get(source)?.error_for_status()?.bytes()?.to_vec();
        t.stop();
        Ok(data)
    } else {
        Ok(std::fs::read(Path::new(source))?)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = CmdArgs::from_args();

    let (classifier, labels) = service::load_model(&ArtifactPaths {
        model_dir: args.export_dir,
        labels_path: args.labels_path,
    })?;

    let data = read_image(&args.image)?;
    let tensor = preprocess::tensor_from_bytes(&data, args.size, args.layout)?;

    let t = Timer::start("Running session");
    let output = classifier.predict(&tensor)?;
    t.stop();

    let prediction = labels.decode(&output)?;
    info!("Classified {} as {}", args.image, prediction.class_name);

    println!("{}", serde_json::to_string(&prediction)?);

    Ok(())
}
