use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use parsing_eval::dataset::load_predictions;
use parsing_eval::{
    ApMode, ImageInput, ImageOutput, ImagePrediction, Params, ParsingEval, PartDataset,
};
use rayon::prelude::*;

#[derive(Parser)]
#[command(name = "parsing-eval")]
#[command(
    about = "Human parsing evaluation tool: compute instance-level part AP (APp, APpvol) from part polygons and predicted label masks"
)]
struct Cli {
    /// Path to ground truth part annotations JSON file
    #[arg(long)]
    gt: PathBuf,

    /// Path to predictions JSON file
    #[arg(long)]
    dt: PathBuf,

    /// JSON file with evaluation parameters; flags below override it
    #[arg(long)]
    params: Option<PathBuf>,

    /// Mean-IoU thresholds (comma-separated, e.g. "0.1,0.5,0.9")
    #[arg(long, value_delimiter = ',')]
    iou_thrs: Option<Vec<f64>>,

    /// Number of parsing classes including background
    #[arg(long)]
    num_classes: Option<usize>,

    /// Use the 11-point interpolated AP instead of the area under the curve
    #[arg(long)]
    use_11_point: bool,

    /// Directory for evaluation artifacts
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Number of independent evaluation workers, merged before scoring
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn build_params(cli: &Cli) -> Result<Params, Box<dyn std::error::Error>> {
    let mut params = match &cli.params {
        Some(path) => Params::from_file(path)?,
        None => Params::default(),
    };
    if let Some(thrs) = &cli.iou_thrs {
        params.iou_thrs = thrs.clone();
    }
    if let Some(n) = cli.num_classes {
        params.num_classes = n;
    }
    if cli.use_11_point {
        params.ap_mode = ApMode::ElevenPoint;
    }
    if let Some(dir) = &cli.output_dir {
        params.output_dir = Some(dir.clone());
    }
    params.validate()?;
    Ok(params)
}

/// Evaluate one contiguous shard of images, one image per `process` call.
///
/// Decoding a prediction record stands in for inference, so its duration is
/// what the session accounts as processing time.
fn run_shard(
    gt: Arc<PartDataset>,
    params: Params,
    img_ids: &[u64],
    preds: &HashMap<u64, &ImagePrediction>,
) -> parsing_eval::Result<ParsingEval> {
    let mut eval = ParsingEval::new(gt, params)?;
    eval.reset();
    for &id in img_ids {
        let start = Instant::now();
        let output = match preds.get(&id) {
            Some(p) => p.to_output()?,
            None => ImageOutput::default(),
        };
        eval.process_timed(&[ImageInput { image_id: id }], &[output], start.elapsed())?;
    }
    Ok(eval)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let params = build_params(&cli)?;

    log::info!("Loading ground truth from {:?}...", cli.gt);
    let gt = Arc::new(PartDataset::new(&cli.gt)?);

    log::info!("Loading predictions from {:?}...", cli.dt);
    let records = load_predictions(&cli.dt)?;
    let preds: HashMap<u64, &ImagePrediction> = records.iter().map(|p| (p.image_id, p)).collect();
    log::info!("Loaded {} prediction records", preds.len());

    let img_ids = gt.img_ids();
    let workers = cli.workers.max(1);
    let shard_len = img_ids.len().div_ceil(workers).max(1);
    log::info!(
        "Evaluating {} images with {} worker(s)...",
        img_ids.len(),
        workers
    );

    let shards: Vec<ParsingEval> = img_ids
        .par_chunks(shard_len)
        .map(|chunk| run_shard(gt.clone(), params.clone(), chunk, &preds))
        .collect::<parsing_eval::Result<_>>()?;

    let mut shards = shards.into_iter();
    let mut eval = match shards.next() {
        Some(first) => first,
        None => {
            let mut empty = ParsingEval::new(gt.clone(), params.clone())?;
            empty.reset();
            empty
        }
    };
    for shard in shards {
        eval.merge(&shard)?;
    }

    let report = eval.evaluate()?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.summarize();
    }

    Ok(())
}
