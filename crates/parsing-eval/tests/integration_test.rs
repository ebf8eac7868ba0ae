use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parsing_eval::dataset::load_predictions;
use parsing_eval::{ApMode, ImageInput, ImageOutput, Params, ParsingEval, PartDataset};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load() -> (Arc<PartDataset>, HashMap<u64, ImageOutput>) {
    let gt = PartDataset::new(&fixtures_dir().join("gt.json")).expect("Failed to load GT");
    let preds = load_predictions(&fixtures_dir().join("dt.json")).expect("Failed to load DT");
    let outputs = preds
        .iter()
        .map(|p| (p.image_id, p.to_output().expect("Failed to decode prediction")))
        .collect();
    (Arc::new(gt), outputs)
}

/// Run every image as its own batch, one second of "inference" each.
fn run(eval: &mut ParsingEval, img_ids: &[u64], outputs: &HashMap<u64, ImageOutput>) {
    for &id in img_ids {
        let output = outputs.get(&id).cloned().unwrap_or_default();
        eval.process_timed(&[ImageInput { image_id: id }], &[output], Duration::from_secs(1))
            .expect("process failed");
    }
}

#[test]
fn test_load_fixtures() {
    let (gt, outputs) = load();
    assert_eq!(gt.dataset.images.len(), 3);
    assert_eq!(gt.dataset.annotations.len(), 5);
    assert_eq!(gt.dataset.categories.len(), 3);
    assert_eq!(gt.img_ids(), vec![1, 2, 3]);
    assert_eq!(outputs[&1].instances.len(), 3);
    // the RLE prediction covers a 10 wide, 5 tall block of class 3
    let rle_pred = &outputs[&2].instances[0];
    assert_eq!(rle_pred.data.iter().filter(|&&v| v == 3).count(), 50);
    assert_eq!(rle_pred.get(9, 4), 3);
    assert_eq!(rle_pred.get(9, 5), 0);
}

#[test]
fn test_area_ap_on_fixtures() {
    let (gt, outputs) = load();
    let img_ids = gt.img_ids();
    let mut eval = ParsingEval::new(gt, Params::default()).unwrap();
    eval.reset();
    run(&mut eval, &img_ids, &outputs);

    assert_eq!(eval.npos(), 3);
    assert_eq!(eval.num_images(), 3);
    assert_eq!(eval.num_records(), vec![5; 9]);

    let report = eval.evaluate().expect("evaluate failed");
    for t in &report.per_threshold {
        let (ap, tp) = if t.iou_thr <= 0.5 {
            (5.0 / 6.0, 3)
        } else {
            (1.0 / 3.0, 1)
        };
        assert!((t.ap - ap).abs() < 1e-9, "APp@{} = {}", t.iou_thr, t.ap);
        assert_eq!(t.tp, tp);
        assert_eq!(t.tp + t.fp, 5);
    }
    assert!((report.ap_vol - 11.0 / 18.0).abs() < 1e-9);
    assert!((report.total_time - 3.0).abs() < 1e-9);
    assert!((report.fps - 1.0).abs() < 1e-9);
    report.summarize();
}

#[test]
fn test_eleven_point_ap_on_fixtures() {
    let (gt, outputs) = load();
    let img_ids = gt.img_ids();
    let params = Params {
        ap_mode: ApMode::ElevenPoint,
        ..Params::default()
    };
    let mut eval = ParsingEval::new(gt, params).unwrap();
    eval.reset();
    run(&mut eval, &img_ids, &outputs);

    let report = eval.evaluate().expect("evaluate failed");
    let ap_05 = report.get("APp@0.5").expect("missing APp@0.5");
    let ap_09 = report.get("APp@0.9").expect("missing APp@0.9");
    assert!((ap_05 - 9.25 / 11.0).abs() < 1e-9);
    assert!((ap_09 - 4.0 / 11.0).abs() < 1e-9);
}

#[test]
fn test_sharded_workers_merge_to_sequential_result() {
    let (gt, outputs) = load();
    let img_ids = gt.img_ids();

    let mut sequential = ParsingEval::new(gt.clone(), Params::default()).unwrap();
    sequential.reset();
    run(&mut sequential, &img_ids, &outputs);

    let mut first = ParsingEval::new(gt.clone(), Params::default()).unwrap();
    first.reset();
    run(&mut first, &img_ids[..1], &outputs);
    let mut second = ParsingEval::new(gt, Params::default()).unwrap();
    second.reset();
    run(&mut second, &img_ids[1..], &outputs);
    first.merge(&second).expect("merge failed");

    assert_eq!(first.npos(), sequential.npos());
    assert_eq!(first.num_images(), sequential.num_images());
    assert_eq!(
        first.evaluate().unwrap().metrics(),
        sequential.evaluate().unwrap().metrics()
    );
}

#[test]
fn test_batched_processing_matches_per_image() {
    let (gt, outputs) = load();
    let img_ids = gt.img_ids();

    let mut per_image = ParsingEval::new(gt.clone(), Params::default()).unwrap();
    per_image.reset();
    run(&mut per_image, &img_ids, &outputs);

    let mut batched = ParsingEval::new(gt, Params::default()).unwrap();
    batched.reset();
    let inputs: Vec<ImageInput> = img_ids.iter().map(|&id| ImageInput { image_id: id }).collect();
    let batch: Vec<ImageOutput> = img_ids.iter().map(|id| outputs[id].clone()).collect();
    batched
        .process_timed(&inputs, &batch, Duration::from_secs(3))
        .expect("process failed");

    assert_eq!(
        batched.evaluate().unwrap().metrics(),
        per_image.evaluate().unwrap().metrics()
    );
}

#[test]
fn test_missing_predictions_count_towards_recall() {
    let (gt, _) = load();
    let img_ids = gt.img_ids();
    let mut eval = ParsingEval::new(gt, Params::default()).unwrap();
    eval.reset();
    run(&mut eval, &img_ids, &HashMap::new());

    assert_eq!(eval.npos(), 3);
    assert_eq!(eval.num_records(), vec![0; 9]);
    let report = eval.evaluate().unwrap();
    assert_eq!(report.ap_vol, 0.0);
}

#[test]
fn test_process_measures_wall_clock() {
    let (gt, outputs) = load();
    let mut eval = ParsingEval::new(gt, Params::default()).unwrap();
    eval.reset();
    std::thread::sleep(Duration::from_millis(20));
    eval.process(&[ImageInput { image_id: 1 }], &[outputs[&1].clone()])
        .expect("process failed");
    assert!(eval.total_time() >= Duration::from_millis(20));
    let report = eval.evaluate().unwrap();
    assert!(report.fps.is_finite() && report.fps > 0.0);
}
