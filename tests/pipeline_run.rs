use image::{Rgb, RgbImage};

use icsi_stage::detect::ReplayBackend;
use icsi_stage::ingest::{FileConfig, FileSource, FrameSource};
use icsi_stage::output::ImageSequenceSink;
use icsi_stage::overlay::OverlayStyle;
use icsi_stage::storage::{open_store, JsonlObservationStore, LogFormat, SqliteObservationStore};
use icsi_stage::{AnnotationPipeline, Stage, StageRules};

const DETECTIONS: &str = r#"{ "frames": [
    { "instances": [
        { "class_id": 3, "score": 0.96, "polygon": [[10, 10], [18, 10], [18, 18], [10, 18]] },
        { "class_id": 3, "score": 0.93, "polygon": [[60, 40], [68, 40], [68, 48], [60, 48]] }
    ] },
    { "instances": [
        { "class_id": 3, "score": 0.96, "polygon": [[30, 35], [40, 35], [40, 40], [30, 40]] },
        { "class_id": 4, "score": 0.99, "polygon": [[5, 30], [150, 30], [150, 45], [5, 45]] }
    ] },
    { "instances": [] }
] }"#;

fn write_frames(dir: &std::path::Path, count: u32) {
    for i in 0..count {
        let shade = (40 * i) as u8;
        RgbImage::from_pixel(160, 90, Rgb([shade, shade, shade]))
            .save(dir.join(format!("img_{:03}.png", i)))
            .unwrap();
    }
}

fn source_for(dir: &std::path::Path) -> FileSource {
    let mut source = FileSource::new(FileConfig {
        path: dir.to_str().unwrap().to_string(),
        fps: 24.0,
    })
    .unwrap();
    source.connect().unwrap();
    source
}

#[test]
fn annotates_sequence_to_disk_with_jsonl_log() {
    let work = tempfile::tempdir().unwrap();
    let frames_dir = work.path().join("frames");
    std::fs::create_dir(&frames_dir).unwrap();
    write_frames(&frames_dir, 3);

    let mut source = source_for(&frames_dir);
    let meta = source.meta().unwrap();
    let out_dir = work.path().join("annotated");
    let log_path = work.path().join("observations.jsonl");
    let mut sink = ImageSequenceSink::create(&out_dir, meta).unwrap();
    let mut store = open_store(&log_path, LogFormat::Jsonl).unwrap();

    let detector = ReplayBackend::from_json(DETECTIONS).unwrap();
    let mut pipeline = AnnotationPipeline::new(detector, StageRules::default(), OverlayStyle::default())
        .with_expected_stage(Stage::SpermSelection);
    let summary = pipeline.run(&mut source, &mut sink, store.as_mut()).unwrap();

    assert_eq!(
        summary.predicted,
        vec![Stage::SpermSelection, Stage::SpermCollection, Stage::StageNotDetected]
    );
    let percent = summary.expected_percent().unwrap();
    assert!((percent - 100.0 / 3.0).abs() < 1e-9);

    let manifest = ImageSequenceSink::read_manifest(&out_dir).unwrap();
    assert_eq!((manifest.width, manifest.height, manifest.frames), (160, 90, 3));
    assert_eq!(manifest.fps, 24.0);
    for i in 0..3 {
        let frame = image::open(out_dir.join(format!("frame_{:06}.png", i))).unwrap();
        assert_eq!((frame.width(), frame.height()), (160, 90));
    }

    let observations = JsonlObservationStore::read_all(&log_path).unwrap();
    assert_eq!(observations.len(), 3);
    assert_eq!(observations[1].stage, Stage::SpermCollection);
    assert_eq!(observations[1].boxes.len(), 2);
    assert!(observations[2].boxes.is_empty());
}

#[test]
fn sqlite_log_records_every_frame() {
    let work = tempfile::tempdir().unwrap();
    let frames_dir = work.path().join("frames");
    std::fs::create_dir(&frames_dir).unwrap();
    write_frames(&frames_dir, 3);

    let mut source = source_for(&frames_dir);
    let meta = source.meta().unwrap();
    let db_path = work.path().join("observations.db");
    let mut sink = ImageSequenceSink::create(&work.path().join("out"), meta).unwrap();
    let mut store = SqliteObservationStore::open(&db_path).unwrap();

    let detector = ReplayBackend::from_json(DETECTIONS).unwrap();
    let mut pipeline = AnnotationPipeline::new(detector, StageRules::default(), OverlayStyle::default());
    pipeline.run(&mut source, &mut sink, &mut store).unwrap();
    drop(store);

    let reopened = SqliteObservationStore::open(&db_path).unwrap();
    let observations = reopened.read_all().unwrap();
    let stages: Vec<Stage> = observations.iter().map(|o| o.stage).collect();
    assert_eq!(
        stages,
        vec![Stage::SpermSelection, Stage::SpermCollection, Stage::StageNotDetected]
    );
}

#[test]
fn synthetic_source_without_detections_is_all_undetected() {
    let work = tempfile::tempdir().unwrap();
    let mut source = FileSource::new(FileConfig {
        path: "stub://32x24/4".to_string(),
        fps: 25.0,
    })
    .unwrap();
    source.connect().unwrap();
    let mut sink = ImageSequenceSink::create(work.path(), source.meta().unwrap()).unwrap();
    let mut store = open_store(&work.path().join("log.jsonl"), LogFormat::Jsonl).unwrap();

    let mut pipeline = AnnotationPipeline::new(
        icsi_stage::detect::StubBackend::new(),
        StageRules::default(),
        OverlayStyle::default(),
    );
    let summary = pipeline.run(&mut source, &mut sink, store.as_mut()).unwrap();
    assert_eq!(summary.count(Stage::StageNotDetected), 4);
    assert_eq!(pipeline.detector().frames_seen(), 4);
}
