use image::{Rgb, RgbImage};

use parkwatch::ingest::ParkedVehicle;
use parkwatch::{
    DetectorConfig, Occupancy, OccupancyDetector, Point, RenderedFrame, SlotError, SlotRegistry,
    SyntheticConfig, VideoSource,
};

fn bay(x: i32) -> [Point; 4] {
    [
        Point::new(x, 40),
        Point::new(x + 60, 40),
        Point::new(x + 60, 140),
        Point::new(x, 140),
    ]
}

/// Three bays matching the default synthetic lot: vehicles park in the first
/// two, the third stays empty.
fn synthetic_lot() -> SlotRegistry {
    let mut registry = SlotRegistry::new();
    for x in [10, 90, 170] {
        registry.add_slot(bay(x)).expect("slot");
    }
    registry
}

fn run_all(detector: OccupancyDetector) -> Vec<RenderedFrame> {
    detector.map(|frame| frame.expect("frame")).collect()
}

fn state_at(frames: &[RenderedFrame], index: u64, slot: usize) -> Occupancy {
    frames
        .iter()
        .find(|f| f.index == index)
        .map(|f| f.states[slot])
        .expect("frame present")
}

#[test]
fn synthetic_lot_tracks_parking_and_leaving() {
    let source = VideoSource::synthetic(SyntheticConfig::default());
    let detector =
        OccupancyDetector::start(synthetic_lot(), source, &DetectorConfig::default(), 1)
            .expect("start");
    let frames = run_all(detector);
    assert_eq!(frames.len(), 300);

    // Second vehicle parks at 30 and leaves after 259; first parks 100..=199.
    assert_eq!(state_at(&frames, 20, 1), Occupancy::Free);
    assert_eq!(state_at(&frames, 60, 1), Occupancy::Occupied);
    assert_eq!(state_at(&frames, 90, 0), Occupancy::Free);
    assert_eq!(state_at(&frames, 150, 0), Occupancy::Occupied);
    assert_eq!(state_at(&frames, 250, 0), Occupancy::Free);
    assert_eq!(state_at(&frames, 250, 1), Occupancy::Occupied);
    assert_eq!(state_at(&frames, 290, 1), Occupancy::Free);
    assert!(frames.iter().all(|f| f.states[2] == Occupancy::Free));

    let flips: usize = frames.iter().map(|f| f.transitions.len()).sum();
    assert_eq!(flips, 4);
}

#[test]
fn debounce_delays_each_flip() {
    let mut config = DetectorConfig::default();
    config.debounce_frames = 5;
    let source = VideoSource::synthetic(SyntheticConfig::default());
    let frames = run_all(
        OccupancyDetector::start(synthetic_lot(), source, &config, 1).expect("start"),
    );
    let arrival = frames
        .iter()
        .flat_map(|f| f.transitions.iter())
        .find(|t| t.slot == 1 && t.to == Occupancy::Occupied)
        .expect("slot 1 becomes occupied");
    // Raw decisions turn at frame 30; the fifth disagreeing frame flips.
    assert_eq!(arrival.frame_index, 34);
}

#[test]
fn vehicle_parked_from_the_first_frame_recovers_after_leaving() {
    let lot = SyntheticConfig {
        frames: 210,
        vehicles: vec![ParkedVehicle {
            x: 104,
            y: 44,
            width: 52,
            height: 92,
            arrives: 1,
            leaves: 10,
        }],
        ..SyntheticConfig::default()
    };
    let mut config = DetectorConfig::default();
    config.debounce_frames = 3;
    let frames = run_all(
        OccupancyDetector::start(
            synthetic_lot(),
            VideoSource::synthetic(lot),
            &config,
            1,
        )
        .expect("start"),
    );
    assert_eq!(frames.len(), 210);

    // The bare bay first reads as a change against the vehicle it was seeded
    // with, then the reference is relearned and the slot settles on Free.
    let slot_flips: Vec<(u64, Occupancy)> = frames
        .iter()
        .flat_map(|f| f.transitions.iter())
        .filter(|t| t.slot == 1)
        .map(|t| (t.frame_index, t.to))
        .collect();
    assert_eq!(slot_flips.len(), 2, "{:?}", slot_flips);
    assert_eq!(slot_flips[0], (13, Occupancy::Occupied));
    assert_eq!(slot_flips[1].1, Occupancy::Free);
    assert!(slot_flips[1].0 <= 60, "{:?}", slot_flips);

    assert!(frames
        .iter()
        .filter(|f| f.index > 60)
        .all(|f| f.states[1] == Occupancy::Free));
    assert!(frames
        .iter()
        .all(|f| f.states[0] == Occupancy::Free && f.states[2] == Occupancy::Free));
}

#[test]
fn start_frame_beyond_source_fails_before_processing() {
    let source = VideoSource::open("stub://lot?frames=20").expect("stub");
    let err = OccupancyDetector::start(synthetic_lot(), source, &DetectorConfig::default(), 21)
        .err()
        .expect("seek must fail");
    match err.downcast_ref::<SlotError>() {
        Some(SlotError::SeekOutOfRange {
            requested,
            available,
            ..
        }) => {
            assert_eq!(*requested, 21);
            assert_eq!(*available, 20);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn start_frame_offsets_frame_indices() {
    let source = VideoSource::open("stub://lot?frames=20").expect("stub");
    let frames = run_all(
        OccupancyDetector::start(synthetic_lot(), source, &DetectorConfig::default(), 15)
            .expect("start"),
    );
    let indices: Vec<u64> = frames.iter().map(|f| f.index).collect();
    assert_eq!(indices, (15..=20).collect::<Vec<_>>());
}

#[test]
fn image_directory_with_a_corrupt_frame() {
    let dir = tempfile::tempdir().expect("temp dir");
    for i in 1..=6u32 {
        let path = dir.path().join(format!("frame_{:03}.png", i));
        if i == 3 {
            std::fs::write(&path, b"truncated").expect("write corrupt frame");
        } else {
            RgbImage::from_pixel(240, 160, Rgb([90, 90, 90]))
                .save(&path)
                .expect("write frame");
        }
    }
    let source = VideoSource::open(dir.path().to_str().expect("utf-8 path")).expect("open dir");
    assert_eq!(source.frame_count(), Some(6));

    let mut detector =
        OccupancyDetector::start(synthetic_lot(), source, &DetectorConfig::default(), 1)
            .expect("start");
    let mut indices = Vec::new();
    while let Some(frame) = detector.next_rendered().expect("recoverable") {
        indices.push(frame.index);
    }
    assert_eq!(indices, vec![1, 2, 4, 5, 6]);
    let summary = detector.summary();
    assert_eq!(summary.frames_processed, 5);
    assert_eq!(summary.frames_skipped, 1);
    assert_eq!(summary.occupied, 0);
}

#[test]
fn stop_signal_cancels_mid_run() {
    let source = VideoSource::open("stub://lot?frames=50").expect("stub");
    let mut detector =
        OccupancyDetector::start(synthetic_lot(), source, &DetectorConfig::default(), 1)
            .expect("start");
    let stop = detector.stop_signal();
    for _ in 0..10 {
        detector.next_rendered().expect("frame").expect("some frame");
    }
    stop.stop();
    assert!(detector.next_rendered().expect("no error").is_none());
    let summary = detector.summary();
    assert!(summary.cancelled);
    assert_eq!(summary.frames_processed, 10);
    assert_eq!(summary.last_frame, Some(10));
}

#[test]
fn rendered_frames_show_state_colors() {
    let config = DetectorConfig::default();
    let source = VideoSource::synthetic(SyntheticConfig::default());
    let frames = run_all(
        OccupancyDetector::start(synthetic_lot(), source, &config, 1).expect("start"),
    );
    let frame = frames.iter().find(|f| f.index == 150).expect("frame 150");
    // Top edge of each slot outline, away from the id labels.
    assert_eq!(frame.image.get_pixel(20, 40).0, config.render.occupied_color);
    assert_eq!(frame.image.get_pixel(180, 40).0, config.render.free_color);
}
