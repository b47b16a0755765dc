use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use parkwatch::{DetectorConfig, Signal};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PARKWATCH_CONFIG",
        "PARKWATCH_DEBOUNCE_FRAMES",
        "PARKWATCH_THRESHOLD",
        "PARKWATCH_SIGNAL",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "debounce_frames": 8,
        "classifier": {
            "threshold": 22.5,
            "learning_rate": 0.1,
            "blur_sigma": 0.0,
            "mask_polygon": true,
            "relearn_frames": 40
        },
        "render": {
            "fill_alpha": 0.3,
            "occupied_color": [255, 64, 0]
        }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("PARKWATCH_THRESHOLD", "30");
    std::env::set_var("PARKWATCH_SIGNAL", "edge_delta");

    let cfg = DetectorConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.debounce_frames, 8);
    assert_eq!(cfg.classifier.threshold, 30.0);
    assert_eq!(cfg.classifier.learning_rate, 0.1);
    assert_eq!(cfg.classifier.blur_sigma, 0.0);
    assert!(cfg.classifier.mask_polygon);
    assert_eq!(cfg.classifier.relearn_frames, 40);
    assert_eq!(cfg.classifier.signal, Signal::EdgeDelta);
    assert_eq!(cfg.render.fill_alpha, 0.3);
    assert_eq!(cfg.render.occupied_color, [255, 64, 0]);
    assert_eq!(cfg.source.as_deref(), Some(file.path()));

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
debounce_frames = 3

[classifier]
signal = "mean_abs_diff"
threshold = 12.0

[render]
show_summary = false
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = DetectorConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.debounce_frames, 3);
    assert_eq!(cfg.classifier.threshold, 12.0);
    assert_eq!(cfg.classifier.signal, Signal::MeanAbsDiff);
    assert!(!cfg.render.show_summary);

    clear_env();
}

#[test]
fn config_path_can_come_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{"debounce_frames": 2}"#)
        .expect("write config");
    std::env::set_var("PARKWATCH_CONFIG", file.path());
    std::env::set_var("PARKWATCH_DEBOUNCE_FRAMES", "9");

    let cfg = DetectorConfig::load(None).expect("load config");
    assert_eq!(cfg.debounce_frames, 9);

    clear_env();
}

#[test]
fn defaults_without_any_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = DetectorConfig::load(None).expect("defaults");
    assert_eq!(cfg.debounce_frames, 5);
    assert_eq!(cfg.classifier.signal, Signal::MeanAbsDiff);
    assert!(cfg.source.is_none());
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{"debounce_frames": 0}"#)
        .expect("write config");
    let err = DetectorConfig::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("debounce_frames"), "{}", err);

    std::env::set_var("PARKWATCH_THRESHOLD", "-4");
    let err = DetectorConfig::load(None).unwrap_err();
    assert!(err.to_string().contains("threshold"), "{}", err);

    std::env::set_var("PARKWATCH_THRESHOLD", "loud");
    assert!(DetectorConfig::load(None).is_err());

    clear_env();
    std::env::set_var("PARKWATCH_SIGNAL", "histogram");
    assert!(DetectorConfig::load(None).is_err());

    clear_env();
}

#[test]
fn malformed_file_is_reported_with_its_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"{ not json").expect("write config");
    let err = DetectorConfig::load(Some(file.path())).unwrap_err();
    assert!(
        err.to_string().contains(&file.path().display().to_string()),
        "{}",
        err
    );
}
