mod common;

use std::fs::{self, File};

use ndarray::{array, s, Array1, ArrayD};
use ndarray_npy::{read_npy, write_npy, NpzWriter};
use scan_aggregate::{AggregateError, DataAggregator};

use common::{scan_array, write_npz, Fixture};

const LAYOUT_JSON: &str = r#"{
    "probe pixel 0": 0, "probe pixel 1": 0, "probe pixel 2": 0,
    "reference pixel 0": 0,
    "Chopper pump": 0, "R2R 0": 0, "pyro detector": 0, "wobbler": 0, "spare": 0
}"#;

const LINEARIZATION_JSON: &str = r#"{"type": "cubicfraction", "parameters": {
    "0": {"a": [0.0], "b": [1.0], "c": [0.0]},
    "2": {"a": [1.0], "b": [0.0], "c": [1.0]}
}}"#;

#[test]
fn three_delays_five_scans() {
    let fixture = Fixture::new();
    fixture.write_scans(&["0", "1", "2"], 5, 64);

    let tensor = DataAggregator::run(fixture.config.clone()).unwrap();
    assert_eq!(tensor.data.shape(), [3, 5, 64]);
    assert_eq!(tensor.scan_shape, [64]);
    for i_delay in 0..3 {
        for i_scan in 0..5 {
            assert_eq!(
                tensor.data.slice(s![i_delay, i_scan, ..]),
                scan_array(i_delay, i_scan, 64)
            );
        }
    }

    let saved: ArrayD<f64> = read_npy(fixture.config.output_path()).unwrap();
    assert_eq!(saved, tensor.data);
    assert_eq!(
        fixture.config.output_path(),
        fixture.base.path().join(format!("{}.npy", common::EXPERIMENT))
    );
}

#[test]
fn delays_and_scans_follow_numeric_order() {
    let fixture = Fixture::new();
    // Intended order: 5 < 40 < 300, which isn't the lexicographic order.
    let delays = ["5", "40", "300"];
    for (i_delay, name) in delays.iter().enumerate() {
        let dir = fixture.delay_dir(name);
        for i_scan in [10, 2, 1] {
            write_npz(
                &dir.join(format!("scan_{i_scan}.npz")),
                &Array1::from_elem(4, i_delay as f64 * 1000.0 + i_scan as f64),
            );
        }
    }

    let tensor = DataAggregator::run(fixture.config.clone()).unwrap();
    assert_eq!(tensor.data.shape(), [3, 3, 4]);
    for i_delay in 0..3 {
        for (i_scan, scan_number) in [1, 2, 10].into_iter().enumerate() {
            assert_eq!(
                tensor.data[[i_delay, i_scan, 0]],
                i_delay as f64 * 1000.0 + scan_number as f64
            );
        }
    }
}

#[test]
fn stray_entries_are_skipped() {
    let fixture = Fixture::new();
    fixture.write_scans(&["0", "1"], 2, 8);
    let raw = fixture.config.raw_data_path();
    fs::write(raw.join("notes.txt"), "not a delay").unwrap();
    fs::write(raw.join("0").join("log.txt"), "not a scan").unwrap();
    fs::write(raw.join("1").join("scan_1.npz.bak"), "not a scan").unwrap();

    let tensor = DataAggregator::run(fixture.config.clone()).unwrap();
    assert_eq!(tensor.data.shape(), [2, 2, 8]);
}

#[test]
fn multi_dimensional_scans() {
    let fixture = Fixture::new();
    for (i_delay, name) in ["a", "b"].iter().enumerate() {
        let dir = fixture.delay_dir(name);
        for i_scan in 0..3 {
            let scan = ArrayD::from_elem(vec![2, 72], (i_delay * 10 + i_scan) as f64);
            write_npy(dir.join(format!("{i_scan}.npy")), &scan).unwrap();
        }
    }

    let tensor = DataAggregator::run(fixture.config.clone()).unwrap();
    assert_eq!(tensor.data.shape(), [2, 3, 2, 72]);
    assert_eq!(tensor.data[[1, 2, 1, 71]], 12.0);
    assert_eq!(tensor.data[[0, 1, 0, 0]], 1.0);
}

#[test]
fn scans_of_other_numeric_types_are_converted() {
    let fixture = Fixture::new();
    let f32_dir = fixture.delay_dir("0");
    let i16_dir = fixture.delay_dir("1");
    for i_scan in 0..2 {
        let name = format!("scan_{i_scan}.npz");

        let mut npz = NpzWriter::new(File::create(f32_dir.join(&name)).unwrap());
        let scan = Array1::from_elem(4, 0.5f32 + i_scan as f32);
        npz.add_array("arr_0", &scan).unwrap();
        npz.finish().unwrap();

        let mut npz = NpzWriter::new(File::create(i16_dir.join(&name)).unwrap());
        let scan = Array1::from_elem(4, -300i16 * (i_scan as i16 + 1));
        npz.add_array("arr_0", &scan).unwrap();
        npz.finish().unwrap();
    }

    let tensor = DataAggregator::run(fixture.config.clone()).unwrap();
    assert_eq!(tensor.data.shape(), [2, 2, 4]);
    assert_eq!(tensor.data.slice(s![0, 0, ..]), Array1::from_elem(4, 0.5));
    assert_eq!(tensor.data.slice(s![0, 1, ..]), Array1::from_elem(4, 1.5));
    assert_eq!(tensor.data.slice(s![1, 0, ..]), Array1::from_elem(4, -300.0));
    assert_eq!(tensor.data.slice(s![1, 1, ..]), Array1::from_elem(4, -600.0));

    let saved: ArrayD<f64> = read_npy(fixture.config.output_path()).unwrap();
    assert_eq!(saved, tensor.data);
}

#[test]
fn staged_pipeline() {
    let fixture = Fixture::new();
    fixture.write_scans(&["0", "1"], 3, 16);

    let aggregator = DataAggregator::open(fixture.config.clone()).unwrap();
    assert_eq!(aggregator.layout().num_delays(), 2);
    assert_eq!(aggregator.layout().num_scans(), 3);

    let mut tensor = aggregator.preallocate().unwrap();
    assert_eq!(tensor.data.shape(), [2, 3, 16]);
    assert!(tensor.data.iter().all(|&v| v == 0.0));

    aggregator.load(&mut tensor).unwrap();
    assert_eq!(tensor.data.slice(s![1, 2, ..]), scan_array(1, 2, 16));
    assert!(!fixture.config.output_path().exists());

    let path = aggregator.save(&tensor).unwrap();
    assert_eq!(path, fixture.config.output_path());
    let saved: ArrayD<f64> = read_npy(&path).unwrap();
    assert_eq!(saved, tensor.data);
}

#[test]
fn save_overwrites() {
    let fixture = Fixture::new();
    fixture.write_scans(&["0"], 1, 4);
    fs::write(fixture.config.output_path(), "stale").unwrap();

    let tensor = DataAggregator::run(fixture.config.clone()).unwrap();
    let saved: ArrayD<f64> = read_npy(fixture.config.output_path()).unwrap();
    assert_eq!(saved, tensor.data);
}

#[test]
fn mismatched_scan_shape_writes_nothing() {
    let fixture = Fixture::new();
    fixture.write_scans(&["0", "1"], 2, 8);
    write_npz(
        &fixture.config.raw_data_path().join("1").join("scan_1.npz"),
        &Array1::zeros(9),
    );

    let result = DataAggregator::run(fixture.config.clone());
    assert!(matches!(
        result,
        Err(AggregateError::InconsistentLayout { .. })
    ));
    assert!(!fixture.config.output_path().exists());
}

#[test]
fn mismatched_scan_count_writes_nothing() {
    let fixture = Fixture::new();
    fixture.write_scans(&["0", "1"], 2, 8);
    write_npz(
        &fixture.config.raw_data_path().join("1").join("scan_2.npz"),
        &Array1::zeros(8),
    );

    let result = DataAggregator::run(fixture.config.clone());
    assert!(matches!(
        result,
        Err(AggregateError::InconsistentLayout { .. })
    ));
    assert!(!fixture.config.output_path().exists());
}

#[test]
fn missing_raw_data() {
    let fixture = Fixture::new();
    fs::remove_dir(fixture.config.raw_data_path()).unwrap();
    assert!(matches!(
        DataAggregator::open(fixture.config.clone()),
        Err(AggregateError::NotFound { .. })
    ));
}

#[test]
fn load_rejects_foreign_tensor() {
    let small = Fixture::new();
    small.write_scans(&["0"], 1, 4);
    let big = Fixture::new();
    big.write_scans(&["0", "1"], 1, 4);

    let mut tensor = DataAggregator::open(small.config.clone())
        .unwrap()
        .preallocate()
        .unwrap();
    let result = DataAggregator::open(big.config.clone())
        .unwrap()
        .load(&mut tensor);
    assert!(matches!(
        result,
        Err(AggregateError::InconsistentLayout { .. })
    ));
}

#[test]
fn configuration_and_data_together() {
    let fixture = Fixture::new();
    fixture.write_config_zip(LAYOUT_JSON, LINEARIZATION_JSON);
    fixture.write_delay_file(&[-0.5, 0.0, 1.5]);
    fixture.write_scans(&["0", "1", "2"], 2, 9);

    let experiment = fixture.config.load().unwrap();
    assert_eq!(experiment.indices.probe_pixels, [0, 1, 2]);
    assert_eq!(experiment.indices.reference_pixels, [3]);
    assert_eq!(experiment.indices.choppers["Chopper pump"], 4);
    assert_eq!(experiment.indices.r2r, [5]);
    assert_eq!(experiment.indices.pyro_detector, Some(6));
    assert_eq!(experiment.indices.wobbler, Some(7));
    assert_eq!(experiment.linearization.len(), 6);

    let delays = fixture.config.get_delays().unwrap();
    let tensor = DataAggregator::run(fixture.config.clone()).unwrap();
    assert_eq!(delays.len(), tensor.num_delays());
    assert_eq!(tensor.data.shape()[2], experiment.channels.len());

    // Linearize the probe pixels of one scan; the table covers two rows of
    // three pixels.
    let scan = tensor.data.slice(s![0, 0, ..]);
    let mut pixels = Array1::zeros(6);
    for (i, &channel) in experiment.indices.probe_pixels.iter().enumerate() {
        pixels[i] = scan[channel];
    }
    let corrected = experiment.linearization.linearize(pixels.view()).unwrap();
    // Pixel 0 is the identity, pixel 2 is x^3 / (x + 1), the rest are zeroed.
    let x2 = pixels[2];
    assert_eq!(corrected[0], pixels[0]);
    assert_eq!(corrected[1], 0.0);
    assert_eq!(corrected[2], x2.powf(3.0) / (x2 + 1.0));
    assert_eq!(corrected.slice(s![3..]), array![0.0, 0.0, 0.0]);
}

#[test]
fn missing_or_broken_config_archive() {
    let fixture = Fixture::new();
    assert!(matches!(
        fixture.config.load(),
        Err(AggregateError::NotFound { .. })
    ));

    fixture.write_config_zip("{ not json", LINEARIZATION_JSON);
    assert!(matches!(
        fixture.config.load(),
        Err(AggregateError::Format { .. })
    ));

    fixture.write_config_zip(LAYOUT_JSON, r#"{"type": "polynomial", "parameters": {}}"#);
    assert!(matches!(
        fixture.config.load(),
        Err(AggregateError::UnsupportedCurveType(_))
    ));
}
