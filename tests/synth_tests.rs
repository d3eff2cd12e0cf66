// tests/synth_tests.rs
use approx::assert_abs_diff_eq;
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use spread_core::io::read_annotations;
use spread_core::{AugmentChannel, ClassTables};
use spread_synth::{
    Frame, Generator, LengthChange, MoldLibrary, MoldSpec, Packet, SynthConfig, check_collision,
};

#[test]
fn test_blend_at_noise_floor() {
    let background = Array2::from_elem((16, 16), -50.0);
    let packet = Packet::new(&Array2::from_elem((4, 4), -50.0), 1, true);

    let mut frame = Frame::new("blend.jpg", &background).with_noise_floor(-50.0);
    let annotation = frame.place(packet, 4, 8).unwrap();

    assert_abs_diff_eq!(frame.data[[8, 4]], -46.9897, epsilon = 1e-4);
    assert_eq!(frame.data[[0, 0]], -50.0);
    assert_abs_diff_eq!(annotation.x_c, 0.375, epsilon = 1e-9);
    // rows 8..12 of 16 end up in the lower half of the picture
    assert_abs_diff_eq!(annotation.y_c, 0.375, epsilon = 1e-9);
    assert_abs_diff_eq!(annotation.height, 0.25, epsilon = 1e-9);
}

#[test]
fn test_out_of_bounds_leaves_frame_untouched() {
    let background = Array2::from_elem((8, 8), -20.0);
    let mut frame = Frame::new("oob.jpg", &background);
    let packet = Packet::new(&Array2::from_elem((4, 4), 30.0), 0, true);

    assert!(frame.place(packet, 6, 0).is_err());
    assert!(frame.annotations.is_empty());
    assert_eq!(frame.data, background);
}

#[test]
fn test_shrink_scenario() {
    let mold = Array2::from_shape_fn((300, 3), |(r, _)| r as f64);
    let mut packet = Packet::new(&mold, 0, true);

    assert_eq!(packet.adjust_length(100, 20), LengthChange::Truncated);
    let rows = packet.data.column(0).to_vec();
    let expected: Vec<f64> = (0..50).chain(250..300).map(|r| r as f64).collect();
    assert_eq!(rows, expected);
}

#[test]
fn test_no_collision_scenario() {
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(check_collision(0, 10, &[50, 60, 70], 5, 5, &mut rng), None);
}

#[test]
fn test_collision_frames_on_disk() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join(format!("spread-collisions-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let config = SynthConfig {
        nfft: 128,
        nlines: 128,
        limit_index: 120,
        num_coll_iter: 4,
        collision_length_range: (40, 80),
        backgrounds: Vec::new(),
        molds: Vec::new(),
        ..SynthConfig::default()
    };

    let mut tables = ClassTables::default();
    tables.augment.insert(0, AugmentChannel { start: 4, space: 12, skip: 1 });
    tables.augment.insert(3, AugmentChannel { start: 6, space: 20, skip: 1 });

    let mut library = MoldLibrary::new();
    library.add_background("floor", Array2::from_elem((128, 128), -10.0));
    library.add_mold(
        MoldSpec::new("wifi_2", 0, "wifi_2.npy", false),
        Array2::from_elem((60, 30), 30.0),
    );
    library.add_mold(
        MoldSpec::new("lightbridge", 3, "lightbridge.npy", true),
        Array2::from_elem((70, 14), 25.0),
    );

    let mut generator = Generator::new(config, tables, library, StdRng::seed_from_u64(21));
    let report = generator.generate(&[0, 3], &dir)?;

    assert_eq!(report.scene, "collision_wifi_lightbridge");
    assert_eq!(report.settings.len(), 7);
    assert_eq!(report.failed, 0);
    assert!(report.rendered > 0);
    assert!(dir.join("report_collision_wifi_lightbridge.json").exists());

    let first = read_annotations(dir.join("collision_wifi_lightbridge_0.txt"))?;
    let labels: Vec<i32> = first.iter().map(|a| a.label).collect();
    assert_eq!(labels, vec![0, 3]);
    // the fixed-length wifi packet keeps its 60 rows
    assert_abs_diff_eq!(first.as_slice()[0].height, 60.0 / 128.0, epsilon = 1e-6);

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
