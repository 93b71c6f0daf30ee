use camera_heatmap::{
    geometry::{GRID_SIDE, TOTAL_CELLS},
    html, load_image,
    waveform::JsonRun,
    workspace::HeatmapConfig,
};

fn write_run(dir: &std::path::Path, run_id: u32) -> HeatmapConfig {
    let mut run = JsonRun::new(3);
    run.insert((100, 0, 0), vec![10.0, 30.0], vec![vec![0.0, 5.0, 0.0], vec![0.0, 15.0, 0.0]]);
    run.insert((100, 0, 1), vec![1.0], vec![vec![1.0, 1.0, 1.0]]);
    run.insert((111, 0, 0), vec![7.0], vec![vec![0.0, 7.0, 0.0]]);
    run.insert((111, 0, 1), vec![2.0], vec![vec![2.0, 2.0, 2.0]]);
    run.save(&dir.join(format!("run{run_id}.json"))).unwrap();

    HeatmapConfig {
        run_dir: dir.to_path_buf(),
        file_pattern: "run{run}.json".to_owned(),
        output: dir.join("interactive_heatmap.html"),
        ..Default::default()
    }
}

#[test]
fn test_run_file_to_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_run(dir.path(), 12);

    let image = load_image(&config, 12).unwrap();
    let pixels = image.pixels();

    // module 100 asic 0 channel 0 -> bottom-right corner of the rotated block
    assert_eq!(pixels[7 * GRID_SIDE + 24].charge, 20.0);
    assert_eq!(pixels[7 * GRID_SIDE + 24].waveform, vec![0.0, 10.0, 0.0]);
    // module 111 asic 0 channel 0 -> top-right corner of the upright block
    assert_eq!(pixels[23].charge, 7.0);
    assert_eq!(pixels.iter().filter(|pixel| pixel.charge != 0.0).count(), 4);
    assert_eq!(image.max_charge(), 20.0);
}

#[test]
fn test_camera_facing_run_is_mirrored() {
    let dir = tempfile::tempdir().unwrap();
    let sky_config = write_run(dir.path(), 3);
    let camera_config = HeatmapConfig {
        camera_facing: true,
        ..sky_config.clone()
    };

    let sky = load_image(&sky_config, 3).unwrap();
    let camera = load_image(&camera_config, 3).unwrap();

    for (idx, pixel) in sky.pixels().iter().enumerate() {
        let (row, col) = (idx / GRID_SIDE, idx % GRID_SIDE);
        assert_eq!(*pixel, camera.pixels()[row * GRID_SIDE + GRID_SIDE - 1 - col]);
    }
}

#[test]
fn test_page_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_run(dir.path(), 5);

    let image = load_image(&config, 5).unwrap();
    let uris = (0..TOTAL_CELLS)
        .map(|_| "data:image/svg+xml;base64,PHN2Zy8+".to_owned())
        .collect();
    html::write_page(&config.output, &image, uris, &config.plot_title()).unwrap();

    let page = std::fs::read_to_string(&config.output).unwrap();
    assert!(page.contains("Sky View Camera Image"));
    assert!(page.contains(html::PLOT_DIV_ID));
    assert!(page.contains(r#""module":111,"asic":0,"channel":0,"charge":7"#));
}

#[test]
fn test_missing_run_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_run(dir.path(), 1);
    assert!(load_image(&config, 2).is_err());
}
