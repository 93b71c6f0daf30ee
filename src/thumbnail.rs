//! Waveform thumbnails shown on hover.

use std::ops::Range;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use plotters::prelude::*;

use crate::pixels::CameraImage;

pub const SVG_MIME: &str = "image/svg+xml";

/// y range covering all samples, padded so that flat traces stay visible
fn amplitude_range(samples: &[f64]) -> Range<f64> {
    let (min, max) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
            (min.min(*v), max.max(*v))
        });

    if !min.is_finite() || !max.is_finite() {
        return -1.0..1.0;
    }
    let pad = if max > min { (max - min) * 0.05 } else { 1.0 };
    (min - pad)..(max + pad)
}

/// Renders the averaged waveform as an svg document.
pub fn render_waveform(samples: &[f64], (width, height): (u32, u32)) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0f64..samples.len().max(1) as f64, amplitude_range(samples))?;

        chart
            .configure_mesh()
            .x_desc("Time (ns)")
            .y_desc("Amplitude (ADC Counts)")
            .draw()?;

        chart.draw_series(LineSeries::new(
            samples.iter().enumerate().map(|(t, v)| (t as f64, *v)),
            &BLUE,
        ))?;

        root.present()?;
    }
    Ok(svg)
}

pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Thumbnail data uri for every pixel of the image, in pixel order.
pub fn render_all(image: &CameraImage, size: (u32, u32)) -> Result<Vec<String>> {
    let pb = ProgressBar::new(image.pixels().len() as u64);
    pb.set_style(ProgressStyle::with_template(
        "Creating plots: {pos}/{len} [{elapsed_precise}] {bar}",
    )?);

    let uris = image
        .pixels()
        .iter()
        .map(|pixel| {
            let svg = render_waveform(&pixel.waveform, size)?;
            pb.inc(1);
            Ok(to_data_uri(SVG_MIME, svg.as_bytes()))
        })
        .collect::<Result<Vec<_>>>()?;

    pb.finish();
    Ok(uris)
}

#[test]
fn test_data_uri() {
    assert_eq!(to_data_uri(SVG_MIME, b"<svg/>"), "data:image/svg+xml;base64,PHN2Zy8+");
}

#[test]
fn test_amplitude_range() {
    assert_eq!(amplitude_range(&[]), -1.0..1.0);
    assert_eq!(amplitude_range(&[3.0, 3.0]), 2.0..4.0);

    let range = amplitude_range(&[0.0, 10.0]);
    assert!(range.start < 0.0 && range.end > 10.0);
}

#[test]
fn test_render_waveform_has_axis_labels() {
    let svg = render_waveform(&[0.0, 5.0, 2.0, 1.0], (640, 480)).unwrap();

    assert!(svg.contains("<svg"));
    assert!(svg.contains("Time (ns)"));
    assert!(svg.contains("Amplitude (ADC Counts)"));
}

#[test]
fn test_render_degenerate_waveforms() {
    for samples in [vec![], vec![4.0; 16]] {
        let svg = render_waveform(&samples, (320, 240)).unwrap();
        assert!(svg.contains("Time (ns)"));
    }
}

#[test]
fn test_render_all_in_pixel_order() {
    use crate::{geometry::TOTAL_CELLS, pixels::Pixel};

    let size = (160, 120);
    let mut image = CameraImage::new(3);
    image
        .set(
            17,
            Pixel {
                charge: 1.0,
                waveform: vec![0.0, 9.0, 0.0],
                module: 100,
                asic: 0,
                channel: 0,
            },
        )
        .unwrap();

    let uris = render_all(&image, size).unwrap();
    assert_eq!(uris.len(), TOTAL_CELLS);
    assert!(uris.iter().all(|uri| uri.starts_with("data:image/svg+xml;base64,")));

    let expected = render_waveform(&[0.0, 9.0, 0.0], size).unwrap();
    assert_eq!(uris[17], to_data_uri(SVG_MIME, expected.as_bytes()));
    assert_ne!(uris[17], uris[16]);
}
