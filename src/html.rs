//! Interactive camera heatmap page.
//!
//! The charges are drawn as a plotly heatmap. Metadata of the hovered pixel
//! is shown in the plotly tooltip while its waveform thumbnail is swapped
//! into a fixed panel next to the plot.

use std::path::Path;

use eyre::{bail, Result, WrapErr};
use plotly::{
    common::{ColorBar, ColorScale, ColorScalePalette, Title},
    layout::Axis,
    Layout, Plot, Trace,
};
use serde::Serialize;

use crate::{
    geometry::{GRID_SIDE, TOTAL_CELLS},
    pixels::CameraImage,
};

pub const PLOT_DIV_ID: &str = "camera-heatmap";
pub const PAGE_TITLE: &str = "Interactive Heatmap";
pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

/// Width of a pixel in plot coordinates.
const PIXEL_PITCH: f64 = 0.1;

const HOVER_TEMPLATE: &str = "<b>Module %{customdata[0]}</b><br>\
    <b>ASIC %{customdata[1]}, Channel %{customdata[2]}</b><br>\
    Charge: %{customdata[3]} ADC &middot; ns<extra></extra>";

/// Data of a single pixel exposed to the hover handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoverRecord {
    pub module: u32,
    pub asic: u32,
    pub channel: u32,
    /// truncated towards zero
    pub charge: i64,
    pub image: String,
}

pub fn hover_records(image: &CameraImage, image_uris: Vec<String>) -> Result<Vec<HoverRecord>> {
    if image_uris.len() != TOTAL_CELLS {
        bail!("expected {TOTAL_CELLS} thumbnails, got {}", image_uris.len());
    }

    Ok(image
        .pixels()
        .iter()
        .zip(image_uris)
        .map(|(pixel, uri)| HoverRecord {
            module: pixel.module,
            asic: pixel.asic,
            channel: pixel.channel,
            charge: pixel.charge as i64,
            image: uri,
        })
        .collect())
}

/// Heatmap trace carrying per-cell metadata for the tooltip.
#[derive(Clone, Serialize)]
struct CameraHeatmap {
    #[serde(rename = "type")]
    kind: &'static str,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<Vec<f64>>,
    zmin: f64,
    zmax: f64,
    colorscale: ColorScale,
    colorbar: ColorBar,
    customdata: Vec<Vec<[i64; 4]>>,
    hovertemplate: &'static str,
}

impl Trace for CameraHeatmap {
    fn to_json(&self) -> String {
        serde_json::to_string(self).expect("heatmap trace holds only plain numbers and strings")
    }
}

/// Pixel centres along one axis.
fn pixel_centres() -> Vec<f64> {
    (0..GRID_SIDE)
        .map(|k| PIXEL_PITCH * (k as f64 + 0.5))
        .collect()
}

pub fn build_plot(image: &CameraImage, title: &str) -> Plot {
    let customdata = image
        .pixels()
        .chunks(GRID_SIDE)
        .map(|row| {
            row.iter()
                .map(|pixel| {
                    [
                        pixel.module as i64,
                        pixel.asic as i64,
                        pixel.channel as i64,
                        pixel.charge as i64,
                    ]
                })
                .collect()
        })
        .collect();

    let trace = CameraHeatmap {
        kind: "heatmap",
        x: pixel_centres(),
        y: pixel_centres(),
        z: image.charge_grid(),
        zmin: 0.0,
        // colour range starts at zero, an all-negative run collapses onto it
        zmax: image.max_charge().max(0.0),
        colorscale: ColorScale::Palette(ColorScalePalette::Viridis),
        colorbar: ColorBar::new().title(Title::new("Charge")),
        customdata,
        hovertemplate: HOVER_TEMPLATE,
    };

    let layout = Layout::new()
        .title(Title::new(title))
        .width(800)
        .height(760)
        .x_axis(Axis::new().visible(false))
        .y_axis(Axis::new().visible(false));

    let mut plot = Plot::new();
    plot.add_trace(Box::new(trace));
    plot.set_layout(layout);
    plot
}

pub fn render_page(image: &CameraImage, image_uris: Vec<String>, title: &str) -> Result<String> {
    let records = serde_json::to_string(&hover_records(image, image_uris)?)?;
    let plot_html = build_plot(image, title).to_inline_html(Some(PLOT_DIV_ID));

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{PAGE_TITLE}</title>
    <script src="{PLOTLY_CDN}"></script>
    <style>
        body {{ font-family: sans-serif; margin: 1rem; }}
        #waveform {{ position: fixed; left: 820px; top: 80px; width: 30%; }}
        #waveform img {{ width: 100%; border: 2px solid #444; }}
        #waveform .label {{ font-size: 15px; font-weight: bold; }}
        #waveform .charge {{ font-size: 15px; }}
    </style>
</head>
<body>
    {plot_html}
    <div id="waveform" hidden>
        <img alt="waveform">
        <div class="label module"></div>
        <div class="label channel"></div>
        <div class="charge"></div>
    </div>
    <script type="text/javascript">
        window.addEventListener("load", function () {{
            var pixels = {records};
            var plot = document.getElementById("{PLOT_DIV_ID}");
            var panel = document.getElementById("waveform");
            plot.on("plotly_hover", function (event) {{
                var cell = event.points[0].pointNumber;
                var pixel = pixels[cell[0] * {GRID_SIDE} + cell[1]];
                panel.querySelector("img").src = pixel.image;
                panel.querySelector(".module").textContent = "Module " + pixel.module;
                panel.querySelector(".channel").textContent =
                    "ASIC " + pixel.asic + ", Channel " + pixel.channel;
                panel.querySelector(".charge").innerHTML =
                    "Charge: " + pixel.charge + " ADC &middot; ns";
                panel.hidden = false;
            }});
        }});
    </script>
</body>
</html>
"#
    ))
}

pub fn write_page(
    filepath: &Path,
    image: &CameraImage,
    image_uris: Vec<String>,
    title: &str,
) -> Result<()> {
    let page = render_page(image, image_uris, title)?;
    std::fs::write(filepath, page).wrap_err_with(|| format!("can't write {}", filepath.display()))
}

#[cfg(test)]
use crate::pixels::Pixel;

#[cfg(test)]
fn sample_image() -> CameraImage {
    let mut image = CameraImage::new(2);
    image
        .set(
            33,
            Pixel {
                charge: 12.7,
                waveform: vec![1.0, 2.0],
                module: 111,
                asic: 2,
                channel: 9,
            },
        )
        .unwrap();
    image
}

#[test]
fn test_hover_records() {
    let image = sample_image();
    let uris = (0..TOTAL_CELLS).map(|idx| format!("uri-{idx}")).collect();
    let records = hover_records(&image, uris).unwrap();

    assert_eq!(records.len(), TOTAL_CELLS);
    assert_eq!(
        records[33],
        HoverRecord {
            module: 111,
            asic: 2,
            channel: 9,
            charge: 12,
            image: "uri-33".to_owned(),
        }
    );
    assert_eq!(records[0].charge, 0);

    assert!(hover_records(&image, vec!["uri".to_owned()]).is_err());
}

#[test]
fn test_heatmap_trace_json() {
    let image = sample_image();
    let trace = CameraHeatmap {
        kind: "heatmap",
        x: pixel_centres(),
        y: pixel_centres(),
        z: image.charge_grid(),
        zmin: 0.0,
        zmax: image.max_charge(),
        colorscale: ColorScale::Palette(ColorScalePalette::Viridis),
        colorbar: ColorBar::new(),
        customdata: vec![],
        hovertemplate: HOVER_TEMPLATE,
    };
    let json: serde_json::Value = serde_json::from_str(&trace.to_json()).unwrap();

    assert_eq!(json["type"], "heatmap");
    assert_eq!(json["zmax"], 12.7);
    assert_eq!(json["z"][1][1], 12.7);
    assert_eq!(json["x"].as_array().unwrap().len(), GRID_SIDE);
}

#[test]
fn test_colour_range_is_clamped_at_zero() {
    let mut image = CameraImage::new(1);
    for idx in 0..TOTAL_CELLS {
        let pixel = Pixel {
            charge: -5.0,
            waveform: vec![0.0],
            module: 100,
            asic: 0,
            channel: 0,
        };
        image.set(idx, pixel).unwrap();
    }
    let plot: serde_json::Value =
        serde_json::from_str(&build_plot(&image, "negative").to_json()).unwrap();

    assert_eq!(plot["data"][0]["zmin"], 0.0);
    assert_eq!(plot["data"][0]["zmax"], 0.0);
}

#[test]
fn test_page_contents() {
    let image = sample_image();
    let uris = (0..TOTAL_CELLS).map(|_| "data:image/svg+xml;base64,AAAA".to_owned()).collect();
    let page = render_page(&image, uris, "Sky View Camera Image").unwrap();

    assert!(page.contains("<title>Interactive Heatmap</title>"));
    assert!(page.contains("Sky View Camera Image"));
    assert!(page.contains(PLOTLY_CDN));
    assert!(page.contains(r#""module":111"#));
    assert!(page.contains("data:image/svg+xml;base64,AAAA"));
}
