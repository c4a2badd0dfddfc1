//! Turns the aggregated readings plus the floor plan into a PNG.

use super::{
    assets::HouseAssets,
    canvas::{Canvas, CHAR_HEIGHT, CHAR_WIDTH},
    layout::RoomConfig,
    reading::{series_key, CurrentSnapshot, Reading, ReadingSeries, CURRENT_KEY},
};
use crate::shared::{cache::CacheStore, errors::AppError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::{codecs::png::PngEncoder, ImageEncoder, Rgba, RgbaImage};
use log::warn;
use std::collections::HashMap;

pub const PLACEHOLDER_LABEL: &str = "??.??";

const BORDER: Rgba<u8> = Rgba([0, 0, 0, 255]);
const COLD: Rgba<u8> = Rgba([0, 0, 255, 255]);
const HOT: Rgba<u8> = Rgba([255, 0, 0, 255]);
const UNKNOWN: Rgba<u8> = Rgba([255, 255, 255, 255]);
const SPARK: Rgba<u8> = Rgba([127, 127, 127, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    Cold,
    Hot,
    Gradient,
}

pub fn classify(room: &RoomConfig, value: f64) -> Fill {
    if value <= room.min {
        Fill::Cold
    } else if value >= room.max {
        Fill::Hot
    } else {
        Fill::Gradient
    }
}

/// Fades from 1 at the reference point to 0 at `max_distance` and beyond.
pub fn relevance(distance: f64, max_distance: f64) -> f64 {
    (1.0 - distance / max_distance).clamp(0.0, 1.0)
}

/// Gradient color for an in-range value. The further the value is from the
/// middle of the range, the stronger the tint; the further the pixel is from
/// the thermostat, the closer to white.
pub fn fill_color(room: &RoomConfig, value: f64, relevance: f64) -> Rgba<u8> {
    let normal = room.normal();
    let difference = (value - normal).abs() / (room.max - room.min);

    let base = 255.0 - 255.0 * difference;
    let level = (base + (255.0 - base) * (1.0 - relevance)) as u8;

    if value > normal {
        Rgba([255, level, level, 255])
    } else {
        Rgba([level, level, 255, 255])
    }
}

fn draw_box(canvas: &mut Canvas, room: &RoomConfig) {
    let r = room.rect;
    canvas.fill_rect(r.x - 1, r.y - 1, r.w + 2, r.h + 2, BORDER);
}

fn fill_gradient(canvas: &mut Canvas, room: &RoomConfig, value: f64, max_distance: f64) {
    let r = room.rect;
    let therm = room.reference_point();

    for py in r.y..r.y + r.h {
        for px in r.x..r.x + r.w {
            let (dx, dy) = (f64::from(px - therm.x), f64::from(py - therm.y));
            let distance = (dx * dx + dy * dy).sqrt();
            let color = fill_color(room, value, relevance(distance, max_distance));
            canvas.put(px, py, color);
        }
    }
}

fn fill(canvas: &mut Canvas, room: &RoomConfig, value: f64, max_distance: f64) {
    let r = room.rect;
    match classify(room, value) {
        Fill::Cold => canvas.fill_rect(r.x, r.y, r.w, r.h, COLD),
        Fill::Hot => canvas.fill_rect(r.x, r.y, r.w, r.h, HOT),
        Fill::Gradient => fill_gradient(canvas, room, value, max_distance),
    }
}

fn draw_label(canvas: &mut Canvas, room: &RoomConfig, text: &str) {
    let origin = room.label_origin(text.len() as i32 * CHAR_WIDTH, CHAR_HEIGHT);
    canvas.label(text, origin.x, origin.y, room.rect.w);
}

fn draw_sparkline(canvas: &mut Canvas, room: &RoomConfig, series: &ReadingSeries) {
    let readings = series.readings();
    if readings.len() < 2 {
        return;
    }

    let spark = room.spark_rect();
    if spark.w <= 0 || spark.h <= 0 {
        return;
    }
    let plotted = &readings[..readings.len().min(spark.w as usize)];

    let (mut low, mut high) = plotted
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), r| {
            (lo.min(r.value), hi.max(r.value))
        });

    let height = f64::from(spark.h);
    if high - low < height {
        let avg = low + (high - low) / 2.0;
        low = avg - height / 2.0;
        high = avg + height / 2.0;
    }

    let bottom = spark.y + spark.h;
    let right = spark.x + spark.w - 1;
    for (pos, r) in plotted.iter().enumerate() {
        let percent = (r.value - low) / (high - low);
        let y = (f64::from(bottom) - height * percent) as i32;
        canvas.put(right - pos as i32, y.clamp(spark.y, bottom), SPARK);
    }
}

/// Composites every room in draw order over the floor plan. Rooms whose
/// sensor has no cached history get a white fill and a placeholder label.
pub fn render_house(assets: &HouseAssets, readings: &HashMap<String, ReadingSeries>) -> RgbaImage {
    let mut canvas = Canvas::new(assets.base.clone());
    let max_distance = assets.layout.max_relevant_distance;

    for room in assets.layout.draw_order() {
        draw_box(&mut canvas, room);

        let latest = readings
            .get(&room.sn)
            .and_then(|series| series.latest().map(|r| (series, r.value)));

        match latest {
            Some((series, value)) => {
                fill(&mut canvas, room, value, max_distance);
                draw_label(&mut canvas, room, &format!("{:.2}", value));
                draw_sparkline(&mut canvas, room, series);
            }
            None => {
                let r = room.rect;
                canvas.fill_rect(r.x, r.y, r.w, r.h, UNKNOWN);
                draw_label(&mut canvas, room, PLACEHOLDER_LABEL);
            }
        }
    }

    canvas.into_image()
}

pub fn encode_png(image: &RgbaImage) -> Result<Bytes, AppError> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| AppError::render(format!("Error encoding image: {}", e)))?;
    Ok(Bytes::from(buffer))
}

fn single(serial: &str, value: f64) -> ReadingSeries {
    ReadingSeries::from(vec![Reading {
        serial: serial.to_string(),
        value,
        timestamp: DateTime::<Utc>::default(),
    }])
}

/// Collects the cached series of every sensor listed in the current
/// snapshot. Cache trouble degrades to less data, never to an error.
pub async fn load_readings(cache: &dyn CacheStore) -> HashMap<String, ReadingSeries> {
    let mut rv = HashMap::new();

    let current: CurrentSnapshot = match cache.get_multi(vec![CURRENT_KEY.to_string()]).await {
        Ok(mut found) => match found.remove(CURRENT_KEY) {
            Some(raw) => match serde_json::from_slice(&raw) {
                Ok(current) => current,
                Err(e) => {
                    warn!("Couldn't decode current values: {}", e);
                    return rv;
                }
            },
            None => return rv,
        },
        Err(e) => {
            warn!("Couldn't get current values from cache: {}", e);
            return rv;
        }
    };

    let keys = current.keys().map(|sn| series_key(sn)).collect();
    let mut cached = match cache.get_multi(keys).await {
        Ok(cached) => cached,
        Err(e) => {
            warn!("Couldn't get latest readings from cache: {}", e);
            for (sn, value) in &current {
                rv.insert(sn.clone(), single(sn, *value));
            }
            return rv;
        }
    };

    for (sn, value) in &current {
        let Some(raw) = cached.remove(&series_key(sn)) else {
            continue;
        };
        let series = match serde_json::from_slice::<ReadingSeries>(&raw) {
            Ok(series) if !series.is_empty() => series,
            Ok(_) => continue,
            Err(e) => {
                warn!("Corrupt history for {}: {}", sn, e);
                single(sn, *value)
            }
        };
        rv.insert(sn.clone(), series);
    }

    rv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        modules::house::layout::{tests::LAYOUT, HouseConfig},
        shared::cache::{CacheItem, MemoryCache},
    };
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn assets() -> HouseAssets {
        let layout = HouseConfig::from_json(LAYOUT).unwrap();
        HouseAssets::new(layout, RgbaImage::from_pixel(200, 120, WHITE))
    }

    fn series(serial: &str, values: &[f64]) -> ReadingSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        ReadingSeries::from(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| Reading {
                    serial: serial.to_string(),
                    value: *v,
                    timestamp: start - Duration::minutes(i as i64),
                })
                .collect::<Vec<_>>(),
        )
    }

    fn office() -> RoomConfig {
        HouseConfig::from_json(LAYOUT)
            .unwrap()
            .by_serial("A")
            .unwrap()
            .clone()
    }

    #[test]
    fn thresholds_pick_solid_fills_inclusively() {
        let room = office();
        assert_eq!(classify(&room, 17.9), Fill::Cold);
        assert_eq!(classify(&room, 18.0), Fill::Cold);
        assert_eq!(classify(&room, 18.01), Fill::Gradient);
        assert_eq!(classify(&room, 25.99), Fill::Gradient);
        assert_eq!(classify(&room, 26.0), Fill::Hot);
        assert_eq!(classify(&room, 30.0), Fill::Hot);
    }

    #[test]
    fn gradient_color_tints_and_fades() {
        let room = office();
        // middle of the range is white regardless of relevance
        assert_eq!(fill_color(&room, 22.0, 1.0), Rgba([255, 255, 255, 255]));
        // warm side, full relevance: diff 0.25 -> 191
        assert_eq!(fill_color(&room, 24.0, 1.0), Rgba([255, 191, 191, 255]));
        // cool side forces blue
        assert_eq!(fill_color(&room, 20.0, 1.0), Rgba([191, 191, 255, 255]));
        // no relevance fades to white
        assert_eq!(fill_color(&room, 24.0, 0.0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn relevance_is_clamped() {
        assert_eq!(relevance(0.0, 50.0), 1.0);
        assert_eq!(relevance(25.0, 50.0), 0.5);
        assert_eq!(relevance(80.0, 50.0), 0.0);
    }

    #[test]
    fn missing_sensor_renders_placeholder() {
        let assets = assets();
        let image = render_house(&assets, &HashMap::new());

        assert_eq!(image.dimensions(), (200, 120));
        // border
        assert_eq!(*image.get_pixel(9, 9), BORDER);
        // white fill away from the label
        assert_eq!(*image.get_pixel(12, 60), WHITE);

        // the label leaves ink in the label row
        let origin = office().label_origin(PLACEHOLDER_LABEL.len() as i32 * CHAR_WIDTH, CHAR_HEIGHT);
        let inked = (origin.x..origin.x + 30)
            .flat_map(|x| (origin.y..origin.y + CHAR_HEIGHT).map(move |y| (x, y)))
            .any(|(x, y)| *image.get_pixel(x as u32, y as u32) != WHITE);
        assert!(inked);
    }

    #[test]
    fn out_of_range_values_fill_solid() {
        let assets = assets();
        let mut readings = HashMap::new();
        readings.insert("A".to_string(), series("A", &[10.0]));
        readings.insert("kitchen".to_string(), series("kitchen", &[40.0]));

        let image = render_house(&assets, &readings);
        assert_eq!(*image.get_pixel(12, 60), COLD);
        assert_eq!(*image.get_pixel(112, 40), HOT);
    }

    #[test]
    fn gradient_is_strongest_at_the_thermostat() {
        let assets = assets();
        let mut readings = HashMap::new();
        readings.insert("A".to_string(), series("A", &[25.0]));

        let image = render_house(&assets, &readings);
        let near = *image.get_pixel(20, 20);
        let far = *image.get_pixel(85, 60);
        assert_eq!(near.0[0], 255);
        assert!(near.0[1] < far.0[1]);
        assert_eq!(far, WHITE);
    }

    #[test]
    fn sparkline_plots_newest_at_the_right_edge() {
        let assets = assets();
        let mut readings = HashMap::new();
        // kitchen sparkline: x 110..140, y 50..70
        readings.insert(
            "kitchen".to_string(),
            series("kitchen", &[20.0, 20.0, 20.0]),
        );

        let image = render_house(&assets, &readings);
        // flat series sits mid-height
        assert_eq!(*image.get_pixel(139, 60), SPARK);
        assert_eq!(*image.get_pixel(138, 60), SPARK);
        assert_eq!(*image.get_pixel(137, 60), SPARK);
        assert_ne!(*image.get_pixel(136, 60), SPARK);
    }

    #[test]
    fn sparkline_is_clipped_to_its_width() {
        let assets = assets();
        let values: Vec<f64> = (0..100).map(|i| 20.0 + (i % 3) as f64).collect();
        let mut readings = HashMap::new();
        readings.insert("kitchen".to_string(), series("kitchen", &values));

        let image = render_house(&assets, &readings);
        for y in 50..=70 {
            assert_ne!(*image.get_pixel(109, y), SPARK);
        }
    }

    #[test]
    fn png_encoding_produces_a_png() {
        let image = RgbaImage::from_pixel(4, 4, WHITE);
        let data = encode_png(&image).unwrap();
        assert_eq!(&data[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn load_readings_walks_current_snapshot() {
        let cache = MemoryCache::new();
        let mut current = CurrentSnapshot::new();
        current.insert("A".into(), 21.5);
        current.insert("B".into(), 19.0);

        cache
            .set_multi(vec![
                CacheItem {
                    key: CURRENT_KEY.into(),
                    value: Bytes::from(serde_json::to_vec(&current).unwrap()),
                    ttl: StdDuration::from_secs(60),
                },
                CacheItem {
                    key: series_key("A"),
                    value: Bytes::from(serde_json::to_vec(&series("A", &[21.5, 21.0])).unwrap()),
                    ttl: StdDuration::from_secs(60),
                },
                CacheItem {
                    key: series_key("B"),
                    value: Bytes::from_static(b"not json"),
                    ttl: StdDuration::from_secs(60),
                },
            ])
            .await
            .unwrap();

        let readings = load_readings(&cache).await;
        assert_eq!(readings["A"].len(), 2);
        // corrupt history degrades to the current value
        assert_eq!(readings["B"].latest().map(|r| r.value), Some(19.0));
    }

    #[tokio::test]
    async fn load_readings_without_current_is_empty() {
        let cache = MemoryCache::new();
        assert!(load_readings(&cache).await.is_empty());
    }
}
