//! Floor-plan geometry: rooms, their thresholds and where to draw things.
//!
//! Geometry fields left at zero are derived from the room rectangle, so a
//! minimal room only needs `rect`, `min` and `max`.

use crate::shared::errors::AppError;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

pub const DEFAULT_SPARK_HEIGHT: i32 = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

fn if_zero(a: i32, b: i32) -> i32 {
    if a == 0 {
        b
    } else {
        a
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Serial number of the sensor in this room. Defaults to the room key.
    #[serde(default)]
    pub sn: String,
    pub min: f64,
    pub max: f64,
    pub rect: Rect,
    /// Thermostat location.
    #[serde(default)]
    pub therm: Point,
    #[serde(default)]
    pub spark: Rect,
    /// Top-left corner of the value label.
    #[serde(default)]
    pub reading: Point,
    #[serde(skip)]
    pub name: String,
}

impl RoomConfig {
    pub fn reference_point(&self) -> Point {
        Point {
            x: if_zero(self.therm.x, self.rect.x + self.rect.w / 2),
            y: if_zero(self.therm.y, self.rect.y + self.rect.h / 2),
        }
    }

    pub fn spark_rect(&self) -> Rect {
        let h = if_zero(self.spark.h, DEFAULT_SPARK_HEIGHT);
        Rect {
            x: if_zero(self.spark.x, self.rect.x),
            y: if_zero(self.spark.y, self.rect.y + self.rect.h - h),
            w: if_zero(self.spark.w, self.rect.w),
            h,
        }
    }

    /// Top-left corner for a label `text_w` pixels wide and `line_h` tall:
    /// centered horizontally, a little above the vertical middle.
    pub fn label_origin(&self, text_w: i32, line_h: i32) -> Point {
        Point {
            x: if_zero(self.reading.x, self.rect.x + self.rect.w / 2 - text_w / 2),
            y: if_zero(
                self.reading.y,
                self.rect.y + (self.rect.h - line_h * 2) / 2 - line_h,
            ),
        }
    }

    pub fn normal(&self) -> f64 {
        self.min + (self.max - self.min) / 2.0
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Dims {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseConfig {
    pub dims: Dims,
    pub max_relevant_distance: f64,
    pub rooms: HashMap<String, RoomConfig>,
    /// Draw order.
    pub colorize: Vec<String>,
    #[serde(skip)]
    by_serial: HashMap<String, String>,
}

impl HouseConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let content = fs::read_to_string(&path).map_err(|e| {
            AppError::render(format!(
                "Failed to read layout {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, AppError> {
        let conf: HouseConfig = serde_json::from_str(content)
            .map_err(|e| AppError::render(format!("Failed to parse layout: {}", e)))?;
        conf.index()
    }

    fn index(mut self) -> Result<Self, AppError> {
        if !(self.max_relevant_distance > 0.0) {
            return Err(AppError::render(
                "max_relevant_distance must be greater than zero",
            ));
        }

        let mut by_serial = HashMap::new();
        for (key, room) in self.rooms.iter_mut() {
            if room.sn.is_empty() {
                room.sn = key.clone();
            }
            room.name = key.clone();

            if !(room.max > room.min) {
                return Err(AppError::render(format!(
                    "Room {} needs max greater than min",
                    key
                )));
            }
            if room.rect.w <= 0 || room.rect.h <= 0 {
                return Err(AppError::render(format!(
                    "Room {} has an empty rectangle",
                    key
                )));
            }
            if let Some(other) = by_serial.insert(room.sn.clone(), key.clone()) {
                return Err(AppError::render(format!(
                    "Serial {} is bound to both {} and {}",
                    room.sn, other, key
                )));
            }
        }

        if let Some(missing) = self.colorize.iter().find(|n| !self.rooms.contains_key(*n)) {
            return Err(AppError::render(format!(
                "Draw order names unknown room {}",
                missing
            )));
        }

        self.by_serial = by_serial;
        Ok(self)
    }

    pub fn by_serial(&self, sn: &str) -> Option<&RoomConfig> {
        self.by_serial.get(sn).and_then(|key| self.rooms.get(key))
    }

    /// Display name for a serial, or the serial itself when unbound.
    pub fn name_of<'a>(&'a self, sn: &'a str) -> &'a str {
        self.by_serial(sn).map(|r| r.name.as_str()).unwrap_or(sn)
    }

    /// Rooms in draw order.
    pub fn draw_order(&self) -> impl Iterator<Item = &RoomConfig> {
        self.colorize.iter().filter_map(|name| self.rooms.get(name))
    }
}
