use super::reading::Reading;
use crate::shared::{errors::AppError, queue::WorkQueue};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::Rng;

/// Parallel arrays as posted by the sensors: `sn`, `ts` and `r`, each
/// optionally spelled with a `[]` suffix.
#[derive(Debug, Default, PartialEq)]
pub struct InputBatch {
    pub serials: Vec<String>,
    pub timestamps: Vec<String>,
    pub values: Vec<String>,
}

impl InputBatch {
    pub fn from_form(fields: Vec<(String, String)>) -> Self {
        let mut batch = InputBatch::default();
        for (key, value) in fields {
            match key.trim_end_matches("[]") {
                "sn" => batch.serials.push(value),
                "ts" => batch.timestamps.push(value),
                "r" => batch.values.push(value),
                _ => {}
            }
        }
        batch
    }

    /// Validates the whole batch up front. Any bad element rejects the
    /// batch, so nothing gets enqueued for a request that answers 400.
    pub fn prepare_readings(&self) -> Result<Vec<Reading>, AppError> {
        if self.serials.len() != self.timestamps.len() || self.serials.len() != self.values.len() {
            return Err(AppError::validation("Incorrect parameters"));
        }

        self.serials
            .iter()
            .zip(&self.timestamps)
            .zip(&self.values)
            .map(|((serial, ts), r)| {
                let timestamp = DateTime::parse_from_rfc3339(ts.trim())
                    .map_err(|e| AppError::validation(format!("Error preparing: {}", e)))?
                    .with_timezone(&Utc);
                let value = r
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| AppError::validation(format!("Error preparing: {}", e)))?;
                if !value.is_finite() {
                    return Err(AppError::validation(format!(
                        "Error preparing: {} is not a finite reading",
                        r.trim()
                    )));
                }

                Ok(Reading {
                    serial: serial.clone(),
                    value,
                    timestamp,
                })
            })
            .collect()
    }
}

/// Enqueues readings in chunks of `chunk_size`, in order.
pub async fn enqueue_readings(
    queue: &dyn WorkQueue,
    readings: &[Reading],
    chunk_size: usize,
) -> Result<(), AppError> {
    for chunk in readings.chunks(chunk_size.max(1)) {
        let payloads = chunk
            .iter()
            .map(|r| serde_json::to_vec(r).map(Bytes::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::upstream(format!("Error queueing things: {}", e)))?;

        queue
            .enqueue(payloads)
            .await
            .map_err(|e| AppError::upstream(format!("Error queueing things: {}", e)))?;
    }
    Ok(())
}

/// Rolls once per accepted reading; true when any roll hits.
pub fn should_consume(probability: f64, n: usize) -> bool {
    let p = if probability.is_nan() {
        0.0
    } else {
        probability.clamp(0.0, 1.0)
    };
    let mut rng = rand::thread_rng();
    (0..n).any(|_| rng.gen_bool(p))
}
