//! In-process tabular engine
//!
//! Numeric statistics follow the usual dataframe conventions: sample
//! standard deviation (ddof = 1) and linearly interpolated quantiles.

use super::{Frame, TabularEngine, TabularError};
use serde_json::{json, Map, Number, Value};

/// Quantiles reported by `describe`, with their output keys
const QUANTILES: [(&str, f64); 3] = [("25%", 0.25), ("50%", 0.5), ("75%", 0.75)];

#[derive(Debug, Default, Clone)]
pub struct BuiltinTabularEngine;

impl BuiltinTabularEngine {
    pub fn new() -> Self {
        Self
    }

    fn describe_numeric(values: &[f64]) -> Result<Map<String, Value>, TabularError> {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(TabularError::Computation(
                "non-finite value in numeric column".to_string(),
            ));
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = mean(&sorted);
        let std = if count < 2 {
            None
        } else {
            Some(sample_std(&sorted, mean))
        };

        let mut stats = Map::new();
        stats.insert("count".to_string(), float(count as f64));
        stats.insert("mean".to_string(), float(mean));
        stats.insert("std".to_string(), std.map(float).unwrap_or(Value::Null));
        stats.insert("min".to_string(), float(sorted[0]));
        for (label, q) in QUANTILES {
            stats.insert(label.to_string(), float(quantile(&sorted, q)));
        }
        stats.insert("max".to_string(), float(sorted[count - 1]));
        Ok(stats)
    }

    fn describe_categorical(values: &[&Value]) -> Map<String, Value> {
        // (rendered value, first occurrence, count), in first-seen order
        let mut counts: Vec<(String, &Value, u64)> = Vec::new();
        for &value in values {
            let key = value.to_string();
            match counts.iter_mut().find(|(k, _, _)| *k == key) {
                Some(entry) => entry.2 += 1,
                None => counts.push((key, value, 1)),
            }
        }

        // Ties go to the value seen first
        let top = counts
            .iter()
            .fold(None::<&(String, &Value, u64)>, |best, entry| match best {
                Some(b) if b.2 >= entry.2 => Some(b),
                _ => Some(entry),
            });

        let mut stats = Map::new();
        stats.insert("count".to_string(), json!(values.len()));
        stats.insert("unique".to_string(), json!(counts.len()));
        stats.insert(
            "top".to_string(),
            top.map(|(_, v, _)| (*v).clone()).unwrap_or(Value::Null),
        );
        stats.insert(
            "freq".to_string(),
            top.map(|(_, _, n)| json!(n)).unwrap_or(Value::Null),
        );
        stats
    }
}

impl TabularEngine for BuiltinTabularEngine {
    fn name(&self) -> &str {
        "builtin"
    }

    fn describe(&self, frame: &Frame) -> Result<Map<String, Value>, TabularError> {
        let numeric: Vec<&String> = frame
            .columns()
            .iter()
            .filter(|c| frame.dtype(c).is_numeric())
            .collect();

        let mut statistics = Map::new();

        if numeric.is_empty() {
            for column in frame.columns() {
                let present = frame.present(column);
                statistics.insert(
                    column.clone(),
                    Value::Object(Self::describe_categorical(&present)),
                );
            }
            return Ok(statistics);
        }

        for column in numeric {
            let values = frame
                .present(column)
                .into_iter()
                .map(|v| {
                    v.as_f64().ok_or_else(|| {
                        TabularError::Computation(format!("column '{column}' is not numeric"))
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            statistics.insert(column.clone(), Value::Object(Self::describe_numeric(&values)?));
        }

        Ok(statistics)
    }

    fn dtypes(&self, frame: &Frame) -> Map<String, Value> {
        frame
            .columns()
            .iter()
            .map(|c| (c.clone(), Value::String(frame.dtype(c).label().to_string())))
            .collect()
    }

    fn drop_missing(&self, frame: &Frame) -> Frame {
        frame.filter_records(|record| frame.is_complete(record))
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Arithmetic mean of finite values, finite even when the plain sum overflows
fn mean(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let sum = values.iter().sum::<f64>();
    if sum.is_finite() {
        return sum / n;
    }

    values
        .iter()
        .enumerate()
        .fold(0.0, |mean, (i, v)| {
            let seen = (i + 1) as f64;
            mean + v / seen - mean / seen
        })
}

/// Sample standard deviation (ddof = 1), rescaled when squares overflow
fn sample_std(values: &[f64], mean: f64) -> f64 {
    let ddof = (values.len() - 1) as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / ddof;
    if variance.is_finite() {
        return variance.sqrt();
    }

    let scale = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let scaled = values
        .iter()
        .map(|v| (v / scale - mean / scale).powi(2))
        .sum::<f64>()
        / ddof;
    scale * scaled.sqrt()
}

/// Linear interpolation between closest ranks over sorted data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
