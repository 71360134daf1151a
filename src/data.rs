//! CSV export of optimization results.

use std::error::Error;
use std::path::Path;

use serde::Serialize;

use crate::utils::state::GaussianSequence;

#[derive(Debug, Serialize)]
struct TraceRecord {
    iteration: usize,
    mean_return: f64,
}

/// Write the per-iteration mean-return trace.
pub fn save_trace<P: AsRef<Path>>(trace: &[f64], path: P) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for (iteration, &mean_return) in trace.iter().enumerate() {
        writer.serialize(TraceRecord {
            iteration,
            mean_return,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a Gaussian sequence as one row per timestep with per-coordinate
/// mean and standard deviation columns.
pub fn save_gaussian_sequence<P: AsRef<Path>, const D: usize>(
    dist: &GaussianSequence<D>,
    path: P,
) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["t".to_string()];
    for i in 0..D {
        header.push(format!("mean_{i}"));
    }
    for i in 0..D {
        header.push(format!("std_{i}"));
    }
    writer.write_record(&header)?;

    for t in 0..dist.len() {
        let mut row = vec![t.to_string()];
        for i in 0..D {
            row.push(format!("{}", dist.mu[t][i]));
        }
        for i in 0..D {
            row.push(format!("{}", dist.sigma[t][(i, i)].max(0.0).sqrt()));
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix2, Vector2};

    #[test]
    fn trace_round_trips_through_csv() {
        let dir = std::env::temp_dir().join("gps_trace_test.csv");
        save_trace(&[3.0, 2.5, 2.5, 1.0], &dir).unwrap();
        let content = std::fs::read_to_string(&dir).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "iteration,mean_return");
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("0,3"));
        std::fs::remove_file(&dir).ok();
    }

    #[test]
    fn sequence_export_has_one_row_per_step() {
        let mut dist = GaussianSequence::<2>::zeros(4);
        for t in 0..4 {
            dist.set(t, Vector2::new(t as f64, -1.0), &(Matrix2::identity() * 0.25));
        }
        let dir = std::env::temp_dir().join("gps_seq_test.csv");
        save_gaussian_sequence(&dist, &dir).unwrap();
        let content = std::fs::read_to_string(&dir).unwrap();
        assert_eq!(content.lines().count(), 5);
        assert!(content.lines().nth(1).unwrap().contains("0.5"));
        std::fs::remove_file(&dir).ok();
    }
}
