use std::error::Error;

use plotters::prelude::*;

use crate::utils::state::GaussianSequence;

/// Lower and upper ±2σ band of one coordinate of a Gaussian sequence,
/// as plain series ready to be drawn.
pub fn confidence_band<const D: usize>(
    dist: &GaussianSequence<D>,
    coord: usize,
) -> (Vec<f64>, Vec<f64>) {
    let mut lb = Vec::with_capacity(dist.len());
    let mut ub = Vec::with_capacity(dist.len());
    for t in 0..dist.len() {
        let m = dist.mu[t][coord];
        let s = dist.sigma[t][(coord, coord)].max(0.0).sqrt();
        lb.push(m - 2.0 * s);
        ub.push(m + 2.0 * s);
    }
    (lb, ub)
}

/// Save the per-iteration mean-return trace as an SVG line chart.
pub fn plot_trace(trace: &[f64], path: &str) -> Result<(), Box<dyn Error>> {
    let root = SVGBackend::new(path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let lo = trace.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = trace.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let pad = 0.05 * (hi - lo).max(1e-9);

    let mut chart = ChartBuilder::on(&root)
        .caption("mean return", ("sans-serif", 24).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..(trace.len().max(2) - 1) as f64, (lo - pad)..(hi + pad))?;
    chart.configure_mesh().x_desc("iteration").draw()?;
    chart.draw_series(LineSeries::new(
        trace.iter().enumerate().map(|(i, &r)| (i as f64, r)),
        &BLUE,
    ))?;
    root.present()?;
    Ok(())
}
