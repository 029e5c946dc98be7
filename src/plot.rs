use crate::equation::Slice;
use crate::error::{PinnError, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

/// 学習過程の損失をグラフとしてPNGファイルに出力します。
pub fn plot_loss_history(
    path: &Path,
    epochs: &[usize],
    total_loss_hist: &[f64],
    phys_loss_hist: &[f64],
) -> Result<()> {
    draw_loss_history(path, epochs, total_loss_hist, phys_loss_hist)
        .map_err(|e| PinnError::Plot(e.to_string()))
}

fn draw_loss_history(
    path: &Path,
    epochs: &[usize],
    total_loss_hist: &[f64],
    phys_loss_hist: &[f64],
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let log = |v: f64| v.max(1e-30).log10();
    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let logs = total_loss_hist.iter().chain(phys_loss_hist).map(|&v| log(v));
    let (min_log_loss, max_log_loss) = logs
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let (min_log_loss, max_log_loss) = if min_log_loss.is_finite() && max_log_loss.is_finite() {
        (min_log_loss - 0.5, max_log_loss + 0.5)
    } else {
        (-6.0, 1.0)
    };
    let max_epoch = epochs.last().copied().unwrap_or(1).max(1);
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..max_epoch, min_log_loss..max_log_loss)?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Epochs")
        .draw()?;
    chart
        .draw_series(LineSeries::new(
            epochs.iter().zip(total_loss_hist).map(|(&e, &val)| (e, log(val))),
            &RED,
        ))?
        .label("Total Loss")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    chart
        .draw_series(LineSeries::new(
            epochs.iter().zip(phys_loss_hist).map(|(&e, &val)| (e, log(val))),
            &BLUE,
        ))?
        .label("Physics Loss")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// 断面上の厳密解・予測・絶対誤差を3枚のヒートマップとして出力します。
pub fn plot_solution(path: &Path, slice: &Slice, pred: &[f64], title: &str) -> Result<()> {
    draw_solution(path, slice, pred, title).map_err(|e| PinnError::Plot(e.to_string()))
}

fn draw_solution(
    path: &Path,
    slice: &Slice,
    pred: &[f64],
    title: &str,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let exact = &slice.samples.values;
    let error: Vec<f64> = exact.iter().zip(pred).map(|(e, p)| (e - p).abs()).collect();
    let root = BitMapBackend::new(path, (1500, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 24))?;
    let panels = root.split_evenly((1, 3));
    let fields: [(&str, &[f64]); 3] = [
        ("Exact", exact),
        ("Predicted", pred),
        ("Absolute error", &error),
    ];
    for (panel, (name, values)) in panels.iter().zip(fields) {
        draw_heatmap(panel, slice, name, values)?;
    }
    root.present()?;
    Ok(())
}

fn draw_heatmap(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    slice: &Slice,
    name: &str,
    values: &[f64],
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let n = slice.resolution;
    let [(x0, x1), (y0, y1)] = slice.extent;
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = if hi > lo { hi - lo } else { 1.0 };
    let mut chart = ChartBuilder::on(area)
        .caption(format!("{name} [{lo:.3e}, {hi:.3e}]"), ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(slice.labels[0])
        .y_desc(slice.labels[1])
        .draw()?;
    let dx = (x1 - x0) / n.max(2).saturating_sub(1) as f64;
    let dy = (y1 - y0) / n.max(2).saturating_sub(1) as f64;
    chart.draw_series(values.iter().enumerate().map(|(idx, &v)| {
        let (i, j) = (idx / n, idx % n);
        let x = x0 + i as f64 * dx;
        let y = y0 + j as f64 * dy;
        let t = (v - lo) / span;
        let color = HSLColor(240.0 / 360.0 * (1.0 - t), 0.8, 0.5);
        Rectangle::new(
            [(x - dx / 2.0, y - dy / 2.0), (x + dx / 2.0, y + dy / 2.0)],
            color.filled(),
        )
    }))?;
    Ok(())
}
