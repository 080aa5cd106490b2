//! Trend charts using Plotters and console summaries

use plotters::prelude::*;

use crate::metrics::{ChurnSummary, DailyPoint, MetricsSummary, HIGH_RISK_THRESHOLD};

const DAU_COLOR: RGBColor = BLUE;
const RETENTION_COLOR: RGBColor = RGBColor(0, 150, 80);

/// Render DAU (top) and retention rate (bottom) over time as an SVG.
///
/// # Arguments
/// * `trend` - Daily points in ascending date order
/// * `output_path` - Path of the SVG file to write
/// * `plot_title` - Title for the chart
pub fn create_trend_chart(
    trend: &[DailyPoint],
    output_path: &str,
    plot_title: Option<&str>,
) -> crate::Result<()> {
    if trend.is_empty() {
        anyhow::bail!("No daily points to plot");
    }
    let title = plot_title.unwrap_or("Daily Active Users and Retention");

    let x_max = (trend.len().saturating_sub(1)).max(1) as f64;
    let dau_max = trend.iter().map(|p| p.active_users).max().unwrap_or(0).max(1) as f64;
    let date_label = |x: &f64| {
        trend
            .get(x.round().max(0.0) as usize)
            .map(|p| p.date.format("%m-%d").to_string())
            .unwrap_or_default()
    };

    let root = SVGBackend::new(output_path, (900, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 26))?;
    let (upper, lower) = root.split_vertically(340);

    let mut dau_chart = ChartBuilder::on(&upper)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..x_max, 0f64..(dau_max * 1.1))?;

    dau_chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Daily active users")
        .x_label_formatter(&date_label)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    dau_chart.draw_series(LineSeries::new(
        trend
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64, f64::from(p.active_users))),
        &DAU_COLOR,
    ))?;

    let mut retention_chart = ChartBuilder::on(&lower)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..x_max, 0f64..100f64)?;

    retention_chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Retention rate (%)")
        .x_label_formatter(&date_label)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    retention_chart.draw_series(LineSeries::new(
        trend
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64, p.retention_rate)),
        &RETENTION_COLOR,
    ))?;

    root.present()?;
    println!("Trend chart saved to: {}", output_path);

    Ok(())
}

/// Print engagement, retention and breakdown tables to the console
pub fn print_summary(summary: &MetricsSummary) {
    println!("\n=== User Engagement ===");
    println!("  Days covered: {}", summary.days);
    println!("  Unique users: {}", summary.total_users);
    println!("  Average daily active users: {:.0}", summary.average_dau);
    println!("  Peak DAU: {}", summary.peak_dau);
    println!(
        "  Average session duration: {:.1} minutes",
        summary.average_session_duration
    );
    println!("  Total app opens: {}", summary.total_app_opens);
    println!(
        "  Average screens per user-day: {:.1}",
        summary.average_screens_viewed
    );

    println!("\n=== Retention ===");
    println!("  Average retention rate: {:.1}%", summary.average_retention);
    println!("  Best retention rate: {:.1}%", summary.best_retention);
    println!("  Average churn rate: {:.1}%", summary.average_churn);
    match (summary.average_dau_growth, summary.peak_dau_growth) {
        (Some(avg), Some(peak)) => {
            println!("  Average DAU growth: {:.2}%", avg);
            println!("  Peak DAU growth: {:.2}%", peak);
        }
        _ => println!("  DAU growth: n/a (single day)"),
    }

    println!("\n=== User Segments ===");
    println!("  Segment          | Users | Duration | Screens");
    println!("  -----------------|-------|----------|--------");
    for s in &summary.segments {
        println!(
            "  {:16} | {:5} | {:8.1} | {:7.1}",
            s.name, s.users, s.mean_session_duration, s.mean_screens_viewed
        );
    }

    println!("\n=== Devices ===");
    for d in &summary.devices {
        println!("  {:10} {} users", d.name, d.users);
    }

    println!("\n=== Acquisition Channels ===");
    println!("  Channel      | Users | Duration");
    println!("  -------------|-------|---------");
    for c in &summary.channels {
        println!(
            "  {:12} | {:5} | {:8.1}",
            c.name, c.users, c.mean_session_duration
        );
    }
}

/// Print churn prediction totals and the per-segment churn share
pub fn print_churn_summary(summary: &ChurnSummary) {
    let share = |count: usize| count as f64 / summary.users.max(1) as f64 * 100.0;

    println!("\n=== Predictions ===");
    println!("Users scored: {}", summary.users);
    println!(
        "Predicted churners: {} ({:.1}%)",
        summary.predicted_churners,
        share(summary.predicted_churners)
    );
    println!(
        "High-risk users (>{:.0}%): {} ({:.1}%)",
        HIGH_RISK_THRESHOLD * 100.0,
        summary.high_risk,
        share(summary.high_risk)
    );
    println!("Average churn probability: {:.3}", summary.average_probability);

    println!("\n=== Churn by Segment ===");
    for (segment, rate) in &summary.segment_churn {
        println!("  {:16} {:5.1}%", segment, rate * 100.0);
    }
}
