//! SVG line chart of one week's average prices, one series per symbol.

use crate::domain::daily_record::WeeklyAggregateRow;
use crate::domain::run_window::REPORT_DAYS;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

pub const CHART_TITLE: &str = "Weekly avg price of stock symbols";

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 400.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 120.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 40.0;

const PALETTE: [&str; 8] = [
    "#2563eb", "#dc2626", "#16a34a", "#d97706", "#7c3aed", "#0891b2", "#db2777", "#4b5563",
];

/// Axis label for a weekday, e.g. `Mon 05/Jun`.
pub fn day_label(date: NaiveDate) -> String {
    date.format("%a %d/%b").to_string()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_weekly_svg(week_start: NaiveDate, rows: &[WeeklyAggregateRow]) -> String {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let prices: Vec<f64> = rows.iter().filter_map(|r| r.avg_price).collect();
    let (min_price, max_price) = if prices.is_empty() {
        (0.0, 1.0)
    } else {
        (
            prices.iter().copied().fold(f64::INFINITY, f64::min),
            prices.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        )
    };
    let range = if max_price > min_price {
        max_price - min_price
    } else {
        1.0
    };

    let x_scale = |date: NaiveDate| -> f64 {
        let day = (date - week_start).num_days() as f64;
        MARGIN_LEFT + day / (REPORT_DAYS - 1) as f64 * plot_width
    };
    let y_scale =
        |v: f64| -> f64 { MARGIN_TOP + plot_height - ((v - min_price) / range) * plot_height };

    // rows arrive ordered by date, so each series is already chronological
    let mut series: BTreeMap<&str, Vec<(NaiveDate, Option<f64>)>> = BTreeMap::new();
    for row in rows {
        series
            .entry(row.symbol.as_str())
            .or_default()
            .push((row.date, row.avg_price));
    }

    let mut svg = String::new();
    svg.push_str(&format!(
        r##"<svg width="{}" height="{}" viewBox="0 0 {} {}" xmlns="http://www.w3.org/2000/svg">"##,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str("\n  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"22\" text-anchor=\"middle\" font-size=\"16\" fill=\"#111\">{}</text>\n",
        CHART_WIDTH / 2.0,
        CHART_TITLE
    ));
    svg.push_str(&format!(
        "  <line x1=\"{0}\" y1=\"{1}\" x2=\"{0}\" y2=\"{2}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        MARGIN_TOP,
        CHART_HEIGHT - MARGIN_BOTTOM
    ));
    svg.push_str(&format!(
        "  <line x1=\"{}\" y1=\"{2}\" x2=\"{}\" y2=\"{2}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        CHART_WIDTH - MARGIN_RIGHT,
        CHART_HEIGHT - MARGIN_BOTTOM
    ));

    for (value, y) in [
        (max_price, MARGIN_TOP + 5.0),
        ((max_price + min_price) / 2.0, MARGIN_TOP + plot_height / 2.0),
        (min_price, CHART_HEIGHT - MARGIN_BOTTOM),
    ] {
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{:.2}</text>\n",
            MARGIN_LEFT - 5.0,
            y,
            value
        ));
    }

    for offset in 0..REPORT_DAYS {
        let date = week_start + Duration::days(offset);
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{}\" text-anchor=\"middle\" font-size=\"10\" fill=\"#666\">{}</text>\n",
            x_scale(date),
            CHART_HEIGHT - MARGIN_BOTTOM + 15.0,
            day_label(date)
        ));
    }

    if prices.is_empty() {
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"12\" fill=\"#999\">No price data</text>\n",
            MARGIN_LEFT + plot_width / 2.0,
            MARGIN_TOP + plot_height / 2.0
        ));
    }

    for (i, (symbol, points)) in series.iter().enumerate() {
        let colour = PALETTE[i % PALETTE.len()];

        // a missing price breaks the line
        let mut path_data = String::new();
        let mut pen_down = false;
        for (date, price) in points {
            match price {
                Some(p) => {
                    let command = if pen_down { " L" } else { " M" };
                    path_data.push_str(&format!("{} {:.1} {:.1}", command, x_scale(*date), y_scale(*p)));
                    pen_down = true;
                }
                None => pen_down = false,
            }
        }
        if !path_data.is_empty() {
            svg.push_str(&format!(
                "  <path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\"/>\n",
                path_data.trim_start(),
                colour
            ));
        }
        for (date, price) in points {
            if let Some(p) = price {
                svg.push_str(&format!(
                    "  <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"{}\"/>\n",
                    x_scale(*date),
                    y_scale(*p),
                    colour
                ));
            }
        }

        let legend_y = MARGIN_TOP + 15.0 * i as f64;
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{:.1}\" font-size=\"11\" fill=\"{}\">{}</text>\n",
            CHART_WIDTH - MARGIN_RIGHT + 10.0,
            legend_y,
            colour,
            escape(symbol)
        ));
    }

    svg.push_str("</svg>");
    svg
}
