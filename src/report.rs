//! Standalone HTML report
//!
//! Summary cards, fabric stock, per-fabric usage, production history and a
//! totals table in one self-contained document.

use chrono::{DateTime, Local};
use std::fmt::Write;

use crate::aggregates::{is_low_stock, usage_by_fabric, Summary, LOW_STOCK_THRESHOLD};
use crate::engine::round_length;
use crate::inventory::Inventory;

const STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: 'Segoe UI', Tahoma, sans-serif; line-height: 1.6; color: #333; background: #f0f2f5; padding: 20px; }
.report { max-width: 1200px; margin: 0 auto; background: white; border-radius: 12px; overflow: hidden; }
.header { background: #4CAF50; color: white; padding: 30px; text-align: center; }
.content { padding: 40px; }
.stats { display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 20px; margin-bottom: 40px; }
.card { background: #f5f7fa; padding: 20px; border-radius: 10px; text-align: center; border-left: 5px solid; }
.card.blue { border-left-color: #3498db; } .card.green { border-left-color: #2ecc71; }
.card.red { border-left-color: #e74c3c; } .card.purple { border-left-color: #9b59b6; }
.number { font-size: 2em; font-weight: bold; }
.section { margin-bottom: 40px; }
.section h2 { border-bottom: 3px solid #3498db; padding-bottom: 8px; margin-bottom: 16px; }
table { width: 100%; border-collapse: collapse; }
th, td { padding: 12px; text-align: left; border-bottom: 1px solid #ddd; }
th { background: #2c3e50; color: white; }
.reorder { background: #e74c3c; color: white; padding: 2px 8px; border-radius: 4px; }
.ok { color: #27ae60; font-weight: bold; }
.no-data { text-align: center; padding: 30px; color: #666; font-style: italic; }
.footer { text-align: center; padding: 20px; color: #666; border-top: 1px solid #eee; }
@media print { body { background: white; } }
"#;

/// Render the report for `inventory` as of `generated_at`.
pub fn render(inventory: &Inventory, generated_at: DateTime<Local>) -> String {
    let summary = Summary::of(inventory);
    let stamp = generated_at.format("%Y-%m-%d %H:%M").to_string();
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>Fabric Workshop Report - {stamp}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <div class=\"report\">\n<div class=\"header\"><h1>Fabric Workshop Report</h1><p>Generated {stamp}</p></div>\n\
         <div class=\"content\">\n"
    );

    let _ = write!(
        html,
        "<div class=\"stats\">\n\
         <div class=\"card blue\"><div class=\"number\">{}</div>Fabric types</div>\n\
         <div class=\"card green\"><div class=\"number\">{}</div>Stock value</div>\n\
         <div class=\"card red\"><div class=\"number\">{}</div>Low stock (&lt;{}m)</div>\n\
         <div class=\"card purple\"><div class=\"number\">{}</div>Fabric used (m)</div>\n\
         </div>\n",
        summary.total_items,
        format_amount(summary.total_value),
        summary.low_stock,
        LOW_STOCK_THRESHOLD,
        round_length(summary.total_used),
    );

    fabric_section(&mut html, inventory);
    usage_section(&mut html, inventory);
    history_section(&mut html, inventory);
    totals_section(&mut html, inventory, &summary);

    let _ = write!(
        html,
        "</div>\n<div class=\"footer\"><p>FabricWorks report generated {stamp}</p></div>\n</div>\n</body>\n</html>\n"
    );
    html
}

fn fabric_section(html: &mut String, inventory: &Inventory) {
    html.push_str("<div class=\"section\"><h2>Fabric stock</h2>\n");
    if inventory.fabrics.is_empty() {
        html.push_str("<div class=\"no-data\">No fabrics recorded</div></div>\n");
        return;
    }
    html.push_str(
        "<table><thead><tr><th>Code</th><th>Material</th><th>Color</th><th>Stock (m)</th>\
         <th>Unit price</th><th>Value</th><th>Status</th></tr></thead><tbody>\n",
    );
    for fabric in &inventory.fabrics {
        let status = if is_low_stock(fabric) {
            "<span class=\"reorder\">Reorder</span>"
        } else {
            "<span class=\"ok\">In stock</span>"
        };
        let color = if fabric.color.is_empty() { "N/A" } else { fabric.color.as_str() };
        let _ = writeln!(
            html,
            "<tr><td><strong>{}</strong></td><td>{}</td><td>{}</td><td>{}m</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&fabric.code),
            escape(&fabric.material),
            escape(color),
            fabric.current_length,
            format_amount(fabric.price),
            format_amount(fabric.stock_value()),
            status,
        );
    }
    html.push_str("</tbody></table></div>\n");
}

fn usage_section(html: &mut String, inventory: &Inventory) {
    html.push_str("<div class=\"section\"><h2>Fabric usage</h2>\n");
    let stats = usage_by_fabric(inventory);
    if stats.is_empty() {
        html.push_str("<div class=\"no-data\">No fabric used yet</div></div>\n");
        return;
    }
    html.push_str(
        "<table><thead><tr><th>Fabric</th><th>Total used (m)</th><th>Value</th>\
         <th>Runs</th><th>Average per run (m)</th></tr></thead><tbody>\n",
    );
    for stat in &stats {
        let _ = writeln!(
            html,
            "<tr><td><strong>{}</strong></td><td>{}m</td><td>{}</td><td>{}</td><td>{}m</td></tr>",
            escape(&stat.label),
            round_length(stat.total_used),
            format_amount(stat.total_value),
            stat.production_count,
            round_length(stat.average_per_run()),
        );
    }
    html.push_str("</tbody></table></div>\n");
}

fn history_section(html: &mut String, inventory: &Inventory) {
    html.push_str("<div class=\"section\"><h2>Production history</h2>\n");
    if inventory.production_records.is_empty() {
        html.push_str("<div class=\"no-data\">No production recorded</div></div>\n");
        return;
    }
    html.push_str(
        "<table><thead><tr><th>Date</th><th>Product</th><th>Quantity</th>\
         <th>Fabric used (m)</th><th>Value</th><th>Notes</th></tr></thead><tbody>\n",
    );
    for record in &inventory.production_records {
        let notes = if record.notes.is_empty() { "N/A" } else { record.notes.as_str() };
        let date = record.date.map_or_else(|| "N/A".to_string(), |d| d.format("%Y-%m-%d").to_string());
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td><strong>{}</strong></td><td>{}</td><td>{}m</td><td>{}</td><td>{}</td></tr>",
            date,
            escape(&record.snapshot.product_name),
            record.quantity,
            round_length(record.fabric_used()),
            format_amount(record.fabric_value()),
            escape(notes),
        );
    }
    html.push_str("</tbody></table></div>\n");
}

fn totals_section(html: &mut String, inventory: &Inventory, summary: &Summary) {
    let reorder = if summary.low_stock > 0 {
        format!("<span class=\"reorder\">{} fabric(s) to reorder</span>", summary.low_stock)
    } else {
        "<span class=\"ok\">All fabrics stocked</span>".to_string()
    };
    let _ = write!(
        html,
        "<div class=\"section\"><h2>Totals</h2><table><tbody>\n\
         <tr><td><strong>Fabric types</strong></td><td>{}</td></tr>\n\
         <tr><td><strong>Products</strong></td><td>{}</td></tr>\n\
         <tr><td><strong>Production runs</strong></td><td>{}</td></tr>\n\
         <tr><td><strong>Stock value</strong></td><td>{}</td></tr>\n\
         <tr><td><strong>Fabric used</strong></td><td>{}m</td></tr>\n\
         <tr><td><strong>Reorder</strong></td><td>{}</td></tr>\n\
         </tbody></table></div>\n",
        summary.total_items,
        inventory.products.len(),
        inventory.production_records.len(),
        format_amount(summary.total_value),
        round_length(summary.total_used),
        reorder,
    );
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Thousands-grouped amount with at most three decimals.
pub fn format_amount(value: f64) -> String {
    let rendered = format!("{:.3}", value.abs());
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && rendered.chars().any(|c| c.is_ascii_digit() && c != '0') { "-" } else { "" };
    if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{fraction}")
    }
}
