//! HTML body of the report email.
//!
//! Inline-styled HTML (mail clients ignore stylesheets) with the charts
//! embedded as base64 PNG data URIs.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::collector::DatabaseTarget;
use crate::error::Result;
use crate::store::PeakStore;

use super::chart::{render_database_chart, render_overall_chart};
use super::truncate_text;

/// Rows shown in each per-database table.
const TABLE_TOP_N: usize = 10;

/// Statement-text prefix length in table rows.
const TABLE_TEXT_CHARS: usize = 80;

/// Peaks above this many milliseconds are highlighted.
const HIGHLIGHT_MS: u64 = 1000;

/// Renders the full report body.
pub fn render_html(
    store: &PeakStore,
    targets: &[DatabaseTarget],
    elapsed: Duration,
) -> Result<String> {
    let overall_b64 = BASE64.encode(render_overall_chart(store, targets)?);

    let mut sections = String::new();
    for target in targets {
        sections.push_str(&database_section(store, &target.name)?);
    }

    Ok(format!(
        r#"<html>
<body style="font-family: 'Segoe UI', sans-serif; background-color: #eaeff2; padding: 20px;">
  <div style="max-width: 900px; margin: 0 auto;">
    <div style="background-color: #005073; color: #ffffff; padding: 20px; text-align: center; border-radius: 8px 8px 0 0;">
      <h2 style="margin: 0;">Multi-Database Peak Report</h2>
      <p style="margin: 5px 0 0 0;">Monitoring Window: {} Minutes</p>
    </div>
    <div style="background:#fff; padding:20px; margin-bottom:20px; text-align:center;">
      <h3 style="color:#555; margin-top:0;">Overall Performance Comparison</h3>
      <img src="data:image/png;base64,{}" style="width:100%; max-width:600px;" />
    </div>
{}
    <div style="text-align:center; color:#888; font-size:11px; margin-top:20px;">
      <b>Note:</b> Full query details are attached in the CSV file.
    </div>
  </div>
</body>
</html>
"#,
        elapsed.as_secs() / 60,
        overall_b64,
        sections
    ))
}

fn database_section(store: &PeakStore, db_name: &str) -> Result<String> {
    let name = escape_html(db_name);

    let Some(chart) = render_database_chart(store, db_name)? else {
        return Ok(format!(
            "    <div style='background:#fff; padding:15px; margin-bottom:15px;'>\
             <h3>{}</h3><p style='color:#777'>No queries captured (&gt; {}ms)</p></div>\n",
            name,
            store.noise_floor_ms()
        ));
    };

    let mut table_rows = String::new();
    for (i, entry) in store
        .sorted_entries(db_name)
        .iter()
        .take(TABLE_TOP_N)
        .enumerate()
    {
        let bg = if i % 2 == 0 { "#f9f9f9" } else { "#ffffff" };
        let style = if entry.max_avg_latency_ms > HIGHLIGHT_MS {
            "color:#dc3545; font-weight:bold;"
        } else {
            "color:#333;"
        };
        table_rows.push_str(&format!(
            r#"        <tr style="background-color: {};">
          <td style="padding:8px; border-bottom:1px solid #ddd; font-family:monospace; font-size:12px;">{}</td>
          <td style="padding:8px; border-bottom:1px solid #ddd; text-align:center;">{}</td>
          <td style="padding:8px; border-bottom:1px solid #ddd; text-align:center; {}">{} ms</td>
        </tr>
"#,
            bg,
            escape_html(&truncate_text(&entry.statement_text, TABLE_TEXT_CHARS)),
            escape_html(&entry.peak_observed_at),
            style,
            entry.max_avg_latency_ms
        ));
    }

    Ok(format!(
        r#"    <div style="background:#fff; padding:20px; border-radius:8px; margin-bottom:20px; box-shadow:0 2px 5px rgba(0,0,0,0.05);">
      <h3 style="color:#005073; border-bottom:2px solid #eee; padding-bottom:10px; margin-top:0;">{}</h3>
      <div style="text-align:center;">
        <img src="data:image/png;base64,{}" style="width:100%; max-width:600px; border:1px solid #eee; margin-bottom:15px;" />
      </div>
      <table style="width:100%; border-collapse:collapse;">
        <thead><tr style="background:#e9ecef;"><th style="padding:8px; text-align:left;">Top Spikes</th><th style="padding:8px; text-align:center;">Time</th><th style="padding:8px; text-align:center;">Peak Duration</th></tr></thead>
        <tbody>
{}        </tbody>
      </table>
    </div>
"#,
        name,
        BASE64.encode(chart),
        table_rows
    ))
}

/// Minimal HTML entity escaping for interpolated statement text.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
