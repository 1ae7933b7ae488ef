// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rendering of command responses for the terminal.

use ghost_core::{CommandResponse, ProcessState, ResponseData};

/// Render a response to printable text. Errors render as `error: ...`.
pub fn render_response(response: &CommandResponse) -> String {
    if !response.success {
        return format!("error: {}", response.error.as_deref().unwrap_or("unknown"));
    }
    match &response.data {
        None => "ok".to_string(),
        Some(ResponseData::Flag(flag)) => flag.to_string(),
        Some(ResponseData::Text(text)) => text.clone(),
        Some(ResponseData::ProcessState(state)) => render_state(state),
        Some(ResponseData::ProcessList(list)) => render_list(list),
    }
}

fn render_state(state: &ProcessState) -> String {
    let mut out = format!(
        "{}  {}  {}",
        state.id,
        state.name,
        if state.is_running { "running" } else { "stopped" }
    );
    if let Some(seen) = state.last_seen_ms {
        out.push_str(&format!("  last-seen={}ms", seen));
    }
    if let Some(metrics) = &state.last_metrics {
        out.push_str(&format!(
            "  cpu={:.1}%  mem={}",
            metrics.cpu_percentage,
            format_bytes(metrics.memory_bytes)
        ));
    }
    out
}

fn render_list(list: &[ProcessState]) -> String {
    if list.is_empty() {
        return "no processes".to_string();
    }
    let id_width = list.iter().map(|s| s.id.as_str().len()).max().unwrap_or(2).max(2);
    let name_width = list.iter().map(|s| s.name.len()).max().unwrap_or(4).max(4);

    let mut out = format!(
        "{:<id_width$}  {:<name_width$}  {:<8}  {:<7}\n",
        "ID",
        "NAME",
        "STATUS",
        "KIND",
        id_width = id_width,
        name_width = name_width,
    );
    for state in list {
        out.push_str(&format!(
            "{:<id_width$}  {:<name_width$}  {:<8}  {:<7}\n",
            state.id.as_str(),
            state.name,
            if state.is_running { "running" } else { "stopped" },
            if state.is_service { "service" } else { "app" },
            id_width = id_width,
            name_width = name_width,
        ));
    }
    out.trim_end().to_string()
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}{}", bytes, UNITS[0])
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
