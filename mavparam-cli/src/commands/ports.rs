//! Port listing command implementation.

use anyhow::{Context, Result};
use console::style;
use mavparam::{DetectedPort, Locator, detect_ports};

use crate::config::Config;

/// List ports command implementation.
///
/// Ports matching the autopilot descriptor patterns are marked, and the port
/// an upload would pick is shown last.
pub(crate) fn cmd_list_ports(config: &Config, json: bool) -> Result<()> {
    let locator = Locator::new().with_extra_patterns(config.port.patterns.iter().cloned());
    let detected = detect_ports().context("failed to enumerate serial ports")?;
    let selected = locator.candidates(&detected).into_iter().next();
    let matches = |port: &DetectedPort| port.matches_any(locator.patterns());

    if json {
        let ports: Vec<serde_json::Value> = detected
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "descriptor": p.descriptor(),
                    "autopilot": matches(p),
                    "vid": p.vid,
                    "pid": p.pid,
                    "manufacturer": p.manufacturer,
                    "product": p.product,
                    "serial": p.serial,
                })
            })
            .collect();
        let output = serde_json::json!({
            "ok": true,
            "data": {
                "ports": ports,
                "selected": selected.as_ref().map(|c| c.endpoint.clone()),
            }
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    eprintln!("{}", style("Available serial ports:").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for (port, line) in detected.iter().zip(mavparam::format_port_list(&detected)) {
        let tag = if matches(port) {
            format!(" [{}]", style("autopilot").yellow())
        } else {
            String::new()
        };
        eprintln!("  {} {}{tag}", style("•").green(), line);
    }

    if let Some(candidate) = selected {
        eprintln!(
            "\n{} Auto-detected: {}",
            style("→").green().bold(),
            style(&candidate.endpoint).cyan().bold()
        );
    }

    Ok(())
}
