//! CLI argument parsing for the hos-planner binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::services::clock::parse_start_time;
use crate::services::duty_schedule::compute_schedule;
use crate::services::logbook::{log_sheet, render_request};
use crate::types::{CycleSummary, LogSheet, LogbookRequest, StopEvent};

#[derive(Parser)]
#[command(name = "hos-planner", version, about = "Hours-of-service trip planning worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Schedule a given amount of driving and print the log sheets as JSON
    Plan {
        /// Total driving time in hours
        #[arg(long)]
        drive_hours: f64,
        /// Trip start (RFC 3339, or local "YYYY-MM-DD HH:MM"); defaults to today 08:00 UTC
        #[arg(long)]
        start: Option<String>,
        /// Hours already used in the current 70-hour cycle
        #[arg(long, default_value_t = 0.0)]
        cycle_used: f64,
    },
    /// Render one log sheet ({date, segments, labels} JSON) as SVG
    Logbook {
        /// Input JSON file
        #[arg(long)]
        input: PathBuf,
        /// Output SVG file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleReport {
    summary: CycleSummary,
    stops: Vec<StopEvent>,
    days: Vec<LogSheet>,
}

/// `plan` subcommand: the schedule with display-ready sheets, pretty JSON
pub fn run_plan(drive_hours: f64, start: Option<&str>, cycle_used: f64) -> Result<String> {
    let start = parse_start_time(start)?;
    let schedule = compute_schedule(drive_hours, start, cycle_used)?;

    let report = ScheduleReport {
        summary: schedule.summary,
        days: schedule.days.iter().map(|day| log_sheet(day, Vec::new())).collect(),
        stops: schedule.stops,
    };
    serde_json::to_string_pretty(&report).context("Failed to serialize schedule")
}

/// `logbook` subcommand: read a sheet description and return the SVG
pub fn run_logbook(input: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let request: LogbookRequest = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", input.display()))?;
    Ok(render_request(&request)?.svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["hos-planner"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_serve_command_parses() {
        let cli = Cli::parse_from(["hos-planner", "serve"]);
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn test_cli_plan_command_parses() {
        let cli = Cli::parse_from([
            "hos-planner",
            "plan",
            "--drive-hours",
            "25",
            "--start",
            "2026-03-02T08:00:00-06:00",
        ]);
        match cli.command {
            Some(Command::Plan { drive_hours, start, cycle_used }) => {
                assert_eq!(drive_hours, 25.0);
                assert_eq!(start.as_deref(), Some("2026-03-02T08:00:00-06:00"));
                assert_eq!(cycle_used, 0.0);
            }
            _ => panic!("expected plan command"),
        }
    }

    #[test]
    fn test_cli_logbook_requires_input() {
        assert!(Cli::try_parse_from(["hos-planner", "logbook"]).is_err());

        let cli = Cli::parse_from(["hos-planner", "logbook", "--input", "day.json"]);
        assert!(matches!(
            cli.command,
            Some(Command::Logbook { ref input, output: None }) if input == Path::new("day.json")
        ));
    }

    #[test]
    fn test_run_plan_prints_quantized_sheets() {
        let json = run_plan(5.0, Some("2026-03-02T08:00:00+00:00"), 10.0).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["summary"]["cycleUsedHours"], 17.0);
        assert_eq!(value["days"].as_array().unwrap().len(), 1);
        assert_eq!(value["days"][0]["segments"][0]["from"], "00:00");
        assert_eq!(value["days"][0]["segments"][1]["status"], "ON");
        assert_eq!(value["stops"][0]["kind"], "pickup_on_duty");
    }

    #[test]
    fn test_run_plan_rejects_negative_hours() {
        assert!(run_plan(-1.0, None, 0.0).is_err());
    }

    #[test]
    fn test_run_logbook_reads_file() {
        let path = std::env::temp_dir().join(format!("hos-planner-day-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{"date":"2026-03-02","segments":[{"status":"OFF","from":"00:00","to":"24:00"}]}"#,
        )
        .unwrap();

        let svg = run_logbook(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(svg.contains("2026-03-02"));

        assert!(run_logbook(Path::new("/nonexistent/day.json")).is_err());
    }
}
