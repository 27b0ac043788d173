//! Driver log sheets: display quantization and SVG rendering.

use std::fmt;

use tracing::debug;

use crate::error::{PlanError, PlanResult};
use crate::services::clock::{format_clock, parse_clock, quantize_minutes};
use crate::services::segments::normalize;
use crate::types::{
    DutyDay, DutyStatus, LogSheet, LogbookRequest, LogbookResponse, Segment, SheetSegment,
    StatusTotals, TimeLabel, DAY_MINUTES,
};

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 320.0;
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_TOP: f64 = 30.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_BOTTOM: f64 = 90.0;

/// Label text wrapping under the grid.
pub const LABEL_MAX_CHARS: usize = 24;
pub const LABEL_MAX_LINES: usize = 2;

/// Snap every boundary to the display grid, then re-normalize.
///
/// Pieces that collapse to zero length disappear and their neighbours merge.
pub fn quantize_segments(segments: &[Segment]) -> Vec<Segment> {
    let snapped: Vec<Segment> = segments
        .iter()
        .map(|s| Segment::new(s.status, quantize_minutes(s.from), quantize_minutes(s.to)))
        .collect();
    normalize(&snapped)
}

/// Display-ready sheet for one duty day. Totals follow the quantized segments.
pub fn log_sheet(day: &DutyDay, labels: Vec<TimeLabel>) -> LogSheet {
    let segments = quantize_segments(&day.segments);
    let totals = StatusTotals::from_segments(&segments);

    LogSheet {
        date: day.date,
        segments: segments.iter().map(sheet_segment).collect(),
        totals,
        labels,
    }
}

fn sheet_segment(segment: &Segment) -> SheetSegment {
    SheetSegment {
        status: segment.status,
        from: format_clock(segment.from),
        to: format_clock(segment.to),
    }
}

/// Render one day's log sheet as a standalone SVG document.
///
/// Segments are normalized first, so any list of segments renders as a
/// full-day line. Labels whose time cannot be parsed are skipped.
pub fn render_svg(date: &str, segments: &[Segment], labels: &[TimeLabel]) -> String {
    SheetSvg::new(date, segments, labels).to_string()
}

/// One log sheet laid out on the SVG grid.
struct SheetSvg<'a> {
    date: &'a str,
    segments: Vec<Segment>,
    totals: StatusTotals,
    labels: &'a [TimeLabel],
}

impl<'a> SheetSvg<'a> {
    fn new(date: &'a str, segments: &[Segment], labels: &'a [TimeLabel]) -> Self {
        let segments = normalize(segments);
        let totals = StatusTotals::from_segments(&segments);
        Self { date, segments, totals, labels }
    }

    fn inner_width() -> f64 {
        WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn grid_bottom() -> f64 {
        HEIGHT - MARGIN_BOTTOM
    }

    fn x_of(minutes: f64) -> f64 {
        MARGIN_LEFT + Self::inner_width() * (minutes.clamp(0.0, DAY_MINUTES) / DAY_MINUTES)
    }

    fn y_of(status: DutyStatus) -> f64 {
        let lane_height = (HEIGHT - MARGIN_TOP - MARGIN_BOTTOM) / (DutyStatus::ALL.len() - 1) as f64;
        MARGIN_TOP + lane_height * status.lane() as f64
    }

    fn write_grid(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hour in 0..=24u32 {
            let x = MARGIN_LEFT + Self::inner_width() * (f64::from(hour) / 24.0);
            write!(
                f,
                r##"<line x1="{x}" y1="{y1}" x2="{x}" y2="{y2}" stroke="#e5e5e5" stroke-width="1"/>"##,
                x = num(x),
                y1 = num(MARGIN_TOP - 10.0),
                y2 = num(Self::grid_bottom())
            )?;
            if hour < 24 {
                write!(
                    f,
                    r##"<text x="{x}" y="{y}" font-size="10" fill="#555">{hour:02}</text>"##,
                    x = num(x + 2.0),
                    y = num(MARGIN_TOP - 15.0)
                )?;
            }
        }

        for status in DutyStatus::ALL {
            let y = Self::y_of(status);
            write!(
                f,
                r##"<line x1="{x1}" y1="{y}" x2="{x2}" y2="{y}" stroke="#bbb" stroke-width="1.5"/>"##,
                x1 = num(MARGIN_LEFT),
                x2 = num(WIDTH - MARGIN_RIGHT),
                y = num(y)
            )?;
            write!(
                f,
                r##"<text x="10" y="{y}" font-size="12" fill="#333">{label}</text>"##,
                y = num(y + 4.0),
                label = status.as_str()
            )?;
        }
        Ok(())
    }

    /// Duty line with vertical connectors at status changes
    fn write_duty_line(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut previous: Option<(f64, f64)> = None;
        for segment in &self.segments {
            let x1 = Self::x_of(segment.from);
            let x2 = Self::x_of(segment.to);
            let y = Self::y_of(segment.status);

            if let Some((last_x, last_y)) = previous {
                if (x1 - last_x).abs() < 1e-6 && (y - last_y).abs() > 1e-6 {
                    write!(
                        f,
                        r#"<line x1="{x}" y1="{y1}" x2="{x}" y2="{y2}" stroke="black" stroke-width="3"/>"#,
                        x = num(x1),
                        y1 = num(last_y),
                        y2 = num(y)
                    )?;
                }
            }
            write!(
                f,
                r#"<line x1="{x1}" y1="{y}" x2="{x2}" y2="{y}" stroke="black" stroke-width="3"/>"#,
                x1 = num(x1),
                x2 = num(x2),
                y = num(y)
            )?;
            previous = Some((x2, y));
        }
        Ok(())
    }

    fn write_labels(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grid_bottom = Self::grid_bottom();
        for label in self.labels {
            let minutes = match parse_clock(&label.time) {
                Ok(m) => m,
                Err(e) => {
                    debug!("Skipping log sheet label '{}': {}", label.text, e);
                    continue;
                }
            };
            let x = Self::x_of(minutes);

            write!(
                f,
                r##"<line x1="{x}" y1="{y1}" x2="{x}" y2="{y2}" stroke="#9aa0a6" stroke-width="1" stroke-dasharray="2,2"/>"##,
                x = num(x),
                y1 = num(grid_bottom - 50.0),
                y2 = num(grid_bottom)
            )?;

            for (i, line) in wrap_text(&label.text, LABEL_MAX_CHARS, LABEL_MAX_LINES).iter().enumerate() {
                write!(
                    f,
                    r##"<text x="{x}" y="{y}" text-anchor="middle" font-size="11" fill="#374151">{text}</text>"##,
                    x = num(x),
                    y = num(grid_bottom + 14.0 + 12.0 * i as f64),
                    text = escape(line)
                )?;
            }
        }
        Ok(())
    }

    fn write_footer(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r##"<text x="{x}" y="{y}" font-size="12" fill="#333">Date: {date}</text>"##,
            x = num(MARGIN_LEFT),
            y = num(HEIGHT - 12.0),
            date = escape(self.date)
        )?;

        let totals = DutyStatus::ALL
            .iter()
            .map(|status| format!("{} {:.2}", status.as_str(), self.totals.get(*status)))
            .collect::<Vec<_>>()
            .join("  ");
        write!(
            f,
            r##"<text x="{x}" y="{y}" text-anchor="end" font-size="12" fill="#333">{totals}</text>"##,
            x = num(WIDTH - MARGIN_RIGHT),
            y = num(HEIGHT - 12.0)
        )
    }
}

impl fmt::Display for SheetSvg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}">"#,
            w = num(WIDTH),
            h = num(HEIGHT)
        )?;
        write!(
            f,
            r##"<rect x="0" y="0" width="{w}" height="{h}" fill="white" stroke="#ddd"/>"##,
            w = num(WIDTH),
            h = num(HEIGHT)
        )?;
        self.write_grid(f)?;
        self.write_duty_line(f)?;
        self.write_labels(f)?;
        self.write_footer(f)?;
        f.write_str("</svg>")
    }
}

/// Render a client-supplied sheet. Date and segments are both required.
pub fn render_request(request: &LogbookRequest) -> PlanResult<LogbookResponse> {
    let (date, segments) = match (request.date.as_deref(), request.segments.as_deref()) {
        (Some(date), Some(segments)) if !date.trim().is_empty() => (date.trim(), segments),
        _ => return Err(PlanError::invalid("Provide JSON with 'date' and 'segments'.")),
    };
    let labels = request.labels.as_deref().unwrap_or_default();

    Ok(LogbookResponse {
        svg: render_svg(date, segments, labels),
    })
}

/// Greedy word wrap into at most `max_lines` lines of `max_chars`.
///
/// When words are left over, the last line ends in an ellipsis. A single
/// word longer than a line is cut to fit.
pub fn wrap_text(text: &str, max_chars: usize, max_lines: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();

    if max_lines == 0 || max_chars == 0 {
        return lines;
    }

    for word in &words {
        let width = line.chars().count();
        if line.is_empty() {
            line = word.chars().take(max_chars).collect();
        } else if width + 1 + word.chars().count() <= max_chars {
            line.push(' ');
            line.push_str(word);
        } else {
            lines.push(std::mem::replace(&mut line, word.chars().take(max_chars).collect()));
        }
        if lines.len() >= max_lines {
            break;
        }
    }
    if !line.is_empty() && lines.len() < max_lines {
        lines.push(line);
    }

    if lines.join(" ") != words.join(" ") {
        if let Some(last) = lines.last_mut() {
            let mut kept: Vec<char> = last.chars().collect();
            kept.truncate(kept.len().saturating_sub(1));
            *last = kept.into_iter().chain(std::iter::once('…')).collect();
        }
    }

    lines
}

/// Escape text content for XML.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Compact coordinate formatting: at most two decimals, no trailing zeros.
fn num(value: f64) -> String {
    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
