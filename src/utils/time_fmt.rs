use lobby_macros::LobbyBusinessError;
use serde::Serialize;
use time::format_description::OwnedFormatItem;
use time::{OffsetDateTime, UtcOffset};

#[derive(Debug, thiserror::Error, LobbyBusinessError)]
pub enum TimeFormatError {
    #[error("unsupported date directive: %{0}")]
    UnsupportedDirective(char),
    #[error("date pattern ends with a bare '%'")]
    DanglingPercent,
    #[error(transparent)]
    Description(#[from] time::error::InvalidFormatDescription),
    #[error("invalid display offset: {0} minutes")]
    Offset(i32),
}

pub type TimeFormatResult<T> = Result<T, TimeFormatError>;

/// Calendar-aware breakdown of the gap between two instants, for display only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CalendarDiff {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

/// Order-independent: the earlier instant is always taken as the start. A day borrow
/// adds the length of the earlier instant's month.
pub fn calendar_diff(a: OffsetDateTime, b: OffsetDateTime) -> CalendarDiff {
    let (mut from, mut to) = (a.to_offset(UtcOffset::UTC), b.to_offset(UtcOffset::UTC));
    if from > to {
        std::mem::swap(&mut from, &mut to);
    }
    let mut years = to.year() - from.year();
    let mut months = to.month() as i32 - from.month() as i32;
    let mut days = to.day() as i32 - from.day() as i32;
    let mut hours = to.hour() as i32 - from.hour() as i32;
    let mut minutes = to.minute() as i32 - from.minute() as i32;
    let mut seconds = to.second() as i32 - from.second() as i32;
    if seconds < 0 {
        seconds += 60;
        minutes -= 1;
    }
    if minutes < 0 {
        minutes += 60;
        hours -= 1;
    }
    if hours < 0 {
        hours += 24;
        days -= 1;
    }
    if days < 0 {
        days += time::util::days_in_year_month(from.year(), from.month()) as i32;
        months -= 1;
    }
    if months < 0 {
        months += 12;
        years -= 1;
    }
    CalendarDiff {
        years: years.max(0) as u32,
        months: months.max(0) as u32,
        days: days.max(0) as u32,
        hours: hours.max(0) as u32,
        minutes: minutes.max(0) as u32,
        seconds: seconds.max(0) as u32,
    }
}

/// Translates a strftime-style pattern into a `time` v1 format description.
fn strftime_to_description(pattern: &str) -> TimeFormatResult<String> {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => {
                let directive = chars.next().ok_or(TimeFormatError::DanglingPercent)?;
                let item = match directive {
                    'd' => "[day]",
                    'e' => "[day padding:space]",
                    'm' => "[month]",
                    'b' | 'h' => "[month repr:short]",
                    'B' => "[month repr:long]",
                    'y' => "[year repr:last_two]",
                    'Y' => "[year]",
                    'H' => "[hour]",
                    'I' => "[hour repr:12]",
                    'M' => "[minute]",
                    'S' => "[second]",
                    'p' => "[period]",
                    'a' => "[weekday repr:short]",
                    'A' => "[weekday]",
                    'j' => "[ordinal]",
                    '%' => "%",
                    other => return Err(TimeFormatError::UnsupportedDirective(other)),
                };
                out.push_str(item);
            }
            '[' => out.push_str("[["),
            other => out.push(other),
        }
    }
    Ok(out)
}

fn compile(pattern: &str) -> TimeFormatResult<OwnedFormatItem> {
    let description = strftime_to_description(pattern)?;
    Ok(time::format_description::parse_owned::<1>(&description)?)
}

/// Renders instants as `"<date> <time>"` in the configured display offset.
#[derive(Debug, Clone)]
pub struct DateTimeFormatter {
    date: OwnedFormatItem,
    time: OwnedFormatItem,
    offset: UtcOffset,
}

impl DateTimeFormatter {
    pub fn new(date_pattern: &str, use_24h: bool, offset_minutes: i32) -> TimeFormatResult<Self> {
        let time_pattern = if use_24h { "%H:%M" } else { "%I:%M %p" };
        let offset = UtcOffset::from_whole_seconds(offset_minutes.saturating_mul(60))
            .map_err(|_| TimeFormatError::Offset(offset_minutes))?;
        Ok(Self {
            date: compile(date_pattern)?,
            time: compile(time_pattern)?,
            offset,
        })
    }

    pub fn format(&self, t: OffsetDateTime) -> String {
        let local = t.to_offset(self.offset);
        match (local.format(&self.date), local.format(&self.time)) {
            (Ok(d), Ok(t)) => format!("{d} {t}"),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Failed to format instant, falling back to RFC 3339: {}", e);
                local
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_else(|_| local.to_string())
            }
        }
    }
}
