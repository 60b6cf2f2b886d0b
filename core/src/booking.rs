//! Bookings (reservations) of PPMS systems.
//!
//! `getbooking` / `nextbooking` answer with three lines: the username, a
//! number of minutes relative to now, and a session id that may be empty.
//! For the current booking the minutes are the time left; for the next one
//! they are the time until it starts, and its end is unknown.

use std::fmt;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use tracing::{error, trace};

use crate::codec::Record;
use crate::error::{PpmsError, Result};

const UNDEFINED_TIME: &str = "===UNDEFINED===";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingKind {
    /// The booking running right now (`getbooking`).
    Current,
    /// The next upcoming booking (`nextbooking`).
    Next,
}

impl BookingKind {
    pub fn action(self) -> &'static str {
        match self {
            BookingKind::Current => "getbooking",
            BookingKind::Next => "nextbooking",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpmsBooking {
    pub username: String,
    pub system_id: u32,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub session: String,
}

/// Local time, truncated to the minute.
pub fn now_minute() -> NaiveDateTime {
    truncate_to_minute(Local::now().naive_local())
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(t)
}

/// Parse `HH:MM` or `HH:MM:SS`; seconds are ignored.
fn parse_clock(text: &str) -> Result<NaiveTime> {
    let mut parts = text.trim().split(':');
    let mut next = |what: &str| -> Result<u32> {
        parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| PpmsError::invalid("booking", format!("bad {what} in time {text:?}")))
    };
    let hour = next("hour")?;
    let minute = next("minute")?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| PpmsError::invalid("booking", format!("time {text:?} out of range")))
}

impl PpmsBooking {
    /// Build a booking from a `getbooking` / `nextbooking` response.
    pub fn from_booking_response(text: &str, kind: BookingKind, system_id: u32) -> Result<Self> {
        Self::from_booking_response_at(text, kind, system_id, now_minute())
    }

    /// Like `from_booking_response`, relative to the given `now`.
    pub fn from_booking_response_at(
        text: &str,
        kind: BookingKind,
        system_id: u32,
        now: NaiveDateTime,
    ) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let (Some(username), Some(minutes)) = (lines.first(), lines.get(1)) else {
            error!(text, "parsing booking response failed, too few lines");
            return Err(PpmsError::invalid("booking", format!("too few lines in {text:?}")));
        };
        let minutes: i64 = minutes.trim().parse().map_err(|e| {
            error!(text, "parsing booking response failed: {e}");
            PpmsError::invalid("booking", format!("relative time {minutes:?}: {e}"))
        })?;

        let now = truncate_to_minute(now);
        let offset = TimeDelta::try_minutes(minutes)
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(|| {
                PpmsError::invalid("booking", format!("relative time of {minutes} minutes out of range"))
            })?;
        let (start, end) = match kind {
            BookingKind::Current => (now, Some(offset)),
            BookingKind::Next => (offset, None),
        };

        let booking = Self {
            username: username.to_string(),
            system_id,
            start,
            end,
            session: lines.get(2).map(|s| s.to_string()).unwrap_or_default(),
        };
        trace!("{booking}");
        Ok(booking)
    }

    /// Build a booking from one record of a `getrunningsheet` response.
    pub fn from_running_sheet(
        entry: &Record,
        system_id: u32,
        username: &str,
        date: NaiveDate,
    ) -> Result<Self> {
        let time = |key: &str| -> Result<NaiveDateTime> {
            let raw = entry
                .get_str(key)
                .ok_or_else(|| PpmsError::invalid("booking", format!("missing field `{key}`")))?;
            Ok(date.and_time(parse_clock(raw)?))
        };

        Ok(Self {
            username: username.to_string(),
            system_id,
            start: time("Start time")?,
            end: Some(time("End time")?),
            session: String::new(),
        })
    }

    /// Move the start to `HH:MM[:SS]` on `date` (today when `None`).
    pub fn set_start_from_str(&mut self, time: &str, date: Option<NaiveDate>) -> Result<()> {
        let date = date.unwrap_or_else(|| Local::now().date_naive());
        self.start = date.and_time(parse_clock(time)?);
        Ok(())
    }

    /// Move the end to `HH:MM[:SS]` on `date` (today when `None`).
    pub fn set_end_from_str(&mut self, time: &str, date: Option<NaiveDate>) -> Result<()> {
        let date = date.unwrap_or_else(|| Local::now().date_naive());
        self.end = Some(date.and_time(parse_clock(time)?));
        Ok(())
    }

    /// `user@system [start -- end]`
    pub fn desc(&self) -> String {
        format!(
            "{}@{} [{} -- {}]",
            self.username,
            self.system_id,
            fmt_time(Some(self.start)),
            fmt_time(self.end)
        )
    }
}

/// Format a booking time, with a marker for a missing one.
pub fn fmt_time(time: Option<NaiveDateTime>) -> String {
    match time {
        Some(t) => t.format("%Y-%m-%d %H:%M").to_string(),
        None => UNDEFINED_TIME.to_string(),
    }
}

impl fmt::Display for PpmsBooking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PpmsBooking(username=[{}], system_id=[{}], starttime=[{}], endtime=[{}]",
            self.username,
            self.system_id,
            fmt_time(Some(self.start)),
            fmt_time(self.end)
        )?;
        if !self.session.is_empty() {
            write!(f, ", session=[{}]", self.session)?;
        }
        f.write_str(")")
    }
}
