//! 12-hour / 24-hour wall-time conversion for the API boundary.
//!
//! The engine works on `NaiveTime` only; clients and price tables speak
//! `"2:00 PM"` or `"14:00"`. Both directions are total over whole minutes.

use chrono::{NaiveTime, Timelike};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised time `{0}` (expected HH:MM or h:MM AM/PM)")]
pub struct TimeParseError(pub String);

/// `14:05` → `"2:05 PM"`, `00:00` → `"12:00 AM"`.
pub fn to_12h(time: NaiveTime) -> String {
    let (pm, hour) = time.hour12();
    format!("{hour}:{:02} {}", time.minute(), if pm { "PM" } else { "AM" })
}

/// `14:05` → `"14:05"`.
pub fn to_24h(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Parse either form. Seconds are not accepted.
pub fn parse_time(input: &str) -> Result<NaiveTime, TimeParseError> {
    let s = input.trim();
    let upper = s.to_ascii_uppercase();
    let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim_end(), Some(false))
    } else if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim_end(), Some(true))
    } else {
        (upper.as_str(), None)
    };

    let err = || TimeParseError(input.to_string());
    let (h, m) = clock.split_once(':').ok_or_else(err)?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return Err(err());
    }
    let hour: u32 = h.parse().map_err(|_| err())?;
    let minute: u32 = m.parse().map_err(|_| err())?;

    let hour = match meridiem {
        None if hour < 24 => hour,
        Some(pm) if (1..=12).contains(&hour) => match (pm, hour) {
            (false, 12) => 0,
            (false, h) => h,
            (true, 12) => 12,
            (true, h) => h + 12,
        },
        _ => return Err(err()),
    };
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(err)
}

/// `"2:00 PM - 3:00 PM"`, the label used to key price entries.
pub fn slot_label(start: NaiveTime, end: NaiveTime) -> String {
    format!("{} - {}", to_12h(start), to_12h(end))
}
