// Time and name formatting for the chat header and message bubbles.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use crate::models::{UserStatus, STATUS_ONLINE};

const MAX_HEADER_NAME: usize = 25;

/// Bubble time: `14:05`, or `Mon  14:05` when not from today.
pub fn message_time<Tz: TimeZone>(timestamp_ms: i64, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let Some(time) = now.timezone().timestamp_millis_opt(timestamp_ms).single() else {
        return String::new();
    };

    let clock = time.format("%H:%M").to_string();
    if time.date_naive() != now.date_naive() {
        format!("{}  {}", time.format("%a"), clock)
    } else {
        clock
    }
}

/// Calendar-style rendering relative to `now`:
/// `Today at 3:04 PM`, `Yesterday at …`, `Last Monday at …`, `06/01/2024`.
pub fn calendar<Tz: TimeZone>(time: &DateTime<Tz>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let at = time.format("%-I:%M %p");
    let days = (time.date_naive() - now.date_naive()).num_days();
    match days {
        0 => format!("Today at {}", at),
        -1 => format!("Yesterday at {}", at),
        1 => format!("Tomorrow at {}", at),
        -6..=-2 => format!("Last {} at {}", time.format("%A"), at),
        2..=6 => format!("{} at {}", time.format("%A"), at),
        _ => time.format("%m/%d/%Y").to_string(),
    }
}

/// Header presence line.
pub fn status_label<Tz: TimeZone>(status: &UserStatus, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    match status {
        UserStatus::Online => STATUS_ONLINE.to_string(),
        UserStatus::LastSeen(ms) => match now.timezone().timestamp_millis_opt(*ms).single() {
            Some(time) => calendar(&time, now),
            None => "Invalid date".to_string(),
        },
        UserStatus::Other(_) => "Invalid date".to_string(),
    }
}

/// Names longer than 25 characters are cut and suffixed with `...`.
pub fn header_name(name: &str) -> String {
    if name.chars().count() > MAX_HEADER_NAME {
        let cut: String = name.chars().take(MAX_HEADER_NAME).collect();
        format!("{}...", cut)
    } else {
        name.to_string()
    }
}
