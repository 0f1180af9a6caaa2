//! Formatting helpers for log lines and user-facing messages.

use chrono::{DateTime, Utc};

/// First six characters of a commit SHA.
pub fn sha_human(sha: &str) -> &str {
    match sha.char_indices().nth(6) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

/// Human-readable span between two instants, order-insensitive.
///
/// Spans of an hour or more report hours and minutes; shorter spans report
/// minutes and seconds.
pub fn took_human(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let (start, end) = if start > end { (end, start) } else { (start, end) };
    let delta = (end - start).num_seconds();
    let hours = delta / 3600;
    let minutes = (delta - hours * 3600) / 60;
    let seconds = delta - hours * 3600 - minutes * 60;

    if hours > 0 {
        let mut msg = if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{} hours", hours)
        };
        if minutes == 1 {
            msg.push_str(" and 1 minute");
        } else {
            msg.push_str(&format!(" and {} minutes", minutes));
        }
        return msg;
    }

    if minutes > 0 {
        let mut msg = if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{} minutes", minutes)
        };
        match seconds {
            0 => {}
            1 => msg.push_str(" and 1 second"),
            s => msg.push_str(&format!(" and {} seconds", s)),
        }
        return msg;
    }

    match seconds {
        0 => "0 minutes".to_string(),
        1 => "1 second".to_string(),
        s => format!("{} seconds", s),
    }
}
