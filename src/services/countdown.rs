use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use tokio::sync::watch;

/// Format used for the `local_time` value.
pub const LOCAL_TIME_FORMAT: &str = "%H:%M:%S";

/// Countdown values driving the overlay text.
///
/// Each value is an independent observable: it has its own setter and its
/// own subscribers, and nothing ties an update of one to the others. The
/// state is owned by whoever renders the overlay (one per stream
/// connection), never shared between viewers.
#[derive(Debug)]
pub struct CountdownState {
    end_date: watch::Sender<Option<DateTime<Utc>>>,
    elapsed_time: watch::Sender<i64>,
    local_time: watch::Sender<String>,
}

/// Point-in-time read of all three values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountdownSnapshot {
    pub end_date: Option<DateTime<Utc>>,
    /// Milliseconds remaining until `end_date`, never negative.
    pub elapsed_time: i64,
    pub local_time: String,
}

impl Default for CountdownState {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CountdownState {
    pub fn new(end_date: Option<DateTime<Utc>>) -> Self {
        Self {
            end_date: watch::Sender::new(end_date),
            elapsed_time: watch::Sender::new(0),
            local_time: watch::Sender::new(String::new()),
        }
    }

    pub fn set_end_date(&self, end_date: Option<DateTime<Utc>>) {
        self.end_date.send_replace(end_date);
    }

    pub fn set_elapsed_time(&self, millis: i64) {
        self.elapsed_time.send_replace(millis);
    }

    pub fn set_local_time(&self, formatted: String) {
        self.local_time.send_replace(formatted);
    }

    pub fn subscribe_end_date(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.end_date.subscribe()
    }

    pub fn subscribe_elapsed_time(&self) -> watch::Receiver<i64> {
        self.elapsed_time.subscribe()
    }

    pub fn subscribe_local_time(&self) -> watch::Receiver<String> {
        self.local_time.subscribe()
    }

    /// Recompute the time-derived values from `now`.
    pub fn tick<Tz: TimeZone>(&self, now: &DateTime<Tz>)
    where
        Tz::Offset: std::fmt::Display,
    {
        let remaining = remaining_millis(*self.end_date.borrow(), &now.with_timezone(&Utc));
        self.set_elapsed_time(remaining);
        self.set_local_time(now.format(LOCAL_TIME_FORMAT).to_string());
    }

    pub fn tick_local(&self) {
        self.tick(&Local::now());
    }

    pub fn snapshot(&self) -> CountdownSnapshot {
        CountdownSnapshot {
            end_date: *self.end_date.borrow(),
            elapsed_time: *self.elapsed_time.borrow(),
            local_time: self.local_time.borrow().clone(),
        }
    }
}

fn remaining_millis(end_date: Option<DateTime<Utc>>, now: &DateTime<Utc>) -> i64 {
    match end_date {
        Some(end) => (end - *now).num_milliseconds().max(0),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
    }

    #[test]
    fn tick_counts_down_to_end_date() {
        let state = CountdownState::new(Some(utc(12, 0, 0)));
        state.tick(&utc(11, 59, 30));

        let snap = state.snapshot();
        assert_eq!(snap.elapsed_time, 30_000);
        assert_eq!(snap.local_time, "11:59:30");
    }

    #[test]
    fn tick_clamps_after_end_date() {
        let state = CountdownState::new(Some(utc(12, 0, 0)));
        state.tick(&(utc(12, 0, 0) + Duration::minutes(5)));
        assert_eq!(state.snapshot().elapsed_time, 0);
    }

    #[test]
    fn no_end_date_means_zero() {
        let state = CountdownState::default();
        state.tick(&utc(8, 0, 0));
        assert_eq!(state.snapshot().elapsed_time, 0);
        assert_eq!(state.snapshot().end_date, None);
    }

    #[test]
    fn local_time_uses_the_given_offset() {
        let state = CountdownState::default();
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        state.tick(&utc(1, 2, 3).with_timezone(&tokyo));
        assert_eq!(state.snapshot().local_time, "10:02:03");
    }

    #[test]
    fn values_update_independently() {
        let state = CountdownState::new(None);
        let mut end_rx = state.subscribe_end_date();
        let mut elapsed_rx = state.subscribe_elapsed_time();
        let local_rx = state.subscribe_local_time();

        state.set_elapsed_time(1234);
        assert!(elapsed_rx.has_changed().unwrap());
        assert!(!end_rx.has_changed().unwrap());
        assert_eq!(*elapsed_rx.borrow_and_update(), 1234);

        state.set_end_date(Some(utc(23, 0, 0)));
        assert!(end_rx.has_changed().unwrap());
        assert_eq!(*end_rx.borrow_and_update(), Some(utc(23, 0, 0)));
        // Changing the end date does not recompute elapsed time until the next tick.
        assert_eq!(*elapsed_rx.borrow(), 1234);
        assert_eq!(*local_rx.borrow(), "");
    }
}
