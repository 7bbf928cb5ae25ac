pub mod recurrence;

pub use recurrence::{next_occurrence, RepeatRule};

use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

pub(crate) const HOUR_MS: i64 = 60 * 60 * 1000;
pub(crate) const MORNING_HOUR: u32 = 9;
pub(crate) const EVENING_HOUR: u32 = 18;
pub(crate) const MONTHLY_DAY: u32 = 12;

// Weekday indices, 0 = Monday.
pub(crate) const MONDAY: u32 = 0;
pub(crate) const SATURDAY: u32 = 5;
pub(crate) const SUNDAY: u32 = 6;

/// The popup's button values, as they appear on the wire. Values we do not
/// recognize deserialize to `Unrecognized` rather than failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnoozeChoice {
    OnNextStartup,
    InOneHour,
    ThisMorning,
    ThisEvening,
    TomorrowMorning,
    TomorrowEvening,
    Saturday,
    NextMonday,
    NextWeek,
    NextMonth,
    EveryStartup,
    EveryHour,
    EveryMorning,
    EverydayNow,
    EveryEvening,
    EveryMonday,
    EverySaturday,
    EverySunday,
    EveryMonth,
    CustomInterval,
    Unrecognized,
}

impl SnoozeChoice {
    pub fn from_wire(raw: &str) -> Self {
        use SnoozeChoice::*;
        match raw {
            "on_next_startup" => OnNextStartup,
            "in_one_hour" => InOneHour,
            "this_morning" => ThisMorning,
            "this_evening" => ThisEvening,
            "tomorrow_morning" => TomorrowMorning,
            "tomorrow_evening" => TomorrowEvening,
            "saturday" => Saturday,
            "next_monday" => NextMonday,
            "next_week" => NextWeek,
            "next_month" => NextMonth,
            "every_startup" => EveryStartup,
            "every_hour" => EveryHour,
            "every_morning" => EveryMorning,
            "everyday_now" => EverydayNow,
            "every_evening" => EveryEvening,
            "every_monday" => EveryMonday,
            "every_saturday" => EverySaturday,
            "every_sunday" => EverySunday,
            "every_month" => EveryMonth,
            "custom_interval" => CustomInterval,
            _ => Unrecognized,
        }
    }
}

impl<'de> Deserialize<'de> for SnoozeChoice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(SnoozeChoice::from_wire(&raw))
    }
}

/// What a snooze choice resolves to: a concrete fire time, a fire on the next
/// host startup, or a recurring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    At(i64),
    AtStartup,
    Repeat(RepeatRule),
}

/// Maps a (choice, repeat flag, request time) triple to a schedule.
///
/// Never fails: custom intervals, unrecognized wire values and malformed
/// choice/flag combinations all fall back to a one-shot an hour out.
pub fn compute_schedule(choice: SnoozeChoice, repeat: bool, now_ms: i64) -> Schedule {
    let now = local_from_ms(now_ms);
    use SnoozeChoice::*;
    match (choice, repeat) {
        (OnNextStartup, false) => Schedule::AtStartup,
        (InOneHour, false) => Schedule::At(now_ms + HOUR_MS),
        (ThisMorning, false) => Schedule::At(local_to_ms(upcoming_time(now, MORNING_HOUR, 0))),
        (ThisEvening, false) => Schedule::At(local_to_ms(upcoming_time(now, EVENING_HOUR, 0))),
        (TomorrowMorning, false) => {
            Schedule::At(local_to_ms(day_at(now.date() + Duration::days(1), MORNING_HOUR, 0)))
        }
        (TomorrowEvening, false) => {
            Schedule::At(local_to_ms(day_at(now.date() + Duration::days(1), EVENING_HOUR, 0)))
        }
        (Saturday, false) => Schedule::At(local_to_ms(next_weekday(now, SATURDAY))),
        (NextMonday, false) => Schedule::At(local_to_ms(next_weekday(now, MONDAY))),
        (NextWeek, false) => {
            Schedule::At(local_to_ms(day_at(now.date() + Duration::days(7), MORNING_HOUR, 0)))
        }
        (NextMonth, false) => Schedule::At(local_to_ms(next_month_day(now, MONTHLY_DAY))),
        (EveryStartup, true) => Schedule::Repeat(RepeatRule::Startup),
        (EveryHour, true) => Schedule::Repeat(RepeatRule::Hourly),
        (EveryMorning, true) => Schedule::Repeat(RepeatRule::Daily { hour: MORNING_HOUR, minute: 0 }),
        // Captures the clock time of the request as the daily fire time.
        (EverydayNow, true) => {
            Schedule::Repeat(RepeatRule::Daily { hour: now.hour(), minute: now.minute() })
        }
        (EveryEvening, true) => Schedule::Repeat(RepeatRule::Daily { hour: EVENING_HOUR, minute: 0 }),
        (EveryMonday, true) => Schedule::Repeat(RepeatRule::Weekly { weekday: MONDAY }),
        (EverySaturday, true) => Schedule::Repeat(RepeatRule::Weekly { weekday: SATURDAY }),
        (EverySunday, true) => Schedule::Repeat(RepeatRule::Weekly { weekday: SUNDAY }),
        (EveryMonth, true) => {
            Schedule::Repeat(RepeatRule::Monthly { day: MONTHLY_DAY, hour: MORNING_HOUR, minute: 0 })
        }
        _ => Schedule::At(now_ms + HOUR_MS),
    }
}

pub(crate) fn local_from_ms(ms: i64) -> NaiveDateTime {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.naive_local())
        .unwrap_or_default()
}

pub(crate) fn local_to_ms(naive: NaiveDateTime) -> i64 {
    let mut candidate = naive;
    loop {
        if let Some(dt) = candidate.and_local_timezone(Local).earliest() {
            return dt.timestamp_millis();
        }
        // Nonexistent local time (DST gap): probe forward.
        candidate = candidate + Duration::minutes(30);
    }
}

pub(crate) fn day_at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, 0)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN))
}

fn upcoming_time(now: NaiveDateTime, hour: u32, minute: u32) -> NaiveDateTime {
    let today = day_at(now.date(), hour, minute);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

// "Next <weekday>" always lands strictly after today, even when today is that
// weekday and 09:00 has not yet been reached. The one-shot choices and the
// weekly repeat rule share this semantics.
pub(crate) fn next_weekday(now: NaiveDateTime, weekday: u32) -> NaiveDateTime {
    let current = now.weekday().num_days_from_monday();
    let mut ahead = (weekday + 7 - current) % 7;
    if ahead == 0 {
        ahead = 7;
    }
    day_at(now.date() + Duration::days(i64::from(ahead)), MORNING_HOUR, 0)
}

fn next_month_day(now: NaiveDateTime, day: u32) -> NaiveDateTime {
    let base = now
        .date()
        .checked_add_months(Months::new(1))
        .unwrap_or_else(|| now.date());
    day_at(base.with_day(day).unwrap_or(base), MORNING_HOUR, 0)
}
