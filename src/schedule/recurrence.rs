use super::{day_at, local_from_ms, local_to_ms, next_weekday, HOUR_MS};
use chrono::{Datelike, Duration, Months};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A recurring wake-up rule. Daily covers the morning (09:00), evening
/// (18:00) and captured-clock-time flavors with one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepeatRule {
    Hourly,
    Daily { hour: u32, minute: u32 },
    /// 0 = Monday.
    Weekly { weekday: u32 },
    Monthly { day: u32, hour: u32, minute: u32 },
    /// Fires once per host-process lifetime, not clock-driven.
    Startup,
}

impl RepeatRule {
    /// Fixed host-level repetition period, when one exists. Monthly spans
    /// vary in length and startup firings are not clock-driven, so those
    /// kinds have none and are re-armed as fresh one-shots instead.
    pub fn period_minutes(&self) -> Option<u32> {
        match self {
            RepeatRule::Hourly => Some(60),
            RepeatRule::Daily { .. } => Some(24 * 60),
            RepeatRule::Weekly { .. } => Some(7 * 24 * 60),
            RepeatRule::Monthly { .. } | RepeatRule::Startup => None,
        }
    }
}

/// Next occurrence of `rule` strictly after `reference_ms`, in local wall
/// clock. Occurrences landing exactly on the reference are pushed one full
/// cycle forward. `Startup` is the one exception: it is not clock-driven and
/// resolves to the reference itself.
pub fn next_occurrence(rule: &RepeatRule, reference_ms: i64) -> i64 {
    let reference = local_from_ms(reference_ms);
    match *rule {
        RepeatRule::Hourly => reference_ms + HOUR_MS,
        RepeatRule::Daily { hour, minute } => {
            let today = day_at(reference.date(), hour, minute);
            let candidate = if today > reference {
                today
            } else {
                today + Duration::days(1)
            };
            local_to_ms(candidate)
        }
        RepeatRule::Weekly { weekday } => local_to_ms(next_weekday(reference, weekday)),
        RepeatRule::Monthly { day, hour, minute } => {
            let date = reference.date();
            let this_month = date.with_day(day).map(|d| day_at(d, hour, minute));
            let candidate = match this_month {
                Some(c) if c > reference => c,
                _ => {
                    let next = date.checked_add_months(Months::new(1)).unwrap_or(date);
                    day_at(next.with_day(day).unwrap_or(next), hour, minute)
                }
            };
            local_to_ms(candidate)
        }
        RepeatRule::Startup => reference_ms,
    }
}

impl fmt::Display for RepeatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepeatRule::Hourly => write!(f, "every hour"),
            RepeatRule::Daily { hour, minute } => {
                write!(f, "every day at {hour:02}:{minute:02}")
            }
            RepeatRule::Weekly { weekday } => write!(f, "every {}", weekday_name(*weekday)),
            RepeatRule::Monthly { day, .. } => write!(f, "monthly on day {day}"),
            RepeatRule::Startup => write!(f, "every startup"),
        }
    }
}

fn weekday_name(weekday: u32) -> &'static str {
    match weekday % 7 {
        0 => "Monday",
        1 => "Tuesday",
        2 => "Wednesday",
        3 => "Thursday",
        4 => "Friday",
        5 => "Saturday",
        _ => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        local_to_ms(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap(),
        )
    }

    #[test]
    fn hourly_is_sixty_minutes_later() {
        let reference = at(2024, 1, 1, 10, 0);
        assert_eq!(
            next_occurrence(&RepeatRule::Hourly, reference),
            at(2024, 1, 1, 11, 0)
        );
    }

    #[test]
    fn daily_stays_today_when_still_ahead() {
        let rule = RepeatRule::Daily { hour: 18, minute: 0 };
        assert_eq!(
            next_occurrence(&rule, at(2024, 1, 1, 10, 0)),
            at(2024, 1, 1, 18, 0)
        );
    }

    #[test]
    fn daily_rolls_to_tomorrow_when_passed() {
        let rule = RepeatRule::Daily { hour: 9, minute: 0 };
        assert_eq!(
            next_occurrence(&rule, at(2024, 1, 1, 9, 30)),
            at(2024, 1, 2, 9, 0)
        );
    }

    #[test]
    fn daily_exactly_on_the_mark_pushes_a_day() {
        let rule = RepeatRule::Daily { hour: 9, minute: 0 };
        assert_eq!(
            next_occurrence(&rule, at(2024, 1, 1, 9, 0)),
            at(2024, 1, 2, 9, 0)
        );
    }

    #[test]
    fn weekly_on_the_same_weekday_is_a_week_out() {
        // 2024-01-01 is a Monday at 00:00; today is excluded even though
        // 09:00 has not been reached yet.
        let rule = RepeatRule::Weekly { weekday: 0 };
        assert_eq!(
            next_occurrence(&rule, at(2024, 1, 1, 0, 0)),
            at(2024, 1, 8, 9, 0)
        );
    }

    #[test]
    fn weekly_advances_to_the_target_weekday() {
        // From a Tuesday to the coming Sunday.
        let rule = RepeatRule::Weekly { weekday: 6 };
        assert_eq!(
            next_occurrence(&rule, at(2024, 1, 2, 12, 0)),
            at(2024, 1, 7, 9, 0)
        );
    }

    #[test]
    fn monthly_stays_this_month_before_the_day() {
        let rule = RepeatRule::Monthly { day: 12, hour: 9, minute: 0 };
        assert_eq!(
            next_occurrence(&rule, at(2024, 1, 5, 10, 0)),
            at(2024, 1, 12, 9, 0)
        );
    }

    #[test]
    fn monthly_rolls_once_the_day_has_passed() {
        let rule = RepeatRule::Monthly { day: 12, hour: 9, minute: 0 };
        assert_eq!(
            next_occurrence(&rule, at(2024, 1, 13, 0, 0)),
            at(2024, 2, 12, 9, 0)
        );
        // Exactly on the occurrence counts as passed.
        assert_eq!(
            next_occurrence(&rule, at(2024, 1, 12, 9, 0)),
            at(2024, 2, 12, 9, 0)
        );
    }

    #[test]
    fn monthly_from_late_january_lands_in_february() {
        let rule = RepeatRule::Monthly { day: 12, hour: 9, minute: 0 };
        assert_eq!(
            next_occurrence(&rule, at(2024, 1, 31, 23, 0)),
            at(2024, 2, 12, 9, 0)
        );
    }

    #[test]
    fn startup_resolves_to_the_reference() {
        let reference = at(2024, 1, 1, 10, 0);
        assert_eq!(next_occurrence(&RepeatRule::Startup, reference), reference);
    }

    #[test]
    fn clock_rules_are_strictly_in_the_future() {
        let reference = at(2024, 1, 12, 9, 0);
        let rules = [
            RepeatRule::Hourly,
            RepeatRule::Daily { hour: 9, minute: 0 },
            RepeatRule::Weekly { weekday: 4 },
            RepeatRule::Monthly { day: 12, hour: 9, minute: 0 },
        ];
        for rule in rules {
            assert!(
                next_occurrence(&rule, reference) > reference,
                "{rule:?} did not advance"
            );
        }
    }

    #[test]
    fn period_minutes_exist_only_for_uniform_rules() {
        assert_eq!(RepeatRule::Hourly.period_minutes(), Some(60));
        assert_eq!(
            RepeatRule::Daily { hour: 9, minute: 0 }.period_minutes(),
            Some(1440)
        );
        assert_eq!(RepeatRule::Weekly { weekday: 0 }.period_minutes(), Some(10080));
        assert_eq!(
            RepeatRule::Monthly { day: 12, hour: 9, minute: 0 }.period_minutes(),
            None
        );
        assert_eq!(RepeatRule::Startup.period_minutes(), None);
    }

    #[test]
    fn rules_survive_a_serde_round_trip() {
        let rule = RepeatRule::Weekly { weekday: 5 };
        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(serde_json::from_str::<RepeatRule>(&json).unwrap(), rule);
        let rule = RepeatRule::Daily { hour: 14, minute: 37 };
        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(serde_json::from_str::<RepeatRule>(&json).unwrap(), rule);
    }
}
