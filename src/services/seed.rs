//! Sample posture history for trying out the dashboard.

use crate::classifier::label_for;
use crate::models::PostureEvent;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use rand::Rng;

/// Working hours used for generated events, inclusive.
const FIRST_HOUR: u32 = 8;
const LAST_HOUR: u32 = 18;

/// Generates a month of plausible posture events ending at `now`.
///
/// - today: one event at :00, :20 and :40 of every working hour already past
/// - the previous 7 days: 5-10 events per day
/// - days 8 to 30 back: 3-7 events per day
///
/// Angles are uniform in `[70, 120)` and labelled like live classifications.
/// Events are returned in ascending time order.
pub fn sample_events<R: Rng>(
    now: DateTime<Utc>,
    offset: FixedOffset,
    rng: &mut R,
) -> Vec<PostureEvent> {
    let local_today = now.with_timezone(&offset).date_naive();
    let at = |days_ago: i64, hour: u32, minute: u32| {
        let date = local_today - Duration::days(days_ago);
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
        (date.and_time(time) - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
    };

    let mut events = Vec::new();
    for hour in FIRST_HOUR..LAST_HOUR {
        for minute in [0, 20, 40] {
            let ts = at(0, hour, minute);
            if ts <= now {
                events.push(event(ts, rng, 30..=180));
            }
        }
    }
    for days_ago in 1..=30 {
        let count = if days_ago <= 7 {
            rng.random_range(5..=10)
        } else {
            rng.random_range(3..=7)
        };
        for _ in 0..count {
            let ts = at(
                days_ago,
                rng.random_range(FIRST_HOUR..=LAST_HOUR),
                rng.random_range(0..60),
            );
            events.push(event(ts, rng, 30..=300));
        }
    }

    events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    events
}

fn event<R: Rng>(
    ts: DateTime<Utc>,
    rng: &mut R,
    durations: std::ops::RangeInclusive<u64>,
) -> PostureEvent {
    let angle: f64 = rng.random_range(70.0..120.0);
    PostureEvent::new(ts, label_for(angle), angle, rng.random_range(durations))
}
