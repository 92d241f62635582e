use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc};
use cron::Schedule;

use dagsched_core::{traits::Trigger, SchedulerError, SchedulerResult};

/// 截断到整秒
pub fn truncate_to_second(time: DateTime<Utc>) -> DateTime<Utc> {
    time - Duration::nanoseconds(i64::from(time.nanosecond()))
}

/// 基于CRON表达式的触发器 (带秒字段, 6或7段)
pub struct CronTrigger {
    expression: String,
    schedule: Schedule,
}

impl CronTrigger {
    pub fn new(cron_expr: &str) -> SchedulerResult<Self> {
        let schedule = Schedule::from_str(cron_expr).map_err(|e| SchedulerError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            expression: cron_expr.to_string(),
            schedule,
        })
    }
}

impl Trigger for CronTrigger {
    fn next_run_time(&self, after: DateTime<Utc>, inclusive: bool) -> Option<DateTime<Utc>> {
        // cron 只返回严格晚于起点的时间
        let start = if inclusive && after.nanosecond() == 0 {
            after - Duration::seconds(1)
        } else {
            after
        };
        self.schedule.after(&start).next()
    }

    fn expression(&self) -> &str {
        &self.expression
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_invalid_expression() {
        let result = CronTrigger::new("not a cron");
        assert!(matches!(result, Err(SchedulerError::InvalidCron { .. })));
    }

    #[test]
    fn test_inclusive_matches_boundary() {
        let trigger = CronTrigger::new("0 */5 * * * *").unwrap();
        assert_eq!(trigger.next_run_time(at(10, 5, 0), true), Some(at(10, 5, 0)));
        assert_eq!(trigger.next_run_time(at(10, 5, 0), false), Some(at(10, 10, 0)));
        assert_eq!(trigger.next_run_time(at(10, 6, 30), true), Some(at(10, 10, 0)));
    }

    #[test]
    fn test_inclusive_with_sub_second_offset() {
        let trigger = CronTrigger::new("* * * * * *").unwrap();
        let after = at(10, 0, 0) + Duration::milliseconds(500);
        assert_eq!(trigger.next_run_time(after, true), Some(at(10, 0, 1)));
    }

    #[test]
    fn test_exhausted_schedule() {
        let trigger = CronTrigger::new("0 0 0 1 1 * 2020").unwrap();
        assert_eq!(trigger.next_run_time(at(0, 0, 0), true), None);
        assert_eq!(trigger.expression(), "0 0 0 1 1 * 2020");
    }

    #[test]
    fn test_every_minute() {
        let trigger = CronTrigger::new("0 * * * * *").unwrap();
        assert_eq!(trigger.next_run_time(at(10, 0, 30), true), Some(at(10, 1, 0)));
        assert_eq!(trigger.next_run_time(at(10, 1, 0), false), Some(at(10, 2, 0)));
    }

    #[test]
    fn test_truncate_to_second() {
        let time = at(8, 0, 0) + Duration::milliseconds(750);
        assert_eq!(truncate_to_second(time), at(8, 0, 0));
    }
}
