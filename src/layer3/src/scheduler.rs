//! In-process timer service — spec.md §4.3.4. Not durable across process
//! restarts; `next_run` times are recomputed from schedules at startup.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, Timelike, Utc, Weekday};
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::time::{interval, Duration};

pub const TICK_RESOLUTION: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Interval(ChronoDuration),
    DailyAt { hour: u32, minute: u32 },
    WeeklyAt { weekday: Weekday, hour: u32, minute: u32 },
    Event(String),
}

/// Parses the schedule grammar: `interval:Nm|Nh|Nd`, `daily:HH:MM`,
/// `weekly:ddd:HH:MM`, or `event:<name>`.
pub fn parse_schedule(spec: &str) -> Result<Schedule, String> {
    let (kind, rest) = spec.split_once(':').ok_or_else(|| format!("malformed schedule '{spec}'"))?;
    match kind {
        "interval" => {
            let (digits, unit) = rest.split_at(rest.len().saturating_sub(1));
            let n: i64 = digits.parse().map_err(|_| format!("bad interval amount in '{spec}'"))?;
            let duration = match unit {
                "m" => ChronoDuration::minutes(n),
                "h" => ChronoDuration::hours(n),
                "d" => ChronoDuration::days(n),
                other => return Err(format!("unknown interval unit '{other}' in '{spec}'")),
            };
            Ok(Schedule::Interval(duration))
        }
        "daily" => {
            let (hour, minute) = parse_hhmm(rest)?;
            Ok(Schedule::DailyAt { hour, minute })
        }
        "weekly" => {
            let mut parts = rest.splitn(2, ':');
            let day = parts.next().ok_or_else(|| format!("missing weekday in '{spec}'"))?;
            let hhmm = parts.next().ok_or_else(|| format!("missing time in '{spec}'"))?;
            let (hour, minute) = parse_hhmm(hhmm)?;
            let weekday = parse_weekday(day).ok_or_else(|| format!("unknown weekday '{day}' in '{spec}'"))?;
            Ok(Schedule::WeeklyAt { weekday, hour, minute })
        }
        "event" => Ok(Schedule::Event(rest.to_string())),
        other => Err(format!("unknown schedule kind '{other}' in '{spec}'")),
    }
}

fn parse_hhmm(s: &str) -> Result<(u32, u32), String> {
    let (h, m) = s.split_once(':').ok_or_else(|| format!("malformed time '{s}'"))?;
    let hour: u32 = h.parse().map_err(|_| format!("bad hour in '{s}'"))?;
    let minute: u32 = m.parse().map_err(|_| format!("bad minute in '{s}'"))?;
    Ok((hour, minute))
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.to_lowercase().as_str() {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Computes the next run time strictly after `from`.
pub fn next_run_after(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Interval(duration) => Some(from + *duration),
        Schedule::DailyAt { hour, minute } => {
            let target_today = from.date_naive().and_time(NaiveTime::from_hms_opt(*hour, *minute, 0)?);
            let target_today = target_today.and_utc();
            if target_today > from {
                Some(target_today)
            } else {
                Some(target_today + ChronoDuration::days(1))
            }
        }
        Schedule::WeeklyAt { weekday, hour, minute } => {
            let mut candidate = from.date_naive();
            loop {
                candidate += ChronoDuration::days(1);
                if candidate.weekday() == *weekday {
                    break;
                }
            }
            let target = candidate.and_time(NaiveTime::from_hms_opt(*hour, *minute, 0)?).and_utc();
            Some(target)
        }
        Schedule::Event(_) => None,
    }
}

#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: String,
    pub schedule: Schedule,
    pub workflow_id: String,
    pub enabled: bool,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
}

impl ScheduledTask {
    pub fn new(id: impl Into<String>, schedule: Schedule, workflow_id: impl Into<String>) -> Self {
        let next_run = next_run_after(&schedule, Utc::now());
        Self {
            id: id.into(),
            schedule,
            workflow_id: workflow_id.into(),
            enabled: true,
            next_run,
            run_count: 0,
        }
    }
}

#[async_trait::async_trait]
pub trait WorkflowInvoker: Send + Sync {
    async fn invoke(&self, workflow_id: &str);
}

/// Holds scheduled tasks and ticks them every [`TICK_RESOLUTION`]. Recomputes
/// `next_run` from each task's schedule at construction — schedules survive
/// a restart, in-flight timing state does not.
pub struct Scheduler {
    tasks: RwLock<HashMap<String, ScheduledTask>>,
    shutdown: Arc<Notify>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn add_task(&self, task: ScheduledTask) {
        self.tasks.write().insert(task.id.clone(), task);
    }

    pub fn remove_task(&self, id: &str) {
        self.tasks.write().remove(id);
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) {
        if let Some(task) = self.tasks.write().get_mut(id) {
            task.enabled = enabled;
        }
    }

    pub fn tasks(&self) -> Vec<ScheduledTask> {
        self.tasks.read().values().cloned().collect()
    }

    pub fn stop(&self) {
        self.shutdown.notify_waiters();
    }

    /// Runs the tick loop until `stop` is called. On each tick, every
    /// enabled task whose `next_run <= now` is invoked and its `next_run`
    /// recomputed.
    pub async fn run(&self, invoker: Arc<dyn WorkflowInvoker>) {
        let mut ticker = interval(TICK_RESOLUTION);
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                _ = ticker.tick() => self.tick(&invoker).await,
            }
        }
    }

    async fn tick(&self, invoker: &Arc<dyn WorkflowInvoker>) {
        let now = Utc::now();
        let due: Vec<(String, String)> = {
            let tasks = self.tasks.read();
            tasks
                .values()
                .filter(|t| t.enabled && t.next_run.map(|nr| nr <= now).unwrap_or(false))
                .map(|t| (t.id.clone(), t.workflow_id.clone()))
                .collect()
        };

        for (task_id, workflow_id) in due {
            invoker.invoke(&workflow_id).await;
            if let Some(task) = self.tasks.write().get_mut(&task_id) {
                task.next_run = next_run_after(&task.schedule, now);
                task.run_count += 1;
            }
        }
    }

    /// Fires every task bound to `event`, regardless of `next_run`.
    pub async fn fire_event(&self, event: &str, invoker: Arc<dyn WorkflowInvoker>) {
        let due: Vec<(String, String)> = {
            let tasks = self.tasks.read();
            tasks
                .values()
                .filter(|t| t.enabled && matches!(&t.schedule, Schedule::Event(name) if name == event))
                .map(|t| (t.id.clone(), t.workflow_id.clone()))
                .collect()
        };
        for (task_id, workflow_id) in due {
            invoker.invoke(&workflow_id).await;
            if let Some(task) = self.tasks.write().get_mut(&task_id) {
                task.run_count += 1;
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interval_minutes() {
        assert_eq!(parse_schedule("interval:15m").unwrap(), Schedule::Interval(ChronoDuration::minutes(15)));
    }

    #[test]
    fn parses_daily_at() {
        assert_eq!(parse_schedule("daily:03:30").unwrap(), Schedule::DailyAt { hour: 3, minute: 30 });
    }

    #[test]
    fn parses_weekly_at() {
        assert_eq!(
            parse_schedule("weekly:mon:09:00").unwrap(),
            Schedule::WeeklyAt { weekday: Weekday::Mon, hour: 9, minute: 0 }
        );
    }

    #[test]
    fn parses_event() {
        assert_eq!(parse_schedule("event:incident_opened").unwrap(), Schedule::Event("incident_opened".to_string()));
    }

    #[test]
    fn rejects_malformed_schedule() {
        assert!(parse_schedule("bogus").is_err());
    }

    #[test]
    fn daily_next_run_rolls_to_tomorrow_when_time_has_passed() {
        let from = Utc::now();
        let past_time = (from - ChronoDuration::hours(1)).time();
        let schedule = Schedule::DailyAt { hour: past_time.hour(), minute: past_time.minute() };
        let next = next_run_after(&schedule, from).unwrap();
        assert!(next > from);
    }

    #[tokio::test]
    async fn disabled_tasks_never_fire() {
        struct Counter(std::sync::atomic::AtomicUsize);
        #[async_trait::async_trait]
        impl WorkflowInvoker for Counter {
            async fn invoke(&self, _workflow_id: &str) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let scheduler = Scheduler::new();
        let mut task = ScheduledTask::new("t1", Schedule::Interval(ChronoDuration::seconds(0)), "wf-1");
        task.enabled = false;
        scheduler.add_task(task);

        let counter = Arc::new(Counter(std::sync::atomic::AtomicUsize::new(0)));
        scheduler.tick(&(counter.clone() as Arc<dyn WorkflowInvoker>)).await;
        assert_eq!(counter.0.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn firing_a_task_increments_its_run_count() {
        struct Noop;
        #[async_trait::async_trait]
        impl WorkflowInvoker for Noop {
            async fn invoke(&self, _workflow_id: &str) {}
        }

        let scheduler = Scheduler::new();
        scheduler.add_task(ScheduledTask::new("t1", Schedule::Interval(ChronoDuration::seconds(0)), "wf-1"));

        let invoker = Arc::new(Noop) as Arc<dyn WorkflowInvoker>;
        scheduler.tick(&invoker).await;
        let task = scheduler.tasks().into_iter().find(|t| t.id == "t1").unwrap();
        assert_eq!(task.run_count, 1);

        scheduler.tick(&invoker).await;
        let task = scheduler.tasks().into_iter().find(|t| t.id == "t1").unwrap();
        assert_eq!(task.run_count, 2);
    }
}
