//! Multi-request crawls: batched detail/bonus/update fetches on the task runner, and paged
//! listings walked until an empty page.

use super::client::MangaClient;
use super::endpoints;
use super::error::CrawlerError;
use crate::model::{comic_id, ClassifyFilter, Comic};
use crate::runner::{
    run_keyed, run_sequence, task, NoProgress, Progress, RunConfig, RunStats, Task,
    TerminalProgress,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::sync::Arc;

/// Runner settings shared by every batch of one CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub workers: usize,
    pub delay_ms: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
    /// Hide progress bars.
    pub quiet: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            delay_ms: 0,
            retries: 0,
            retry_delay_ms: 1000,
            quiet: false,
        }
    }
}

impl BatchOptions {
    /// Pool when `workers > 1`, otherwise sequential with `delay_ms` between requests.
    pub fn run_config(&self, label: &str, unit: &str) -> Result<RunConfig, CrawlerError> {
        Ok(RunConfig::builder()
            .max_workers(self.workers)
            .inter_task_delay_ms(self.delay_ms)
            .retries(self.retries)
            .retry_delay_ms(self.retry_delay_ms)
            .progress_label(label)
            .progress_unit(unit)
            .build()?)
    }

    fn progress(&self) -> Box<dyn Progress> {
        if self.quiet {
            Box::new(NoProgress)
        } else {
            Box::new(TerminalProgress::new())
        }
    }
}

fn log_deficit(what: &str, stats: &RunStats) {
    if stats.failed > 0 {
        tracing::warn!(
            failed = stats.failed,
            submitted = stats.submitted,
            "{}: some requests failed on every attempt and were left out",
            what
        );
    }
}

/// Detail pages for `ids`. Ids whose every attempt fails are left out.
pub fn comics_details(
    client: &Arc<MangaClient>,
    ids: &[String],
    opts: &BatchOptions,
) -> Result<Vec<Comic>, CrawlerError> {
    let config = opts.run_config("批量请求漫画详情", "本")?;
    let tasks: Vec<Task<Comic>> = ids
        .iter()
        .map(|id| {
            let client = Arc::clone(client);
            let id = id.clone();
            task(move || Ok(endpoints::comic_detail(&client, &id)?))
        })
        .collect();
    let (comics, stats) = run_sequence(tasks, &config, opts.progress().as_ref());
    log_deficit("comic details", &stats);
    Ok(comics)
}

/// Every day in `start..=end`, one request per day, flattened and sorted by date.
pub fn update_pages(
    client: &Arc<MangaClient>,
    start: NaiveDate,
    end: NaiveDate,
    page_size: u32,
    opts: &BatchOptions,
) -> Result<Vec<Comic>, CrawlerError> {
    let config = opts.run_config("批量获取更新推荐页", "页")?;
    let tasks: Vec<Task<Vec<Comic>>> = days(start, end)
        .into_iter()
        .map(|day| {
            let client = Arc::clone(client);
            let date = day.format("%Y-%m-%d").to_string();
            task(move || Ok(endpoints::update_page(&client, &date, 1, page_size)?))
        })
        .collect();
    let (pages, stats) = run_sequence(tasks, &config, opts.progress().as_ref());
    log_deficit("update pages", &stats);
    Ok(merge_by_date(pages))
}

fn days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut day = start;
    while day <= end {
        out.push(day);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    out
}

/// Concurrent runs return days in completion order; a stable sort restores date order
/// while keeping each day's own ordering.
fn merge_by_date(pages: Vec<Vec<Comic>>) -> Vec<Comic> {
    let mut comics: Vec<Comic> = pages.into_iter().flatten().collect();
    comics.sort_by(|a, b| date_key(a).cmp(date_key(b)));
    comics
}

fn date_key(comic: &Comic) -> &str {
    comic.get("date").and_then(Value::as_str).unwrap_or("")
}

/// Fetch bonus items for every comic and fill the `bonus*` summary fields in place.
/// Comics whose bonus request failed keep no bonus fields.
pub fn attach_bonus(
    client: &Arc<MangaClient>,
    comics: &mut [Comic],
    today: NaiveDate,
    opts: &BatchOptions,
) -> Result<(), CrawlerError> {
    let config = opts.run_config("批量请求漫画特典", "本")?;
    let tasks: Vec<Task<(String, Vec<Value>)>> = comics
        .iter()
        .filter_map(comic_id)
        .map(|id| {
            let client = Arc::clone(client);
            task(move || Ok(endpoints::comic_bonus(&client, &id)?))
        })
        .collect();
    let (mut bonuses, stats) = run_keyed(tasks, &config, opts.progress().as_ref());
    log_deficit("comic bonus", &stats);
    for comic in comics.iter_mut() {
        if let Some(bonus) = comic_id(comic).and_then(|id| bonuses.remove(&id)) {
            apply_bonus(comic, bonus, today);
        }
    }
    Ok(())
}

/// Summarise a bonus list onto `comic`: count, newest item, and the next item to go
/// offline after `today`.
pub fn apply_bonus(comic: &mut Comic, bonus: Vec<Value>, today: NaiveDate) {
    comic.insert("bonus_total".into(), Value::from(bonus.len()));

    // On equal times the earliest listed item wins.
    let newest = bonus
        .iter()
        .rev()
        .max_by(|a, b| item_str(a, "online_time").cmp(&item_str(b, "online_time")));
    if let Some(newest) = newest {
        comic.insert("last_bonus_title".into(), item_str(newest, "title").into());
        let date = item_str(newest, "online_time");
        comic.insert("last_bonus_date".into(), date_only(&date).into());
    }

    let expiring = bonus
        .iter()
        .filter(|b| {
            parse_day(&item_str(b, "offline_time"))
                .map(|d| d > today)
                .unwrap_or(false)
        })
        .min_by(|a, b| item_str(a, "offline_time").cmp(&item_str(b, "offline_time")));
    if let Some(expiring) = expiring {
        comic.insert(
            "recently_lock_bonus_title".into(),
            item_str(expiring, "title").into(),
        );
        let date = item_str(expiring, "offline_time");
        comic.insert("recently_lock_bonus_date".into(), date_only(&date).into());
    }

    comic.insert("bonus".into(), Value::Array(bonus));
}

fn item_str(bonus: &Value, key: &str) -> String {
    bonus
        .pointer(&format!("/item/{}", key))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn date_only(timestamp: &str) -> String {
    timestamp.split(' ').next().unwrap_or("").to_string()
}

fn parse_day(timestamp: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(date_only(timestamp).as_str(), "%Y-%m-%d"))
        .ok()
}

/// Walk a paged listing from `first_page` until a page comes back empty, or fetch only
/// `first_page` when `single` is set. Page failures are not retried here; they end the
/// walk with an error.
pub fn collect_pages<F>(
    label: &str,
    first_page: u32,
    single: bool,
    quiet: bool,
    mut fetch: F,
) -> Result<Vec<Comic>, CrawlerError>
where
    F: FnMut(u32) -> Result<Vec<Comic>, CrawlerError>,
{
    let spinner = (!quiet).then(|| crate::runner::page_spinner(label, "页"));
    let mut comics = Vec::new();
    let mut page_num = first_page;
    loop {
        let page = fetch(page_num)?;
        if page.is_empty() {
            break;
        }
        tracing::debug!(page = page_num, count = page.len(), "fetched page");
        comics.extend(page);
        if let Some(s) = &spinner {
            s.inc(1);
        }
        if single {
            break;
        }
        page_num += 1;
    }
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    tracing::info!(count = comics.len(), "{} loaded", label);
    Ok(comics)
}

/// Entire classify listing for `filter`.
pub fn classify_all(
    client: &MangaClient,
    filter: &ClassifyFilter,
    page_size: u32,
    page_num: Option<u32>,
    quiet: bool,
) -> Result<Vec<Comic>, CrawlerError> {
    let label = format!("分类页加载中({}本/页)", page_size);
    collect_pages(&label, page_num.unwrap_or(1), page_num.is_some(), quiet, |n| {
        endpoints::classify_page(client, filter, n, page_size)
    })
}

/// Entire home feed for one generated device id.
pub fn home_feed_all(
    client: &MangaClient,
    page_size: u32,
    page_num: Option<u32>,
    quiet: bool,
) -> Result<Vec<Comic>, CrawlerError> {
    let buvid = endpoints::generate_buvid();
    tracing::info!(%buvid, "home feed device id");
    let label = format!("主页信息流加载中({}本/页)", page_size);
    collect_pages(&label, page_num.unwrap_or(1), page_num.is_some(), quiet, |n| {
        endpoints::home_feed(client, &buvid, n, page_size)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn comic(id: i64, date: &str) -> Comic {
        let Value::Object(map) = json!({"comic_id": id, "date": date}) else {
            unreachable!()
        };
        map
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn days_are_inclusive() {
        let d = days(day("2024-02-27"), day("2024-03-01"));
        assert_eq!(d.len(), 4);
        assert_eq!(d[2], day("2024-02-29"));
        assert!(days(day("2024-03-02"), day("2024-03-01")).is_empty());
    }

    #[test]
    fn merge_by_date_sorts_days_and_keeps_order_within_day() {
        let pages = vec![
            vec![comic(3, "2024-03-02"), comic(4, "2024-03-02")],
            vec![comic(1, "2024-03-01"), comic(2, "2024-03-01")],
        ];
        let ids: Vec<i64> = merge_by_date(pages)
            .iter()
            .map(|c| c["comic_id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn apply_bonus_summarises_newest_and_next_expiring() {
        let mut c = comic(1, "");
        let bonus = vec![
            json!({"item": {"title": "old", "online_time": "2023-01-01 00:00:00", "offline_time": "2023-06-01 00:00:00"}}),
            json!({"item": {"title": "new", "online_time": "2024-05-01 00:00:00", "offline_time": "2030-01-01 00:00:00"}}),
            json!({"item": {"title": "soon", "online_time": "2024-01-01 00:00:00", "offline_time": "2024-07-01 00:00:00"}}),
        ];
        apply_bonus(&mut c, bonus, day("2024-06-01"));
        assert_eq!(c["bonus_total"], 3);
        assert_eq!(c["last_bonus_title"], "new");
        assert_eq!(c["last_bonus_date"], "2024-05-01");
        assert_eq!(c["recently_lock_bonus_title"], "soon");
        assert_eq!(c["recently_lock_bonus_date"], "2024-07-01");
        assert_eq!(c["bonus"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn apply_bonus_ties_keep_first_listed_item() {
        let mut c = comic(1, "");
        let bonus = vec![
            json!({"item": {"title": "first", "online_time": "2024-05-01 00:00:00", "offline_time": "2024-08-01 00:00:00"}}),
            json!({"item": {"title": "second", "online_time": "2024-05-01 00:00:00", "offline_time": "2024-08-01 00:00:00"}}),
            json!({"item": {"title": "third", "online_time": "2024-05-01 00:00:00", "offline_time": "2024-08-01 00:00:00"}}),
        ];
        apply_bonus(&mut c, bonus, day("2024-06-01"));
        assert_eq!(c["last_bonus_title"], "first");
        assert_eq!(c["recently_lock_bonus_title"], "first");
    }

    #[test]
    fn apply_bonus_empty_list_only_sets_count() {
        let mut c = comic(1, "");
        apply_bonus(&mut c, Vec::new(), day("2024-06-01"));
        assert_eq!(c["bonus_total"], 0);
        assert!(c.get("last_bonus_title").is_none());
        assert!(c.get("recently_lock_bonus_title").is_none());
    }

    #[test]
    fn collect_pages_stops_at_empty_page() -> Result<(), CrawlerError> {
        let mut requested = Vec::new();
        let comics = collect_pages("test", 1, false, true, |n| {
            requested.push(n);
            Ok(if n <= 3 { vec![comic(n as i64, "")] } else { Vec::new() })
        })?;
        assert_eq!(comics.len(), 3);
        assert_eq!(requested, vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn collect_pages_single_page_mode() -> Result<(), CrawlerError> {
        let mut requested = Vec::new();
        let comics = collect_pages("test", 5, true, true, |n| {
            requested.push(n);
            Ok(vec![comic(1, ""), comic(2, "")])
        })?;
        assert_eq!(comics.len(), 2);
        assert_eq!(requested, vec![5]);
        Ok(())
    }

    #[test]
    fn collect_pages_propagates_page_error() {
        let result = collect_pages("test", 1, false, true, |_| {
            Err(CrawlerError::HttpStatus {
                status: 500,
                url: "u".into(),
            })
        });
        assert!(result.is_err());
    }

    #[test]
    fn run_config_reflects_options() -> Result<(), CrawlerError> {
        let opts = BatchOptions {
            workers: 1,
            delay_ms: 300,
            ..BatchOptions::default()
        };
        let config = opts.run_config("label", "页")?;
        assert!(!config.concurrent());
        assert_eq!(config.inter_task_delay().as_millis(), 300);

        let bad = BatchOptions {
            workers: 0,
            ..BatchOptions::default()
        };
        assert!(matches!(
            bad.run_config("label", "页"),
            Err(CrawlerError::Config(_))
        ));
        Ok(())
    }
}
