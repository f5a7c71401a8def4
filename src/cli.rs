//! CLI parsing and orchestration. Parses args, crawls a listing or a list of ids, optionally
//! follows up with detail and bonus requests, and saves after each stage. Maps errors to
//! exit codes.

use crate::config::{self, Config};
use crate::crawler::{
    self, attach_bonus, classify_all, comics_details, endpoints, home_feed_all,
    load_headers_file, update_pages, BatchOptions, CrawlerError, MangaClient,
};
use crate::export::{self, columns_for, Columns, ExportError};
use crate::model::{ClassifyFilter, Comic, Dictionaries, PageType};
use chrono::{Local, NaiveDate};
use clap::{ArgGroup, Parser};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_OUTPUT: &str = "metadata.json";
/// Favorite and bought lists are fetched as one oversized page.
const FULL_LIST_PAGE_SIZE: u32 = 1000;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Crawler(#[from] CrawlerError),

    #[error("{0}")]
    Export(#[from] ExportError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Crawler(
                CrawlerError::Config(_)
                | CrawlerError::HeadersFile { .. }
                | CrawlerError::InvalidHeaders { .. },
            ) => 1,
            CliRunError::Crawler(_) => 2,
            CliRunError::Export(_) => 3,
        }
    }
}

/// Comic ids given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdList(pub Vec<String>);

#[derive(Parser, Debug)]
#[command(name = "bmmc")]
#[command(about = "bmmc - 哔哩哔哩漫画元数据请求器 (Bilibili manga metadata crawler)")]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["parameter", "page_type", "id", "input"])
))]
#[command(
    after_help = "Config file keys (workers, delay_ms, retries, retry_delay_ms, timeout_secs, page_size, user_agent, headers, output) are read from ./bmmc.toml or ~/.config/bmmc/config.toml. CLI flags override config."
)]
pub struct Args {
    /// Print the accepted parameter values and exit.
    #[arg(short, long)]
    pub parameter: bool,

    /// Listing to crawl: classify, update, ranking, home_feed, favorite, or buy.
    #[arg(short = 't', long = "type", value_parser = parse_page_type)]
    pub page_type: Option<PageType>,

    /// One or more comic ids, separated by spaces or commas.
    #[arg(short, long, value_parser = parse_id_list)]
    pub id: Option<IdList>,

    /// Read comic ids from a previous .json, .csv or .xlsx output.
    #[arg(short = 'I', long)]
    pub input: Option<PathBuf>,

    /// Skip the confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,

    /// Follow a listing with a detail request per comic.
    #[arg(short, long)]
    pub detail: bool,

    /// Also fetch bonus items for every comic.
    #[arg(short, long)]
    pub bonus: bool,

    /// Classify page: style id.
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub style: i64,

    /// Classify page: area id.
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub area: i64,

    /// Classify page: status id.
    #[arg(short = 'u', long, default_value_t = -1, allow_negative_numbers = true)]
    pub status: i64,

    /// Classify page: sort order. Also the favorite list order.
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub order: i64,

    /// Classify page: price id.
    #[arg(short = 'c', long, default_value_t = -1, allow_negative_numbers = true)]
    pub price: i64,

    /// Classify page: special tag id.
    #[arg(short = 'e', long, default_value_t = 0, allow_negative_numbers = true)]
    pub special: i64,

    /// Ranking page: ranking type id.
    #[arg(short, long, default_value_t = 0)]
    pub rank: i64,

    /// Update page: first day (YYYY-MM-DD). Default: today.
    #[arg(long, value_parser = parse_date)]
    pub sdate: Option<NaiveDate>,

    /// Update page: last day (YYYY-MM-DD). Default: today.
    #[arg(long, value_parser = parse_date)]
    pub edate: Option<NaiveDate>,

    /// Output file; the extension picks the format (.json, .csv or .xlsx). Default: metadata.json.
    #[arg(short = 'O', long)]
    pub output: Option<PathBuf>,

    /// Worker threads for batch requests (overrides config; default 4). 1 runs sequentially.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Delay in milliseconds between sequential requests (overrides config; default 0).
    #[arg(short = 'D', long)]
    pub delay: Option<u64>,

    /// JSON file of extra request headers, e.g. {"Cookie": "SESSDATA=..."}.
    #[arg(short = 'H', long)]
    pub headers: Option<PathBuf>,

    /// Comics per listing page (overrides config; default 100).
    #[arg(short = 'S', long, alias = "page_size")]
    pub page_size: Option<u32>,

    /// Fetch only this listing page.
    #[arg(short = 'P', long, alias = "page_num")]
    pub page_num: Option<u32>,

    /// Extra attempts per failed request (overrides config; default 0).
    #[arg(long)]
    pub retries: Option<u32>,

    /// Milliseconds between attempts of one request (overrides config; default 1000).
    #[arg(long)]
    pub retry_delay: Option<u64>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds (overrides config; default 5).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug logging and full error chain.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_page_type(s: &str) -> Result<PageType, String> {
    s.parse()
}

/// Ids separated by spaces and/or commas; empty pieces are dropped.
fn parse_id_list(s: &str) -> Result<IdList, String> {
    let ids: Vec<String> = s
        .replace(',', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err("Expected at least one comic id.".to_string());
    }
    Ok(IdList(ids))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date: '{}'. Use YYYY-MM-DD, e.g. 2024-05-06.", s))
}

/// Update-page range; both ends default to `today` and must be in order.
fn date_range(
    sdate: Option<NaiveDate>,
    edate: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), CliRunError> {
    let start = sdate.unwrap_or(today);
    let end = edate.unwrap_or(today);
    if start > end {
        return Err(CliRunError::InvalidInput(format!(
            "Start date must not be after end date: --sdate={} > --edate={}",
            start, end
        )));
    }
    Ok((start, end))
}

/// Effective settings after merging flags, config file, and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub batch: BatchOptions,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    pub headers: Option<PathBuf>,
    pub output: PathBuf,
}

impl Settings {
    pub fn resolve(args: &Args, config: Option<&Config>) -> Self {
        let batch = BatchOptions {
            workers: args
                .workers
                .or_else(|| config.and_then(|c| c.workers))
                .unwrap_or(DEFAULT_WORKERS),
            delay_ms: args
                .delay
                .or_else(|| config.and_then(|c| c.delay_ms))
                .unwrap_or(0),
            retries: args
                .retries
                .or_else(|| config.and_then(|c| c.retries))
                .unwrap_or(0),
            retry_delay_ms: args
                .retry_delay
                .or_else(|| config.and_then(|c| c.retry_delay_ms))
                .unwrap_or(DEFAULT_RETRY_DELAY_MS),
            quiet: args.quiet,
        };
        Self {
            batch,
            page_size: args
                .page_size
                .or_else(|| config.and_then(|c| c.page_size))
                .unwrap_or(DEFAULT_PAGE_SIZE),
            timeout_secs: args
                .timeout
                .or_else(|| config.and_then(|c| c.timeout_secs))
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            user_agent: args
                .user_agent
                .clone()
                .or_else(|| config.and_then(|c| c.user_agent.clone())),
            headers: args
                .headers
                .clone()
                .or_else(|| config.and_then(|c| c.headers.clone())),
            output: args
                .output
                .clone()
                .or_else(|| config.and_then(|c| c.output.clone()))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
        }
    }
}

fn classify_filter(args: &Args) -> ClassifyFilter {
    ClassifyFilter {
        style: args.style,
        area: args.area,
        status: args.status,
        order: args.order,
        price: args.price,
        special: args.special,
    }
}

/// The favorite list is per user, so it needs a logged-in cookie.
fn check_login(page: Option<PageType>, settings: &Settings) -> Result<(), CliRunError> {
    match page {
        Some(PageType::Favorite) if settings.headers.is_none() => Err(CliRunError::InvalidInput(
            "The favorite list needs a logged-in cookie. Pass a JSON headers file with a valid Cookie via --headers.".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Ensure output path parent exists.
fn validate_output_path(path: &Path) -> Result<(), CliRunError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                path.display()
            )));
        }
    }
    Ok(())
}

fn speed(opts: &BatchOptions) -> String {
    if opts.delay_ms > 0 {
        format!("{}线程, 间隔{}毫秒", opts.workers, opts.delay_ms)
    } else {
        format!("{}线程", opts.workers)
    }
}

fn page_hint(page_num: Option<u32>) -> String {
    page_num
        .map(|n| format!(", 指定第{}页", n))
        .unwrap_or_default()
}

/// Summary of what is about to be requested, ending in a yes/no question.
fn confirm_prompt(
    args: &Args,
    settings: &Settings,
    dicts: &Dictionaries,
    ids: Option<usize>,
    dates: (NaiveDate, NaiveDate),
) -> String {
    let mut prompt = match (ids, args.page_type) {
        (Some(n), _) => format!(
            "您选择了{}本漫画, 请求漫画详情速度({})",
            n,
            speed(&settings.batch)
        ),
        (None, Some(page)) => {
            let mut p = format!("您选择了[{}]", page.label());
            match page {
                PageType::Ranking => {
                    p.push_str(&format!(", 排行榜为[{}]", dicts.ranking_name(args.rank)))
                }
                PageType::Classify => p.push_str(&format!(
                    ", 分类为{}, 每页{}本漫画{}",
                    classify_filter(args).describe(dicts),
                    settings.page_size,
                    page_hint(args.page_num)
                )),
                PageType::Update => {
                    let days = (dates.1 - dates.0).num_days() + 1;
                    p.push_str(&format!(
                        ", 日期为[{}至{}]共{}天",
                        dates.0, dates.1, days
                    ))
                }
                PageType::HomeFeed => p.push_str(&format!(
                    ", 每页{}本漫画(注意: 信息流加载大于200本/页可能会造成重复){}",
                    settings.page_size,
                    page_hint(args.page_num)
                )),
                PageType::Favorite | PageType::Buy => {}
            }
            p
        }
        (None, None) => String::new(),
    };
    if args.detail {
        prompt.push_str(", 以及请求漫画详情页");
    }
    if args.bonus {
        prompt.push_str(", 同时请求漫画特典");
    }
    if args.detail || args.bonus {
        prompt.push_str(&format!(", 请求速度为({})", speed(&settings.batch)));
    }
    prompt.push_str(&format!(
        ", 保存文件为[{}], 是否继续？(Y/n): ",
        settings.output.display()
    ));
    prompt
}

/// Empty answer takes `default`; anything but y/yes/n/no is a no.
pub fn parse_confirmation(answer: &str, default: bool) -> bool {
    match answer.trim().to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}

fn confirm(prompt: &str) -> Result<bool, CliRunError> {
    ask(prompt, &mut std::io::stderr(), &mut std::io::stdin().lock())
}

fn ask(
    prompt: &str,
    out: &mut impl Write,
    input: &mut impl BufRead,
) -> Result<bool, CliRunError> {
    write!(out, "{}", prompt)
        .and_then(|_| out.flush())
        .map_err(|e| CliRunError::InvalidInput(format!("Cannot show confirmation: {}", e)))?;
    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .map_err(|e| CliRunError::InvalidInput(format!("Cannot read confirmation: {}", e)))?;
    Ok(parse_confirmation(&answer, true))
}

fn build_client(settings: &Settings) -> Result<MangaClient, CliRunError> {
    let mut builder = MangaClient::builder().timeout_secs(settings.timeout_secs);
    if let Some(ua) = &settings.user_agent {
        builder = builder.user_agent(ua.clone());
    }
    if let Some(path) = &settings.headers {
        builder = builder.headers(load_headers_file(path)?);
    }
    Ok(builder.build()?)
}

/// Fetch one listing in full (or the page given by `--page-num`).
fn crawl_listing(
    client: &Arc<MangaClient>,
    page: PageType,
    args: &Args,
    settings: &Settings,
    dates: (NaiveDate, NaiveDate),
) -> Result<Vec<Comic>, CrawlerError> {
    let quiet = settings.batch.quiet;
    match page {
        PageType::Classify => classify_all(
            client,
            &classify_filter(args),
            settings.page_size,
            args.page_num,
            quiet,
        ),
        PageType::Update => update_pages(client, dates.0, dates.1, settings.page_size, &settings.batch),
        PageType::Ranking => Ok(endpoints::parse_ranking_list(endpoints::ranking_page(
            client, args.rank,
        )?)),
        PageType::HomeFeed => home_feed_all(client, settings.page_size, args.page_num, quiet),
        PageType::Favorite => endpoints::favorite(
            client,
            args.page_num.unwrap_or(1),
            FULL_LIST_PAGE_SIZE,
            args.order,
        ),
        PageType::Buy => {
            endpoints::buy_comics(client, args.page_num.unwrap_or(1), FULL_LIST_PAGE_SIZE)
        }
    }
}

fn save(
    path: &Path,
    comics: &[Comic],
    columns: &Columns,
    what: &str,
    quiet: bool,
) -> Result<(), CliRunError> {
    export::save(path, comics, columns)?;
    if !quiet {
        eprintln!(
            "{}数据保存成功, 共{}本漫画: {}",
            what,
            comics.len(),
            path.display()
        );
    }
    Ok(())
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let settings = Settings::resolve(args, config.as_ref());
    let today = Local::now().date_naive();
    let dates = date_range(args.sdate, args.edate, today)?;
    check_login(args.page_type, &settings)?;
    if !args.parameter {
        validate_output_path(&settings.output)?;
    }
    // Reject bad runner settings before any request goes out.
    settings.batch.run_config("", "")?;

    let client = Arc::new(build_client(&settings)?);

    let dicts = match crawler::fetch_dictionaries(&client) {
        Ok(d) => d,
        Err(e) if !args.parameter => {
            tracing::warn!(error = %e, "could not fetch labels; using built-in names");
            Dictionaries::builtin()
        }
        Err(e) => return Err(e.into()),
    };
    if args.parameter {
        println!("{}", dicts.render_parameters(&today.format("%Y-%m-%d").to_string()));
        return Ok(());
    }

    let ids = match (&args.input, &args.id) {
        (Some(path), _) => Some(endpoints::comic_ids(&export::load(path)?)),
        (None, Some(list)) => Some(list.0.clone()),
        (None, None) => None,
    };

    if !args.yes {
        let prompt = confirm_prompt(args, &settings, &dicts, ids.as_ref().map(Vec::len), dates);
        if !confirm(&prompt)? {
            tracing::info!("cancelled");
            return Ok(());
        }
    }

    let opts = &settings.batch;
    let columns = columns_for(args.page_type, args.detail, args.bonus);
    let output = settings.output.as_path();

    let mut comics = match (&ids, args.page_type) {
        (Some(ids), _) => {
            let comics = comics_details(&client, ids, opts)?;
            save(output, &comics, &columns, "自定义漫画ID", opts.quiet)?;
            comics
        }
        (None, Some(page)) => {
            let comics = crawl_listing(&client, page, args, &settings, dates)?;
            let what = match page {
                PageType::Ranking => format!("[{}]", dicts.ranking_name(args.rank)),
                _ => format!("[{}]", page.label()),
            };
            save(output, &comics, &columns, &what, opts.quiet)?;
            comics
        }
        (None, None) => {
            return Err(CliRunError::InvalidInput(
                "Nothing to do: pass --type, --id, --input, or --parameter.".to_string(),
            ))
        }
    };

    if ids.is_none() && args.detail {
        let listed = endpoints::comic_ids(&comics);
        comics = comics_details(&client, &listed, opts)?;
        save(output, &comics, &columns, "漫画详情页", opts.quiet)?;
    }

    if args.bonus {
        attach_bonus(&client, &mut comics, today, opts)?;
        save(output, &comics, &columns, "特典", opts.quiet)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["bmmc"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn parse_id_list_spaces_and_commas() {
        assert_eq!(
            parse_id_list("28284, 26009 1,,2").unwrap(),
            IdList(vec![
                "28284".to_string(),
                "26009".to_string(),
                "1".to_string(),
                "2".to_string()
            ])
        );
        assert!(parse_id_list(" , ").is_err());
    }

    #[test]
    fn mode_is_required_and_exclusive() {
        assert!(Args::try_parse_from(["bmmc"]).is_err());
        assert!(Args::try_parse_from(["bmmc", "-t", "classify", "-i", "1"]).is_err());
        assert!(Args::try_parse_from(["bmmc", "-p", "-I", "in.json"]).is_err());
    }

    #[test]
    fn classify_flags_accept_negative_values() {
        let a = args(&["-t", "classify", "-s", "-1", "-a", "2", "-o", "5", "-S", "20", "-P", "3"]);
        assert_eq!(a.page_type, Some(PageType::Classify));
        let f = classify_filter(&a);
        assert_eq!(f.style, -1);
        assert_eq!(f.area, 2);
        assert_eq!(f.order, 5);
        assert_eq!(a.page_size, Some(20));
        assert_eq!(a.page_num, Some(3));
    }

    #[test]
    fn invalid_type_rejected() {
        assert!(Args::try_parse_from(["bmmc", "-t", "search"]).is_err());
    }

    #[test]
    fn date_range_defaults_and_order() {
        let today = day("2024-06-01");
        assert_eq!(date_range(None, None, today).unwrap(), (today, today));
        let (s, e) = date_range(Some(day("2024-05-30")), None, today).unwrap();
        assert_eq!((s, e), (day("2024-05-30"), today));
        let err = date_range(Some(day("2024-06-02")), Some(day("2024-06-01")), today);
        assert!(matches!(err, Err(CliRunError::InvalidInput(_))));
        assert!(parse_date("2024/06/01").is_err());
    }

    #[test]
    fn flags_override_config_override_defaults() {
        let config = Config {
            workers: Some(8),
            delay_ms: Some(200),
            page_size: Some(50),
            output: Some(PathBuf::from("from-config.csv")),
            ..Config::default()
        };
        let a = args(&["-t", "update", "-w", "2", "--retries", "3"]);
        let s = Settings::resolve(&a, Some(&config));
        assert_eq!(s.batch.workers, 2);
        assert_eq!(s.batch.delay_ms, 200);
        assert_eq!(s.batch.retries, 3);
        assert_eq!(s.batch.retry_delay_ms, 1000);
        assert_eq!(s.page_size, 50);
        assert_eq!(s.timeout_secs, 5);
        assert_eq!(s.output, PathBuf::from("from-config.csv"));

        let s = Settings::resolve(&a, None);
        assert_eq!(s.page_size, 100);
        assert_eq!(s.output, PathBuf::from("metadata.json"));
    }

    #[test]
    fn favorite_requires_headers() {
        let a = args(&["-t", "favorite"]);
        let s = Settings::resolve(&a, None);
        assert!(matches!(
            check_login(a.page_type, &s),
            Err(CliRunError::InvalidInput(_))
        ));
        let a = args(&["-t", "favorite", "-H", "headers.json"]);
        let s = Settings::resolve(&a, None);
        assert!(check_login(a.page_type, &s).is_ok());
        let a = args(&["-t", "buy"]);
        assert!(check_login(a.page_type, &Settings::resolve(&a, None)).is_ok());
    }

    #[test]
    fn output_path_needs_existing_parent() {
        assert!(validate_output_path(Path::new("out.xlsx")).is_ok());
        assert!(validate_output_path(Path::new("out.csv")).is_ok());
        assert!(matches!(
            validate_output_path(Path::new("/nonexistent-bmmc-dir/out.json")),
            Err(CliRunError::InvalidInput(_))
        ));
    }

    #[test]
    fn confirmation_answers() {
        assert!(parse_confirmation("", true));
        assert!(!parse_confirmation("\n", false));
        assert!(parse_confirmation("Y\n", false));
        assert!(parse_confirmation(" yes ", false));
        assert!(!parse_confirmation("n", true));
        assert!(!parse_confirmation("maybe", true));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn ask_writes_prompt_and_reports_broken_output() {
        let mut shown = Vec::new();
        assert!(!ask("继续？", &mut shown, &mut &b"n\n"[..]).unwrap());
        assert_eq!(shown, "继续？".as_bytes());
        assert!(ask("继续？", &mut Vec::new(), &mut &b"\n"[..]).unwrap());
        assert!(matches!(
            ask("继续？", &mut ClosedPipe, &mut &b"y\n"[..]),
            Err(CliRunError::InvalidInput(_))
        ));
    }

    #[test]
    fn prompt_describes_update_range_and_follow_ups() {
        let a = args(&[
            "-t", "update", "--sdate", "2024-05-01", "--edate", "2024-05-03", "-d", "-b", "-w",
            "1", "-D", "300",
        ]);
        let s = Settings::resolve(&a, None);
        let dates = date_range(a.sdate, a.edate, day("2024-06-01")).unwrap();
        let p = confirm_prompt(&a, &s, &Dictionaries::builtin(), None, dates);
        assert!(p.starts_with("您选择了[更新推荐页]"));
        assert!(p.contains("共3天"));
        assert!(p.contains("以及请求漫画详情页"));
        assert!(p.contains("同时请求漫画特典"));
        assert!(p.contains("1线程, 间隔300毫秒"));
        assert!(p.ends_with("是否继续？(Y/n): "));
    }

    #[test]
    fn prompt_for_ids_counts_comics() {
        let a = args(&["-i", "1,2,3"]);
        let s = Settings::resolve(&a, None);
        let today = day("2024-06-01");
        let p = confirm_prompt(&a, &s, &Dictionaries::builtin(), Some(3), (today, today));
        assert!(p.starts_with("您选择了3本漫画"));
        assert!(p.contains("4线程"));
        assert!(p.contains("[metadata.json]"));
    }

    #[test]
    fn cli_run_error_exit_codes() {
        assert_eq!(CliRunError::InvalidInput("x".into()).exit_code(), 1);
        let crawl = CliRunError::Crawler(CrawlerError::HttpStatus {
            status: 500,
            url: "u".into(),
        });
        assert_eq!(crawl.exit_code(), 2);
        let headers = CliRunError::Crawler(CrawlerError::InvalidHeaders {
            path: "h.json".into(),
            reason: "bad".into(),
        });
        assert_eq!(headers.exit_code(), 1);
        let export = CliRunError::Export(ExportError::UnsupportedFormat {
            path: "a.xlsx".into(),
        });
        assert_eq!(export.exit_code(), 3);
    }
}
