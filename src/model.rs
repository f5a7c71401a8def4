//! Data model for crawled comic metadata.
//!
//! Endpoint responses vary in shape from page to page, so a comic is kept as the JSON
//! object the API returned, with a few normalised keys (`comic_id`, `last_ep_*`, ...) added
//! by the crawler. Export picks columns out of it by key.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One comic record: the API object plus normalised keys.
pub type Comic = Map<String, Value>;

/// Listing page a crawl starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    Classify,
    Update,
    Ranking,
    HomeFeed,
    Favorite,
    Buy,
}

impl PageType {
    pub const ALL: [PageType; 6] = [
        PageType::Classify,
        PageType::Update,
        PageType::Ranking,
        PageType::HomeFeed,
        PageType::Favorite,
        PageType::Buy,
    ];

    /// Value accepted by `--type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Classify => "classify",
            PageType::Update => "update",
            PageType::Ranking => "ranking",
            PageType::HomeFeed => "home_feed",
            PageType::Favorite => "favorite",
            PageType::Buy => "buy",
        }
    }

    /// Display name of the page on the site.
    pub fn label(&self) -> &'static str {
        match self {
            PageType::Classify => "分类页",
            PageType::Update => "更新推荐页",
            PageType::Ranking => "排行页",
            PageType::HomeFeed => "主页信息流",
            PageType::Favorite => "我的追漫",
            PageType::Buy => "已购漫画",
        }
    }

    /// Pages that only make sense with a logged-in cookie.
    pub fn requires_login(&self) -> bool {
        matches!(self, PageType::Favorite | PageType::Buy)
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageType::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| {
                format!(
                    "Invalid --type value: '{}'. Use classify, update, ranking, home_feed, favorite, or buy.",
                    s
                )
            })
    }
}

/// Filters of the classify page. `-1` (or `0` for order and special) means "all".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyFilter {
    pub style: i64,
    pub area: i64,
    pub status: i64,
    pub order: i64,
    pub price: i64,
    pub special: i64,
}

impl Default for ClassifyFilter {
    fn default() -> Self {
        Self {
            style: -1,
            area: -1,
            status: -1,
            order: 0,
            price: -1,
            special: 0,
        }
    }
}

impl ClassifyFilter {
    /// Human-readable summary, e.g. `[风格: 热血][地区: 日本]`; `[全部类型]` when unfiltered.
    pub fn describe(&self, dicts: &Dictionaries) -> String {
        let parts = [
            ("风格", "styles", self.style, -1),
            ("地区", "areas", self.area, -1),
            ("状态", "status", self.status, -1),
            ("排序方式", "orders", self.order, 0),
            ("收费方式", "prices", self.price, -1),
            ("特殊分类", "special", self.special, 0),
        ];
        let text: String = parts
            .iter()
            .filter(|(_, _, value, unset)| value != unset)
            .map(|(title, group, value, _)| {
                format!("[{}: {}]", title, dicts.classify_name(group, *value))
            })
            .collect();
        if text.is_empty() {
            "[全部类型]".to_string()
        } else {
            text
        }
    }
}

/// Id → name tables for classify filters and ranking types. Starts with a few built-in
/// entries the label endpoint does not return; fetched labels are merged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionaries {
    pub classify: BTreeMap<String, BTreeMap<i64, String>>,
    pub ranking: BTreeMap<i64, String>,
}

impl Default for Dictionaries {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Dictionaries {
    pub fn builtin() -> Self {
        fn table(entries: &[(i64, &str)]) -> BTreeMap<i64, String> {
            entries.iter().map(|(id, name)| (*id, name.to_string())).collect()
        }
        let mut classify = BTreeMap::new();
        classify.insert(
            "special".to_string(),
            table(&[(1, "Vomic有声漫"), (2, "番剧原作"), (3, "制作人")]),
        );
        classify.insert(
            "prices".to_string(),
            table(&[
                (1, "免费"),
                (3, "等就免费"),
                (4, "限时免费"),
                (5, "通用券可用"),
                (6, "漫读券可用"),
                (7, "限免卡可用"),
                (8, "打折卡可用"),
            ]),
        );
        classify.insert(
            "orders".to_string(),
            table(&[(5, "阅读热度"), (6, "弹幕热度"), (7, "评论热度")]),
        );
        Self {
            classify,
            ranking: BTreeMap::new(),
        }
    }

    /// Merge the label endpoint's `data` object (`{"styles": [{"id": .., "name": ..}], ...}`).
    /// Built-in names win over fetched ones for the same id.
    pub fn merge_labels(&mut self, labels: &Value) {
        let Some(groups) = labels.as_object() else {
            return;
        };
        for (group, entries) in groups {
            let fetched = id_name_pairs(entries);
            if fetched.is_empty() {
                continue;
            }
            let slot = self.classify.entry(group.clone()).or_default();
            for (id, name) in fetched {
                slot.entry(id).or_insert(name);
            }
        }
    }

    /// Merge ranking types from a ranking page's `data` (`rankInfo.list`).
    pub fn merge_ranking(&mut self, ranking_page: &Value) {
        let list = ranking_page.pointer("/rankInfo/list").unwrap_or(&Value::Null);
        self.ranking.extend(id_name_pairs(list));
    }

    /// Name for `id` in a classify group, or the id itself when unknown.
    pub fn classify_name(&self, group: &str, id: i64) -> String {
        self.classify
            .get(group)
            .and_then(|t| t.get(&id))
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub fn ranking_name(&self, id: i64) -> String {
        self.ranking
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Table of accepted parameter values printed by `--parameter`.
    pub fn render_parameters(&self, today: &str) -> String {
        let join = |t: &BTreeMap<i64, String>| {
            t.iter()
                .map(|(id, name)| format!("{}: {}", id, name))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut out = String::from("以下是各分类与其对应可用参数列表\n");
        let types = PageType::ALL
            .iter()
            .map(|p| format!("{}: {}", p.as_str(), p.label()))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(" type | {}\n", types));
        out.push_str(" classify(分类页):\n");
        for (group, table) in &self.classify {
            out.push_str(&format!("   {:<7} | {}\n", group, join(table)));
        }
        out.push_str(" update(更新推荐页):\n");
        out.push_str("   sdate   | 不小于 2019-05-06\n");
        out.push_str(&format!("   edate   | 不大于 {}\n", today));
        out.push_str(" ranking(排行页):\n");
        out.push_str(&format!("   {:<7} | {}\n", "rank", join(&self.ranking)));
        out.push_str(" favorite(我的追漫):\n");
        out.push_str(&format!(
            "   {:<7} | 1: 追漫顺序, 2: 更新时间, 3: 最近阅读\n",
            "order"
        ));
        out
    }
}

fn id_name_pairs(entries: &Value) -> Vec<(i64, String)> {
    entries
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let id = item.get("id").and_then(Value::as_i64)?;
                    let name = item.get("name").and_then(Value::as_str)?;
                    Some((id, name.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Comic ids come back as numbers from most endpoints and as strings from CSV input.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The record's `comic_id`, normalised to a string.
pub fn comic_id(comic: &Comic) -> Option<String> {
    comic.get("comic_id").and_then(id_string)
}

/// Python-like truthiness used by the field mapping: empty / zero / null are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
