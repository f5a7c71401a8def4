//! One function per API endpoint. Each performs a single request and normalises the
//! response into [Comic] records; the parsing half is split out so it can be tested on
//! captured JSON.

use super::client::MangaClient;
use super::error::CrawlerError;
use crate::model::{id_string, ClassifyFilter, Comic};
use md5::{Digest, Md5};
use rand::Rng;
use serde_json::{Map, Value};

const BASE: &str = "https://manga.bilibili.com";

pub const ALL_LABEL_URL: &str = "https://manga.bilibili.com/twirp/comic.v1.Comic/AllLabel";
pub const CLASS_PAGE_URL: &str =
    "https://manga.bilibili.com/twirp/comic.v1.Comic/ClassPage?device=h5&platform=web";
pub const DAILY_PUSH_URL: &str = "https://manga.bilibili.com/twirp/comic.v1.Comic/GetDailyPush";
pub const COMIC_DETAIL_URL: &str =
    "https://manga.bilibili.com/twirp/comic.v1.Comic/ComicDetail?device=h5&platform=web";
pub const COMIC_ALBUM_URL: &str = "https://manga.bilibili.com/twirp/comic.v1.Comic/GetComicAlbumPlus?mobi_app=android_comic&device=android&platform=android&version=5.21.0";
pub const HOME_FEED_URL: &str = "https://manga.bilibili.com/twirp/comic.v1.Home/HomeFeed";
pub const FAVORITE_URL: &str =
    "https://manga.bilibili.com/twirp/bookshelf.v1.Bookshelf/ListFavorite?device=pc&platform=web";
pub const AUTO_BUY_URL: &str =
    "https://manga.bilibili.com/twirp/user.v1.User/GetAutoBuyComics?device=pc&platform=web";

/// All classify labels: `{"styles": [..], "areas": [..], ...}`.
pub fn classify_labels(client: &MangaClient) -> Result<Value, CrawlerError> {
    client.post_form(ALL_LABEL_URL, &[])
}

/// One page of the classify listing.
pub fn classify_page(
    client: &MangaClient,
    filter: &ClassifyFilter,
    page_num: u32,
    page_size: u32,
) -> Result<Vec<Comic>, CrawlerError> {
    let form = [
        ("style_id", filter.style.to_string()),
        ("area_id", filter.area.to_string()),
        ("is_finish", filter.status.to_string()),
        ("order", filter.order.to_string()),
        ("special_tag", filter.special.to_string()),
        ("is_free", filter.price.to_string()),
        ("page_num", page_num.to_string()),
        ("page_size", page_size.to_string()),
    ];
    let data = client.post_form(CLASS_PAGE_URL, &form)?;
    Ok(parse_classify_page(data))
}

/// Classify entries carry their id as `season_id`.
pub fn parse_classify_page(data: Value) -> Vec<Comic> {
    objects(data)
        .map(|mut comic| {
            let id = comic.get("season_id").cloned().unwrap_or(Value::Null);
            comic.insert("comic_id".into(), id);
            comic
        })
        .collect()
}

/// Comics pushed on one day (`date` is `YYYY-MM-DD`).
pub fn update_page(
    client: &MangaClient,
    date: &str,
    page_num: u32,
    page_size: u32,
) -> Result<Vec<Comic>, CrawlerError> {
    let form = [
        ("date", date.to_string()),
        ("page_num", page_num.to_string()),
        ("page_size", page_size.to_string()),
    ];
    let data = client.post_form(DAILY_PUSH_URL, &form)?;
    Ok(parse_update_page(data, date))
}

/// A missing or null `list` means nothing was pushed that day.
pub fn parse_update_page(mut data: Value, date: &str) -> Vec<Comic> {
    let list = data
        .get_mut("list")
        .map(Value::take)
        .unwrap_or(Value::Null);
    objects(list)
        .map(|mut comic| {
            comic.insert("date".into(), Value::String(date.to_string()));
            comic
        })
        .collect()
}

pub fn ranking_url(rank_type: i64) -> String {
    format!("{}/ranking/{}/index.pageContext.json", BASE, rank_type)
}

/// Raw ranking page `data`: `rankInfo` (ranking types) and `rankListInfo` (entries).
pub fn ranking_page(client: &MangaClient, rank_type: i64) -> Result<Value, CrawlerError> {
    client.get_json(&ranking_url(rank_type))
}

/// Ranking entries with `rank` set to their 1-based position.
pub fn parse_ranking_list(mut data: Value) -> Vec<Comic> {
    let list = data
        .get_mut("rankListInfo")
        .map(Value::take)
        .unwrap_or(Value::Null);
    objects(list)
        .enumerate()
        .map(|(i, mut comic)| {
            comic.insert("rank".into(), Value::from(i + 1));
            comic
        })
        .collect()
}

/// Full detail of one comic.
pub fn comic_detail(client: &MangaClient, comic_id: &str) -> Result<Comic, CrawlerError> {
    let data = client.post_form(COMIC_DETAIL_URL, &[("comic_id", comic_id.to_string())])?;
    parse_comic_detail(data, COMIC_DETAIL_URL)
}

/// Adds `comic_id` and `last_ep_*` from the newest episode. `release_time` is rewritten
/// from `YYYY.MM.DD` to `YYYY-MM-DD`, or taken from the oldest episode when empty.
pub fn parse_comic_detail(data: Value, url: &str) -> Result<Comic, CrawlerError> {
    let missing = |field: &str| CrawlerError::MissingField {
        url: url.to_string(),
        field: field.to_string(),
    };
    let mut comic = match data {
        Value::Object(map) => map,
        _ => return Err(missing("data")),
    };
    let id = comic.get("id").cloned().unwrap_or(Value::Null);
    comic.insert("comic_id".into(), id);

    let episodes = comic
        .get("ep_list")
        .and_then(Value::as_array)
        .filter(|eps| !eps.is_empty())
        .ok_or_else(|| missing("ep_list"))?;
    let newest = &episodes[0];
    let oldest = &episodes[episodes.len() - 1];
    let text = |ep: &Value, key: &str| ep.get(key).and_then(Value::as_str).unwrap_or("").to_string();

    let last_ep_id = newest.get("id").cloned().unwrap_or(Value::Null);
    let last_ep_cover = newest.get("cover").cloned().unwrap_or(Value::Null);
    let last_ep_title = format!("{} {}", text(newest, "short_title"), text(newest, "title"));
    let last_ep_date = date_part(&text(newest, "pub_time"));
    let oldest_date = date_part(&text(oldest, "pub_time"));

    comic.insert("last_ep_id".into(), last_ep_id);
    comic.insert("last_ep_cover".into(), last_ep_cover);
    comic.insert("last_ep_title".into(), Value::String(last_ep_title));
    comic.insert("last_ep_date".into(), Value::String(last_ep_date));

    let release = comic
        .get("release_time")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let release = if release.is_empty() {
        oldest_date
    } else {
        release.replace('.', "-")
    };
    comic.insert("release_time".into(), Value::String(release));
    Ok(comic)
}

/// Bonus (album) items of one comic, keyed by the id that was asked for.
pub fn comic_bonus(
    client: &MangaClient,
    comic_id: &str,
) -> Result<(String, Vec<Value>), CrawlerError> {
    let data = client.post_form(COMIC_ALBUM_URL, &[("comic_id", comic_id.to_string())])?;
    Ok((comic_id.to_string(), parse_bonus_list(data)))
}

pub fn parse_bonus_list(mut data: Value) -> Vec<Value> {
    match data.get_mut("list").map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Random device id for the home feed: `XX` + three check chars + MD5 of a random MAC.
pub fn generate_buvid() -> String {
    let mut rng = rand::thread_rng();
    let mac: String = (0..6)
        .map(|_| format!("{:02X}", rng.gen::<u8>()))
        .collect();
    buvid_from_mac(&mac)
}

fn buvid_from_mac(mac: &str) -> String {
    let digest = Md5::digest(mac.replace([':', '-'], "").as_bytes());
    let h: String = digest.iter().map(|b| format!("{:02X}", b)).collect();
    let bytes = h.as_bytes();
    format!(
        "XX{}{}{}{}",
        bytes[2] as char, bytes[12] as char, bytes[22] as char, h
    )
}

/// One page of the home feed for device `buvid`.
pub fn home_feed(
    client: &MangaClient,
    buvid: &str,
    page_num: u32,
    page_size: u32,
) -> Result<Vec<Comic>, CrawlerError> {
    let url = format!("{}?buvid={}", HOME_FEED_URL, buvid);
    let form = [
        ("page_num", page_num.to_string()),
        ("page_size", page_size.to_string()),
    ];
    let data = client.post_form(&url, &form)?;
    Ok(parse_home_feed(data))
}

/// Flattens each feed item: id, title, type, image, then the nested `comic_info` fields.
pub fn parse_home_feed(mut data: Value) -> Vec<Comic> {
    let feeds = data
        .get_mut("feeds")
        .map(Value::take)
        .unwrap_or(Value::Null);
    objects(feeds)
        .map(|mut feed| {
            let mut comic = Map::new();
            comic.insert(
                "comic_id".into(),
                feed.remove("item_id").unwrap_or(Value::Null),
            );
            for key in ["title", "type", "image"] {
                comic.insert(key.into(), feed.remove(key).unwrap_or(Value::Null));
            }
            if let Some(Value::Object(info)) = feed.remove("comic_info") {
                comic.extend(info);
            }
            comic
        })
        .collect()
}

/// The logged-in user's followed comics. Needs a cookie; 401 becomes `Unauthorized`.
pub fn favorite(
    client: &MangaClient,
    page_num: u32,
    page_size: u32,
    order: i64,
) -> Result<Vec<Comic>, CrawlerError> {
    let form = [
        ("page_num", page_num.to_string()),
        ("page_size", page_size.to_string()),
        ("order", order.to_string()),
    ];
    let data = client.post_form(FAVORITE_URL, &form)?;
    Ok(parse_favorite(data))
}

/// Status 2/3 map to `is_finish` 0/1; episode fields renamed to the common `last_ep_*`.
pub fn parse_favorite(data: Value) -> Vec<Comic> {
    objects(data)
        .map(|mut comic| {
            let is_finish = match comic.get("status").and_then(Value::as_i64) {
                Some(2) => Value::from(0),
                Some(3) => Value::from(1),
                _ => Value::Null,
            };
            comic.insert("is_finish".into(), is_finish);
            copy_key(&mut comic, "ord_count", "total");
            copy_key(&mut comic, "latest_ep_short_title", "last_ep_title");
            let date = date_part(str_field(&comic, "last_ep_publish_time"));
            comic.insert("last_ep_date".into(), Value::String(date));
            comic
        })
        .collect()
}

/// Comics with auto-buy enabled for the logged-in user.
pub fn buy_comics(
    client: &MangaClient,
    page_num: u32,
    page_size: u32,
) -> Result<Vec<Comic>, CrawlerError> {
    let form = [
        ("page_num", page_num.to_string()),
        ("page_size", page_size.to_string()),
    ];
    let data = client.post_form(AUTO_BUY_URL, &form)?;
    Ok(parse_buy_comics(data))
}

pub fn parse_buy_comics(data: Value) -> Vec<Comic> {
    objects(data)
        .map(|mut comic| {
            copy_key(&mut comic, "comic_title", "title");
            copy_key(&mut comic, "last_ord", "total");
            copy_key(&mut comic, "last_short_title", "last_ep_title");
            let date = date_part(str_field(&comic, "ctime"));
            comic.insert("last_ep_date".into(), Value::String(date));
            comic
        })
        .collect()
}

/// Ids of a listing, in order, skipping entries without one.
pub fn comic_ids(comics: &[Comic]) -> Vec<String> {
    comics
        .iter()
        .filter_map(|c| c.get("comic_id").and_then(id_string))
        .collect()
}

/// Object elements of a JSON array; anything else yields nothing.
fn objects(value: Value) -> impl Iterator<Item = Comic> {
    let items = match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    };
    items.into_iter().filter_map(|item| match item {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

fn copy_key(comic: &mut Comic, from: &str, to: &str) {
    let value = comic.get(from).cloned().unwrap_or(Value::Null);
    comic.insert(to.into(), value);
}

fn str_field<'a>(comic: &'a Comic, key: &str) -> &'a str {
    comic.get(key).and_then(Value::as_str).unwrap_or("")
}

/// `2024-05-01 12:00:00` → `2024-05-01`.
fn date_part(timestamp: &str) -> String {
    timestamp.split(' ').next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_page_copies_season_id() {
        let comics = parse_classify_page(json!([
            {"season_id": 26009, "title": "A"},
            {"season_id": 28284, "title": "B"},
            "junk"
        ]));
        assert_eq!(comics.len(), 2);
        assert_eq!(comics[0]["comic_id"], 26009);
        assert_eq!(comic_ids(&comics), vec!["26009", "28284"]);
    }

    #[test]
    fn update_page_stamps_date_and_tolerates_null_list() {
        let comics = parse_update_page(json!({"list": [{"comic_id": 1}]}), "2024-03-01");
        assert_eq!(comics[0]["date"], "2024-03-01");
        assert!(parse_update_page(json!({"list": null}), "2024-03-01").is_empty());
        assert!(parse_update_page(Value::Null, "2024-03-01").is_empty());
    }

    #[test]
    fn ranking_list_numbered_from_one() {
        let comics = parse_ranking_list(json!({
            "rankListInfo": [{"comic_id": 5}, {"comic_id": 9}]
        }));
        assert_eq!(comics[0]["rank"], 1);
        assert_eq!(comics[1]["rank"], 2);
        assert_eq!(ranking_url(7), "https://manga.bilibili.com/ranking/7/index.pageContext.json");
    }

    #[test]
    fn comic_detail_derives_episode_fields() -> Result<(), CrawlerError> {
        let comic = parse_comic_detail(
            json!({
                "id": 26009,
                "title": "Example",
                "release_time": "2019.05.06",
                "ep_list": [
                    {"id": 900, "cover": "c.jpg", "short_title": "120", "title": "Finale", "pub_time": "2024-02-01 10:00:00"},
                    {"id": 1, "cover": "a.jpg", "short_title": "1", "title": "Start", "pub_time": "2019-05-06 00:00:00"}
                ]
            }),
            "u",
        )?;
        assert_eq!(comic["comic_id"], 26009);
        assert_eq!(comic["last_ep_id"], 900);
        assert_eq!(comic["last_ep_title"], "120 Finale");
        assert_eq!(comic["last_ep_date"], "2024-02-01");
        assert_eq!(comic["release_time"], "2019-05-06");
        Ok(())
    }

    #[test]
    fn comic_detail_release_falls_back_to_oldest_episode() -> Result<(), CrawlerError> {
        let comic = parse_comic_detail(
            json!({
                "id": 1,
                "release_time": "",
                "ep_list": [
                    {"id": 3, "short_title": "3", "title": "", "pub_time": "2023-01-03 00:00:00"},
                    {"id": 1, "short_title": "1", "title": "", "pub_time": "2022-12-25 08:00:00"}
                ]
            }),
            "u",
        )?;
        assert_eq!(comic["release_time"], "2022-12-25");
        Ok(())
    }

    #[test]
    fn comic_detail_without_episodes_is_missing_field() {
        let result = parse_comic_detail(json!({"id": 1, "ep_list": []}), "u");
        assert!(matches!(
            result,
            Err(CrawlerError::MissingField { ref field, .. }) if field == "ep_list"
        ));
        assert!(parse_comic_detail(Value::Null, "u").is_err());
    }

    #[test]
    fn bonus_list_defaults_to_empty() {
        assert_eq!(parse_bonus_list(json!({"list": [{"item": {}}]})).len(), 1);
        assert!(parse_bonus_list(json!({})).is_empty());
    }

    #[test]
    fn buvid_shape() {
        let buvid = generate_buvid();
        assert_eq!(buvid.len(), 2 + 3 + 32);
        assert!(buvid.starts_with("XX"));
        assert!(buvid[2..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        let h = &buvid[5..];
        let check: String = [2, 12, 22].iter().map(|&i| h.as_bytes()[i] as char).collect();
        assert_eq!(&buvid[2..5], check);
    }

    #[test]
    fn buvid_ignores_mac_separators() {
        assert_eq!(
            buvid_from_mac("AA:BB:CC:DD:EE:FF"),
            buvid_from_mac("AABBCCDDEEFF")
        );
    }

    #[test]
    fn home_feed_flattens_comic_info() {
        let comics = parse_home_feed(json!({
            "feeds": [{
                "item_id": 42,
                "title": "T",
                "type": 1,
                "image": "i.jpg",
                "comic_info": {"score": 9.5, "is_finish": 1}
            }]
        }));
        assert_eq!(comics[0]["comic_id"], 42);
        assert_eq!(comics[0]["image"], "i.jpg");
        assert_eq!(comics[0]["score"], 9.5);
    }

    #[test]
    fn favorite_maps_status_and_episode_fields() {
        let comics = parse_favorite(json!([
            {"comic_id": 1, "status": 3, "ord_count": 80, "latest_ep_short_title": "80", "last_ep_publish_time": "2024-01-02 03:04:05"},
            {"comic_id": 2, "status": 2}
        ]));
        assert_eq!(comics[0]["is_finish"], 1);
        assert_eq!(comics[0]["total"], 80);
        assert_eq!(comics[0]["last_ep_title"], "80");
        assert_eq!(comics[0]["last_ep_date"], "2024-01-02");
        assert_eq!(comics[1]["is_finish"], 0);
        assert_eq!(comics[1]["last_ep_date"], "");
    }

    #[test]
    fn buy_comics_renames_fields() {
        let comics = parse_buy_comics(json!([
            {"comic_id": 7, "comic_title": "Bought", "last_ord": 12, "last_short_title": "12", "ctime": "2023-06-01 00:00:00"}
        ]));
        assert_eq!(comics[0]["title"], "Bought");
        assert_eq!(comics[0]["total"], 12);
        assert_eq!(comics[0]["last_ep_date"], "2023-06-01");
        assert!(parse_buy_comics(Value::Null).is_empty());
    }
}
