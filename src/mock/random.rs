//! Generator library behind `@placeholder` tokens.
//!
//! Names and argument conventions follow Mock.js `Random` so existing
//! templates keep working.

use base64::Engine;
use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Timelike};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Number, Value};
use std::sync::atomic::{AtomicI64, Ordering};

const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_992;
pub(super) const MAX_RANGE_LEN: i64 = 10_000;

const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NUMBER: &str = "0123456789";
const SYMBOL: &str = "!@#$%^&*()[]";

const HANZI: &str = "的一是在不了有和人这中大为上个国我以要他时来用们生到作地于出就分对成会可主发年动同工也能下过子说产种面而方后多定行学法所民得经十三之进着等部度家电力里如水化高自二理起小物现实加量都两体制机当使点从业本去把性好应开它合还因由其些然前外天政四日那社义事平形相全表间样与关各重新线内数正心反你明看原又么利比或但质气第向道命此变条只没结解问意建月公无系军很情者最立代想已通并提直题党程展五果料象员革位入常文总次品式活设及管特件长求老头基资边流路级少图山统接知较将组见计别她手角期根论运农指几九区强放决西被干做必战先回则任取据处理府研";

const FIRST_NAMES: &[&str] = &[
    "James", "John", "Robert", "Michael", "William", "David", "Richard", "Charles", "Joseph",
    "Thomas", "Christopher", "Daniel", "Paul", "Mark", "Donald", "George", "Kenneth", "Steven",
    "Edward", "Brian", "Ronald", "Anthony", "Kevin", "Jason", "Matthew", "Gary", "Timothy",
    "Jose", "Larry", "Jeffrey", "Frank", "Scott", "Eric", "Mary", "Patricia", "Linda",
    "Barbara", "Elizabeth", "Jennifer", "Maria", "Susan", "Margaret", "Dorothy", "Lisa",
    "Nancy", "Karen", "Betty", "Helen", "Sandra", "Donna", "Carol", "Ruth", "Sharon",
    "Michelle", "Laura", "Sarah", "Kimberly", "Deborah", "Jessica", "Shirley", "Cynthia",
    "Angela", "Melissa", "Brenda", "Amy", "Anna",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Miller", "Davis", "Garcia", "Rodriguez",
    "Wilson", "Martinez", "Anderson", "Taylor", "Thomas", "Hernandez", "Moore", "Martin",
    "Jackson", "Thompson", "White", "Lopez", "Lee", "Gonzalez", "Harris", "Clark", "Lewis",
    "Robinson", "Walker", "Perez", "Hall", "Young", "Allen",
];

const CFIRST_NAMES: &[&str] = &[
    "王", "李", "张", "刘", "陈", "杨", "赵", "黄", "周", "吴", "徐", "孙", "胡", "朱", "高",
    "林", "何", "郭", "马", "罗",
];

const CLAST_NAMES: &[&str] = &[
    "伟", "芳", "娜", "秀英", "敏", "静", "丽", "强", "磊", "军", "洋", "勇", "艳", "杰", "娟",
    "涛", "明", "超", "秀兰", "霞", "平", "刚", "桂英",
];

const PROTOCOLS: &[&str] = &[
    "http", "ftp", "gopher", "mailto", "mid", "cid", "news", "nntp", "prospero", "telnet",
    "rlogin", "tn3270", "wais",
];

const TLDS: &[&str] = &[
    "com", "net", "org", "edu", "gov", "int", "mil", "cn", "com.cn", "net.cn", "gov.cn",
    "org.cn", "io", "dev",
];

const REGIONS: &[&str] = &["东北", "华北", "华东", "华中", "华南", "西南", "西北"];

/// Province → cities → counties, plus the six-digit area code of the
/// province capital (used for ID numbers).
const AREAS: &[(&str, &str, &[(&str, &[&str])])] = &[
    ("北京市", "110101", &[("北京市", &["东城区", "西城区", "朝阳区", "海淀区"])]),
    ("上海市", "310101", &[("上海市", &["黄浦区", "徐汇区", "长宁区", "浦东新区"])]),
    (
        "广东省",
        "440103",
        &[
            ("广州市", &["越秀区", "海珠区", "天河区", "白云区"]),
            ("深圳市", &["罗湖区", "福田区", "南山区", "宝安区"]),
        ],
    ),
    (
        "浙江省",
        "330102",
        &[
            ("杭州市", &["上城区", "拱墅区", "西湖区", "滨江区"]),
            ("宁波市", &["海曙区", "江北区", "鄞州区"]),
        ],
    ),
    (
        "江苏省",
        "320102",
        &[
            ("南京市", &["玄武区", "秦淮区", "鼓楼区", "建邺区"]),
            ("苏州市", &["姑苏区", "虎丘区", "吴中区"]),
        ],
    ),
    (
        "四川省",
        "510104",
        &[("成都市", &["锦江区", "青羊区", "金牛区", "武侯区"])],
    ),
    (
        "湖北省",
        "420102",
        &[("武汉市", &["江岸区", "江汉区", "武昌区", "洪山区"])],
    ),
];

const IMAGE_SIZES: &[&str] = &[
    "300x250", "250x250", "240x400", "336x280", "180x150", "720x300", "468x60", "234x60",
    "88x31", "120x90", "120x60", "120x240", "125x125", "728x90", "160x600", "120x600", "300x600",
];

const ID_WEIGHTS: [u32; 17] = [7, 9, 10, 5, 8, 4, 2, 1, 6, 3, 7, 9, 10, 5, 8, 4, 2];
const ID_CHECK: &[u8] = b"10X98765432";

/// Call a generator by name. Returns `None` for unknown names.
pub(super) fn call<R: Rng>(
    name: &str,
    args: &[Value],
    rng: &mut R,
    increment: &AtomicI64,
) -> Option<Value> {
    let value = match name.to_lowercase().as_str() {
        // basic
        "boolean" | "bool" => Value::Bool(boolean(args, rng)),
        "natural" => json!(integer(rng, int(args, 0).unwrap_or(0), int(args, 1).unwrap_or(MAX_SAFE_INTEGER))),
        "integer" => json!(integer(
            rng,
            int(args, 0).unwrap_or(-MAX_SAFE_INTEGER),
            int(args, 1).unwrap_or(MAX_SAFE_INTEGER)
        )),
        "float" => float(args, rng),
        "character" => Value::String(character(text(args, 0), rng).to_string()),
        "string" => Value::String(string(args, rng)),
        "range" => range(args),

        // date
        "date" => Value::String(format_date(&random_date(rng), text(args, 0).unwrap_or("yyyy-MM-dd"))),
        "time" => Value::String(format_date(&random_date(rng), text(args, 0).unwrap_or("HH:mm:ss"))),
        "datetime" => Value::String(format_date(
            &random_date(rng),
            text(args, 0).unwrap_or("yyyy-MM-dd HH:mm:ss"),
        )),
        "now" => Value::String(now(args)),

        // image
        "image" | "img" => Value::String(image(args, rng)),
        "dataimage" => Value::String(data_image(args, rng)),

        // color
        "color" | "hex" => Value::String(hex_color(rng)),
        "rgb" => Value::String(format!(
            "rgb({}, {}, {})",
            rng.gen_range(0..=255),
            rng.gen_range(0..=255),
            rng.gen_range(0..=255)
        )),
        "rgba" => Value::String(format!(
            "rgba({}, {}, {}, {:.2})",
            rng.gen_range(0..=255),
            rng.gen_range(0..=255),
            rng.gen_range(0..=255),
            rng.gen_range(0.0..=1.0f64)
        )),
        "hsl" => Value::String(format!(
            "hsl({}, {}, {})",
            rng.gen_range(0..360),
            rng.gen_range(0..=100),
            rng.gen_range(0..=100)
        )),

        // text
        "word" => {
            let len = length(args, 0, rng, 3, 10);
            Value::String(word(rng, len))
        }
        "sentence" => {
            let len = length(args, 0, rng, 12, 18);
            Value::String(sentence(rng, len))
        }
        "paragraph" => {
            let count = length(args, 0, rng, 3, 7);
            let sentences: Vec<String> = (0..count).map(|_| any_sentence(rng)).collect();
            Value::String(sentences.join(" "))
        }
        "title" => {
            let count = length(args, 0, rng, 3, 7);
            let words: Vec<String> = (0..count).map(|_| capitalize(&any_word(rng))).collect();
            Value::String(words.join(" "))
        }
        "cword" => Value::String(cword(args, rng)),
        "csentence" => {
            let len = length(args, 0, rng, 12, 18);
            Value::String(csentence(rng, len))
        }
        "cparagraph" => {
            let count = length(args, 0, rng, 3, 7);
            let sentences: Vec<String> = (0..count)
                .map(|_| {
                    let len = rng.gen_range(12..=18);
                    csentence(rng, len)
                })
                .collect();
            Value::String(sentences.concat())
        }
        "ctitle" => {
            let len = length(args, 0, rng, 3, 7);
            Value::String(hanzi(rng, len))
        }

        // name
        "first" => Value::String(pick_str(FIRST_NAMES, rng).to_string()),
        "last" => Value::String(pick_str(LAST_NAMES, rng).to_string()),
        "name" => {
            let mut parts = vec![pick_str(FIRST_NAMES, rng)];
            if flag(args, 0) {
                parts.push(pick_str(FIRST_NAMES, rng));
            }
            parts.push(pick_str(LAST_NAMES, rng));
            Value::String(parts.join(" "))
        }
        "cfirst" => Value::String(pick_str(CFIRST_NAMES, rng).to_string()),
        "clast" => Value::String(pick_str(CLAST_NAMES, rng).to_string()),
        "cname" => Value::String(format!("{}{}", pick_str(CFIRST_NAMES, rng), pick_str(CLAST_NAMES, rng))),

        // web
        "protocol" => Value::String(pick_str(PROTOCOLS, rng).to_string()),
        "tld" => Value::String(pick_str(TLDS, rng).to_string()),
        "domain" => Value::String(domain(text(args, 0), rng)),
        "url" => {
            let protocol = text(args, 0).map(str::to_string).unwrap_or_else(|| pick_str(PROTOCOLS, rng).to_string());
            let host = text(args, 1).map(str::to_string).unwrap_or_else(|| domain(None, rng));
            Value::String(format!("{}://{}/{}", protocol, host, any_word(rng)))
        }
        "email" => {
            let host = text(args, 0).map(str::to_string).unwrap_or_else(|| domain(None, rng));
            let local = format!("{}.{}", character(Some("lower"), rng), any_word(rng));
            Value::String(format!("{}@{}", local, host))
        }
        "ip" => Value::String(format!(
            "{}.{}.{}.{}",
            rng.gen_range(0..=255),
            rng.gen_range(0..=255),
            rng.gen_range(0..=255),
            rng.gen_range(0..=255)
        )),

        // address
        "region" => Value::String(pick_str(REGIONS, rng).to_string()),
        "province" => Value::String(random_area(rng).0.to_string()),
        "city" => {
            let (province, city, _) = random_area(rng);
            Value::String(if flag(args, 0) { format!("{} {}", province, city) } else { city.to_string() })
        }
        "county" => {
            let (province, city, county) = random_area(rng);
            Value::String(if flag(args, 0) {
                format!("{} {} {}", province, city, county)
            } else {
                county.to_string()
            })
        }
        "zip" => {
            let len = int(args, 0).unwrap_or(6).clamp(0, 64) as usize;
            Value::String((0..len).map(|_| character(Some("number"), rng)).collect())
        }

        // helper
        "capitalize" => Value::String(capitalize(text(args, 0).unwrap_or_default())),
        "upper" => Value::String(text(args, 0).unwrap_or_default().to_uppercase()),
        "lower" => Value::String(text(args, 0).unwrap_or_default().to_lowercase()),
        "pick" => pick(args, rng),
        "shuffle" => {
            let mut items = list(args);
            items.shuffle(rng);
            Value::Array(items)
        }

        // misc
        "guid" | "uuid" => Value::String(guid(rng)),
        "id" => Value::String(id_number(rng)),
        "increment" => {
            let step = int(args, 0).unwrap_or(1);
            json!(increment.fetch_add(step, Ordering::Relaxed).wrapping_add(step))
        }

        _ => return None,
    };
    Some(value)
}

fn int(args: &[Value], i: usize) -> Option<i64> {
    match args.get(i)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(args: &[Value], i: usize) -> Option<&str> {
    args.get(i).and_then(Value::as_str)
}

fn flag(args: &[Value], i: usize) -> bool {
    match args.get(i) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

/// Uniform integer in `[min, max]`, tolerating reversed bounds.
fn integer<R: Rng>(rng: &mut R, min: i64, max: i64) -> i64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    rng.gen_range(lo..=hi)
}

/// Length from `(len)` or `(min, max)` arguments starting at `at`.
fn length<R: Rng>(args: &[Value], at: usize, rng: &mut R, min: i64, max: i64) -> usize {
    let len = match (int(args, at), int(args, at + 1)) {
        (Some(lo), Some(hi)) => integer(rng, lo, hi),
        (Some(len), None) => len,
        _ => integer(rng, min, max),
    };
    len.clamp(0, MAX_RANGE_LEN) as usize
}

fn pick_str<'a, R: Rng>(pool: &[&'a str], rng: &mut R) -> &'a str {
    pool.choose(rng).copied().unwrap_or_default()
}

fn boolean<R: Rng>(args: &[Value], rng: &mut R) -> bool {
    match args.get(2) {
        Some(Value::Bool(current)) => biased_bool(
            rng,
            int(args, 0).unwrap_or(1),
            int(args, 1).unwrap_or(1),
            *current,
        ),
        _ => rng.gen_bool(0.5),
    }
}

/// `current` with probability `min / (min + max)`, otherwise its negation.
pub(super) fn biased_bool<R: Rng>(rng: &mut R, min: i64, max: i64, current: bool) -> bool {
    let total = min.saturating_add(max);
    if total <= 0 {
        return current;
    }
    if rng.gen::<f64>() > min as f64 / total as f64 {
        !current
    } else {
        current
    }
}

fn float<R: Rng>(args: &[Value], rng: &mut R) -> Value {
    let whole = integer(
        rng,
        int(args, 0).unwrap_or(-MAX_SAFE_INTEGER),
        int(args, 1).unwrap_or(MAX_SAFE_INTEGER),
    );
    let dmin = int(args, 2).unwrap_or(0).clamp(0, 17);
    let dmax = int(args, 3).unwrap_or(17).clamp(0, 17);
    let digits = integer(rng, dmin, dmax.max(dmin)) as usize;
    let text = format!("{}.{}", whole, decimal_digits(rng, "", digits));
    number_from_text(&text)
}

/// Pad `existing` fractional digits to `count` with random digits; the
/// last digit is never zero so the value keeps its precision.
pub(super) fn decimal_digits<R: Rng>(rng: &mut R, existing: &str, count: usize) -> String {
    let mut digits: String = existing.chars().take(count).collect();
    while digits.len() < count {
        let pool = if digits.len() + 1 < count { NUMBER } else { "123456789" };
        digits.push(character(Some(pool), rng));
    }
    digits
}

pub(super) fn number_from_text(text: &str) -> Value {
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// One character from a named pool (`lower`, `upper`, `number`,
/// `symbol`, `alpha`) or from a custom pool string.
fn character<R: Rng>(pool: Option<&str>, rng: &mut R) -> char {
    let chars: Vec<char> = match pool.map(str::to_lowercase).as_deref() {
        Some("lower") => LOWER.chars().collect(),
        Some("upper") => UPPER.chars().collect(),
        Some("number") => NUMBER.chars().collect(),
        Some("symbol") => SYMBOL.chars().collect(),
        Some("alpha") => LOWER.chars().chain(UPPER.chars()).collect(),
        Some(custom) if !custom.is_empty() => pool.unwrap_or_default().chars().collect(),
        _ => [LOWER, UPPER, NUMBER, SYMBOL].concat().chars().collect(),
    };
    chars.choose(rng).copied().unwrap_or('a')
}

pub(super) fn random_string<R: Rng>(rng: &mut R, pool: Option<&str>, len: usize) -> String {
    (0..len).map(|_| character(pool, rng)).collect()
}

fn string<R: Rng>(args: &[Value], rng: &mut R) -> String {
    let (pool, len) = match args {
        [] => (None, integer(rng, 3, 7)),
        [len] => (None, int(std::slice::from_ref(len), 0).unwrap_or(5)),
        [Value::String(pool), _] if int(args, 0).is_none() => (Some(pool.as_str()), int(args, 1).unwrap_or(5)),
        [_, _] => (None, integer(rng, int(args, 0).unwrap_or(3), int(args, 1).unwrap_or(7))),
        _ => (
            text(args, 0),
            integer(rng, int(args, 1).unwrap_or(3), int(args, 2).unwrap_or(7)),
        ),
    };
    random_string(rng, pool, len.clamp(0, MAX_RANGE_LEN) as usize)
}

fn range(args: &[Value]) -> Value {
    let (start, stop) = match (int(args, 0), int(args, 1)) {
        (Some(start), Some(stop)) => (start, stop),
        (Some(stop), None) => (0, stop),
        _ => (0, 0),
    };
    let step = int(args, 2).filter(|s| *s > 0).unwrap_or(1);
    let values: Vec<Value> = (0i64..)
        .map_while(|i| i.checked_mul(step).and_then(|offset| start.checked_add(offset)))
        .take_while(|v| *v < stop)
        .take(MAX_RANGE_LEN as usize)
        .map(Value::from)
        .collect();
    Value::Array(values)
}

fn random_date<R: Rng>(rng: &mut R) -> DateTime<Local> {
    let now = Local::now();
    let millis = rng.gen_range(0..=now.timestamp_millis().max(0));
    Local.timestamp_millis_opt(millis).single().unwrap_or(now)
}

const NOW_UNITS: &[&str] = &["year", "month", "week", "day", "hour", "minute", "second"];

fn now(args: &[Value]) -> String {
    let (unit, format) = match text(args, 0) {
        Some(first) if NOW_UNITS.contains(&first.to_lowercase().as_str()) => {
            (Some(first.to_lowercase()), text(args, 1))
        }
        Some(first) => (None, Some(first)),
        None => (None, None),
    };
    let now = Local::now();
    let date = unit
        .and_then(|u| truncate(&now, &u))
        .unwrap_or(now);
    format_date(&date, format.unwrap_or("yyyy-MM-dd HH:mm:ss"))
}

/// Start of the current `unit` (weeks start on Sunday).
fn truncate(now: &DateTime<Local>, unit: &str) -> Option<DateTime<Local>> {
    let date = now.date_naive();
    let naive = match unit {
        "year" => NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
        "month" => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.and_hms_opt(0, 0, 0)?,
        "week" => {
            let back = i64::from(date.weekday().num_days_from_sunday());
            (date - chrono::Duration::days(back)).and_hms_opt(0, 0, 0)?
        }
        "day" => date.and_hms_opt(0, 0, 0)?,
        "hour" => date.and_hms_opt(now.hour(), 0, 0)?,
        "minute" => date.and_hms_opt(now.hour(), now.minute(), 0)?,
        "second" => date.and_hms_opt(now.hour(), now.minute(), now.second())?,
        _ => return None,
    };
    Local.from_local_datetime(&naive).single()
}

const DATE_TOKENS: &[&str] = &[
    "yyyy", "yy", "y", "MM", "M", "dd", "d", "HH", "H", "hh", "h", "mm", "m", "ss", "s", "SS",
    "S", "A", "a", "T",
];

/// Format with Mock.js date tokens (`yyyy-MM-dd HH:mm:ss`, `T` for epoch
/// milliseconds). Unknown characters are copied through.
pub(super) fn format_date(date: &DateTime<Local>, format: &str) -> String {
    let millis = date.nanosecond() / 1_000_000 % 1000;
    let hour12 = match date.hour() % 12 {
        0 => 12,
        h => h,
    };
    let mut out = String::new();
    let mut rest = format;
    while let Some(ch) = rest.chars().next() {
        match DATE_TOKENS.iter().find(|token| rest.starts_with(**token)) {
            Some(token) => {
                let piece = match *token {
                    "yyyy" | "y" => date.year().to_string(),
                    "yy" => format!("{:02}", date.year() % 100),
                    "MM" => format!("{:02}", date.month()),
                    "M" => date.month().to_string(),
                    "dd" => format!("{:02}", date.day()),
                    "d" => date.day().to_string(),
                    "HH" => format!("{:02}", date.hour()),
                    "H" => date.hour().to_string(),
                    "hh" => format!("{:02}", hour12),
                    "h" => hour12.to_string(),
                    "mm" => format!("{:02}", date.minute()),
                    "m" => date.minute().to_string(),
                    "ss" => format!("{:02}", date.second()),
                    "s" => date.second().to_string(),
                    "SS" => format!("{:03}", millis),
                    "S" => millis.to_string(),
                    "A" => (if date.hour() < 12 { "AM" } else { "PM" }).to_string(),
                    "a" => (if date.hour() < 12 { "am" } else { "pm" }).to_string(),
                    _ => date.timestamp_millis().to_string(),
                };
                out.push_str(&piece);
                rest = &rest[token.len()..];
            }
            None => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    out
}

fn hex_color<R: Rng>(rng: &mut R) -> String {
    format!("#{:06x}", rng.gen_range(0..=0xff_ffffu32))
}

fn image<R: Rng>(args: &[Value], rng: &mut R) -> String {
    let size = text(args, 0)
        .map(str::to_string)
        .unwrap_or_else(|| pick_str(IMAGE_SIZES, rng).to_string());
    let mut url = format!("http://dummyimage.com/{}", size);
    if let Some(background) = text(args, 1) {
        url.push('/');
        url.push_str(background.trim_start_matches('#'));
    }
    if let Some(foreground) = text(args, 2) {
        url.push('/');
        url.push_str(foreground.trim_start_matches('#'));
    }
    if let Some(format) = text(args, 3) {
        url.push('.');
        url.push_str(format);
    }
    if let Some(label) = text(args, 4) {
        url.push_str("&text=");
        url.push_str(&urlencoding::encode(label));
    }
    url
}

/// An SVG placeholder image as a base64 data URI.
fn data_image<R: Rng>(args: &[Value], rng: &mut R) -> String {
    let size = text(args, 0)
        .map(str::to_string)
        .unwrap_or_else(|| pick_str(IMAGE_SIZES, rng).to_string());
    let (width, height) = size.split_once('x').unwrap_or(("100", "100"));
    let label = text(args, 1).unwrap_or(&size);
    let svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}"><rect width="100%" height="100%" fill="{fill}"/><text x="50%" y="50%" dominant-baseline="middle" text-anchor="middle" fill="#ffffff">{label}</text></svg>"##,
        w = width,
        h = height,
        fill = hex_color(rng),
        label = label,
    );
    format!(
        "data:image/svg+xml;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(svg)
    )
}

fn word<R: Rng>(rng: &mut R, len: usize) -> String {
    random_string(rng, Some("lower"), len)
}

/// A lowercase word of 3 to 10 letters.
fn any_word<R: Rng>(rng: &mut R) -> String {
    let len = rng.gen_range(3..=10);
    word(rng, len)
}

fn sentence<R: Rng>(rng: &mut R, words: usize) -> String {
    let words: Vec<String> = (0..words).map(|_| any_word(rng)).collect();
    format!("{}.", capitalize(&words.join(" ")))
}

fn any_sentence<R: Rng>(rng: &mut R) -> String {
    let len = rng.gen_range(12..=18);
    sentence(rng, len)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn hanzi<R: Rng>(rng: &mut R, len: usize) -> String {
    random_string(rng, Some(HANZI), len)
}

fn cword<R: Rng>(args: &[Value], rng: &mut R) -> String {
    match text(args, 0).filter(|pool| int(args, 0).is_none() && !pool.is_empty()) {
        Some(pool) => {
            let len = length(args, 1, rng, 1, 1);
            random_string(rng, Some(pool), len)
        }
        None => {
            let len = length(args, 0, rng, 1, 1);
            hanzi(rng, len)
        }
    }
}

fn csentence<R: Rng>(rng: &mut R, len: usize) -> String {
    format!("{}。", hanzi(rng, len))
}

fn domain<R: Rng>(tld: Option<&str>, rng: &mut R) -> String {
    let tld = tld.map(str::to_string).unwrap_or_else(|| pick_str(TLDS, rng).to_string());
    format!("{}.{}", any_word(rng), tld)
}

fn random_area<R: Rng>(rng: &mut R) -> (&'static str, &'static str, &'static str) {
    let (province, _, cities) = AREAS[rng.gen_range(0..AREAS.len())];
    let (city, counties) = cities[rng.gen_range(0..cities.len())];
    (province, city, pick_str(counties, rng))
}

/// Arguments as a list: a single array argument, or the arguments themselves.
fn list(args: &[Value]) -> Vec<Value> {
    match args.first() {
        Some(Value::Array(items)) => items.clone(),
        _ => args.to_vec(),
    }
}

fn pick<R: Rng>(args: &[Value], rng: &mut R) -> Value {
    match args.first() {
        Some(Value::Array(items)) if args.len() > 1 => {
            let count = integer(rng, int(args, 1).unwrap_or(1), int(args, 2).or(int(args, 1)).unwrap_or(1));
            let mut items = items.clone();
            items.shuffle(rng);
            items.truncate(count.max(0) as usize);
            Value::Array(items)
        }
        _ => list(args).choose(rng).cloned().unwrap_or(Value::Null),
    }
}

/// Random version-4 UUID.
fn guid<R: Rng>(rng: &mut R) -> String {
    format!(
        "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
        rng.gen::<u32>(),
        rng.gen::<u16>(),
        rng.gen::<u16>() & 0x0fff,
        (rng.gen::<u16>() & 0x3fff) | 0x8000,
        rng.gen::<u64>() & 0xffff_ffff_ffff,
    )
}

/// 18-character resident ID number: area code, birth date, sequence and
/// the ISO 7064 check character.
fn id_number<R: Rng>(rng: &mut R) -> String {
    let (_, area, _) = AREAS[rng.gen_range(0..AREAS.len())];
    let birth = format_date(&random_date(rng), "yyyyMMdd");
    let sequence = random_string(rng, Some(NUMBER), 3);
    let body = format!("{}{}{}", area, birth, sequence);
    let sum: u32 = body
        .chars()
        .zip(ID_WEIGHTS)
        .map(|(c, w)| c.to_digit(10).unwrap_or(0) * w)
        .sum();
    let check = char::from(ID_CHECK[(sum % 11) as usize]);
    format!("{}{}", body, check)
}
