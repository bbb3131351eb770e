//! Mock data expansion.
//!
//! Interprets the Mock.js template conventions: directive suffixes on
//! mapping keys (`list|1-10`, `id|+1`, `price|1-100.2`, `flag|1`) and
//! `@placeholder` tokens in string values. Pattern leaves are sampled.
//!
//! Expansion never fails. A key whose directive cannot be parsed is
//! emitted literally and a placeholder with no generator stays in the
//! output as written; both are reported as degradations. Repeat counts
//! above [`MAX_REPEAT`] are lowered to it and reported the same way.

mod placeholder;
mod random;

use crate::template::{Pattern, TemplateValue};
use rand::rngs::ThreadRng;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicI64;
use std::sync::LazyLock;
use tracing::debug;

/// `name|+step`, `name|min-max`, `name|count`, with an optional `.dmin-dmax`.
static RULE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)\|(?:\+(\d+)|([+-]?\d+-?[+-]?\d*)?(?:\.(\d+-?\d*))?)$")
        .expect("rule key regex is valid")
});

/// Largest repeat count honored for strings, patterns, sequences and
/// mapping subsets.
pub const MAX_REPEAT: usize = random::MAX_RANGE_LEN as usize;

static RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?\d+)-?([+-]?\d+)?$").expect("range regex is valid")
});

/// Result of expanding a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub value: Value,
    /// Directives and placeholders that were emitted literally.
    pub degraded: Vec<String>,
}

/// Expands templates into concrete JSON values.
///
/// Stateless across calls except for the `@increment` counter, which keeps
/// counting for the lifetime of the expander.
#[derive(Debug, Default)]
pub struct MockExpander {
    increment: AtomicI64,
}

impl MockExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand a template into a concrete value.
    pub fn expand(&self, template: &TemplateValue) -> Value {
        self.expand_reporting(template).value
    }

    /// Expand a template, also returning what could not be interpreted.
    pub fn expand_reporting(&self, template: &TemplateValue) -> Expansion {
        // `+step` directives advance numbers inside the working copy.
        let mut working = template.clone();
        let mut generator = Generator {
            rng: rand::thread_rng(),
            increment: &self.increment,
            frames: Vec::new(),
            order: HashMap::new(),
            degraded: Vec::new(),
        };
        let value = generator.generate(&mut working, None);
        Expansion {
            value,
            degraded: generator.degraded,
        }
    }
}

/// A parsed key directive.
#[derive(Debug, Clone, Default, PartialEq)]
struct Rule {
    min: Option<i64>,
    max: Option<i64>,
    /// Drawn from `min..=max`, or `min` when no max is given.
    count: Option<i64>,
    step: Option<i64>,
    /// Number of decimal places, drawn from the `.dmin-dmax` part.
    decimals: Option<usize>,
}

impl Rule {
    fn has_range(&self) -> bool {
        self.min.is_some()
    }
}

enum KeyRule<'k> {
    Plain(&'k str),
    Directive(&'k str, Rule),
    Unrecognized,
}

fn parse_key<'k, R: Rng>(key: &'k str, rng: &mut R) -> KeyRule<'k> {
    if !key.contains('|') {
        return KeyRule::Plain(key);
    }
    let Some(caps) = RULE_KEY.captures(key) else {
        return KeyRule::Unrecognized;
    };
    let name = caps.get(1).map_or(key, |m| m.as_str());
    let mut rule = Rule::default();

    if let Some(step) = caps.get(2) {
        match step.as_str().parse() {
            Ok(step) => rule.step = Some(step),
            Err(_) => return KeyRule::Unrecognized,
        }
    }

    if let Some(range) = caps.get(3) {
        let Some((min, max)) = parse_range(range.as_str()) else {
            return KeyRule::Unrecognized;
        };
        rule.min = Some(min);
        rule.max = max;
        rule.count = Some(match max {
            Some(max) => draw(rng, min, max),
            None => min,
        });
    }

    if let Some(decimal) = caps.get(4) {
        let Some((dmin, dmax)) = parse_range(decimal.as_str()) else {
            return KeyRule::Unrecognized;
        };
        let places = match dmax {
            Some(dmax) => draw(rng, dmin, dmax),
            None => dmin,
        };
        rule.decimals = Some(places.clamp(0, 17) as usize);
    }

    KeyRule::Directive(name, rule)
}

fn parse_range(text: &str) -> Option<(i64, Option<i64>)> {
    let caps = RANGE.captures(text)?;
    let min = caps.get(1)?.as_str().parse().ok()?;
    let max = match caps.get(2) {
        Some(m) => Some(m.as_str().parse().ok()?),
        None => None,
    };
    Some((min, max))
}

fn draw<R: Rng>(rng: &mut R, a: i64, b: i64) -> i64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    rng.gen_range(lo..=hi)
}

/// Sibling context of the mapping currently being generated, used to
/// resolve `@key` references to other properties.
struct Frame {
    template: Vec<(String, TemplateValue)>,
    /// Properties already written to the output, by output name.
    generated: HashMap<String, Value>,
    /// Properties generated ahead of their turn, by raw key.
    resolved: HashMap<String, Value>,
    resolving: HashSet<String>,
}

struct Generator<'a> {
    rng: ThreadRng,
    increment: &'a AtomicI64,
    frames: Vec<Frame>,
    /// Next index for `list|+step` sequences, keyed by sequence identity.
    order: HashMap<usize, usize>,
    degraded: Vec<String>,
}

impl Generator<'_> {
    fn generate(&mut self, value: &mut TemplateValue, rule: Option<&Rule>) -> Value {
        match value {
            TemplateValue::Null => Value::Null,
            TemplateValue::Bool(current) => self.gen_bool(*current, rule),
            TemplateValue::Number(n) => self.gen_number(n, rule),
            TemplateValue::String(s) => self.gen_string(s, rule),
            TemplateValue::Pattern(p) => self.gen_pattern(p, rule),
            TemplateValue::Sequence(items) => self.gen_sequence(items, rule),
            TemplateValue::Mapping(entries) => self.gen_mapping(entries, rule),
        }
    }

    fn degrade(&mut self, what: &str) {
        debug!(directive = %what, "Emitting uninterpreted template directive literally");
        self.degraded.push(what.to_string());
    }

    /// The rule's count as a repeat count, capped at [`MAX_REPEAT`].
    fn repeat_count(&mut self, rule: Option<&Rule>) -> Option<usize> {
        let count = rule.and_then(|r| r.count)?.max(0);
        match usize::try_from(count) {
            Ok(count) if count <= MAX_REPEAT => Some(count),
            _ => {
                self.degrade(&format!("|{}", count));
                Some(MAX_REPEAT)
            }
        }
    }

    fn gen_bool(&mut self, current: bool, rule: Option<&Rule>) -> Value {
        match rule.filter(|r| r.has_range()) {
            Some(rule) => Value::Bool(random::biased_bool(
                &mut self.rng,
                rule.min.unwrap_or(1),
                rule.max.unwrap_or(1),
                current,
            )),
            None => Value::Bool(current),
        }
    }

    fn gen_number(&mut self, n: &Number, rule: Option<&Rule>) -> Value {
        let Some(rule) = rule else {
            return Value::Number(n.clone());
        };

        if let Some(places) = rule.decimals {
            let text = n.to_string();
            let (whole, fraction) = text.split_once('.').unwrap_or((&text, ""));
            let whole = match rule.count {
                Some(count) => count.to_string(),
                None => whole.to_string(),
            };
            let digits = random::decimal_digits(&mut self.rng, fraction, places);
            if digits.is_empty() {
                if let Ok(whole) = whole.parse::<i64>() {
                    return Value::from(whole);
                }
            }
            return random::number_from_text(&format!("{}.{}", whole, digits));
        }

        match rule.count {
            Some(count) if rule.step.is_none() => Value::from(count),
            _ => Value::Number(n.clone()),
        }
    }

    fn gen_string(&mut self, template: &str, rule: Option<&Rule>) -> Value {
        let text = match self.repeat_count(rule) {
            Some(count) if template.is_empty() => {
                return Value::String(random::random_string(&mut self.rng, None, count));
            }
            Some(count) => template.repeat(count),
            None => template.to_string(),
        };
        self.substitute(&text)
    }

    fn gen_pattern(&mut self, pattern: &Pattern, rule: Option<&Rule>) -> Value {
        match self.repeat_count(rule) {
            Some(count) => match pattern.repeated(count) {
                Some(repeated) => Value::String(repeated.sample(&mut self.rng)),
                None => {
                    self.degrade(&pattern.literal());
                    Value::String(pattern.sample(&mut self.rng))
                }
            },
            None => Value::String(pattern.sample(&mut self.rng)),
        }
    }

    fn gen_sequence(&mut self, items: &mut [TemplateValue], rule: Option<&Rule>) -> Value {
        let Some(rule) = rule else {
            return Value::Array(items.iter_mut().map(|item| self.generate(item, None)).collect());
        };
        if items.is_empty() {
            return Value::Array(Vec::new());
        }

        if let Some(step) = rule.step {
            // Pick the next element in order, advancing by `step` each time
            // this sequence is generated.
            let slot = self.order.entry(items.as_ptr() as usize).or_insert(0);
            let idx = *slot % items.len();
            *slot = slot.saturating_add(usize::try_from(step).unwrap_or(0));
            return self.generate(&mut items[idx], None);
        }

        if rule.min == Some(1) && rule.max.is_none() {
            let idx = self.rng.gen_range(0..items.len());
            return self.generate(&mut items[idx], None);
        }

        let times = self.repeat_count(Some(rule)).unwrap_or(1);
        let mut out = Vec::with_capacity(times.saturating_mul(items.len()).min(MAX_REPEAT));
        for _ in 0..times {
            for item in items.iter_mut() {
                out.push(self.generate(item, None));
            }
        }
        Value::Array(out)
    }

    fn gen_mapping(&mut self, entries: &mut [(String, TemplateValue)], rule: Option<&Rule>) -> Value {
        let mut order: Vec<usize> = (0..entries.len()).collect();
        if let Some(count) = self.repeat_count(rule) {
            order.shuffle(&mut self.rng);
            order.truncate(count);
        }

        self.frames.push(Frame {
            template: entries.to_vec(),
            generated: HashMap::new(),
            resolved: HashMap::new(),
            resolving: HashSet::new(),
        });

        let mut out = Map::new();
        for idx in order {
            let (raw_key, template) = &mut entries[idx];
            let (name, rule) = match parse_key(raw_key, &mut self.rng) {
                KeyRule::Plain(name) => (name.to_string(), None),
                KeyRule::Directive(name, rule) => (name.to_string(), Some(rule)),
                KeyRule::Unrecognized => {
                    self.degrade(raw_key);
                    (raw_key.clone(), None)
                }
            };

            let already = self
                .frames
                .last_mut()
                .and_then(|frame| frame.resolved.remove(raw_key.as_str()));
            let value = match already {
                Some(value) => value,
                None => self.generate(template, rule.as_ref()),
            };
            if let Some(frame) = self.frames.last_mut() {
                frame.generated.insert(name.clone(), value.clone());
            }
            out.insert(name, value);

            if let (Some(step), TemplateValue::Number(n)) =
                (rule.as_ref().and_then(|r| r.step), &mut *template)
            {
                *n = advance(n, step);
            }
        }

        self.frames.pop();
        Value::Object(out)
    }

    /// Replace placeholders in `text`. A string that is exactly one
    /// placeholder takes the generated value's own type.
    fn substitute(&mut self, text: &str) -> Value {
        let tokens = placeholder::scan(text);
        if tokens.is_empty() {
            return Value::String(text.to_string());
        }

        if let [token] = tokens.as_slice() {
            if !token.escaped && token.raw == text {
                return self
                    .resolve(token.name, &token.args, token.raw)
                    .unwrap_or_else(|| Value::String(text.to_string()));
            }
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for token in &tokens {
            out.push_str(&text[last..token.start]);
            if token.escaped {
                out.push_str(&token.raw[1..]);
            } else {
                match self.resolve(token.name, &token.args, token.raw) {
                    Some(Value::String(s)) => out.push_str(&s),
                    Some(other) => out.push_str(&other.to_string()),
                    None => out.push_str(token.raw),
                }
            }
            last = token.end;
        }
        out.push_str(&text[last..]);
        Value::String(out)
    }

    /// Resolve a placeholder: a sibling property first, then the generator
    /// library. `None` means it stays literal.
    fn resolve(&mut self, name: &str, args: &[Value], raw: &str) -> Option<Value> {
        if let Some(value) = self.resolve_sibling(name, raw) {
            return Some(value);
        }
        match random::call(name, args, &mut self.rng, self.increment) {
            Some(value) => Some(value),
            None => {
                self.degrade(raw);
                None
            }
        }
    }

    fn resolve_sibling(&mut self, name: &str, raw: &str) -> Option<Value> {
        let frame = self.frames.last()?;
        if let Some(value) = frame.generated.get(name).or_else(|| frame.resolved.get(name)) {
            return Some(value.clone());
        }
        if frame.resolving.contains(name) {
            return None;
        }
        let (key, template) = frame.template.iter().find(|(k, _)| k == name)?;
        if template.as_str() == Some(raw) {
            return None;
        }

        let key = key.clone();
        let mut template = template.clone();
        let rule = match parse_key(&key, &mut self.rng) {
            KeyRule::Directive(_, rule) => Some(rule),
            _ => None,
        };

        self.frames.last_mut()?.resolving.insert(key.clone());
        let value = self.generate(&mut template, rule.as_ref());
        let frame = self.frames.last_mut()?;
        frame.resolving.remove(&key);
        frame.resolved.insert(key, value.clone());
        Some(value)
    }
}

/// `n + step`, staying integral when `n` is.
fn advance(n: &Number, step: i64) -> Number {
    if let Some(i) = n.as_i64() {
        return Number::from(i.saturating_add(step));
    }
    n.as_f64()
        .and_then(|f| Number::from_f64(f + step as f64))
        .unwrap_or_else(|| n.clone())
}
