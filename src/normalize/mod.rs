//! Record Normalizer — converts the oracle's inconsistently shaped
//! `attributes`/`relationships` output into canonical records.
//!
//! Shapes are tried in priority order, each detector independent of the rest:
//! 1. Degenerate/empty — empty sequence, bare field-name tokens, explicit
//!    `none`/`null`/`无` markers → `[]`.
//! 2. Already-structured — a sequence of key/value objects → alias-map and
//!    default-fill.
//! 3. Serialized single record — one bracketed string (single- or
//!    double-quoted) → structural parse, falling back to key/value scanning.
//! 4. One-record-per-string — each string encodes one full record.
//! 5. Flattened key/value tokens — one pair per string; a reappearing
//!    `relation` key opens a new record.
//! 6. Informal triple — `"source - relation - target"`.
//!
//! This routine never errors: unparseable fragments are dropped and counted
//! for the caller to log.

use std::collections::HashSet;

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::graph::{NormalizedAttribute, NormalizedRelation};

/// Canonical relationship field names.
const ALLOWED_KEYS: [&str; 5] = [
    "relation",
    "target_name",
    "target_type",
    "target_description",
    "relation_description",
];

/// Markers that mean "no records" when they are the sole element.
const EMPTY_MARKERS: [&str; 4] = ["none", "null", "无", "relationships"];

static KEY_RE: OnceLock<Regex> = OnceLock::new();
static ATTR_KV_RE: OnceLock<Regex> = OnceLock::new();
static ATTR_ALT_RE: OnceLock<Regex> = OnceLock::new();

fn key_re() -> &'static Regex {
    // relation_description before relation so the longer key wins.
    KEY_RE.get_or_init(|| {
        Regex::new(
            r"\b(relation_description|target_description|target_name|target_type|relation)\b\s*[:：]",
        )
        .expect("static regex is valid")
    })
}

fn attr_kv_re() -> &'static Regex {
    ATTR_KV_RE.get_or_init(|| {
        Regex::new(r"^\s*key\s*[:：]\s*(.+?)\s*[,，]\s*value\s*[:：]\s*(.+?)\s*$")
            .expect("static regex is valid")
    })
}

fn attr_alt_re() -> &'static Regex {
    // "key = x | value = y", "key -> x / value -> y" and similar.
    ATTR_ALT_RE.get_or_init(|| {
        Regex::new(r"^\s*key\s*[:=>-]+\s*(.+?)\s+[|/,&，]\s*value\s*[:=>-]+\s*(.+)")
            .expect("static regex is valid")
    })
}

/// Result of normalizing one relationships field: canonical records plus the
/// number of fragments that matched no grammar rule.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RelationOutcome {
    pub records: Vec<NormalizedRelation>,
    pub dropped: usize,
}

// ── String helpers ────────────────────────────────────────────────────────────

/// Strip one matching pair of surrounding quotes (`'`, `"`, `“”`, `‘’`).
fn strip_quotes(s: &str) -> String {
    let s = s.trim();
    let mut chars = s.chars();
    if let (Some(first), Some(last)) = (chars.next(), s.chars().last()) {
        if s.chars().count() >= 2 {
            let matched = matches!(
                (first, last),
                ('\'', '\'') | ('"', '"') | ('“', '”') | ('‘', '’')
            );
            if matched {
                let start = first.len_utf8();
                let end = s.len() - last.len_utf8();
                return s[start..end].trim().to_string();
            }
        }
    }
    s.to_string()
}

fn string_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// First non-empty value among `keys`, as a trimmed string.
fn field(m: &Map<String, Value>, keys: &[&str]) -> String {
    for key in keys {
        if let Some(v) = m.get(*key) {
            let s = string_of(v);
            if !s.is_empty() {
                return s;
            }
        }
    }
    String::new()
}

// ── Shape detectors ───────────────────────────────────────────────────────────

/// Scan a string for `key: value` pairs over the canonical relationship keys.
///
/// Values run to the next recognized key (or end of string); surrounding
/// quotes and trailing separators are stripped.
fn scan_kv_pairs(s: &str) -> Vec<(String, String)> {
    let positions: Vec<(usize, usize, &str)> = key_re()
        .captures_iter(s)
        .map(|c| {
            let whole = c.get(0).expect("match exists");
            (whole.start(), whole.end(), c.get(1).expect("group 1").as_str())
        })
        .collect();

    let mut pairs = Vec::with_capacity(positions.len());
    for (i, (_, value_start, key)) in positions.iter().enumerate() {
        let value_end = positions.get(i + 1).map(|p| p.0).unwrap_or(s.len());
        let raw = s[*value_start..value_end]
            .trim()
            .trim_end_matches(['，', ','])
            .trim();
        pairs.push((key.to_string(), strip_quotes(raw)));
    }
    pairs
}

/// Parse a string that looks like one serialized record.
///
/// Tries a structural JSON parse first (accepting single-quoted variants via
/// quote substitution), then falls back to key/value scanning. An empty map
/// means the string matched nothing.
fn parse_record_string(s: &str) -> Map<String, Value> {
    let t = s.trim();

    if t.starts_with('{') && t.ends_with('}') {
        if let Ok(Value::Object(m)) = serde_json::from_str::<Value>(t) {
            return m;
        }
        // Python-literal style: single-quoted keys and values.
        let swapped = t.replace(['“', '”'], "\"").replace('\'', "\"");
        if let Ok(Value::Object(m)) = serde_json::from_str::<Value>(&swapped) {
            return m;
        }
    }

    let inner = t.trim_start_matches('{').trim_end_matches('}');
    let mut m = Map::new();
    for (k, v) in scan_kv_pairs(inner) {
        m.insert(k, Value::String(v));
    }
    m
}

/// Reconstruct records from flattened key/value tokens: one pair per string,
/// a new record opened whenever a `relation` key reappears while other keys
/// are already populated.
fn parse_flat_kv_items(items: &[String]) -> (Vec<Map<String, Value>>, usize) {
    let mut records = Vec::new();
    let mut curr: Map<String, Value> = Map::new();
    let mut dropped = 0;

    fn flush(curr: &mut Map<String, Value>, records: &mut Vec<Map<String, Value>>) {
        if !curr.is_empty() {
            records.push(std::mem::take(curr));
        }
    }

    for item in items {
        let pairs = scan_kv_pairs(item);
        if pairs.is_empty() {
            // Crude fallback: a lone "key: value" the scanner did not catch.
            if let Some((key, value)) = item.split_once(':') {
                let key = key.trim();
                if ALLOWED_KEYS.contains(&key) {
                    if key == "relation" && curr.keys().any(|k| k != "relation") {
                        flush(&mut curr, &mut records);
                    }
                    curr.insert(key.to_string(), Value::String(strip_quotes(value)));
                } else {
                    dropped += 1;
                }
            } else {
                dropped += 1;
            }
            continue;
        }

        for (key, value) in pairs {
            if key == "relation" && curr.keys().any(|k| k != "relation") {
                flush(&mut curr, &mut records);
            }
            curr.insert(key, Value::String(value));
        }
    }
    flush(&mut curr, &mut records);

    (records, dropped)
}

/// Parse an informal triple `"source - relation - target"`. Only the relation
/// and target are recoverable.
fn parse_triple(s: &str) -> Option<Map<String, Value>> {
    let parts: Vec<&str> = s.split(" - ").map(str::trim).collect();
    if parts.len() >= 3 {
        let mut m = Map::new();
        m.insert("relation".to_string(), Value::String(parts[1].to_string()));
        m.insert("target_name".to_string(), Value::String(parts[2].to_string()));
        return Some(m);
    }
    None
}

fn is_triple_like(s: &str) -> bool {
    s.matches(" - ").count() >= 2
}

/// Degenerate inputs that explicitly mean "no records".
fn is_degenerate(items: &[Value]) -> bool {
    if items.len() == 1 {
        if let Value::String(s) = &items[0] {
            if EMPTY_MARKERS.contains(&s.trim().to_lowercase().as_str()) {
                return true;
            }
        }
    }
    !items.is_empty()
        && items.iter().all(|v| {
            matches!(v, Value::String(s) if ALLOWED_KEYS.contains(&s.trim()))
        })
}

// ── Record-level normalization ────────────────────────────────────────────────

/// Apply field aliases and defaults; fan out list-valued target names.
fn normalize_record(m: &Map<String, Value>) -> Vec<NormalizedRelation> {
    let relation = field(m, &["relation"]);
    let target_type = field(m, &["target_type", "type"]);
    let target_description = field(m, &["target_description", "description"]);
    let relation_description = field(m, &["relation_description"]);

    let targets: Vec<String> = match m.get("target_name") {
        Some(Value::Array(items)) if !items.is_empty() => items.iter().map(string_of).collect(),
        _ => vec![field(m, &["target_name", "name"])],
    };

    targets
        .into_iter()
        .map(|target_name| NormalizedRelation {
            relation: relation.clone(),
            target_name,
            target_type: target_type.clone(),
            target_description: target_description.clone(),
            relation_description: relation_description.clone(),
        })
        .collect()
}

// ── Public entry points ───────────────────────────────────────────────────────

/// Normalize a raw `relationships` field into canonical records.
///
/// Never errors; fragments matching no grammar rule are counted in
/// [`RelationOutcome::dropped`]. Output is deduplicated by the full 5-field
/// tuple, preserving first-seen order.
pub fn normalize_relationships(raw: &Value) -> RelationOutcome {
    let single;
    let items: &[Value] = match raw {
        Value::Array(items) => items,
        Value::Null => return RelationOutcome::default(),
        Value::String(_) | Value::Object(_) => {
            single = [raw.clone()];
            &single
        }
        _ => {
            return RelationOutcome {
                records: Vec::new(),
                dropped: 1,
            }
        }
    };

    if items.is_empty() || is_degenerate(items) {
        return RelationOutcome::default();
    }

    let mut raw_records: Vec<Map<String, Value>> = Vec::new();
    let mut dropped = 0usize;

    if items.iter().any(Value::is_object) {
        // Shape 2: structured records, possibly interleaved with serialized ones.
        for item in items {
            match item {
                Value::Object(m) if !m.is_empty() => raw_records.push(m.clone()),
                Value::String(s) => {
                    let m = parse_record_string(s);
                    if m.is_empty() {
                        dropped += 1;
                    } else {
                        raw_records.push(m);
                    }
                }
                _ => dropped += 1,
            }
        }
    } else {
        let strs: Vec<String> = items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();

        if strs.iter().all(|s| is_triple_like(s) || s.contains(':'))
            && strs.iter().any(|s| is_triple_like(s))
        {
            // Shape 6 (with shape-3 stragglers).
            for s in &strs {
                let parsed = if is_triple_like(s) {
                    parse_triple(s)
                } else {
                    Some(parse_record_string(s)).filter(|m| !m.is_empty())
                };
                match parsed {
                    Some(m) => raw_records.push(m),
                    None => dropped += 1,
                }
            }
        } else if strs.iter().any(|s| s.contains(':')) {
            // Shape 4 when every string parses as a whole record (>= 2 keys),
            // otherwise shape 5 (flattened pairs).
            let parsed: Vec<Map<String, Value>> =
                strs.iter().map(|s| parse_record_string(s)).collect();
            if parsed.iter().all(|m| m.len() >= 2) {
                raw_records.extend(parsed);
            } else {
                let (records, flat_dropped) = parse_flat_kv_items(&strs);
                raw_records.extend(records);
                dropped += flat_dropped;
            }
        } else {
            dropped += strs.len();
        }
    }

    let mut seen: HashSet<NormalizedRelation> = HashSet::new();
    let mut records = Vec::new();
    for m in &raw_records {
        let recs = normalize_record(m);
        // A record that resolved to neither a relation nor a target carried
        // no recognizable keys at all.
        if recs
            .iter()
            .all(|r| r.relation.is_empty() && r.target_name.is_empty())
        {
            dropped += 1;
            continue;
        }
        for rec in recs {
            if seen.insert(rec.clone()) {
                records.push(rec);
            }
        }
    }

    RelationOutcome { records, dropped }
}

/// Normalize a raw `attributes` field into key/value pairs.
///
/// A narrower grammar than relationships: structured `{key, value}` objects,
/// or `"key: x, value: y"` strings (with a few separator variants). Anything
/// else is dropped.
pub fn normalize_attributes(raw: &Value) -> Vec<NormalizedAttribute> {
    let items = match raw {
        Value::Array(items) if !items.is_empty() => items,
        _ => return Vec::new(),
    };

    if items[0].is_object() {
        return items
            .iter()
            .filter_map(Value::as_object)
            .filter(|m| !m.is_empty())
            .map(|m| NormalizedAttribute {
                key: field(m, &["key"]),
                value: field(m, &["value"]),
            })
            .collect();
    }

    let mut attrs = Vec::new();
    for item in items {
        let Value::String(s) = item else { continue };
        if let Some(caps) = attr_kv_re().captures(s) {
            attrs.push(NormalizedAttribute {
                key: strip_quotes(&caps[1]),
                value: strip_quotes(&caps[2]),
            });
        } else if let Some(caps) = attr_alt_re().captures(s) {
            attrs.push(NormalizedAttribute {
                key: strip_quotes(&caps[1]),
                value: strip_quotes(&caps[2]),
            });
        }
    }
    attrs
}
