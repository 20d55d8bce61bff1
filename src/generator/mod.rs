//! Dummy row generation for development and demos.
//!
//! Values are picked per column from its base type, its validation rules and
//! a few name heuristics (`price`, `city`, `email`, ...). Every generated row
//! is run through the normal row validation before it is returned.

pub mod phone;
pub mod words;

use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::columns::{country, validate_row, BaseType, ColumnTypeRegistry, ValidateMode};
use crate::database::models::Column;
use crate::types::TableType;

/// Integer-valued number columns, matched against the lowercased name
const INTEGER_HINTS: [&str; 7] = ["qty", "quantity", "count", "stock", "year", "age", "rating"];

/// Generate `count` rows for `columns`. Rows that would not validate are
/// dropped, so the result may be shorter than `count`.
pub fn generate_rows<R: Rng + ?Sized>(
    columns: &[Column],
    registry: &ColumnTypeRegistry,
    table_type: TableType,
    count: usize,
    rng: &mut R,
) -> Vec<Map<String, Value>> {
    let mut rows = Vec::with_capacity(count);
    for index in 0..count {
        let raw = generate_row(columns, registry, table_type, rng);
        match validate_row(columns, registry, &Value::Object(raw), ValidateMode::Create) {
            Ok(row) => rows.push(row),
            Err(e) => warn!("dropping generated row {}: {}", index, e),
        }
    }
    rows
}

fn generate_row<R: Rng + ?Sized>(
    columns: &[Column],
    registry: &ColumnTypeRegistry,
    table_type: TableType,
    rng: &mut R,
) -> Map<String, Value> {
    let mut row = Map::new();

    // Country first: a phone column in the same row follows it
    let row_country = columns
        .iter()
        .find(|c| matches!(registry.resolve(&c.column_type), Ok(t) if t.base == BaseType::Country))
        .map(|c| (c.name.clone(), pick_country(c, rng)));
    if let Some((name, code)) = &row_country {
        row.insert(name.clone(), Value::String(code.clone()));
    }

    let person = Person::random(rng);

    for column in columns {
        if row.contains_key(&column.name) {
            continue;
        }
        let Ok(resolved) = registry.resolve(&column.column_type) else {
            continue;
        };
        let name = column.name.to_ascii_lowercase();

        if let Some(options) = column.validation.as_ref().and_then(|v| v.options.as_ref()) {
            if let Some(choice) = options.choose(rng) {
                row.insert(column.name.clone(), Value::String(choice.clone()));
            }
            continue;
        }

        let is_phone = name.contains("phone") || resolved.reference.ends_with(":phone");
        let value = match resolved.base {
            BaseType::Text if is_phone => Some(json!(phone::phone_number(
                row_country.as_ref().map(|(_, code)| code.as_str()),
                rng
            ))),
            BaseType::Text => {
                let has_pattern = resolved.pattern.is_some()
                    || column.validation.as_ref().and_then(|v| v.pattern.as_ref()).is_some();
                match text_by_name(&name, table_type, &person, rng) {
                    Some(text) => Some(json!(fit_length(text, column, rng))),
                    // A pattern we know nothing about: only fill it when it must be filled
                    None if has_pattern => column
                        .default_value
                        .clone()
                        .or_else(|| column.is_required.then(|| json!("sample"))),
                    None => Some(json!(fit_length(lorem(rng, 3), column, rng))),
                }
            }
            BaseType::Number => Some(number_value(&name, column, rng)),
            BaseType::Date => {
                let days = rng.gen_range(0..365);
                Some(json!((Utc::now() - Duration::days(days)).format("%Y-%m-%d").to_string()))
            }
            BaseType::Boolean => Some(json!(rng.gen_bool(0.5))),
            BaseType::Email => Some(json!(person.email(rng))),
            BaseType::Url => Some(json!(format!("https://www.{}.example.com", person.company_slug))),
            BaseType::Country => Some(json!(pick_country(column, rng))),
        };

        if let Some(value) = value {
            row.insert(column.name.clone(), value);
        }
    }

    if table_type == TableType::Rent {
        let used = rng.gen_bool(0.3);
        row.insert("used".to_string(), json!(used));
        row.insert("available".to_string(), json!(!used));
    }

    row
}

/// Identity shared by the name-like columns of one row
struct Person {
    first: &'static str,
    last: &'static str,
    company: String,
    company_slug: String,
}

impl Person {
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let prefix = pick(words::COMPANY_PREFIXES, rng);
        let suffix = pick(words::COMPANY_SUFFIXES, rng);
        Self {
            first: pick(words::FIRST_NAMES, rng),
            last: pick(words::LAST_NAMES, rng),
            company: format!("{} {}", prefix, suffix),
            company_slug: format!("{}{}", prefix, suffix).to_ascii_lowercase(),
        }
    }

    fn email<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        format!(
            "{}.{}@{}",
            self.first.to_ascii_lowercase(),
            self.last.to_ascii_lowercase(),
            pick(words::EMAIL_DOMAINS, rng)
        )
    }
}

fn text_by_name<R: Rng + ?Sized>(name: &str, table_type: TableType, person: &Person, rng: &mut R) -> Option<String> {
    let text = if name.contains("first") {
        person.first.to_string()
    } else if name.contains("last") || name.contains("surname") {
        person.last.to_string()
    } else if name.contains("email") {
        person.email(rng)
    } else if name.contains("company") || name.contains("brand") {
        person.company.clone()
    } else if name.contains("city") {
        pick(words::CITIES, rng).to_string()
    } else if name.contains("address") || name.contains("street") {
        format!("{} {}", rng.gen_range(1..=250), pick(words::STREETS, rng))
    } else if name.contains("colo") {
        pick(words::COLORS, rng).to_string()
    } else if name.contains("size") {
        pick(words::SIZES, rng).to_string()
    } else if name.contains("sku") {
        format!("SKU-{:06}", rng.gen_range(0..1_000_000))
    } else if name.contains("title") || name.contains("product") || (name.contains("name") && table_type.is_inventory())
    {
        format!("{} {}", pick(words::ADJECTIVES, rng), pick(words::PRODUCTS, rng))
    } else if name.contains("name") {
        format!("{} {}", person.first, person.last)
    } else if name.contains("desc") || name.contains("note") || name.contains("comment") {
        let mut sentence = lorem(rng, 8);
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    } else {
        return None;
    };
    Some(text)
}

fn number_value<R: Rng + ?Sized>(name: &str, column: &Column, rng: &mut R) -> Value {
    let rules = column.validation.as_ref();
    let min = rules.and_then(|v| v.min);
    let max = rules.and_then(|v| v.max);
    let integer = INTEGER_HINTS.iter().any(|hint| name.contains(hint));

    let (low, high): (f64, f64) = if name == "qty" || name.contains("stock") || name.contains("quantity") {
        (0.0, 50.0)
    } else if name.contains("year") {
        (1990.0, 2025.0)
    } else if name.contains("price") {
        (1.0, 500.0)
    } else if name.contains("fee") {
        (0.0, 25.0)
    } else if name.contains("rating") {
        (1.0, 5.0)
    } else {
        (0.0, 1000.0)
    };
    let low = min.map_or(low, |m| low.max(m));
    let high = max.map_or(high, |m| high.min(m)).max(low);

    if integer {
        let low = low.ceil() as i64;
        let high = (high.floor() as i64).max(low);
        json!(rng.gen_range(low..=high))
    } else {
        let value = (rng.gen_range(low..=high) * 100.0).round() / 100.0;
        json!(value.clamp(low, high))
    }
}

/// Mostly countries with a phone plan, so phone columns can follow them
fn pick_country<R: Rng + ?Sized>(column: &Column, rng: &mut R) -> String {
    if let Some(options) = column.validation.as_ref().and_then(|v| v.options.as_ref()) {
        if let Some(choice) = options.choose(rng) {
            return choice.to_ascii_uppercase();
        }
    }
    if rng.gen_bool(0.8) {
        pick(phone::PHONE_PLANS, rng).country.to_string()
    } else {
        pick(country::COUNTRIES, rng).0.to_string()
    }
}

/// Text columns are never padded past this many characters
const MAX_FILL_CHARS: usize = 10_000;

/// Respect text `min`/`max` length rules
fn fit_length<R: Rng + ?Sized>(mut text: String, column: &Column, rng: &mut R) -> String {
    let rules = column.validation.as_ref();
    if let Some(min) = rules.and_then(|v| v.min) {
        let min = min.min(MAX_FILL_CHARS as f64);
        while (text.chars().count() as f64) < min {
            text.push(' ');
            text.push_str(pick(words::LOREM, rng));
        }
    }
    if let Some(max) = rules.and_then(|v| v.max) {
        let max = max.max(0.0) as usize;
        if text.chars().count() > max {
            text = text.chars().take(max).collect::<String>().trim_end().to_string();
        }
    }
    text
}

fn lorem<R: Rng + ?Sized>(rng: &mut R, count: usize) -> String {
    (0..count)
        .map(|_| pick(words::LOREM, rng))
        .collect::<Vec<_>>()
        .join(" ")
}

fn pick<T: Copy, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> T {
    items[rng.gen_range(0..items.len())]
}
