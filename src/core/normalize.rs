//! Canonical form for free-text postal addresses, and the cheap bucket keys
//! derived from it.

use std::collections::BTreeSet;

/// Secondary-unit designators. A designator is always dropped, together with
/// the unit identifier that follows it (`apt 3`, `ste b`, `# 12`).
const UNIT_DESIGNATORS: &[&str] = &["#", "apt", "apartment", "unit", "suite", "ste", "spc", "space"];

/// Designators that also show up glued to their number (`apt3`, `ste200`).
const GLUED_DESIGNATORS: &[&str] = &["apartment", "apt", "unit", "suite", "ste", "spc"];

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("road", "rd"),
    ("street", "st"),
    ("avenue", "ave"),
    ("boulevard", "blvd"),
    ("drive", "dr"),
    ("lane", "ln"),
    ("court", "ct"),
    ("place", "pl"),
    ("circle", "cir"),
    ("parkway", "pkwy"),
    ("highway", "hwy"),
];

const DIRECTIONALS: &[&str] = &["n", "s", "e", "w", "ne", "nw", "se", "sw"];

fn is_unit_identifier(token: &str) -> bool {
    token.chars().count() == 1 || token.chars().any(|c| c.is_ascii_digit())
}

fn is_glued_unit(token: &str) -> bool {
    GLUED_DESIGNATORS.iter().any(|designator| {
        token
            .strip_prefix(designator)
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_ascii_digit())
    })
}

fn standardize(token: &str) -> &str {
    ABBREVIATIONS
        .iter()
        .find(|(long, _)| *long == token)
        .map(|(_, short)| *short)
        .unwrap_or(token)
}

fn strip_country(tokens: &mut Vec<&str>) {
    loop {
        let trailing = match tokens.as_slice() {
            [.., "united", "states"] => 2,
            [.., "usa"] | [.., "us"] if tokens.len() > 1 => 1,
            _ => 0,
        };
        if trailing == 0 {
            break;
        }
        tokens.truncate(tokens.len() - trailing);
    }
}

/// Lower-cases, strips punctuation and unit designators, standardizes street
/// suffixes and collapses whitespace. Empty input gives an empty string.
///
/// `normalize(normalize(x)) == normalize(x)` for every input.
pub fn normalize(address: &str) -> String {
    let mut cleaned = String::with_capacity(address.len() + 4);
    for ch in address.chars() {
        match ch {
            '#' => cleaned.push_str(" # "),
            '.' | '\'' => {}
            c if c.is_alphanumeric() => {
                // Some lowercase mappings emit combining marks; keep only the
                // alphanumeric part so a second pass sees the same text.
                cleaned.extend(c.to_lowercase().filter(|lc| lc.is_alphanumeric()));
            }
            _ => cleaned.push(' '),
        }
    }

    let raw: Vec<&str> = cleaned.split_whitespace().collect();
    let mut tokens: Vec<&str> = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let token = raw[i];
        if UNIT_DESIGNATORS.contains(&token) {
            let skip_identifier = raw.get(i + 1).is_some_and(|next| is_unit_identifier(next));
            i += if skip_identifier { 2 } else { 1 };
            continue;
        }
        if is_glued_unit(token) {
            i += 1;
            continue;
        }
        tokens.push(standardize(token));
        i += 1;
    }

    strip_country(&mut tokens);
    tokens.join(" ")
}

/// Bucketing fingerprint of a normalized address. Two addresses are only
/// ever compared when they share at least one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressKey {
    /// House number plus the first three letters of the street name.
    NumberStreet { number: String, street: String },
    Number(String),
    Street(String),
    /// First five non-space characters.
    Prefix(String),
    Zip(String),
}

fn house_number(token: &str) -> Option<String> {
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}

fn is_zip(token: &str) -> bool {
    token.len() == 5 && token.bytes().all(|b| b.is_ascii_digit())
}

/// Keys for one normalized address. Addresses without a leading house
/// number only get the prefix key (and the zip key when one is present), so
/// they can miss matches whose other keys would have lined up.
pub fn derive_keys(normalized: &str) -> BTreeSet<AddressKey> {
    let mut keys = BTreeSet::new();
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    if tokens.is_empty() {
        return keys;
    }

    if let Some(number) = house_number(tokens[0]) {
        let street = tokens[1..]
            .iter()
            .find(|t| !DIRECTIONALS.contains(t))
            .map(|t| t.chars().take(3).collect::<String>());

        if let Some(street) = street {
            keys.insert(AddressKey::NumberStreet {
                number: number.clone(),
                street: street.clone(),
            });
            keys.insert(AddressKey::Street(street));
        }
        keys.insert(AddressKey::Number(number));
    }

    let prefix: String = normalized
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(5)
        .collect();
    keys.insert(AddressKey::Prefix(prefix));

    if let Some(zip) = tokens[1..].iter().rev().find(|t| is_zip(t)) {
        keys.insert(AddressKey::Zip(zip.to_string()));
    }

    keys
}
