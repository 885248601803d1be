// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key:value lines embedded in tracker item descriptions.
//!
//! The tracker stores free text; Gas Town layers structured fields on top
//! as `Key: value` lines. Lookups are case-insensitive on the key. Lines
//! that don't parse as a field are left alone by every mutation.

/// Extract the value of `key` from a description, if present.
///
/// Matches the first line of the form `Key: value` (key compared
/// case-insensitively); returns the trimmed value.
pub fn get_field<'a>(description: &'a str, key: &str) -> Option<&'a str> {
    description.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        if k.trim().eq_ignore_ascii_case(key) {
            Some(v.trim())
        } else {
            None
        }
    })
}

/// Set `key` to `value` in a description, replacing an existing field line
/// or appending a new one. All other lines are preserved byte-for-byte.
pub fn set_field(description: &str, key: &str, value: &str) -> String {
    let mut out = Vec::new();
    let mut replaced = false;
    for line in description.lines() {
        let is_target = line
            .split_once(':')
            .is_some_and(|(k, _)| k.trim().eq_ignore_ascii_case(key));
        if is_target && !replaced {
            out.push(format!("{key}: {value}"));
            replaced = true;
        } else {
            out.push(line.to_string());
        }
    }
    if !replaced {
        out.push(format!("{key}: {value}"));
    }
    out.join("\n")
}

/// All `Key: value` pairs in order of appearance.
pub fn parse_fields(description: &str) -> Vec<(String, String)> {
    description
        .lines()
        .filter_map(|line| {
            let (k, v) = line.split_once(':')?;
            let key = k.trim();
            // A key is a single word, optionally hyphenated or
            // underscored; anything else is prose with a stray colon.
            if key.is_empty()
                || !key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return None;
            }
            Some((key.to_string(), v.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
#[path = "fields_tests.rs"]
mod tests;
