//! Minimal org-mode reader.
//!
//! Understands just enough of the format to extract agenda items: headings with
//! workflow keywords and tags, the planning line, property drawers and body text.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use super::{Heading, OrgTimestamp, TodoKeywords};

/// Parse a whole document into its headings.
///
/// `#+TODO:` style lines in the document extend `keywords` for this document only.
pub fn parse_document(text: &str, keywords: &TodoKeywords) -> Vec<Heading> {
    let mut keywords = keywords.clone();
    keywords.extend(&file_keywords(text));

    let mut headings = Vec::new();
    let mut current: Option<(Heading, Vec<&str>)> = None;

    for (index, line) in text.lines().enumerate() {
        if let Some(rest) = heading_text(line) {
            if let Some((heading, lines)) = current.take() {
                headings.push(finish(heading, &lines));
            }
            let mut heading = parse_heading_line(rest, &keywords);
            heading.line = index + 1;
            current = Some((heading, Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }

    if let Some((heading, lines)) = current.take() {
        headings.push(finish(heading, &lines));
    }

    headings
}

/// Text after the stars of a heading line, or `None` for other lines.
fn heading_text(line: &str) -> Option<&str> {
    let stripped = line.trim_start_matches('*');
    if stripped.len() == line.len() {
        return None;
    }
    if stripped.is_empty() {
        return Some("");
    }
    stripped.strip_prefix(' ')
}

/// Collect `#+TODO:`, `#+SEQ_TODO:` and `#+TYP_TODO:` declarations.
fn file_keywords(text: &str) -> TodoKeywords {
    let mut keywords = TodoKeywords {
        todo: Vec::new(),
        done: Vec::new(),
    };

    for line in text.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.to_ascii_uppercase();
        if !matches!(key.as_str(), "#+TODO" | "#+SEQ_TODO" | "#+TYP_TODO") {
            continue;
        }

        let words: Vec<&str> = value.split_whitespace().collect();
        let (todo, done) = match words.iter().position(|w| *w == "|") {
            Some(bar) => (&words[..bar], &words[bar + 1..]),
            // Without a bar, the last keyword is the done state
            None if !words.is_empty() => words.split_at(words.len() - 1),
            None => continue,
        };

        keywords.todo.extend(todo.iter().map(|w| strip_fast_key(w)));
        keywords.done.extend(done.iter().map(|w| strip_fast_key(w)));
    }

    keywords
}

/// `WAIT(w@/!)` -> `WAIT`
fn strip_fast_key(word: &str) -> String {
    word.split('(').next().unwrap_or(word).to_string()
}

fn parse_heading_line(rest: &str, keywords: &TodoKeywords) -> Heading {
    let mut text = rest.trim();
    let mut todo = None;
    let mut done = false;

    if let Some(first) = text.split_whitespace().next()
        && keywords.contains(first)
    {
        todo = Some(first.to_string());
        done = keywords.is_done(first);
        text = text[first.len()..].trim_start();
    }

    let (title, tags) = split_tags(text);

    Heading {
        todo,
        done,
        tags,
        ..Heading::new(title)
    }
}

/// Split a trailing `:tag1:tag2:` group off the heading text.
fn split_tags(text: &str) -> (&str, Vec<String>) {
    let Some(last) = text.split_whitespace().last() else {
        return (text, Vec::new());
    };

    let is_tag_group = last.len() > 2
        && last.starts_with(':')
        && last.ends_with(':')
        && last[1..last.len() - 1]
            .split(':')
            .all(|t| !t.is_empty() && t.chars().all(|c| c.is_alphanumeric() || "_@#%".contains(c)));

    if !is_tag_group {
        return (text, Vec::new());
    }

    let tags = last
        .trim_matches(':')
        .split(':')
        .map(String::from)
        .collect();
    let title = text[..text.len() - last.len()].trim_end();
    (title, tags)
}

/// Fill planning, properties and body from the lines under a heading.
fn finish(mut heading: Heading, lines: &[&str]) -> Heading {
    let mut body = Vec::new();
    let mut in_drawer: Option<bool> = None; // Some(true) = property drawer
    let mut planning_allowed = true;

    for line in lines {
        let trimmed = line.trim();

        if let Some(is_properties) = in_drawer {
            if trimmed.eq_ignore_ascii_case(":END:") {
                in_drawer = None;
            } else if is_properties {
                if let Some((key, value)) = parse_property(trimmed) {
                    heading.properties.insert(key, value);
                }
            }
            continue;
        }

        if planning_allowed && is_planning_line(trimmed) {
            let (scheduled, deadline) = parse_planning(trimmed);
            heading.scheduled = heading.scheduled.or(scheduled);
            heading.deadline = heading.deadline.or(deadline);
            continue;
        }

        if trimmed.len() > 2 && trimmed.starts_with(':') && trimmed.ends_with(':') {
            let name = &trimmed[1..trimmed.len() - 1];
            if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
                in_drawer = Some(name.eq_ignore_ascii_case("PROPERTIES"));
                planning_allowed = false;
                continue;
            }
        }

        planning_allowed = false;
        body.push(*line);
    }

    heading.body = dedent(&body);
    heading
}

fn parse_property(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix(':')?;
    let (key, value) = rest.split_once(':')?;
    let key = key.trim_end_matches('+').trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_ascii_uppercase(), value.trim().to_string()))
}

fn is_planning_line(line: &str) -> bool {
    ["SCHEDULED:", "DEADLINE:", "CLOSED:"]
        .iter()
        .any(|k| line.starts_with(k))
}

fn parse_planning(line: &str) -> (Option<OrgTimestamp>, Option<OrgTimestamp>) {
    let scheduled = line
        .find("SCHEDULED:")
        .and_then(|i| parse_timestamp(&line[i + "SCHEDULED:".len()..]));
    let deadline = line
        .find("DEADLINE:")
        .and_then(|i| parse_timestamp(&line[i + "DEADLINE:".len()..]));
    (scheduled, deadline)
}

/// Parse the timestamp (or timestamp range) at the start of `text`.
pub fn parse_timestamp(text: &str) -> Option<OrgTimestamp> {
    let text = text.trim_start();
    let (inner, rest) = bracketed(text)?;
    let mut stamp = parse_stamp_body(inner)?;

    if let Some(range) = rest.strip_prefix("--")
        && let Some((end_inner, _)) = bracketed(range)
        && let Some(end) = parse_stamp_body(end_inner)
    {
        stamp.range_end = Some((end.date, end.start_time));
    }

    Some(stamp)
}

/// Split `<...>rest` or `[...]rest` into the inner text and the rest.
fn bracketed(text: &str) -> Option<(&str, &str)> {
    let close = match text.chars().next()? {
        '<' => '>',
        '[' => ']',
        _ => return None,
    };
    let end = text.find(close)?;
    Some((&text[1..end], &text[end + 1..]))
}

fn parse_stamp_body(inner: &str) -> Option<OrgTimestamp> {
    let mut tokens = inner.split_whitespace();
    let date = NaiveDate::parse_from_str(tokens.next()?, "%Y-%m-%d").ok()?;
    let mut stamp = OrgTimestamp::on(date);

    for token in tokens {
        if token.starts_with('+') || token.starts_with(".+") {
            stamp.repeater = Some(token.to_string());
        } else if token.starts_with('-') {
            // Warning period, e.g. -3d
        } else if token.contains(':') {
            let (start, end) = match token.split_once('-') {
                Some((start, end)) => (start, Some(end)),
                None => (token, None),
            };
            stamp.start_time = parse_time(start);
            stamp.end_time = end.and_then(parse_time);
        }
    }

    Some(stamp)
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M").ok()
}

/// Remove the indentation shared by all non-blank lines, then trim blank edges.
/// Indentation is counted in characters.
fn dedent(lines: &[&str]) -> String {
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);

    let text = lines
        .iter()
        .map(|l| {
            l.char_indices()
                .nth(indent)
                .map_or("", |(i, _)| &l[i..])
                .trim_end()
        })
        .collect::<Vec<_>>()
        .join("\n");

    text.trim().to_string()
}

/// Parse property key/value pairs from a drawer body. Used by tests and callers
/// building headings by hand.
pub fn properties_from(lines: &[&str]) -> BTreeMap<String, String> {
    lines.iter().filter_map(|l| parse_property(l.trim())).collect()
}
