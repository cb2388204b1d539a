//! Prometheus text exposition parser.
//!
//! Parses `metric_name{label="value",...} value [timestamp]` lines into
//! [`Sample`]s. Comment lines (`# HELP`, `# TYPE`, anything starting with
//! `#`) and malformed lines are skipped rather than treated as errors.

use std::collections::BTreeMap;

/// A single parsed sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl Sample {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Lazily parse exposition text into samples.
///
/// No ordering is imposed across metric families; duplicate series are
/// yielded as they appear.
pub fn parse(text: &str) -> impl Iterator<Item = Sample> + '_ {
    text.lines().filter_map(parse_line)
}

/// The value of the last sample named `name`, optionally restricted to
/// samples carrying `label = value`.
pub fn latest<'a, I>(samples: I, name: &str, label: Option<(&str, &str)>) -> Option<f64>
where
    I: IntoIterator<Item = &'a Sample>,
{
    samples
        .into_iter()
        .filter(|s| s.name == name)
        .filter(|s| match label {
            Some((key, value)) => s.label(key) == Some(value),
            None => true,
        })
        .last()
        .map(|s| s.value)
}

/// Parse one line. Returns `None` for comments, blanks, and anything malformed.
fn parse_line(line: &str) -> Option<Sample> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let name_end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .unwrap_or(line.len());
    let name = &line[..name_end];
    if !is_valid_name(name) {
        return None;
    }

    let mut rest = &line[name_end..];
    let labels = if let Some(after_brace) = rest.strip_prefix('{') {
        let (labels, consumed) = parse_labels(after_brace)?;
        rest = &after_brace[consumed..];
        labels
    } else {
        BTreeMap::new()
    };

    // Value, then an optional timestamp which is ignored.
    let mut tokens = rest.split_whitespace();
    let value = parse_value(tokens.next()?)?;
    if let Some(ts) = tokens.next() {
        ts.parse::<i64>().ok()?;
    }
    if tokens.next().is_some() {
        return None;
    }

    Some(Sample {
        name: name.to_string(),
        labels,
        value,
    })
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Parse a label block after the opening `{`.
///
/// Returns the labels and the number of bytes consumed, including the
/// closing `}`.
fn parse_labels(input: &str) -> Option<(BTreeMap<String, String>, usize)> {
    let mut labels = BTreeMap::new();
    let bytes = input.as_bytes();
    let mut pos = 0;

    loop {
        pos += count_whitespace(&input[pos..]);
        match bytes.get(pos)? {
            b'}' => return Some((labels, pos + 1)),
            b',' if !labels.is_empty() => {
                pos += 1;
                continue;
            }
            _ => {}
        }

        let key_len = input[pos..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(input.len() - pos);
        if key_len == 0 {
            return None;
        }
        let key = &input[pos..pos + key_len];
        pos += key_len;

        pos += count_whitespace(&input[pos..]);
        if bytes.get(pos)? != &b'=' {
            return None;
        }
        pos += 1;
        pos += count_whitespace(&input[pos..]);
        if bytes.get(pos)? != &b'"' {
            return None;
        }
        pos += 1;

        let (value, consumed) = parse_quoted(&input[pos..])?;
        pos += consumed;
        labels.insert(key.to_string(), value);
    }
}

/// Decode a quoted label value after its opening quote.
fn parse_quoted(input: &str) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((value, i + 1)),
            '\\' => match chars.next()?.1 {
                'n' => value.push('\n'),
                '\\' => value.push('\\'),
                '"' => value.push('"'),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            },
            c => value.push(c),
        }
    }
    None
}

fn count_whitespace(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

fn parse_value(token: &str) -> Option<f64> {
    match token {
        "+Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        other => other.parse::<f64>().ok(),
    }
}
