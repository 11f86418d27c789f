//! Decoder for the text exposition format.
//!
//! Turns one scraped body into a [`MetricFamilyMapping`]. Metadata lines
//! (`# HELP` / `# TYPE`) announce a family; sample lines attach to the
//! announced family, with histogram and summary child series
//! (`_bucket`/`_sum`/`_count`) folded into their base family. Sample lines
//! with no preceding metadata become untyped families of their own.
//!
//! Any malformed line fails the whole document: a half-garbled payload is
//! reported as a decode failure instead of being silently truncated.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::model::{MetricFamily, MetricFamilyMapping, MetricType, Sample};

static METRIC_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("metric name regex"));
static LABEL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("label name regex"));

/// Decode failure for one scraped body.
#[derive(Debug, Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Parses a complete exposition document into a family mapping.
pub fn parse_text(text: &str) -> Result<MetricFamilyMapping, ParseError> {
    let mut families = MetricFamilyMapping::default();

    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            parse_metadata_line(comment.trim_start(), lineno, &mut families)?;
            continue;
        }

        let sample = parse_sample_line(line, lineno)?;
        attach_sample(&mut families, sample);
    }

    Ok(families)
}

/// Handles the content of a `#` line: HELP and TYPE update family metadata,
/// anything else is a plain comment.
fn parse_metadata_line(
    comment: &str,
    lineno: usize,
    families: &mut MetricFamilyMapping,
) -> Result<(), ParseError> {
    if let Some(rest) = comment.strip_prefix("HELP ") {
        let (name, help) = match rest.trim_start().split_once(char::is_whitespace) {
            Some((name, help)) => (name, help),
            None => (rest.trim(), ""),
        };
        if !METRIC_NAME_RE.is_match(name) {
            return Err(ParseError::new(
                lineno,
                format!("invalid metric name '{name}' on HELP line"),
            ));
        }
        families
            .entry(name.to_string())
            .or_insert_with(|| MetricFamily::untyped(name))
            .help = unescape_help(help);
        return Ok(());
    }

    if let Some(rest) = comment.strip_prefix("TYPE ") {
        let mut tokens = rest.split_whitespace();
        let name = tokens
            .next()
            .ok_or_else(|| ParseError::new(lineno, "TYPE line without metric name"))?;
        if !METRIC_NAME_RE.is_match(name) {
            return Err(ParseError::new(
                lineno,
                format!("invalid metric name '{name}' on TYPE line"),
            ));
        }
        let keyword = tokens
            .next()
            .ok_or_else(|| ParseError::new(lineno, "TYPE line without type keyword"))?;
        families
            .entry(name.to_string())
            .or_insert_with(|| MetricFamily::untyped(name))
            .family_type = MetricType::from_keyword(keyword);
        return Ok(());
    }

    // Plain comment.
    Ok(())
}

/// Parses `name{labels} value [timestamp]`.
fn parse_sample_line(line: &str, lineno: usize) -> Result<Sample, ParseError> {
    let name_end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .ok_or_else(|| ParseError::new(lineno, "sample line without value"))?;
    let name = &line[..name_end];
    if !METRIC_NAME_RE.is_match(name) {
        return Err(ParseError::new(
            lineno,
            format!("invalid metric name '{name}'"),
        ));
    }

    let mut labels = Vec::new();
    let rest = &line[name_end..];
    let rest = match rest.strip_prefix('{') {
        Some(after_brace) => parse_labels(after_brace, lineno, &mut labels)?,
        None => rest,
    };

    let mut tokens = rest.split_whitespace();
    let value_token = tokens
        .next()
        .ok_or_else(|| ParseError::new(lineno, "sample line without value"))?;
    // f64 parsing accepts the special forms +Inf, -Inf and NaN directly.
    let value: f64 = value_token
        .parse()
        .map_err(|_| ParseError::new(lineno, format!("invalid sample value '{value_token}'")))?;

    let timestamp_ms = match tokens.next() {
        Some(token) => Some(token.parse::<i64>().map_err(|_| {
            ParseError::new(lineno, format!("invalid timestamp '{token}'"))
        })?),
        None => None,
    };
    if tokens.next().is_some() {
        return Err(ParseError::new(lineno, "trailing tokens after timestamp"));
    }

    Ok(Sample {
        name: name.to_string(),
        labels,
        value,
        timestamp_ms,
    })
}

/// Parses the label pairs following an opening `{`, returning the remainder
/// of the line after the closing `}`.
fn parse_labels<'a>(
    input: &'a str,
    lineno: usize,
    labels: &mut Vec<(String, String)>,
) -> Result<&'a str, ParseError> {
    let mut rest = input.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix('}') {
            return Ok(after);
        }

        let eq = rest
            .find('=')
            .ok_or_else(|| ParseError::new(lineno, "label pair without '='"))?;
        let name = rest[..eq].trim();
        if !LABEL_NAME_RE.is_match(name) {
            return Err(ParseError::new(
                lineno,
                format!("invalid label name '{name}'"),
            ));
        }

        rest = rest[eq + 1..].trim_start();
        rest = rest
            .strip_prefix('"')
            .ok_or_else(|| ParseError::new(lineno, "label value must be quoted"))?;
        let (value, after_value) = parse_quoted(rest, lineno)?;
        labels.push((name.to_string(), value));

        rest = after_value.trim_start();
        if let Some(after) = rest.strip_prefix(',') {
            rest = after.trim_start();
            continue;
        }
        if !rest.starts_with('}') {
            return Err(ParseError::new(
                lineno,
                "expected ',' or '}' after label value",
            ));
        }
    }
}

/// Consumes a quoted label value (opening quote already stripped), resolving
/// the `\\`, `\"` and `\n` escapes. Returns the value and the remainder after
/// the closing quote.
fn parse_quoted(input: &str, lineno: usize) -> Result<(String, &str), ParseError> {
    let mut value = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, '"')) => value.push('"'),
                // Unknown escapes are kept literally, as the reference
                // parsers do.
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => return Err(ParseError::new(lineno, "unterminated label value")),
            },
            '"' => return Ok((value, &input[i + 1..])),
            _ => value.push(c),
        }
    }
    Err(ParseError::new(lineno, "unterminated label value"))
}

/// HELP text escapes only backslash and newline.
fn unescape_help(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn attach_sample(families: &mut MetricFamilyMapping, sample: Sample) {
    let key = family_key(families, &sample.name);
    families
        .entry(key)
        .or_insert_with(|| MetricFamily::untyped(sample.name.clone()))
        .samples
        .push(sample);
}

/// Resolves the family a sample belongs to: its own name, or the base family
/// for histogram/summary child series announced earlier in the document.
fn family_key(families: &MetricFamilyMapping, sample_name: &str) -> String {
    if families.contains_key(sample_name) {
        return sample_name.to_owned();
    }
    for suffix in ["_bucket", "_sum", "_count"] {
        if let Some(base) = sample_name.strip_suffix(suffix) {
            match families.get(base).map(|f| f.family_type) {
                Some(MetricType::Histogram) => return base.to_owned(),
                Some(MetricType::Summary) if suffix != "_bucket" => return base.to_owned(),
                _ => {}
            }
        }
    }
    sample_name.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_help_type_and_samples() {
        let text = "\
# HELP http_requests_total The total number of HTTP requests.
# TYPE http_requests_total counter
http_requests_total{method=\"post\",code=\"200\"} 1027 1395066363000
http_requests_total{method=\"post\",code=\"400\"} 3 1395066363000
";
        let families = parse_text(text).unwrap();
        assert_eq!(families.len(), 1);

        let family = &families["http_requests_total"];
        assert_eq!(family.family_type, MetricType::Counter);
        assert_eq!(family.help, "The total number of HTTP requests.");
        assert_eq!(family.samples.len(), 2);
        assert_eq!(family.samples[0].value, 1027.0);
        assert_eq!(family.samples[0].timestamp_ms, Some(1395066363000));
        assert_eq!(
            family.samples[0].labels,
            vec![
                ("method".to_string(), "post".to_string()),
                ("code".to_string(), "200".to_string()),
            ]
        );
    }

    #[test]
    fn sample_without_metadata_becomes_untyped_family() {
        let families = parse_text("metric_without_any_labels 12.47\n").unwrap();
        let family = &families["metric_without_any_labels"];
        assert_eq!(family.family_type, MetricType::Untyped);
        assert_eq!(family.help, "");
        assert_eq!(family.samples[0].value, 12.47);
    }

    #[test]
    fn histogram_children_fold_into_base_family() {
        let text = "\
# HELP http_request_duration_seconds A histogram of the request duration.
# TYPE http_request_duration_seconds histogram
http_request_duration_seconds_bucket{le=\"0.05\"} 24054
http_request_duration_seconds_bucket{le=\"+Inf\"} 144320
http_request_duration_seconds_sum 53423
http_request_duration_seconds_count 144320
";
        let families = parse_text(text).unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families["http_request_duration_seconds"].samples.len(), 4);
    }

    #[test]
    fn summary_quantiles_and_children() {
        let text = "\
# TYPE rpc_duration_seconds summary
rpc_duration_seconds{quantile=\"0.5\"} 4773
rpc_duration_seconds_sum 17560473
rpc_duration_seconds_count 2693
";
        let families = parse_text(text).unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families["rpc_duration_seconds"].samples.len(), 3);
    }

    #[test]
    fn escaped_label_values() {
        let text = "msg_total{path=\"C:\\\\DIR\",text=\"say \\\"hi\\\"\\n\"} 1\n";
        let families = parse_text(text).unwrap();
        let sample = &families["msg_total"].samples[0];
        assert_eq!(sample.labels[0].1, "C:\\DIR");
        assert_eq!(sample.labels[1].1, "say \"hi\"\n");
    }

    #[test]
    fn special_values_parse() {
        let text = "a +Inf\nb -Inf\nc NaN\n";
        let families = parse_text(text).unwrap();
        assert_eq!(families["a"].samples[0].value, f64::INFINITY);
        assert_eq!(families["b"].samples[0].value, f64::NEG_INFINITY);
        assert!(families["c"].samples[0].value.is_nan());
    }

    #[test]
    fn help_unescaping() {
        let text = "# HELP odd_metric first line\\nsecond \\\\ line\n";
        let families = parse_text(text).unwrap();
        assert_eq!(families["odd_metric"].help, "first line\nsecond \\ line");
    }

    #[test]
    fn empty_document_is_empty_mapping() {
        assert!(parse_text("").unwrap().is_empty());
        assert!(parse_text("\n# just a comment\n\n").unwrap().is_empty());
    }

    #[test]
    fn malformed_lines_fail() {
        assert!(parse_text("no_value_here\n").is_err());
        assert!(parse_text("bad{label=unquoted} 1\n").is_err());
        assert!(parse_text("bad{label=\"unterminated} 1\n").is_err());
        assert!(parse_text("bad_value abc\n").is_err());
        assert!(parse_text("trailing 1 2 3\n").is_err());
        assert!(parse_text("2starts_with_digit 1\n").is_err());
    }

    #[test]
    fn parse_error_reports_line_number() {
        let err = parse_text("ok 1\nbroken\n").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
