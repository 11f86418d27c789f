//! Serializer for the text exposition format.
//!
//! Renders an aggregated family mapping into one text payload: families in
//! sorted name order, each with its `# HELP`/`# TYPE` metadata followed by
//! its sample lines. An empty mapping renders an empty body.

use std::fmt::Write;

use tracing::error;

use crate::model::{MetricFamily, MetricFamilyMapping, Sample};

/// Renders the mapping, falling back to whatever was written so far if a
/// formatting fault occurs mid-way. Encoding problems never surface to the
/// HTTP caller.
pub fn render_text(families: &MetricFamilyMapping) -> String {
    let mut out = String::new();

    let mut names: Vec<&String> = families.keys().collect();
    names.sort();

    for name in names {
        if let Err(e) = write_family(&mut out, &families[name]) {
            error!("Failed to serialize metric family {}: {}", name, e);
            break;
        }
    }

    out
}

fn write_family(out: &mut String, family: &MetricFamily) -> std::fmt::Result {
    if !family.help.is_empty() {
        writeln!(out, "# HELP {} {}", family.name, escape_help(&family.help))?;
    }
    writeln!(out, "# TYPE {} {}", family.name, family.family_type.as_str())?;
    for sample in &family.samples {
        write_sample(out, sample)?;
    }
    Ok(())
}

fn write_sample(out: &mut String, sample: &Sample) -> std::fmt::Result {
    out.push_str(&sample.name);

    if !sample.labels.is_empty() {
        out.push('{');
        for (i, (name, value)) in sample.labels.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write!(out, "{}=\"{}\"", name, escape_label_value(value))?;
        }
        out.push('}');
    }

    write!(out, " {}", format_value(sample.value))?;
    if let Some(ts) = sample.timestamp_ms {
        write!(out, " {ts}")?;
    }
    out.push('\n');
    Ok(())
}

fn escape_help(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// The format spells infinities `+Inf`/`-Inf`; plain `{}` formatting covers
/// every finite value.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposition::parse_text;
    use crate::model::{MetricFamilyMapping, MetricType, Sample};

    fn mapping_with(families: Vec<MetricFamily>) -> MetricFamilyMapping {
        families
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect()
    }

    #[test]
    fn empty_mapping_renders_empty_body() {
        assert_eq!(render_text(&MetricFamilyMapping::default()), "");
    }

    #[test]
    fn renders_metadata_and_samples() {
        let mut family = MetricFamily::new(
            "http_requests_total",
            MetricType::Counter,
            "Total requests.",
        );
        family.samples.push(Sample::new(
            "http_requests_total",
            vec![("method".to_string(), "GET".to_string())],
            5.0,
        ));
        let text = render_text(&mapping_with(vec![family]));
        assert_eq!(
            text,
            "# HELP http_requests_total Total requests.\n\
             # TYPE http_requests_total counter\n\
             http_requests_total{method=\"GET\"} 5\n"
        );
    }

    #[test]
    fn families_render_in_sorted_name_order() {
        let text = render_text(&mapping_with(vec![
            MetricFamily::untyped("zeta"),
            MetricFamily::untyped("alpha"),
            MetricFamily::untyped("mid"),
        ]));
        let alpha = text.find("alpha").unwrap();
        let mid = text.find("mid").unwrap();
        let zeta = text.find("zeta").unwrap();
        assert!(alpha < mid && mid < zeta);
    }

    #[test]
    fn family_without_help_skips_help_line() {
        let mut family = MetricFamily::untyped("bare");
        family.samples.push(Sample::new("bare", vec![], 1.0));
        let text = render_text(&mapping_with(vec![family]));
        assert_eq!(text, "# TYPE bare untyped\nbare 1\n");
    }

    #[test]
    fn escapes_label_values_and_help() {
        let mut family = MetricFamily::new("m", MetricType::Gauge, "line1\nline2 \\ done");
        family.samples.push(Sample::new(
            "m",
            vec![("path".to_string(), "C:\\DIR \"x\"\n".to_string())],
            1.0,
        ));
        let text = render_text(&mapping_with(vec![family]));
        assert!(text.contains("# HELP m line1\\nline2 \\\\ done"));
        assert!(text.contains("m{path=\"C:\\\\DIR \\\"x\\\"\\n\"} 1"));
    }

    #[test]
    fn special_values_render() {
        let mut family = MetricFamily::untyped("v");
        for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            family.samples.push(Sample::new("v", vec![], value));
        }
        let text = render_text(&mapping_with(vec![family]));
        assert!(text.contains("v +Inf"));
        assert!(text.contains("v -Inf"));
        assert!(text.contains("v NaN"));
    }

    #[test]
    fn timestamps_are_preserved() {
        let mut family = MetricFamily::untyped("t");
        let mut sample = Sample::new("t", vec![], 2.0);
        sample.timestamp_ms = Some(1395066363000);
        family.samples.push(sample);
        let text = render_text(&mapping_with(vec![family]));
        assert!(text.contains("t 2 1395066363000\n"));
    }

    #[test]
    fn rendered_text_parses_back() {
        let mut family = MetricFamily::new("roundtrip_total", MetricType::Counter, "Help text.");
        family.samples.push(Sample::new(
            "roundtrip_total",
            vec![("k".to_string(), "v\"w\\x".to_string())],
            3.5,
        ));
        let mapping = mapping_with(vec![family]);
        let reparsed = parse_text(&render_text(&mapping)).unwrap();
        assert_eq!(reparsed, mapping);
    }
}
