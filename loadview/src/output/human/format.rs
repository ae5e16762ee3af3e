use std::time::Duration;

use loadview_core::{CumulativeTotals, Delta};

pub(crate) fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        return format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60);
    }
    if secs >= 60 {
        return format!("{}m{:02}s", secs / 60, secs % 60);
    }
    if secs >= 1 {
        return format!("{:.1}s", d.as_secs_f64());
    }
    format!("{}ms", d.as_millis())
}

pub(crate) fn format_percent(ratio: f64) -> String {
    if ratio.is_finite() {
        format!("{:.1}%", ratio * 100.0)
    } else {
        "0.0%".to_string()
    }
}

pub(crate) fn format_totals(t: &CumulativeTotals) -> String {
    format!(
        "accepted={} rejected={} errors={}",
        t.accepted, t.rejected, t.errors
    )
}

pub(crate) fn format_delta(d: &Delta) -> String {
    format!("+{}/+{}/+{}", d.accepted, d.rejected, d.errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_uses_the_largest_unit() {
        assert_eq!(format_elapsed(Duration::from_millis(250)), "250ms");
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m05s");
        assert_eq!(format_elapsed(Duration::from_secs(3723)), "1h02m03s");
    }

    #[test]
    fn percent_handles_empty_totals() {
        assert_eq!(format_percent(0.25), "25.0%");
        assert_eq!(format_percent(f64::NAN), "0.0%");
    }
}
