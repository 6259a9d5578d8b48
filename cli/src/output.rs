use colored::Colorize;
use sync::{CollectionCounters, SyncReport};

pub fn header(title: &str) {
    println!("{}", title.bold().underline());
}

pub fn hint(msg: &str) {
    println!("{} {}", "hint:".cyan().bold(), msg.dimmed());
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Prints a run report: one line per collection that saw activity, then
/// issues and, if the run was cut short, the abort reason.
pub fn report(report: &SyncReport) {
    println!();
    let mut any = false;
    for (kind, counters) in &report.collections {
        if counters.is_noop() && counters.untouched == 0 {
            continue;
        }
        any = true;
        println!(
            "  {:<16} {}",
            kind.to_string().dimmed(),
            counter_line(counters)
        );
    }
    if !any {
        println!("  {}", "nothing to do".dimmed());
    }
    println!();

    for issue in &report.issues {
        let subject = match (&issue.ref_id, &issue.remote_id) {
            (Some(rid), _) => format!("#{rid}"),
            (None, Some(remote)) => format!("record {remote}"),
            (None, None) => String::new(),
        };
        warn(&format!("{} {}: {}", issue.collection, subject, issue.message));
    }

    match &report.aborted {
        Some(reason) => warn(&format!(
            "run aborted early: {reason} (collections synced before the failure stay synced)"
        )),
        None if report.issues.is_empty() => success("in sync"),
        None => success(&format!(
            "in sync, with {} warning(s) above",
            report.issues.len()
        )),
    }
}

fn counter_line(counters: &CollectionCounters) -> String {
    let mut parts = Vec::new();
    for (label, value) in [
        ("pulled", counters.pulled),
        ("pushed", counters.pushed),
        ("promoted", counters.promoted),
        ("created", counters.created_remote),
        ("removed", counters.removed_remote),
        ("skipped", counters.skipped),
        ("untouched", counters.untouched),
    ] {
        if value > 0 {
            parts.push(format!("{label} {value}"));
        }
    }
    if parts.is_empty() {
        "no changes".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_line_skips_zero_counters() {
        let counters = CollectionCounters {
            pulled: 2,
            untouched: 5,
            ..Default::default()
        };
        assert_eq!(counter_line(&counters), "pulled 2, untouched 5");
    }

    #[test]
    fn test_counter_line_for_an_idle_collection() {
        assert_eq!(counter_line(&CollectionCounters::default()), "no changes");
    }
}
