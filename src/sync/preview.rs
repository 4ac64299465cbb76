//! Dry-run preview of classified changes.

use super::types::{KindReport, RunMode, RunReport};
use crate::diff::{Diff, Diffs, JoinChange, Keyed};
use crate::model::{Item, Relationship, Set};
use colored::Colorize;

/// How one entity kind is named and labelled in the preview.
trait Preview: Keyed {
    const NOUN: &'static str;

    fn label(&self) -> String;

    fn remote(&self) -> Option<&str>;
}

impl Preview for Set {
    const NOUN: &'static str = "set(s)";

    fn label(&self) -> String {
        format!("{}.{}", self.schema, self.name.physical)
    }

    fn remote(&self) -> Option<&str> {
        self.remote_id()
    }
}

impl Preview for Item {
    const NOUN: &'static str = "item(s)";

    fn label(&self) -> String {
        if self.fqdn.is_empty() {
            self.set.item(&self.name.physical).to_string()
        } else {
            self.fqdn.clone()
        }
    }

    fn remote(&self) -> Option<&str> {
        self.remote_id()
    }
}

impl Preview for Relationship {
    const NOUN: &'static str = "relationship(s)";

    fn label(&self) -> String {
        format!("{}.{}", self.schema, self.name.physical)
    }

    fn remote(&self) -> Option<&str> {
        self.remote_id()
    }
}

impl Preview for JoinChange {
    const NOUN: &'static str = "join(s)";

    fn label(&self) -> String {
        format!("{} -> {}", self.join.parent.fqdn, self.join.child.fqdn)
    }

    fn remote(&self) -> Option<&str> {
        None
    }
}

fn entry<T: Preview>(marker: char, entity: &T) -> String {
    match entity.remote() {
        Some(id) => format!("    {marker} {} ({id})", entity.label()),
        None => format!("    {marker} {}", entity.label()),
    }
}

fn section<'a, T: Preview + 'a>(
    lines: &mut Vec<String>,
    verb: &str,
    marker: char,
    entities: impl ExactSizeIterator<Item = &'a T>,
    max: usize,
) {
    let total = entities.len();
    if total == 0 {
        return;
    }
    lines.push(format!("  {total} {} will be {verb}", T::NOUN));
    lines.extend(entities.take(max).map(|e| entry(marker, e)));
    if total > max {
        lines.push(format!("    {marker} and more..."));
    }
}

fn kind<T: Preview>(lines: &mut Vec<String>, diff: &Diff<T>, max: usize) {
    section(lines, "added to the catalog", '+', diff.added().iter(), max);
    section(lines, "removed from the catalog", '-', diff.deleted().iter(), max);
    section(
        lines,
        "updated in the catalog",
        '!',
        diff.updated().iter().map(|u| &u.entity),
        max,
    );
}

/// Preview lines for all four diffs, at most `max` entries per list.
#[must_use]
pub fn preview_lines(diffs: &Diffs, max: usize) -> Vec<String> {
    let mut lines = Vec::new();
    kind(&mut lines, &diffs.sets, max);
    kind(&mut lines, &diffs.items, max);
    kind(&mut lines, &diffs.relationships, max);
    kind(&mut lines, &diffs.joins, max);
    lines
}

/// Print the preview to stdout.
pub fn print_preview(diffs: &Diffs, max: usize) {
    println!("{}", "Dry run".bold().underline());
    let lines = preview_lines(diffs, max);
    if lines.is_empty() {
        println!("  {}", "Catalog is up to date.".green());
        return;
    }
    for line in lines {
        match line.trim_start().chars().next() {
            Some('+') => println!("{}", line.green()),
            Some('-') => println!("{}", line.red()),
            Some('!') => println!("{}", line.yellow()),
            _ => println!("{}", line.bold()),
        }
    }
}

fn report_line(label: &str, kind: &KindReport) {
    if kind.total() + kind.failed + kind.skipped == 0 {
        return;
    }
    let mut line = format!(
        "  {label:<14} +{} !{} -{}",
        kind.added, kind.updated, kind.deleted
    );
    if kind.skipped > 0 {
        line.push_str(&format!("  skipped {}", kind.skipped));
    }
    if kind.failed > 0 {
        println!("{line}  {}", format!("failed {}", kind.failed).red());
    } else {
        println!("{line}");
    }
}

/// Print a run summary to stdout.
pub fn print_report(report: &RunReport) {
    let title = match report.mode {
        RunMode::DryRun => "Dry run summary",
        RunMode::Commit => "Sync summary",
    };
    println!("{}", title.bold().underline());
    if report.changes() + report.failed() == 0 {
        println!("  {}", "No changes.".green());
        return;
    }
    report_line("Sets:", &report.sets);
    report_line("Items:", &report.items);
    report_line("Relationships:", &report.relationships);
    report_line("Joins:", &report.joins);

    let elapsed = report.finished_at - report.started_at;
    println!(
        "{}",
        format!("Finished in {} ms", elapsed.num_milliseconds()).dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SetType;
    use crate::testing::{customers, orders};

    fn sales(mut set: Set) -> Set {
        set.schema = "sales".into();
        set
    }

    #[test]
    fn test_preview_lists_changes() {
        let mut diffs = Diffs::default();
        diffs.sets.add(sales(orders()));
        let mut gone = sales(customers());
        gone.id = Some("set-7".into());
        diffs.sets.delete(gone);

        let lines = preview_lines(&diffs, 10);
        assert_eq!(
            lines,
            vec![
                "  1 set(s) will be added to the catalog",
                "    + sales.orders",
                "  1 set(s) will be removed from the catalog",
                "    - sales.customers (set-7)",
            ]
        );
    }

    #[test]
    fn test_preview_truncates() {
        let mut diffs = Diffs::default();
        for name in ["a", "b", "c"] {
            diffs.sets.add(sales(Set::new(name, SetType::Table)));
        }

        let lines = preview_lines(&diffs, 2);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "  3 set(s) will be added to the catalog");
        assert_eq!(lines[3], "    + and more...");
    }

    #[test]
    fn test_empty_preview() {
        assert!(preview_lines(&Diffs::default(), 5).is_empty());
    }
}
