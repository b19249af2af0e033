//! Diff display - dirsync-specific UI

use colored::Colorize;
use converge::{Action, DiffReport, ResourceDiff, group_by_kind};
use graphkit::EntityKind;

use crate::ui;

fn kind_title(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Application => "Applications",
        EntityKind::ConditionalAccessPolicy => "Conditional access policies",
        EntityKind::Domain => "Domains",
        EntityKind::Group => "Groups",
        EntityKind::ServicePrincipal => "Service principals",
        EntityKind::User => "Users",
    }
}

fn state_description(diff: &ResourceDiff) -> String {
    match (&diff.action, diff.id.as_deref()) {
        (Action::Create, Some(id)) => format!("(removed externally, will recreate {id})"),
        (Action::Create, None) => format!("(not found) → {}", diff.description),
        (Action::Delete, Some(id)) => format!("(will remove {id})"),
        (Action::Update(changes), _) => ui::plural(changes.len(), "change"),
        _ => String::new(),
    }
}

/// Display planned changes and planning failures in a box
pub fn display_plan(report: &DiffReport) {
    let summary = report.summary();
    if !summary.has_changes() && !report.has_errors() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Directory Diff".bold()
    );
    println!("│");

    for (kind, diffs) in group_by_kind(report.changes()) {
        println!("│ {}", kind_title(kind).bold());

        for diff in diffs {
            let symbol = match &diff.action {
                Action::Create => "+".green(),
                Action::Delete => "-".red(),
                Action::Update(_) => "~".yellow(),
                Action::None => "?".dimmed(),
            };
            println!(
                "│   {} {:<30} {}",
                symbol,
                diff.address,
                state_description(diff).dimmed()
            );
            for change in diff.changes() {
                println!(
                    "│       {}: {} → {}",
                    change.field,
                    ui::truncate(&change.from, 60).dimmed(),
                    ui::truncate(&change.to, 60)
                );
            }
        }
        println!("│");
    }

    if report.has_errors() {
        println!("│ {}", "Errors".red().bold());
        for error in &report.errors {
            println!("│   {} {}", "✗".red(), error);
            println!("│       {}", error.source.category().advice().dimmed());
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to create, {} to update, {} to remove, {} unchanged",
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.removals.to_string().red(),
        summary.unchanged
    );
    if report.has_errors() {
        println!(
            "│ {} {}",
            report.errors.len().to_string().red().bold(),
            "resource(s) failed to plan".red()
        );
    }
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::Change;

    fn diff(action: Action, id: Option<&str>) -> ResourceDiff {
        ResourceDiff {
            index: 0,
            address: "group.admins".into(),
            kind: EntityKind::Group,
            description: "Group Admins".into(),
            id: id.map(str::to_string),
            action,
        }
    }

    #[test]
    fn test_state_description() {
        assert_eq!(
            state_description(&diff(Action::Create, None)),
            "(not found) → Group Admins"
        );
        assert!(state_description(&diff(Action::Create, Some("g1"))).contains("recreate g1"));
        assert_eq!(state_description(&diff(Action::Delete, Some("g1"))), "(will remove g1)");

        let changes = vec![
            Change::new("display_name", "\"A\"", "\"B\""),
            Change::new("members", "[]", "[\"u1\"]"),
        ];
        assert_eq!(state_description(&diff(Action::Update(changes), Some("g1"))), "2 changes");
        assert_eq!(state_description(&diff(Action::None, Some("g1"))), "");
    }

    #[test]
    fn test_kind_titles_cover_every_kind() {
        for kind in EntityKind::ALL {
            assert!(!kind_title(kind).is_empty());
        }
    }
}
