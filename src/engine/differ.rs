//! Plan display

use colored::Colorize;
use secgroups::{GroupHandle, ReconciliationPlan};
use std::fmt::Write;

/// Render a plan in a boxed, human-readable layout
pub fn format_plan(plan: &ReconciliationPlan) -> String {
    let mut out = String::new();

    if plan.is_empty() {
        let _ = writeln!(out, "  {} No changes needed", "✓".green());
        return out;
    }

    let _ = writeln!(
        out,
        "┌─ {} ─────────────────────────────────────────┐",
        "Security Group Plan".bold()
    );
    let _ = writeln!(out, "│");

    if !plan.creates.is_empty() {
        let _ = writeln!(out, "│ {}", "Groups to create".bold());
        for create in &plan.creates {
            let vpc = create.vpc.as_deref().unwrap_or("no vpc");
            let _ = writeln!(
                out,
                "│   {} {:<30} {}",
                "+".green(),
                create.name,
                format!("({vpc}) {}", create.description).dimmed()
            );
        }
        let _ = writeln!(out, "│");
    }

    if !plan.updates.is_empty() {
        let _ = writeln!(out, "│ {}", "Rules to authorize".bold());
        for update in &plan.updates {
            let handle = match &update.handle {
                GroupHandle::Existing(id) => id.clone(),
                GroupHandle::Pending(_) => "new".to_string(),
            };
            let _ = writeln!(out, "│   {} {}", update.name.cyan(), format!("[{handle}]").dimmed());
            for rule in &update.rules {
                let _ = writeln!(out, "│     {} {rule}", "+".green());
            }
        }
        let _ = writeln!(out, "│");
    }

    let _ = writeln!(out, "├─────────────────────────────────────────────────────┤");
    let _ = writeln!(
        out,
        "│ Summary: {} to create, {} to authorize",
        crate::ui::plural(plan.creates.len(), "group").bold(),
        crate::ui::plural(plan.rule_count(), "rule").bold()
    );
    let _ = writeln!(out, "└─────────────────────────────────────────────────────┘");
    out
}

/// Print a plan
pub fn display_plan(plan: &ReconciliationPlan) {
    println!();
    print!("{}", format_plan(plan));
}

#[cfg(test)]
mod tests {
    use super::*;
    use secgroups::{DesiredState, Document, DocumentFormat, RemoteSnapshot, plan};

    fn plan_for(yaml: &str) -> ReconciliationPlan {
        let document = Document::from_str_with_format(yaml, DocumentFormat::Yaml).unwrap();
        let desired = DesiredState::load(&document).unwrap();
        plan(&desired, &RemoteSnapshot::default()).unwrap()
    }

    #[test]
    fn test_empty_plan() {
        let text = format_plan(&ReconciliationPlan::default());
        assert!(text.contains("No changes needed"));
    }

    #[test]
    fn test_plan_lists_groups_and_rules() {
        let text = format_plan(&plan_for(
            "web:\n  options:\n    vpc: vpc-1\n    rules:\n      - \"tcp port 80, 443 0.0.0.0/0\"\n",
        ));
        assert!(text.contains("Groups to create"));
        assert!(text.contains("(vpc-1) managed by roadhouse"));
        assert!(text.contains("tcp port 80 0.0.0.0/0"));
        assert!(text.contains("tcp port 443 0.0.0.0/0"));
        assert!(text.contains("[new]"));
        assert!(text.contains("1 group"));
        assert!(text.contains("2 rules"));
    }
}
