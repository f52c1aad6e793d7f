use tablesmith_db::{MigrationAction, MigrationOutcome};
use tablesmith_schema::SchemaDescriptor;

const WIDTH: usize = 60;
const LABEL_W: usize = 14;
const VALUE_W: usize = WIDTH - LABEL_W - 4; // 4 for "│ " + " │"

/// Boxed overview of a planned migration, one entry per output line.
pub fn render_summary(descriptor: &SchemaDescriptor, outcome: &MigrationOutcome) -> Vec<String> {
    let version = env!("CARGO_PKG_VERSION");

    let action = match outcome.action {
        MigrationAction::Created => "create",
        MigrationAction::Altered => "alter",
        MigrationAction::Repaired => "repair indexes",
        MigrationAction::Unchanged => "nothing to do",
        MigrationAction::Failed => "failed",
    };
    let target = descriptor
        .version()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unversioned".to_string());
    let indexes = descriptor.indexes().count();

    let title = format!("tablesmith v{version}");
    let top = format!("╭─── {title} {}╮", "─".repeat(WIDTH - 7 - title.chars().count()));
    let bottom = format!("╰{}╯", "─".repeat(WIDTH - 2));
    let row = |l: &str, r: &str| format!("│ {:<LABEL_W$}{:<VALUE_W$} │", l, fit(r, VALUE_W));

    let mut lines = vec![
        top,
        row("Table", descriptor.table_name()),
        row("Engine", &descriptor.engine().to_string()),
        row("Version", &target),
        row("", &"─".repeat(VALUE_W)),
        row("Columns", &descriptor.columns().len().to_string()),
        row("Indexes", &indexes.to_string()),
        row("Foreign keys", &descriptor.foreign_keys().len().to_string()),
        row("", &"─".repeat(VALUE_W)),
        row("Action", action),
        row("Statements", &outcome.statements.len().to_string()),
    ];
    if !outcome.warnings.is_empty() {
        lines.push(row("Warnings", &outcome.warnings.len().to_string()));
    }
    if !outcome.errors.is_empty() {
        lines.push(row("Errors", &outcome.errors.len().to_string()));
    }
    lines.push(bottom);
    lines
}

pub fn print_summary(descriptor: &SchemaDescriptor, outcome: &MigrationOutcome) {
    for line in render_summary(descriptor, outcome) {
        println!("{line}");
    }
}

fn fit(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(width - 1).collect();
    cut.push('…');
    cut
}
