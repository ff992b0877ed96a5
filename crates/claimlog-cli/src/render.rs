use claimlog_core::catalog::{Catalog, ConditionDefinition, FieldType};
use claimlog_core::config::Settings;
use claimlog_core::correlation::CorrelationReport;
use claimlog_core::entry::LogEntry;
use claimlog_core::stats::ConditionStats;

pub fn entry_line(entry: &LogEntry, catalog: &Catalog) -> String {
    let severity = entry
        .severity()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "-".to_string());
    let notes = entry.notes().map(str::trim).filter(|n| !n.is_empty()).unwrap_or("(no notes)");
    format!(
        "{} | {} | {} | {} | {}",
        entry.id,
        catalog.name_of(&entry.condition_id),
        entry.occurrence_date().format("%Y-%m-%d"),
        severity,
        notes
    )
}

pub fn entry_detail(entry: &LogEntry, catalog: &Catalog) -> String {
    let mut lines = vec![
        format!("id: {}", entry.id),
        format!("condition: {}", catalog.name_of(&entry.condition_id)),
        format!("logged: {}", entry.timestamp.to_rfc3339()),
    ];
    for (name, value) in &entry.data {
        lines.push(format!("{}: {}", name, value));
    }
    lines.join("\n")
}

fn type_name(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text => "text",
        FieldType::Number => "number",
        FieldType::Date => "date",
        FieldType::Time => "time",
        FieldType::Select => "select",
        FieldType::Textarea => "textarea",
        FieldType::Checkbox => "checkbox",
    }
}

pub fn condition_block(condition: &ConditionDefinition) -> String {
    let mut lines = vec![format!("{} ({})", condition.name, condition.id)];
    lines.push(format!("  {}", condition.description));
    for field in &condition.fields {
        let mut line = format!(
            "  - {}{}: {}",
            field.name,
            if field.required { "*" } else { "" },
            type_name(field.field_type)
        );
        if let Some(options) = &field.options {
            line.push_str(&format!(" [{}]", options.join(" | ")));
        }
        if field.min.is_some() || field.max.is_some() {
            let min = field.min.map(|v| v.to_string()).unwrap_or_default();
            let max = field.max.map(|v| v.to_string()).unwrap_or_default();
            line.push_str(&format!(" ({}..{})", min, max));
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn stats_block(stats: &ConditionStats, catalog: &Catalog) -> String {
    let mut lines = vec![catalog.name_of(&stats.condition_id).to_string()];
    lines.push(format!("  total logs: {}", stats.total_logs));
    lines.push(format!("  average severity: {}", stats.average_severity));
    lines.push(format!("  prostrating: {}%", stats.prostrating_percentage));
    let since = stats
        .days_since_last_log
        .map(|days| format!("{} days", days))
        .unwrap_or_else(|| "never".to_string());
    lines.push(format!("  last log: {}", since));
    lines.push(format!("  current streak: {} days", stats.current_streak_days));
    lines.push(format!("  estimated rating: {}", stats.va_rating_estimate));
    if let Some(criteria) = &stats.rating_criteria {
        lines.push(format!("    {}", criteria));
    }
    lines.join("\n")
}

pub fn correlation_block(report: &CorrelationReport, catalog: &Catalog) -> String {
    if report.pairs.is_empty() {
        return "No conditions logged on the same day.".to_string();
    }
    let mut lines = vec!["Co-occurring conditions:".to_string()];
    for pair in &report.pairs {
        lines.push(format!(
            "  {} + {}: {} day(s)",
            catalog.name_of(&pair.first),
            catalog.name_of(&pair.second),
            pair.count
        ));
    }
    lines.push("Recent multi-condition days:".to_string());
    for day in &report.days {
        let names: Vec<&str> = day
            .condition_ids
            .iter()
            .map(|id| catalog.name_of(id))
            .collect();
        lines.push(format!("  {}: {}", day.date.format("%Y-%m-%d"), names.join(", ")));
    }
    lines.join("\n")
}

pub fn settings_block(settings: &Settings) -> String {
    let file_or_none = |path: &Option<std::path::PathBuf>| {
        path.as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    };
    let catalog = match &settings.catalog_file {
        Some(setting) => format!("{} ({})", setting.value.display(), setting.source),
        None => "built-in (default)".to_string(),
    };
    [
        format!("home: {}", settings.home.display()),
        format!("project config: {}", file_or_none(&settings.project_file)),
        format!("global config: {}", file_or_none(&settings.global_file)),
        format!(
            "data_file: {} ({})",
            settings.data_file.value.display(),
            settings.data_file.source
        ),
        format!("catalog_file: {}", catalog),
        format!(
            "seed_on_first_run: {} ({})",
            settings.seed_on_first_run.value, settings.seed_on_first_run.source
        ),
    ]
    .join("\n")
}
