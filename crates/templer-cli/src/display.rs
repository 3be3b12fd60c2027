//! Terminal output for failures

use console::style;
use std::error::Error as _;
use templer_render::RenderReport;

/// Print an error: one line by default, the full diagnostic when `detailed`
pub fn error(err: miette::Report, detailed: bool) {
    if detailed {
        eprintln!("{:?}", err);
    } else {
        eprintln!("{} {}", style("error:").red().bold(), err);
    }
}

/// Single line with every cause of `err`, outermost first
pub fn cause_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if !parts.last().is_some_and(|last| last.contains(&message)) {
            parts.push(message);
        }
        source = cause.source();
    }
    parts.join(": ")
}

/// Print the failures of a render pass
///
/// Each failure was already logged when it happened; in detailed mode the
/// full diagnostic of every failure is printed again with its cause chain.
pub fn render_report(report: RenderReport, detailed: bool) {
    if report.is_success() {
        return;
    }

    eprintln!(
        "{} Template rendering failed: {}",
        style("✗").red(),
        style(report.summary()).bold()
    );

    if !detailed {
        return;
    }

    for (file, errors) in report.errors_by_file {
        eprintln!();
        eprintln!(
            "  {} {} ({})",
            style("→").blue(),
            style(&file).yellow(),
            pluralize(errors.len(), "error", "errors")
        );
        for err in errors {
            eprintln!("    {} {}", style("✗").red(), cause_chain(&err));
            eprintln!("{:?}", miette::Report::new(err));
        }
    }
}

/// Format count with proper pluralization
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}
