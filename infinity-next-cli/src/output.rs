use infinity_next_api::PublishOutcome;
use std::io::{self, Write};

pub(crate) fn note(msg: &str) {
    let _ = writeln!(io::stderr(), "inext: {}", msg);
}

pub(crate) fn warn(msg: &str) {
    let _ = writeln!(io::stderr(), "inext (warning): {}", msg);
}

/// Print the full error chain, outermost context first.
pub(crate) fn print_error(err: &anyhow::Error) {
    let stderr = io::stderr();
    let mut w = stderr.lock();
    let _ = writeln!(w, "Error: {}", err);
    for cause in err.chain().skip(1) {
        let _ = writeln!(w, "  caused by: {}", cause);
    }
}

pub(crate) fn print_publish_outcome(outcome: &PublishOutcome) {
    let stdout = io::stdout();
    let mut w = stdout.lock();
    if outcome.has_warnings() {
        let _ = writeln!(
            w,
            "published changes with warnings: {}",
            outcome.warnings.join(", ")
        );
    } else {
        let _ = writeln!(w, "Successfully published changes");
    }
}

pub(crate) fn print_discarded() {
    let _ = writeln!(io::stdout(), "Successfully discarded changes");
}

pub(crate) fn print_enforced(task_id: &str) {
    let _ = writeln!(io::stdout(), "Enforce policy task {} succeeded", task_id);
}
