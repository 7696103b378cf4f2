//! GitHub Actions workflow commands.

use crate::error::ActionError;
use std::io::Write as _;
use std::path::Path;

const OUTPUT_DELIMITER: &str = "ghadelimiter_nunu_upload";

/// Publish a step output for later steps.
pub fn set_output(name: &str, value: &str) -> Result<(), ActionError> {
    match std::env::var_os("GITHUB_OUTPUT") {
        Some(path) if !path.is_empty() => append_output(Path::new(&path), name, value),
        _ => {
            println!("::set-output name={}::{}", name, escape_data(value));
            Ok(())
        }
    }
}

/// Mark the step as failed with `message`.
pub fn report_failure(message: &str) {
    println!("::error::{}", escape_data(message));
}

fn append_output(path: &Path, name: &str, value: &str) -> Result<(), ActionError> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    if value.contains('\n') {
        write!(
            file,
            "{name}<<{OUTPUT_DELIMITER}\n{value}\n{OUTPUT_DELIMITER}\n"
        )?;
    } else {
        writeln!(file, "{}={}", name, value)?;
    }

    tracing::debug!("Set output {} in {}", name, path.display());
    Ok(())
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
