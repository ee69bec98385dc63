// SPDX-License-Identifier: CEPL-1.0
//! Last-resort sink for errors that end the process.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Written to the working directory.
pub const ERROR_LOG_FILE: &str = "error_log.txt";

/// Renders the whole cause chain, outermost context first.
pub fn format_fatal(stage: &str, err: &anyhow::Error) -> String {
    let mut out = format!("fatal error during {stage}\n");
    for (depth, cause) in err.chain().enumerate() {
        if depth == 0 {
            out.push_str(&format!("  {cause}\n"));
        } else {
            out.push_str(&format!("  caused by: {cause}\n"));
        }
    }
    out.push('\n');
    out
}

/// Appends the formatted error to `path`, creating the file when missing.
pub fn append_fatal(path: &Path, stage: &str, err: &anyhow::Error) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(format_fatal(stage, err).as_bytes())?;
    file.flush()
}
