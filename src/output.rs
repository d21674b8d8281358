use std::io::{self, Write};

use serde::Serialize;

use crate::workflow::RunSummary;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_summary(summary: &RunSummary) {
        for report in &summary.subjects {
            println!(
                "{}: {} fetched, {} copied, {} removed, {} kept, {} failures",
                report.subject,
                report.fetched.len(),
                report.copied.len(),
                report.removed.len(),
                report.kept.len(),
                report.failures.len()
            );
            for failure in &report.failures {
                println!("   {failure}");
            }
        }
    }
}
