//! Output formatting for the CLI.

use clap::ValueEnum;
use p4_cli_ops::{ChangeRecord, CommandOutput, P4File};
use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Pretty-printed JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "status": "success", "message": message })
        ),
    }
}

pub fn print_error(message: &str, code: Option<&str>, format: &OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => eprintln!(
            "{}",
            serde_json::json!({ "status": "error", "code": code, "message": message })
        ),
    }
}

pub fn print_row(label: &str, value: &str) {
    println!("  {:<16} {}", format!("{}:", label), value);
}

pub fn print_heading(text: &str) {
    println!("\n{}", text);
    println!("{}", "-".repeat(50));
}

pub fn print_lines(lines: &[String], empty: &str, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(lines),
        OutputFormat::Text => {
            if lines.is_empty() {
                println!("{}", empty);
            }
            for line in lines {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

pub fn print_files(files: &[P4File], format: &OutputFormat) -> anyhow::Result<()> {
    if *format == OutputFormat::Json {
        return print_json(files);
    }
    if files.is_empty() {
        println!("No files found");
        return Ok(());
    }
    println!("{:<18} {:>9} {:<10} {}", "Status", "Have/Head", "Action", "Path");
    println!("{}", "-".repeat(100));
    for file in files {
        let revisions = format!(
            "{}/{}",
            file.have_rev.map_or("-".to_string(), |rev| rev.to_string()),
            file.head_rev.map_or("-".to_string(), |rev| rev.to_string())
        );
        let path = file
            .depot_path
            .as_deref()
            .or(file.local_path.as_deref())
            .unwrap_or("-");
        println!(
            "{:<18} {:>9} {:<10} {}",
            file.status().as_str(),
            revisions,
            file.action.as_deref().unwrap_or("-"),
            path
        );
        if !file.checked_out_by.is_empty() {
            println!("{:<39} also opened by {}", "", file.checked_out_by.join(", "));
        }
    }
    Ok(())
}

pub fn print_changes(changes: &[ChangeRecord], format: &OutputFormat) -> anyhow::Result<()> {
    if *format == OutputFormat::Json {
        return print_json(changes);
    }
    if changes.is_empty() {
        println!("No changelists found");
        return Ok(());
    }
    for change in changes {
        let when = change
            .time
            .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:<10} {:<16} {}  {}",
            change.change,
            change.status.as_deref().unwrap_or("-"),
            change.user.as_deref().unwrap_or("-"),
            when,
            change.description.lines().next().unwrap_or_default()
        );
    }
    Ok(())
}

/// Summary of a raw command: records as JSON lines or key/value blocks,
/// followed by per-file messages.
pub fn print_command_output(output: &CommandOutput, format: &OutputFormat) -> anyhow::Result<()> {
    if *format == OutputFormat::Json {
        return print_json(output);
    }
    for record in &output.records {
        for (key, value) in record.iter() {
            println!("{} {}", key, value);
        }
        println!();
    }
    for line in &output.info {
        println!("{}", line);
    }
    for message in &output.messages {
        eprintln!("{}", message);
    }
    Ok(())
}
