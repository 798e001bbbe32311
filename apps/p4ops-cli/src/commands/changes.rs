//! Changelist commands.

use super::{report, Context};
use crate::output::{self, OutputFormat};
use crate::FilterArgs;
use anyhow::Result;
use p4_cli_ops::{Changelist, ChangelistFilter, ChangelistRef};

fn to_filter(args: &FilterArgs) -> ChangelistFilter {
    ChangelistFilter {
        description: args.description.clone(),
        perfect_match_only: args.exact,
        case_sensitive: args.case_sensitive,
    }
}

pub async fn changes_pending(ctx: &Context, filter: &FilterArgs, format: &OutputFormat) -> Result<()> {
    let pending = ctx
        .client
        .get_pending_changelists(&to_filter(filter))
        .await?;
    match format {
        OutputFormat::Json => output::print_json(&pending),
        OutputFormat::Text => {
            if pending.is_empty() {
                println!("No pending changelists");
            }
            for changelist in &pending {
                println!(
                    "{:<8} {}",
                    changelist.number,
                    changelist.description.trim_end()
                );
            }
            Ok(())
        }
    }
}

pub async fn changes_new(ctx: &Context, description: &str, format: &OutputFormat) -> Result<()> {
    let number = ctx.client.make_new_changelist(description).await?;
    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({ "change": number })),
        OutputFormat::Text => {
            println!("Change {} created", number);
            Ok(())
        }
    }
}

pub async fn changes_delete(ctx: &Context, filter: &FilterArgs, format: &OutputFormat) -> Result<()> {
    let deleted = ctx.client.delete_changelist(&to_filter(filter)).await?;
    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({ "deleted": deleted })),
        OutputFormat::Text => {
            if deleted.is_empty() {
                println!("No changelists deleted");
            }
            for number in &deleted {
                println!("Change {} deleted", number);
            }
            Ok(())
        }
    }
}

pub async fn changes_files(ctx: &Context, changelist: &str, format: &OutputFormat) -> Result<()> {
    let files = ctx
        .client
        .get_files_in_changelist(&ChangelistRef::from(changelist))
        .await?;
    output::print_lines(&files, "No files in changelist", format)
}

pub async fn changes_exists(ctx: &Context, changelist: &str, format: &OutputFormat) -> Result<()> {
    let exists = ctx
        .client
        .changelist_exists(&ChangelistRef::from(changelist))
        .await?;
    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({ "exists": exists })),
        OutputFormat::Text => {
            println!("{}", if exists { "yes" } else { "no" });
            Ok(())
        }
    }
}

pub async fn changes_submit(ctx: &Context, changelist: &str, format: &OutputFormat) -> Result<()> {
    let result = ctx
        .client
        .submit_changelist(&ChangelistRef::from(changelist))
        .await?;
    if *format == OutputFormat::Text {
        if let Some(number) = result
            .records
            .iter()
            .find_map(|record| record.get_u32("submittedChange"))
        {
            println!("Submitted as change {}", number);
            return Ok(());
        }
    }
    report("Submitted", &result, format)
}

pub async fn changes_shelved(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let shelved = ctx.client.get_shelved_files().await?;
    match format {
        OutputFormat::Json => output::print_json(&shelved),
        OutputFormat::Text => {
            if shelved.is_empty() {
                println!("No shelved files");
            }
            for file in &shelved {
                println!("{:<8} {}", file.changelist, file.depot_path);
            }
            Ok(())
        }
    }
}

pub async fn changes_revert(
    ctx: &Context,
    changelist: &str,
    unchanged_only: bool,
    format: &OutputFormat,
) -> Result<()> {
    let result = ctx
        .client
        .revert_changelist(&ChangelistRef::from(changelist), unchanged_only)
        .await?;
    report("Reverted", &result, format)
}

pub async fn changes_reopen(
    ctx: &Context,
    changelist: &str,
    files: &[String],
    format: &OutputFormat,
) -> Result<()> {
    let result = ctx
        .client
        .move_files_to_changelist(files, &ChangelistRef::from(changelist))
        .await?;
    report("Moved", &result, format)
}

pub async fn opened_in(ctx: &Context, depot_path: &str, format: &OutputFormat) -> Result<()> {
    let changelist = ctx.client.get_changelist_for_file(depot_path).await?;
    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "depot_path": depot_path,
            "changelist": changelist.map(|cl| cl.to_string()),
        })),
        OutputFormat::Text => {
            match changelist {
                Some(Changelist::Default) => println!("default"),
                Some(Changelist::Numbered(number)) => println!("{}", number),
                None => println!("{} is not opened", depot_path),
            }
            Ok(())
        }
    }
}
