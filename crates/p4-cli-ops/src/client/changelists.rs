use super::paths::change_records;
use super::{to_args, P4Client};
use crate::types::{
    Changelist, ChangelistFilter, ChangelistRef, CommandOutput, PendingChangelist, RunOptions,
    ShelvedFile,
};
use crate::{P4CliOpsError, P4Result};
use tracing::{info, warn};

impl P4Client {
    /// Create a numbered changelist with `description` and no files.
    pub async fn make_new_changelist(&self, description: &str) -> P4Result<u32> {
        if self.online_check && !self.host_online().await {
            return Err(P4CliOpsError::ServerOffline {
                server: self.server.clone(),
            });
        }

        let mut form_args = self.global_args();
        form_args.extend([
            "--field".to_string(),
            format!("Description={description}"),
            "--field".to_string(),
            "Files=".to_string(),
            "change".to_string(),
            "-o".to_string(),
        ]);
        let form = self.execute(form_args, None, false).await?.ensure_success()?;

        let mut create_args = self.global_args();
        create_args.extend(["change".to_string(), "-i".to_string()]);
        let created = self
            .execute(create_args, Some(form.stdout().to_string()), false)
            .await?
            .ensure_success()?;

        let number = created
            .info
            .iter()
            .find_map(|line| parse_created_change(line))
            .ok_or_else(|| P4CliOpsError::ParseError {
                message: format!("unexpected `change -i` output: {}", created.stdout().trim()),
            })?;
        info!(changelist = number, "Created changelist");
        Ok(number)
    }

    /// Pending changelists of this user and workspace matching `filter`.
    pub async fn get_pending_changelists(
        &self,
        filter: &ChangelistFilter,
    ) -> P4Result<Vec<PendingChangelist>> {
        let flags = [
            "-l",
            "-s",
            "pending",
            "-u",
            self.user.as_str(),
            "-c",
            self.workspace.as_str(),
        ];
        let output = self
            .run_cmd("changes", &to_args(&flags), &[], RunOptions::default())
            .await?
            .ensure_success()?;

        Ok(change_records(&output.records)?
            .into_iter()
            .filter(|change| filter.matches(&change.description))
            .map(|change| PendingChangelist {
                number: change.change,
                description: change.description,
            })
            .collect())
    }

    pub async fn get_pending_changelist_numbers(
        &self,
        filter: &ChangelistFilter,
    ) -> P4Result<Vec<u32>> {
        Ok(self
            .get_pending_changelists(filter)
            .await?
            .into_iter()
            .map(|changelist| changelist.number)
            .collect())
    }

    pub async fn get_pending_changelist_descriptions(
        &self,
        filter: &ChangelistFilter,
    ) -> P4Result<Vec<String>> {
        Ok(self
            .get_pending_changelists(filter)
            .await?
            .into_iter()
            .map(|changelist| changelist.description)
            .collect())
    }

    /// Whether `changelist` is the default changelist or one of the pending
    /// changelists. Descriptions must match exactly.
    pub async fn changelist_exists(&self, changelist: &ChangelistRef) -> P4Result<bool> {
        match changelist {
            ChangelistRef::Default => Ok(true),
            ChangelistRef::Number(number) => Ok(self
                .get_pending_changelist_numbers(&ChangelistFilter::all())
                .await?
                .contains(number)),
            ChangelistRef::Description(description) => Ok(self
                .find_changelist_by_description(description)
                .await?
                .is_some()),
        }
    }

    /// Pending changelist whose description equals `description`, created
    /// when there is none. `"default"` is the default changelist.
    pub async fn get_or_make_changelist(
        &self,
        description: &str,
        case_sensitive: bool,
    ) -> P4Result<Changelist> {
        if description == "default" {
            return Ok(Changelist::Default);
        }

        let filter = ChangelistFilter {
            description: description.to_string(),
            perfect_match_only: true,
            case_sensitive,
        };
        if let Some(number) = self
            .get_pending_changelist_numbers(&filter)
            .await?
            .into_iter()
            .next()
        {
            return Ok(Changelist::Numbered(number));
        }

        Ok(Changelist::Numbered(self.make_new_changelist(description).await?))
    }

    /// Resolve a caller-supplied changelist, creating it when it is given by
    /// a description no pending changelist has.
    pub async fn ensure_changelist(&self, changelist: &ChangelistRef) -> P4Result<Changelist> {
        match changelist {
            ChangelistRef::Default => Ok(Changelist::Default),
            ChangelistRef::Number(number) => Ok(Changelist::Numbered(*number)),
            ChangelistRef::Description(description) => match description.trim().parse::<u32>() {
                Ok(number) => Ok(Changelist::Numbered(number)),
                Err(_) => self.get_or_make_changelist(description, false).await,
            },
        }
    }

    /// Move opened files to `changelist` (`reopen -c`).
    pub async fn move_files_to_changelist(
        &self,
        files: &[impl AsRef<str>],
        changelist: &ChangelistRef,
    ) -> P4Result<CommandOutput> {
        let files = to_args(files);
        if files.is_empty() {
            warn!("No files given to reopen");
            return Ok(CommandOutput::empty());
        }
        let changelist = self.ensure_changelist(changelist).await?;
        self.run_cmd(
            "reopen",
            &["-c".to_string(), changelist.as_arg()],
            &files,
            RunOptions::default(),
        )
        .await
    }

    /// Depot paths of the files in a changelist. A description no pending
    /// changelist matches yields no files.
    pub async fn get_files_in_changelist(&self, changelist: &ChangelistRef) -> P4Result<Vec<String>> {
        let number = match changelist {
            ChangelistRef::Default => return self.get_files_in_default_changelist().await,
            ChangelistRef::Number(number) => *number,
            ChangelistRef::Description(description) => {
                match self.find_changelist_by_description(description).await? {
                    Some(number) => number,
                    None => return Ok(Vec::new()),
                }
            }
        };

        let output = self
            .run_cmd(
                "describe",
                &["-O".to_string()],
                &[number.to_string()],
                RunOptions::default(),
            )
            .await?
            .ensure_success()?;

        Ok(output
            .records
            .iter()
            .flat_map(|record| record.indexed("depotFile"))
            .map(str::to_string)
            .collect())
    }

    /// Changelist `depot_path` is open in for this user, if any.
    pub async fn get_changelist_for_file(&self, depot_path: &str) -> P4Result<Option<Changelist>> {
        let output = self
            .run_cmd(
                "opened",
                &["-a".to_string(), "-u".to_string(), self.user.clone()],
                &[],
                RunOptions::default(),
            )
            .await?
            .ensure_success()?;

        Ok(output
            .records
            .iter()
            .find(|record| record.get("depotFile") == Some(depot_path))
            .and_then(|record| record.get("change"))
            .and_then(|change| match change.trim() {
                "default" => Some(Changelist::Default),
                number => number.parse().ok().map(Changelist::Numbered),
            }))
    }

    /// Delete every pending changelist matching `filter`. Returns the numbers
    /// p4 deleted.
    pub async fn delete_changelist(&self, filter: &ChangelistFilter) -> P4Result<Vec<u32>> {
        let mut deleted = Vec::new();
        for number in self.get_pending_changelist_numbers(filter).await? {
            let result = self
                .run_cmd(
                    "change",
                    &["-d".to_string(), number.to_string()],
                    &[],
                    RunOptions::default(),
                )
                .await;
            // A changelist that vanished since listing only skips that number.
            let failure = match result {
                Ok(output) => output.failure(),
                Err(err @ P4CliOpsError::Changelist { .. }) => Some(err),
                Err(err) => return Err(err),
            };
            match failure {
                Some(err) => warn!(changelist = number, error = %err, "Failed to delete changelist"),
                None => deleted.push(number),
            }
        }
        Ok(deleted)
    }

    /// Shelved files across all pending changelists.
    pub async fn get_shelved_files(&self) -> P4Result<Vec<ShelvedFile>> {
        let numbers: Vec<String> = self
            .get_pending_changelist_numbers(&ChangelistFilter::all())
            .await?
            .into_iter()
            .map(|number| number.to_string())
            .collect();
        if numbers.is_empty() {
            return Ok(Vec::new());
        }

        let output = self
            .run_cmd("describe", &["-S".to_string()], &numbers, RunOptions::default())
            .await?
            .ensure_success()?;

        let mut shelved = Vec::new();
        for record in &output.records {
            let Some(changelist) = record.get_u32("change") else {
                continue;
            };
            shelved.extend(record.indexed("depotFile").into_iter().map(|depot_path| {
                ShelvedFile {
                    depot_path: depot_path.to_string(),
                    changelist,
                }
            }));
        }
        Ok(shelved)
    }

    /// Submit a numbered changelist.
    pub async fn submit_changelist(&self, changelist: &ChangelistRef) -> P4Result<CommandOutput> {
        let number = match changelist {
            ChangelistRef::Default => {
                return Err(P4CliOpsError::InvalidParams {
                    message: "the default changelist cannot be submitted by number".to_string(),
                })
            }
            ChangelistRef::Number(number) => *number,
            ChangelistRef::Description(description) => self
                .find_changelist_by_description(description)
                .await?
                .ok_or_else(|| P4CliOpsError::Changelist {
                    message: format!("no pending changelist described as '{description}'"),
                })?,
        };

        let output = self
            .run_cmd(
                "submit",
                &["-c".to_string(), number.to_string()],
                &[],
                RunOptions::default(),
            )
            .await?
            .ensure_success()?;
        info!(changelist = number, "Submitted changelist");
        Ok(output)
    }

    /// Revert every file in `changelist`.
    pub async fn revert_changelist(
        &self,
        changelist: &ChangelistRef,
        unchanged_only: bool,
    ) -> P4Result<CommandOutput> {
        let files = self.get_files_in_changelist(changelist).await?;
        self.revert_files(&files, unchanged_only).await
    }

    async fn find_changelist_by_description(&self, description: &str) -> P4Result<Option<u32>> {
        Ok(self
            .get_pending_changelist_numbers(&ChangelistFilter::exact(description))
            .await?
            .into_iter()
            .next())
    }

    async fn get_files_in_default_changelist(&self) -> P4Result<Vec<String>> {
        let output = self
            .run_cmd(
                "opened",
                &["-c".to_string(), "default".to_string()],
                &[],
                RunOptions::default(),
            )
            .await?
            .ensure_success()?;

        Ok(output
            .records
            .iter()
            .filter_map(|record| record.get("depotFile").map(str::to_string))
            .collect())
    }
}

/// Number from a `Change N created.` line.
pub(crate) fn parse_created_change(line: &str) -> Option<u32> {
    let rest = line.trim().strip_prefix("Change ")?;
    let (number, tail) = rest.split_once(' ')?;
    if !tail.starts_with("created") {
        return None;
    }
    number.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_created_change() {
        assert_eq!(parse_created_change("Change 27277 created."), Some(27277));
        assert_eq!(
            parse_created_change("Change 12 created with 3 open file(s)."),
            Some(12)
        );
        assert_eq!(parse_created_change("Change 12 updated."), None);
        assert_eq!(parse_created_change("Something else"), None);
    }
}
