//! Command-line front end for the contact book.
//!
//! # Responsibility
//! - Map subcommands onto `contactbook_api` handlers.
//! - Print the JSON body; exit non-zero when the status is an error.

mod args;

use args::{Cli, Command, ContactCommand, GroupCommand};
use clap::Parser;
use contactbook_api::{Api, ApiConfig, ApiResponse, ContactRequest};
use contactbook_core::{default_log_level, init_logging, LoggingConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _logging = match &cli.log_dir {
        Some(log_dir) => {
            let level = cli
                .log_level
                .clone()
                .unwrap_or_else(|| default_log_level().to_string());
            match init_logging(&LoggingConfig::new(level, log_dir.clone())) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    eprintln!("logging init failed: {err}");
                    return ExitCode::FAILURE;
                }
            }
        }
        None => None,
    };

    let config = match ApiConfig::resolve(cli.db_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    let api = Api::new(config);

    let response = match run(&api, cli.command) {
        Ok(response) => response,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    print_response(&response)
}

fn run(api: &Api, command: Command) -> Result<ApiResponse, String> {
    let response = match command {
        Command::Contact(command) => match command {
            ContactCommand::Create { fields, json } => {
                let requests = match json {
                    Some(raw) => parse_contacts(&raw)?,
                    None => vec![ContactRequest::from(fields)],
                };
                api.create_contacts(requests)
            }
            ContactCommand::Update { id, fields } => api.update_contact(&id, fields.into()),
            ContactCommand::Get { id } => api.get_contact(&id),
            ContactCommand::List(list) => api.list_contacts(list.into()),
            ContactCommand::Count => api.count_contacts(),
            ContactCommand::Archive { id } => api.archive_contact(&id),
        },
        Command::Group(command) => match command {
            GroupCommand::Create(fields) => api.create_group(fields.into()),
            GroupCommand::Update { id, fields } => api.update_group(&id, fields.into()),
            GroupCommand::Get { id } => api.get_group(&id),
            GroupCommand::List(list) => api.list_groups(list.into()),
            GroupCommand::Count => api.count_groups(),
            GroupCommand::Archive { id } => api.archive_group(&id),
            GroupCommand::CreateContacts { group_id, json } => {
                api.create_contacts_into_group(&group_id, parse_contacts(&json)?)
            }
            GroupCommand::AddContacts {
                group_id,
                contact_ids,
            } => api.add_contacts_to_group(&group_id, &contact_ids),
            GroupCommand::RemoveContact {
                group_id,
                contact_id,
            } => api.remove_contact_from_group(&group_id, &contact_id),
            GroupCommand::Members { group_id } => api.list_group_members(&group_id),
        },
    };
    Ok(response)
}

fn parse_contacts(raw: &str) -> Result<Vec<ContactRequest>, String> {
    serde_json::from_str(raw).map_err(|err| format!("invalid contacts JSON: {err}"))
}

fn print_response(response: &ApiResponse) -> ExitCode {
    let rendered = if response.body.is_null() {
        String::new()
    } else {
        serde_json::to_string_pretty(&response.body).unwrap_or_else(|_| response.body.to_string())
    };

    if response.is_success() {
        if !rendered.is_empty() {
            println!("{rendered}");
        }
        ExitCode::SUCCESS
    } else {
        eprintln!("status={} {rendered}", response.status);
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::parse_contacts;

    #[test]
    fn parse_contacts_accepts_camel_case_array() {
        let parsed =
            parse_contacts(r#"[{"phoneNumber":"123","name":"Ann"},{"phoneNumber":"456"}]"#)
                .unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].phone_number, "123");
        assert_eq!(parsed[1].name, "");
    }

    #[test]
    fn parse_contacts_rejects_non_array() {
        assert!(parse_contacts(r#"{"phoneNumber":"123"}"#)
            .unwrap_err()
            .contains("invalid contacts JSON"));
    }
}
