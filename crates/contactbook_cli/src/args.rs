use clap::{Args, Parser, Subcommand};
use contactbook_api::{ContactRequest, GroupRequest, ListParams};

/// contactbook: manage contacts, groups and group membership
#[derive(Debug, Parser)]
#[command(name = "contactbook", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// SQLite database file (created and migrated on first use)
    #[arg(long, env = "CONTACTBOOK_DB_PATH")]
    pub db_path: Option<String>,

    /// Absolute directory for rotating log files; logging is off when unset
    #[arg(long, env = "CONTACTBOOK_LOG_DIR")]
    pub log_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CONTACTBOOK_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Contact operations
    #[command(subcommand)]
    Contact(ContactCommand),
    /// Group and membership operations
    #[command(subcommand)]
    Group(GroupCommand),
}

#[derive(Debug, Subcommand)]
pub enum ContactCommand {
    /// Create one contact from flags, or a batch from --json
    Create {
        #[command(flatten)]
        fields: ContactFields,
        /// JSON array of contacts (camelCase keys); replaces the field flags
        #[arg(long, conflicts_with = "phone")]
        json: Option<String>,
    },
    /// Replace every field of an active contact
    Update {
        id: String,
        #[command(flatten)]
        fields: ContactFields,
    },
    Get {
        id: String,
    },
    List(ListArgs),
    Count,
    /// Archive a contact and recount its groups
    Archive {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum GroupCommand {
    Create(GroupFields),
    /// Replace name and description of an active group
    Update {
        id: String,
        #[command(flatten)]
        fields: GroupFields,
    },
    Get {
        id: String,
    },
    List(ListArgs),
    Count,
    /// Archive a group and drop all of its memberships
    Archive {
        id: String,
    },
    /// Create contacts from a JSON array and link them to the group
    CreateContacts {
        group_id: String,
        #[arg(long)]
        json: String,
    },
    /// Link existing contacts; prints only the newly linked ids
    AddContacts {
        group_id: String,
        #[arg(required = true)]
        contact_ids: Vec<String>,
    },
    /// Unlink one contact (no-op when it is not a member)
    RemoveContact {
        group_id: String,
        contact_id: String,
    },
    /// List active member ids
    Members {
        group_id: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ContactFields {
    /// Phone number; non-digits are stripped
    #[arg(long, default_value = "")]
    pub phone: String,
    #[arg(long, default_value = "")]
    pub email: String,
    #[arg(long, default_value = "")]
    pub name: String,
    #[arg(long, default_value = "")]
    pub surname: String,
    #[arg(long, default_value = "")]
    pub patronymic: String,
    #[arg(long, default_value_t = 0)]
    pub age: u8,
    /// unknown, male or female
    #[arg(long, default_value = "unknown")]
    pub gender: String,
}

impl From<ContactFields> for ContactRequest {
    fn from(fields: ContactFields) -> Self {
        Self {
            phone_number: fields.phone,
            email: fields.email,
            name: fields.name,
            surname: fields.surname,
            patronymic: fields.patronymic,
            age: fields.age,
            gender: fields.gender,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct GroupFields {
    #[arg(long)]
    pub name: String,
    #[arg(long, default_value = "")]
    pub description: String,
}

impl From<GroupFields> for GroupRequest {
    fn from(fields: GroupFields) -> Self {
        Self {
            name: fields.name,
            description: fields.description,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Sort spec, e.g. `-age,+surname,name`
    #[arg(long)]
    pub sort: Option<String>,
    #[arg(long)]
    pub limit: Option<u32>,
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
}

impl From<ListArgs> for ListParams {
    fn from(args: ListArgs) -> Self {
        Self {
            sort: args.sort,
            limit: args.limit,
            offset: args.offset,
        }
    }
}
