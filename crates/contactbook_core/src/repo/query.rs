//! List query options: sort specification and pagination.
//!
//! A sort spec is a comma separated list of field names, each optionally
//! prefixed with `-` (descending) or `+` (ascending, the default), e.g.
//! `-age,+surname,name`. Fields a repository does not whitelist are skipped.

use crate::options::StoreOptions;
use rusqlite::types::Value;

const SORT_FIELD_SEPARATOR: char = ',';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub key: String,
    pub direction: SortDirection,
}

/// One page of rows plus the total matching count, read from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Query options for list operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub sorts: Vec<SortField>,
    /// Page size. `None`/`0` means the store default; capped at the store max.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ListQuery {
    pub fn new(sort: Option<&str>, limit: Option<u32>, offset: u32) -> Self {
        Self {
            sorts: sort.map(parse_sorts).unwrap_or_default(),
            limit,
            offset,
        }
    }
}

/// Parses a sort spec. Entries shorter than two characters or containing
/// characters other than ASCII alphanumerics and `_` are dropped.
pub fn parse_sorts(raw: &str) -> Vec<SortField> {
    let mut sorts = Vec::new();
    for field in raw.split(SORT_FIELD_SEPARATOR) {
        let field = field.trim();
        if field.len() < 2 {
            continue;
        }

        let (direction, key) = if let Some(key) = field.strip_prefix('-') {
            (SortDirection::Desc, key)
        } else if let Some(key) = field.strip_prefix('+') {
            (SortDirection::Asc, key)
        } else {
            (SortDirection::Asc, field)
        };

        if key.is_empty()
            || !key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            continue;
        }

        sorts.push(SortField {
            key: key.to_string(),
            direction,
        });
    }
    sorts
}

/// Builds `ORDER BY ... LIMIT ? OFFSET ?` for a whitelisted column map.
///
/// `columns` maps public sort keys to SQL column names. The result always
/// ends with an `id ASC` tiebreak so pages are stable.
pub(crate) fn order_and_page_sql(
    query: &ListQuery,
    columns: &[(&str, &str)],
    options: &StoreOptions,
    bind_values: &mut Vec<Value>,
) -> String {
    let mut order_terms = Vec::new();
    for sort in &query.sorts {
        if let Some((_, column)) = columns.iter().find(|(key, _)| *key == sort.key) {
            order_terms.push(format!("{column} {}", sort.direction.as_sql()));
        }
    }
    if order_terms.is_empty() {
        order_terms.push("created_at DESC".to_string());
    }
    order_terms.push("id ASC".to_string());

    let mut sql = format!(" ORDER BY {}", order_terms.join(", "));
    sql.push_str(" LIMIT ?");
    bind_values.push(Value::Integer(i64::from(
        options.normalize_limit(query.limit),
    )));
    if query.offset > 0 {
        sql.push_str(" OFFSET ?");
        bind_values.push(Value::Integer(i64::from(query.offset)));
    }
    sql
}
