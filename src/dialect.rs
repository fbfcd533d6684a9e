use std::fmt;
use std::str::FromStr;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::model::PersistentEntity;

static QUESTION_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?").expect("valid regex"));
static DOLLAR_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\d+").expect("valid regex"));
static AT_P_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"@p\d+").expect("valid regex"));
static COLON_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r":\d+").expect("valid regex"));

/// SQL dialects the runtime knows the quirks of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    H2,
    MySql,
    Postgres,
    SqlServer,
    Oracle,
    Ansi,
}

/// How positional parameters are written in statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderFormat {
    /// `?`
    QuestionMark,
    /// `$1`, `$2`, ...
    Dollar,
    /// `@p1`, `@p2`, ...
    AtP,
    /// `:1`, `:2`, ...
    Colon,
}

impl PlaceholderFormat {
    /// Placeholder text for the zero-based bind position `index`.
    pub fn render(&self, index: usize) -> String {
        match self {
            Self::QuestionMark => "?".to_string(),
            Self::Dollar => format!("${}", index + 1),
            Self::AtP => format!("@p{}", index + 1),
            Self::Colon => format!(":{}", index + 1),
        }
    }

    pub fn pattern(&self) -> &'static Regex {
        match self {
            Self::QuestionMark => &QUESTION_MARK,
            Self::Dollar => &DOLLAR_NUMBERED,
            Self::AtP => &AT_P_NUMBERED,
            Self::Colon => &COLON_NUMBERED,
        }
    }
}

/// Statement kinds the batching capability is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Insert,
    Update,
    Delete,
    JoinInsert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStyle {
    LimitOffset,
    OffsetFetch,
}

impl Dialect {
    /// Whether a statement of `kind` against `entity` may run as one native batch.
    ///
    /// SQL Server never batches inserts. MySQL and Oracle cannot return
    /// generated keys from a batched insert.
    pub fn supports_batch(&self, kind: BatchKind, entity: &PersistentEntity) -> bool {
        match kind {
            BatchKind::Insert => match self {
                Self::SqlServer => false,
                Self::MySql | Self::Oracle => !entity.has_generated_identity(),
                _ => true,
            },
            BatchKind::Update | BatchKind::Delete | BatchKind::JoinInsert => true,
        }
    }

    pub fn placeholder_format(&self) -> PlaceholderFormat {
        match self {
            Self::Postgres => PlaceholderFormat::Dollar,
            Self::SqlServer => PlaceholderFormat::AtP,
            Self::Oracle => PlaceholderFormat::Colon,
            Self::H2 | Self::MySql | Self::Ansi => PlaceholderFormat::QuestionMark,
        }
    }

    /// UUIDs have to be bound as text.
    pub fn requires_string_uuid(&self) -> bool {
        matches!(self, Self::MySql | Self::Oracle | Self::SqlServer)
    }

    /// Pagination is rejected without an explicit ORDER BY.
    pub fn requires_mandatory_order_by(&self) -> bool {
        matches!(self, Self::SqlServer)
    }

    pub fn pagination_style(&self) -> PaginationStyle {
        match self {
            Self::SqlServer | Self::Oracle => PaginationStyle::OffsetFetch,
            _ => PaginationStyle::LimitOffset,
        }
    }

    pub fn quote(&self, identifier: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", identifier),
            Self::SqlServer => format!("[{}]", identifier),
            _ => format!("\"{}\"", identifier),
        }
    }

    /// Detect the dialect from a connection URL (`jdbc:` prefix tolerated).
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim().to_ascii_lowercase();
        let url = url.strip_prefix("jdbc:").unwrap_or(&url);
        let scheme = url.split([':', '/']).next().unwrap_or_default();
        match scheme {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlserver" | "mssql" => Some(Self::SqlServer),
            "oracle" => Some(Self::Oracle),
            "h2" => Some(Self::H2),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::H2 => "H2",
            Self::MySql => "MYSQL",
            Self::Postgres => "POSTGRES",
            Self::SqlServer => "SQL_SERVER",
            Self::Oracle => "ORACLE",
            Self::Ansi => "ANSI",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "H2" => Ok(Self::H2),
            "MYSQL" | "MARIADB" => Ok(Self::MySql),
            "POSTGRES" | "POSTGRESQL" => Ok(Self::Postgres),
            "SQL_SERVER" | "SQLSERVER" | "MSSQL" => Ok(Self::SqlServer),
            "ORACLE" => Ok(Self::Oracle),
            "ANSI" => Ok(Self::Ansi),
            other => Err(format!("Unknown dialect '{}'", other)),
        }
    }
}
