use shared::{CategoryType, ParseEnumError, TransactionType};

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by repositories, services and the locator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage initialization failed: {0}")]
    Initialization(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("completion failed: {0}")]
    Collaborator(String),

    #[error("storage has been shut down")]
    Closed,
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<ParseEnumError> for Error {
    fn from(err: ParseEnumError) -> Self {
        Error::Corrupt(err.to_string())
    }
}

impl From<chrono::ParseError> for Error {
    fn from(err: chrono::ParseError) -> Self {
        Error::Corrupt(format!("bad date: {}", err))
    }
}

/// Business-rule violations. Raised before anything is written.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("transfer requires a destination account")]
    MissingDestination,

    #[error("transfer source and destination must differ")]
    SameAccountTransfer,

    #[error("category is required for income and expense")]
    MissingCategory,

    #[error("category {0} does not exist")]
    UnknownCategory(String),

    #[error("{category} category cannot hold a {transaction} transaction")]
    CategoryTypeMismatch {
        category: CategoryType,
        transaction: TransactionType,
    },

    #[error("{0} name must not be empty")]
    EmptyName(&'static str),

    #[error("parent category {0} does not exist")]
    UnknownParent(String),

    #[error("parent category {0} is deactivated")]
    InactiveParent(String),

    #[error("category {0} is itself a child and cannot be a parent")]
    NestingTooDeep(String),

    #[error("category {0} already has children and cannot be nested")]
    ParentHasChildren(String),

    #[error("a category cannot be its own parent")]
    SelfParent,

    #[error("parent is {parent} but the category is {child}")]
    ParentTypeMismatch {
        parent: CategoryType,
        child: CategoryType,
    },

    #[error("budget limit must be greater than zero")]
    NonPositiveLimit,

    #[error("month {0} is outside 1-12")]
    InvalidMonth(u32),

    #[error("message must not be empty")]
    EmptyMessage,
}
