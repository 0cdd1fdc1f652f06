use std::fmt;

#[derive(Debug)]
pub enum AnchorError {
    IoError(std::io::Error),
    JsonError(serde_json::Error),
    SqliteError(rusqlite::Error),
    HttpError(Box<ureq::Error>),
    FromUtf8Error(std::string::FromUtf8Error),
    /// A git subprocess exited non-zero or could not be spawned.
    GitCommand(String),
    /// A single path has no commits or does not exist in the repository.
    HistoryUnavailable(String),
    /// Every path in a batch history lookup failed.
    NoHistoryFound(usize),
    /// The graph store returned an error or a row we could not interpret.
    GraphError(String),
    Generic(String),
}

impl fmt::Display for AnchorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorError::IoError(e) => write!(f, "IO error: {}", e),
            AnchorError::JsonError(e) => write!(f, "JSON error: {}", e),
            AnchorError::SqliteError(e) => write!(f, "SQLite error: {}", e),
            AnchorError::HttpError(e) => write!(f, "HTTP error: {}", e),
            AnchorError::FromUtf8Error(e) => write!(f, "From UTF-8 error: {}", e),
            AnchorError::GitCommand(e) => write!(f, "Git command error: {}", e),
            AnchorError::HistoryUnavailable(path) => {
                write!(
                    f,
                    "no history found for file {} (file may not exist or have no commits)",
                    path
                )
            }
            AnchorError::NoHistoryFound(count) => {
                write!(f, "no file histories could be retrieved for {} files", count)
            }
            AnchorError::GraphError(e) => write!(f, "Graph query error: {}", e),
            AnchorError::Generic(e) => write!(f, "Generic error: {}", e),
        }
    }
}

impl std::error::Error for AnchorError {}

impl From<std::io::Error> for AnchorError {
    fn from(err: std::io::Error) -> Self {
        AnchorError::IoError(err)
    }
}

impl From<serde_json::Error> for AnchorError {
    fn from(err: serde_json::Error) -> Self {
        AnchorError::JsonError(err)
    }
}

impl From<rusqlite::Error> for AnchorError {
    fn from(err: rusqlite::Error) -> Self {
        AnchorError::SqliteError(err)
    }
}

impl From<ureq::Error> for AnchorError {
    fn from(err: ureq::Error) -> Self {
        AnchorError::HttpError(Box::new(err))
    }
}

impl From<std::string::FromUtf8Error> for AnchorError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        AnchorError::FromUtf8Error(err)
    }
}

#[cfg(feature = "test-support")]
impl From<git2::Error> for AnchorError {
    fn from(err: git2::Error) -> Self {
        AnchorError::Generic(format!("git2 error: {}", err))
    }
}
