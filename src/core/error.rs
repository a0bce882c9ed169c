use thiserror::Error;

/// Coarse failure class of the most recent fetch.
#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
pub enum ErrorKind {
    #[display("transport")]
    Transport,

    #[display("parse")]
    Parse,
}

/// Failure of a single price fetch.
///
/// Both variants are recoverable: the coordinator keeps serving the last good snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("price API request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("malformed price API response: {0}")]
    Parse(#[from] ParseError),
}

impl FetchError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Parse(_) => ErrorKind::Parse,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(Box::new(error))
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON")]
    Json(#[from] serde_json::Error),

    #[error("the response carries no data: {}", .0.join("; "))]
    NoData(Vec<String>),

    #[error("the response contains no price intervals")]
    NoIntervals,

    #[error("interval #{0} does not end after it starts")]
    EmptyInterval(usize),

    #[error("interval #{0} overlaps with or precedes the previous one")]
    UnorderedInterval(usize),

    #[error("interval #{0} does not start where the previous one ends")]
    IntervalGap(usize),

    #[error("additional cost name `{0}` does not produce an identifier")]
    BlankCostName(String),
}

/// Invalid schedule configuration, fatal at startup.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("`{0}` is not a known IANA time zone")]
    InvalidTimeZone(String),

    #[error("the new prices hour must be within `0..=23`, got `{0}`")]
    InvalidHour(u32),

    #[error("`{0}` has no following day")]
    DateOutOfRange(chrono::NaiveDate),
}
