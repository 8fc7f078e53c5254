/*!
 * Errors that can be returned by store and competition operations
 */

use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};

use diesel_async::pooled_connection::deadpool::{BuildError, PoolError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Db(diesel::result::Error),
    Pool(PoolError),
    PoolBuild(BuildError),
    CompetitionNotFound(i32),
    NotAPlayer { competition_id: i32, steam_id: String },
    AlreadyVoted { competition_id: i32, steam_id: String },
    DateOutOfRange(i32),
    TransactionClosed,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::CompetitionNotFound(id) => write!(f, "competition with ID {} not found", id),
            Self::NotAPlayer { competition_id, steam_id } => {
                write!(f, "{} does not play in competition {}", steam_id, competition_id)
            }
            Self::AlreadyVoted { competition_id, steam_id } => {
                write!(f, "{} already voted in competition {}", steam_id, competition_id)
            }
            Self::DateOutOfRange(id) => write!(f, "dates of competition {} are out of range", id),
            Self::TransactionClosed => write!(f, "unit of work already committed or rolled back"),
            _ => match self.source() {
                Some(error) => write!(f, "{}", error),
                None => Ok(()),
            },
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Db(e) => Some(e),
            Self::Pool(e) => Some(e),
            Self::PoolBuild(e) => Some(e),
            _ => None,
        }
    }
}

impl Error {
    /// Whether the error means the caller referenced something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CompetitionNotFound(_) | Self::Db(diesel::result::Error::NotFound))
    }
}

impl From<diesel::result::Error> for Error {
    fn from(e: diesel::result::Error) -> Error {
        Error::Db(e)
    }
}

impl From<PoolError> for Error {
    fn from(e: PoolError) -> Error {
        Error::Pool(e)
    }
}

impl From<BuildError> for Error {
    fn from(e: BuildError) -> Error {
        Error::PoolBuild(e)
    }
}
