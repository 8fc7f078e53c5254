/*!
 * Collaborators the competition engine reads from and writes to
 *
 * Every trait is implemented by one store value bound to a single unit of
 * work, so a chain of calls sees its own writes and commits them together.
 */

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Competition, CompetitionPlayer, CompetitionVote, Game, PlayerKey, User, UserGameInfo};

#[cfg(test)]
pub mod memory;
pub mod pg;

/// Which competitions an account belongs to.
#[async_trait]
pub trait Roster: Send {
    async fn memberships(&mut self, steam_id: &str) -> Result<Vec<CompetitionPlayer>>;
}

/// Individual ballots cast in competitions.
#[async_trait]
pub trait VoteLedger: Send {
    async fn positive_votes_count(&mut self, competition_id: i32) -> Result<i64>;

    async fn has_voted(&mut self, key: &PlayerKey) -> Result<bool>;

    async fn record_vote(&mut self, key: &PlayerKey, positive: bool) -> Result<CompetitionVote>;

    /// Drop the whole ballot of a competition, returning how many votes were removed.
    async fn clear_votes(&mut self, competition_id: i32) -> Result<usize>;
}

#[async_trait]
pub trait GameCatalog: Send {
    /// Owned games of an internal user.
    async fn user_game_info(&mut self, user_id: i32) -> Result<Vec<(UserGameInfo, Game)>>;
}

#[async_trait]
pub trait UserDirectory: Send {
    async fn user_by_steam_id(&mut self, steam_id: &str) -> Result<Option<User>>;
}

/// Persistence of competition aggregates.
#[async_trait]
pub trait CompetitionStore: Send {
    async fn competition(&mut self, id: i32) -> Result<Option<Competition>>;

    /// The competition this membership points to, if the account really plays in it.
    async fn competition_with_player(&mut self, key: &PlayerKey) -> Result<Option<Competition>>;

    /// Write back the game, dates and status of a competition.
    async fn save_competition(&mut self, competition: &Competition) -> Result<()>;
}

/// A transaction scoped to one request. Writes are durable only after `commit`.
#[async_trait]
pub trait UnitOfWork: Send + Sized {
    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
