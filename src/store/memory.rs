//! In-memory stores for testing.
//!
//! Every unit of work works on a snapshot of the shared data and publishes it back on commit.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{CompetitionStore, GameCatalog, Roster, UnitOfWork, UserDirectory, VoteLedger};
use crate::error::{Error, Result};
use crate::models::*;

#[derive(Clone, Debug, Default)]
struct Data {
    next_id: i32,
    competitions: Vec<CompetitionRecord>,
    players: Vec<CompetitionPlayer>,
    votes: Vec<CompetitionVote>,
    games: Vec<Game>,
    users: Vec<User>,
    user_games: Vec<UserGameInfo>,
}

impl Data {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn aggregate(&self, record: &CompetitionRecord) -> Competition {
        let players = self.players.iter().filter(|p| p.competition_id == record.id).cloned().collect();
        let votes = self.votes.iter().filter(|v| v.competition_id == record.id).cloned().collect();
        Competition::from_parts(record.clone(), players, votes)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryDb {
    inner: Arc<Mutex<Data>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the data into a new unit of work.
    ///
    /// Committing replaces the whole shared data with that snapshot, so of two units of work open
    /// at once the last one to commit wins for every row, not only for the rows it wrote.
    pub fn begin(&self) -> MemoryUnitOfWork {
        MemoryUnitOfWork { db: self.clone(), data: Some(self.inner.lock().clone()) }
    }

    pub fn add_game(&self, name: &str) -> Game {
        let mut data = self.inner.lock();
        let id = data.next_id();
        let game = Game { id, app_id: 1000 + id, name: name.to_owned() };
        data.games.push(game.clone());
        game
    }

    pub fn add_user(&self, steam_id: &str) -> User {
        let mut data = self.inner.lock();
        let id = data.next_id();
        let user = User { id, steam_id: steam_id.to_owned(), steam_name: None };
        data.users.push(user.clone());
        user
    }

    pub fn add_owned_games(&self, user: &User, games: &[&Game]) {
        let mut data = self.inner.lock();
        for game in games {
            let id = data.next_id();
            data.user_games.push(UserGameInfo { id, user_id: user.id, game_id: game.id, playtime_minutes: 0 });
        }
    }

    /// Create a competition whose roster holds one player per entry of `steam_ids`.
    pub fn add_competition(
        &self,
        game_id: i32,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        steam_ids: &[Option<&str>],
    ) -> i32 {
        let mut data = self.inner.lock();
        let id = data.next_id();
        data.competitions.push(CompetitionRecord {
            id,
            created_at: start_date,
            game_id,
            start_date,
            end_date,
            status_id: 3,
        });
        for steam_id in steam_ids {
            let player_id = data.next_id();
            data.players.push(CompetitionPlayer {
                id: player_id,
                competition_id: id,
                steam_id: steam_id.map(str::to_owned),
            });
        }
        id
    }

    pub fn add_vote(&self, competition_id: i32, steam_id: &str, positive: bool) {
        let mut data = self.inner.lock();
        let id = data.next_id();
        data.votes.push(CompetitionVote {
            id,
            created_at: Utc::now(),
            competition_id,
            steam_id: steam_id.to_owned(),
            positive,
        });
    }
}

pub struct MemoryUnitOfWork {
    db: MemoryDb,
    data: Option<Data>,
}

impl MemoryUnitOfWork {
    fn data(&mut self) -> Result<&mut Data> {
        self.data.as_mut().ok_or(Error::TransactionClosed)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(mut self) -> Result<()> {
        let data = self.data.take().ok_or(Error::TransactionClosed)?;
        *self.db.inner.lock() = data;
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.data.take().ok_or(Error::TransactionClosed)?;
        Ok(())
    }
}

#[async_trait]
impl CompetitionStore for MemoryUnitOfWork {
    async fn competition(&mut self, id: i32) -> Result<Option<Competition>> {
        let data = &*self.data()?;
        Ok(data.competitions.iter().find(|c| c.id == id).map(|c| data.aggregate(c)))
    }

    async fn competition_with_player(&mut self, key: &PlayerKey) -> Result<Option<Competition>> {
        Ok(self.competition(key.competition_id).await?.filter(|c| c.has_player(key)))
    }

    async fn save_competition(&mut self, competition: &Competition) -> Result<()> {
        let data = self.data()?;
        let record = data
            .competitions
            .iter_mut()
            .find(|c| c.id == competition.id)
            .ok_or(Error::CompetitionNotFound(competition.id))?;
        *record = CompetitionRecord { created_at: record.created_at, ..competition.record() };
        Ok(())
    }
}

#[async_trait]
impl Roster for MemoryUnitOfWork {
    async fn memberships(&mut self, steam_id: &str) -> Result<Vec<CompetitionPlayer>> {
        Ok(self.data()?.players.iter().filter(|p| p.steam_id.as_deref() == Some(steam_id)).cloned().collect())
    }
}

#[async_trait]
impl VoteLedger for MemoryUnitOfWork {
    async fn positive_votes_count(&mut self, competition_id: i32) -> Result<i64> {
        let count = self.data()?.votes.iter().filter(|v| v.competition_id == competition_id && v.positive).count();
        Ok(count as i64)
    }

    async fn has_voted(&mut self, key: &PlayerKey) -> Result<bool> {
        Ok(self
            .data()?
            .votes
            .iter()
            .any(|v| v.competition_id == key.competition_id && v.steam_id == key.steam_id))
    }

    async fn record_vote(&mut self, key: &PlayerKey, positive: bool) -> Result<CompetitionVote> {
        if self.has_voted(key).await? {
            return Err(Error::AlreadyVoted { competition_id: key.competition_id, steam_id: key.steam_id.clone() });
        }
        let data = self.data()?;
        let vote = CompetitionVote {
            id: data.next_id(),
            created_at: Utc::now(),
            competition_id: key.competition_id,
            steam_id: key.steam_id.clone(),
            positive,
        };
        data.votes.push(vote.clone());
        Ok(vote)
    }

    async fn clear_votes(&mut self, competition_id: i32) -> Result<usize> {
        let data = self.data()?;
        let before = data.votes.len();
        data.votes.retain(|v| v.competition_id != competition_id);
        Ok(before - data.votes.len())
    }
}

#[async_trait]
impl GameCatalog for MemoryUnitOfWork {
    async fn user_game_info(&mut self, user_id: i32) -> Result<Vec<(UserGameInfo, Game)>> {
        let data = &*self.data()?;
        Ok(data
            .user_games
            .iter()
            .filter(|info| info.user_id == user_id)
            .filter_map(|info| {
                let game = data.games.iter().find(|g| g.id == info.game_id)?;
                Some((info.clone(), game.clone()))
            })
            .collect())
    }
}

#[async_trait]
impl UserDirectory for MemoryUnitOfWork {
    async fn user_by_steam_id(&mut self, steam_id: &str) -> Result<Option<User>> {
        Ok(self.data()?.users.iter().find(|u| u.steam_id == steam_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[tokio::test]
    async fn writes_are_visible_only_after_commit() {
        let db = MemoryDb::new();
        let now = Utc::now();
        let id = db.add_competition(1, now, now + Duration::days(1), &[Some("a")]);

        let mut uow = db.begin();
        uow.record_vote(&PlayerKey::new(id, "a"), true).await.unwrap();
        assert_eq!(uow.positive_votes_count(id).await.unwrap(), 1);
        assert_eq!(db.begin().positive_votes_count(id).await.unwrap(), 0);
        uow.commit().await.unwrap();

        assert_eq!(db.begin().positive_votes_count(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let db = MemoryDb::new();
        let now = Utc::now();
        let id = db.add_competition(1, now, now + Duration::days(1), &[Some("a")]);
        db.add_vote(id, "a", true);

        let mut uow = db.begin();
        assert_eq!(uow.clear_votes(id).await.unwrap(), 1);
        uow.rollback().await.unwrap();

        assert_eq!(db.begin().positive_votes_count(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn second_vote_of_a_player_is_rejected() {
        let db = MemoryDb::new();
        let now = Utc::now();
        let id = db.add_competition(1, now, now, &[Some("a")]);
        let key = PlayerKey::new(id, "a");

        let mut uow = db.begin();
        uow.record_vote(&key, true).await.unwrap();
        assert!(matches!(uow.record_vote(&key, false).await, Err(Error::AlreadyVoted { .. })));
        assert_eq!(uow.positive_votes_count(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn last_commit_replaces_the_whole_snapshot() {
        let db = MemoryDb::new();
        let now = Utc::now();
        let id = db.add_competition(1, now, now, &[Some("a"), Some("b")]);

        let mut first = db.begin();
        let mut second = db.begin();
        first.record_vote(&PlayerKey::new(id, "a"), true).await.unwrap();
        second.record_vote(&PlayerKey::new(id, "b"), true).await.unwrap();
        first.commit().await.unwrap();
        second.commit().await.unwrap();

        let mut uow = db.begin();
        assert!(!uow.has_voted(&PlayerKey::new(id, "a")).await.unwrap());
        assert!(uow.has_voted(&PlayerKey::new(id, "b")).await.unwrap());
    }

    #[tokio::test]
    async fn membership_needs_matching_competition() {
        let db = MemoryDb::new();
        let now = Utc::now();
        let first = db.add_competition(1, now, now, &[Some("a")]);
        let second = db.add_competition(1, now, now, &[Some("b")]);

        let mut uow = db.begin();
        assert!(uow.competition_with_player(&PlayerKey::new(first, "a")).await.unwrap().is_some());
        assert!(uow.competition_with_player(&PlayerKey::new(second, "a")).await.unwrap().is_none());
        assert_eq!(uow.memberships("b").await.unwrap().len(), 1);
    }
}
