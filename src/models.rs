/*!
 * DB models for competitions and the game catalog
 */

use chrono::{DateTime, Duration, Utc};
use diesel::{AsChangeset, Identifiable, Insertable, Queryable, Selectable};

pub use crate::schema::{competition, competition_player, competition_vote, game, steam_user, user_game_info};

/// Status a competition is put back into whenever its game changes.
pub const STATUS_ACTIVE: i32 = 1;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Eq, Hash)]
#[diesel(table_name = game)]
pub struct Game {
    pub id: i32,
    pub app_id: i32,
    pub name: String,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = steam_user)]
pub struct User {
    pub id: i32,
    pub steam_id: String,
    pub steam_name: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = user_game_info)]
pub struct UserGameInfo {
    pub id: i32,
    pub user_id: i32,
    pub game_id: i32,
    pub playtime_minutes: i32,
}

/// A row of the `competition` table, without its players and votes.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = competition)]
pub struct CompetitionRecord {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub game_id: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status_id: i32,
}

/// Fields rewritten when a competition moves to another game.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = competition)]
pub struct CompetitionChanges {
    pub game_id: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status_id: i32,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = competition_player)]
pub struct CompetitionPlayer {
    pub id: i32,
    pub competition_id: i32,
    pub steam_id: Option<String>,
}

impl CompetitionPlayer {
    /// Membership key of this player, if it is bound to an account.
    pub fn key(&self) -> Option<PlayerKey> {
        self.steam_id.as_ref().map(|steam_id| PlayerKey::new(self.competition_id, steam_id))
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = competition_vote)]
pub struct CompetitionVote {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub competition_id: i32,
    pub steam_id: String,
    pub positive: bool,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = competition_vote)]
pub struct NewCompetitionVote<'a> {
    pub competition_id: i32,
    pub steam_id: &'a str,
    pub positive: bool,
}

/// Identifies one account's membership in one competition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerKey {
    pub competition_id: i32,
    pub steam_id: String,
}

impl PlayerKey {
    pub fn new(competition_id: i32, steam_id: impl Into<String>) -> Self {
        Self { competition_id, steam_id: steam_id.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Upcoming,
    Active,
    Ended,
}

/// A competition along with its roster and current ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Competition {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub game_id: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status_id: i32,
    pub players: Vec<CompetitionPlayer>,
    pub votes: Vec<CompetitionVote>,
}

impl Competition {
    pub fn from_parts(
        record: CompetitionRecord,
        players: Vec<CompetitionPlayer>,
        votes: Vec<CompetitionVote>,
    ) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            game_id: record.game_id,
            start_date: record.start_date,
            end_date: record.end_date,
            status_id: record.status_id,
            players,
            votes,
        }
    }

    pub fn record(&self) -> CompetitionRecord {
        CompetitionRecord {
            id: self.id,
            created_at: self.created_at,
            game_id: self.game_id,
            start_date: self.start_date,
            end_date: self.end_date,
            status_id: self.status_id,
        }
    }

    pub fn changes(&self) -> CompetitionChanges {
        CompetitionChanges {
            game_id: self.game_id,
            start_date: self.start_date,
            end_date: self.end_date,
            status_id: self.status_id,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end_date - self.start_date
    }

    pub fn phase_at(&self, now: DateTime<Utc>) -> Phase {
        if now < self.start_date {
            Phase::Upcoming
        } else if now <= self.end_date {
            Phase::Active
        } else {
            Phase::Ended
        }
    }

    pub fn is_current_at(&self, now: DateTime<Utc>) -> bool {
        self.phase_at(now) == Phase::Active
    }

    pub fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        self.phase_at(now) == Phase::Ended
    }

    pub fn has_player(&self, key: &PlayerKey) -> bool {
        key.competition_id == self.id
            && self.players.iter().any(|p| p.steam_id.as_deref() == Some(key.steam_id.as_str()))
    }
}
