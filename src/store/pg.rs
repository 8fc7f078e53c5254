/*!
 * Postgres implementation of the stores, on top of diesel-async
 */

use async_trait::async_trait;
use diesel::{
    dsl::exists,
    result::{DatabaseErrorKind, Error as DieselError},
    ExpressionMethods, OptionalExtension, QueryDsl, QueryResult, SelectableHelper,
};
use diesel_async::{
    pooled_connection::{
        deadpool::{Object, Pool},
        AsyncDieselConnectionManager,
    },
    AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager,
};
use tracing::{debug, instrument, warn};

use super::{CompetitionStore, GameCatalog, Roster, UnitOfWork, UserDirectory, VoteLedger};
use crate::config::DbConfig;
use crate::error::{Error, Result};
use crate::models::*;

pub type PgPool = Pool<AsyncPgConnection>;

pub fn connect(config: &DbConfig) -> Result<PgPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
    let mut builder = Pool::builder(manager);
    if let Some(max) = config.max_connections {
        builder = builder.max_size(max);
    }
    Ok(builder.build()?)
}

/// One pooled connection with an open transaction.
///
/// Dropping it without `commit` or `rollback` throws the connection away instead of handing an
/// open transaction back to the pool; the server then rolls it back.
pub struct PgUnitOfWork {
    conn: Option<Object<AsyncPgConnection>>,
}

impl PgUnitOfWork {
    #[instrument(skip_all, err)]
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        let mut conn = pool.get().await?;
        <AnsiTransactionManager as TransactionManager<AsyncPgConnection>>::begin_transaction(&mut *conn)
            .await?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut AsyncPgConnection> {
        self.conn.as_deref_mut().ok_or(Error::TransactionClosed)
    }

    async fn finish(&mut self, commit: bool) -> Result<()> {
        let mut conn = self.conn.take().ok_or(Error::TransactionClosed)?;
        let res = if commit {
            <AnsiTransactionManager as TransactionManager<AsyncPgConnection>>::commit_transaction(&mut *conn)
                .await
        } else {
            <AnsiTransactionManager as TransactionManager<AsyncPgConnection>>::rollback_transaction(&mut *conn)
                .await
        };
        if res.is_err() {
            // Never hand a connection in an unknown transaction state back to the pool
            drop(Object::take(conn));
        }
        Ok(res?)
    }
}

impl Drop for PgUnitOfWork {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("Unit of work dropped while open, discarding its connection");
            drop(Object::take(conn));
        }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    #[instrument(skip_all, err)]
    async fn commit(mut self) -> Result<()> {
        self.finish(true).await
    }

    #[instrument(skip_all, err)]
    async fn rollback(mut self) -> Result<()> {
        self.finish(false).await
    }
}

async fn load_aggregate(conn: &mut AsyncPgConnection, record: CompetitionRecord) -> QueryResult<Competition> {
    let players = competition_player::table
        .filter(competition_player::competition_id.eq(record.id))
        .order(competition_player::id)
        .select(CompetitionPlayer::as_select())
        .load(conn)
        .await?;
    let votes = competition_vote::table
        .filter(competition_vote::competition_id.eq(record.id))
        .order(competition_vote::id)
        .select(CompetitionVote::as_select())
        .load(conn)
        .await?;
    Ok(Competition::from_parts(record, players, votes))
}

#[async_trait]
impl CompetitionStore for PgUnitOfWork {
    #[instrument(skip(self), err)]
    async fn competition(&mut self, id: i32) -> Result<Option<Competition>> {
        let conn = self.conn()?;
        let record = competition::table
            .find(id)
            .select(CompetitionRecord::as_select())
            .first(conn)
            .await
            .optional()?;
        match record {
            Some(record) => Ok(Some(load_aggregate(conn, record).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), err)]
    async fn competition_with_player(&mut self, key: &PlayerKey) -> Result<Option<Competition>> {
        let conn = self.conn()?;
        let record = competition::table
            .inner_join(competition_player::table)
            .filter(competition::id.eq(key.competition_id))
            .filter(competition_player::steam_id.eq(key.steam_id.as_str()))
            .select(CompetitionRecord::as_select())
            .first(conn)
            .await
            .optional()?;
        match record {
            Some(record) => Ok(Some(load_aggregate(conn, record).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip_all, fields(id = competition.id), err)]
    async fn save_competition(&mut self, competition: &Competition) -> Result<()> {
        let conn = self.conn()?;
        let updated = diesel::update(competition::table.find(competition.id))
            .set(competition.changes())
            .execute(conn)
            .await?;
        if updated == 0 {
            return Err(Error::CompetitionNotFound(competition.id));
        }
        debug!("Saved competition");
        Ok(())
    }
}

#[async_trait]
impl Roster for PgUnitOfWork {
    #[instrument(skip(self), err)]
    async fn memberships(&mut self, steam_id: &str) -> Result<Vec<CompetitionPlayer>> {
        let conn = self.conn()?;
        Ok(competition_player::table
            .filter(competition_player::steam_id.eq(steam_id))
            .order(competition_player::id)
            .select(CompetitionPlayer::as_select())
            .load(conn)
            .await?)
    }
}

#[async_trait]
impl VoteLedger for PgUnitOfWork {
    #[instrument(skip(self), err)]
    async fn positive_votes_count(&mut self, competition_id: i32) -> Result<i64> {
        let conn = self.conn()?;
        Ok(competition_vote::table
            .filter(competition_vote::competition_id.eq(competition_id))
            .filter(competition_vote::positive.eq(true))
            .count()
            .get_result(conn)
            .await?)
    }

    #[instrument(skip(self), err)]
    async fn has_voted(&mut self, key: &PlayerKey) -> Result<bool> {
        let conn = self.conn()?;
        Ok(diesel::select(exists(
            competition_vote::table
                .filter(competition_vote::competition_id.eq(key.competition_id))
                .filter(competition_vote::steam_id.eq(key.steam_id.as_str())),
        ))
        .get_result(conn)
        .await?)
    }

    #[instrument(skip(self), err)]
    async fn record_vote(&mut self, key: &PlayerKey, positive: bool) -> Result<CompetitionVote> {
        let conn = self.conn()?;
        let vote = NewCompetitionVote {
            competition_id: key.competition_id,
            steam_id: &key.steam_id,
            positive,
        };
        diesel::insert_into(competition_vote::table)
            .values(vote)
            .returning(CompetitionVote::as_returning())
            .get_result(conn)
            .await
            .map_err(|e| vote_insert_error(key, e))
    }

    #[instrument(skip(self), err)]
    async fn clear_votes(&mut self, competition_id: i32) -> Result<usize> {
        let conn = self.conn()?;
        Ok(diesel::delete(competition_vote::table.filter(competition_vote::competition_id.eq(competition_id)))
            .execute(conn)
            .await?)
    }
}

/// A concurrent vote of the same player trips the unique `(competition_id, steam_id)` constraint.
fn vote_insert_error(key: &PlayerKey, e: DieselError) -> Error {
    match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => Error::AlreadyVoted {
            competition_id: key.competition_id,
            steam_id: key.steam_id.clone(),
        },
        e => Error::Db(e),
    }
}

#[async_trait]
impl GameCatalog for PgUnitOfWork {
    #[instrument(skip(self), err)]
    async fn user_game_info(&mut self, user_id: i32) -> Result<Vec<(UserGameInfo, Game)>> {
        let conn = self.conn()?;
        Ok(user_game_info::table
            .inner_join(game::table)
            .filter(user_game_info::user_id.eq(user_id))
            .order(user_game_info::id)
            .select((UserGameInfo::as_select(), Game::as_select()))
            .load(conn)
            .await?)
    }
}

#[async_trait]
impl UserDirectory for PgUnitOfWork {
    #[instrument(skip(self), err)]
    async fn user_by_steam_id(&mut self, steam_id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        Ok(steam_user::table
            .filter(steam_user::steam_id.eq(steam_id))
            .select(User::as_select())
            .first(conn)
            .await
            .optional()?)
    }
}
