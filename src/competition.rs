/*!
 * Competition engine: lookups, vote quorum, shared games and game reassignment
 */

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, DurationRound, Utc};
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::models::{Competition, CompetitionPlayer, Game, PlayerKey, STATUS_ACTIVE};
use crate::store::{CompetitionStore, GameCatalog, Roster, UserDirectory, VoteLedger};

pub async fn competition_by_id<S>(store: &mut S, id: i32) -> Result<Option<Competition>>
where
    S: CompetitionStore + ?Sized,
{
    store.competition(id).await
}

/// First competition about `game_id` that `player` takes part in.
pub async fn competition_by_player_and_game<S>(
    store: &mut S,
    player: &CompetitionPlayer,
    game_id: i32,
) -> Result<Option<Competition>>
where
    S: CompetitionStore + ?Sized,
{
    let key = match player.key() {
        Some(key) => key,
        None => return Ok(None),
    };
    Ok(store.competition_with_player(&key).await?.filter(|c| c.game_id == game_id))
}

/// Every competition holding one of `entries`, in entry order.
///
/// `None` when there is nothing to look up, `Some` (possibly empty) otherwise. An entry matched
/// twice yields its competition twice. Entries are matched on `(competition_id, steam_id)`, so an
/// entry without an account id never matches anything.
pub async fn all_competitions_for_user<S>(
    store: &mut S,
    entries: &[CompetitionPlayer],
) -> Result<Option<Vec<Competition>>>
where
    S: CompetitionStore + ?Sized,
{
    if entries.is_empty() {
        return Ok(None);
    }

    let mut found = Vec::new();
    for key in entries.iter().filter_map(CompetitionPlayer::key) {
        if let Some(competition) = store.competition_with_player(&key).await? {
            found.push(competition);
        }
    }
    Ok(Some(found))
}

async fn competitions_by_steam_id<S>(
    store: &mut S,
    steam_id: &str,
    keep: impl Fn(&Competition) -> bool,
) -> Result<Option<Vec<Competition>>>
where
    S: Roster + CompetitionStore + ?Sized,
{
    let memberships = store.memberships(steam_id).await?;
    if memberships.is_empty() {
        debug!("No memberships");
        return Ok(None);
    }
    Ok(all_competitions_for_user(store, &memberships)
        .await?
        .map(|competitions| competitions.into_iter().filter(|c| keep(c)).collect()))
}

pub async fn current_competitions_by_steam_id<S>(store: &mut S, steam_id: &str) -> Result<Option<Vec<Competition>>>
where
    S: Roster + CompetitionStore + ?Sized,
{
    current_competitions_at(store, steam_id, Utc::now()).await
}

#[instrument(skip(store), err)]
pub async fn current_competitions_at<S>(
    store: &mut S,
    steam_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Vec<Competition>>>
where
    S: Roster + CompetitionStore + ?Sized,
{
    competitions_by_steam_id(store, steam_id, |c| c.is_current_at(now)).await
}

pub async fn previous_competitions_by_steam_id<S>(store: &mut S, steam_id: &str) -> Result<Option<Vec<Competition>>>
where
    S: Roster + CompetitionStore + ?Sized,
{
    previous_competitions_at(store, steam_id, Utc::now()).await
}

#[instrument(skip(store), err)]
pub async fn previous_competitions_at<S>(
    store: &mut S,
    steam_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Vec<Competition>>>
where
    S: Roster + CompetitionStore + ?Sized,
{
    competitions_by_steam_id(store, steam_id, |c| c.has_ended_at(now)).await
}

/// Number of players in a competition, 0 when it does not exist.
pub async fn total_users<S>(store: &mut S, competition_id: i32) -> Result<usize>
where
    S: CompetitionStore + ?Sized,
{
    Ok(store.competition(competition_id).await?.map_or(0, |c| c.players.len()))
}

/// Strictly more than half of the players voted yes.
pub fn is_majority(positive_votes: i64, total_users: usize) -> bool {
    positive_votes as f64 > total_users as f64 / 2.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTally {
    pub total_users: usize,
    pub positive_votes: i64,
    pub succeeded: bool,
}

#[instrument(skip(store), err)]
pub async fn vote_tally<S>(store: &mut S, competition_id: i32) -> Result<VoteTally>
where
    S: CompetitionStore + VoteLedger + ?Sized,
{
    let total_users = total_users(store, competition_id).await?;
    let positive_votes = store.positive_votes_count(competition_id).await?;
    Ok(VoteTally { total_users, positive_votes, succeeded: is_majority(positive_votes, total_users) })
}

pub async fn has_vote_succeeded<S>(store: &mut S, competition_id: i32) -> Result<bool>
where
    S: CompetitionStore + VoteLedger + ?Sized,
{
    Ok(vote_tally(store, competition_id).await?.succeeded)
}

/// Record the vote of a player and tell whether the ballot now passes.
#[instrument(skip(store), err)]
pub async fn cast_vote<S>(store: &mut S, competition_id: i32, steam_id: &str, positive: bool) -> Result<bool>
where
    S: CompetitionStore + VoteLedger + ?Sized,
{
    let competition = store
        .competition(competition_id)
        .await?
        .ok_or(Error::CompetitionNotFound(competition_id))?;

    let key = PlayerKey::new(competition_id, steam_id);
    if !competition.has_player(&key) {
        return Err(Error::NotAPlayer { competition_id, steam_id: key.steam_id });
    }
    if store.has_voted(&key).await? {
        return Err(Error::AlreadyVoted { competition_id, steam_id: key.steam_id });
    }

    let vote = store.record_vote(&key, positive).await?;
    info!(vote_id = vote.id, "Vote recorded");
    has_vote_succeeded(store, competition_id).await
}

/// Games owned by every player of the competition that has an account.
///
/// A player whose account is unknown owns nothing, which empties the result. Without any such
/// player the result is empty.
#[instrument(skip(store), err)]
pub async fn shared_games<S>(store: &mut S, competition_id: i32) -> Result<HashSet<Game>>
where
    S: CompetitionStore + UserDirectory + GameCatalog + ?Sized,
{
    let competition = store
        .competition(competition_id)
        .await?
        .ok_or(Error::CompetitionNotFound(competition_id))?;

    let mut owned = Vec::with_capacity(competition.players.len());
    for steam_id in competition.players.iter().filter_map(|p| p.steam_id.as_deref()) {
        let games = match store.user_by_steam_id(steam_id).await? {
            Some(user) => store
                .user_game_info(user.id)
                .await?
                .into_iter()
                .map(|(_, game)| (game.id, game))
                .collect::<HashMap<_, _>>(),
            None => {
                debug!(steam_id, "No user for player");
                HashMap::new()
            }
        };
        owned.push(games);
    }

    let mut owned = owned.into_iter();
    let mut shared = match owned.next() {
        Some(first) => first,
        None => return Ok(HashSet::new()),
    };
    for games in owned {
        shared.retain(|id, _| games.contains_key(id));
    }
    Ok(shared.into_values().collect())
}

pub async fn update_game_for_competition<S>(store: &mut S, competition_id: i32, new_game_id: i32) -> Result<Competition>
where
    S: CompetitionStore + VoteLedger + ?Sized,
{
    update_game_at(store, competition_id, new_game_id, Utc::now()).await
}

/// Point a competition at another game, restarting it at `now` for the same duration with an
/// empty ballot. Players are kept as they are.
///
/// Dates are truncated to microseconds, the precision of `timestamptz`, so the returned
/// competition is exactly what a later read gives back.
///
/// All writes go through `store`; the caller commits them as one unit of work.
#[instrument(skip(store), err)]
pub async fn update_game_at<S>(
    store: &mut S,
    competition_id: i32,
    new_game_id: i32,
    now: DateTime<Utc>,
) -> Result<Competition>
where
    S: CompetitionStore + VoteLedger + ?Sized,
{
    let mut competition = store
        .competition(competition_id)
        .await?
        .ok_or(Error::CompetitionNotFound(competition_id))?;

    let duration = competition.duration();
    let start_date = stored_precision(now).ok_or(Error::DateOutOfRange(competition_id))?;
    let end_date = start_date
        .checked_add_signed(duration)
        .and_then(stored_precision)
        .ok_or(Error::DateOutOfRange(competition_id))?;

    competition.game_id = new_game_id;
    competition.start_date = start_date;
    competition.end_date = end_date;
    competition.status_id = STATUS_ACTIVE;

    store.save_competition(&competition).await?;
    let cleared = store.clear_votes(competition_id).await?;
    competition.votes.clear();

    info!(cleared, players = competition.players.len(), "Competition moved to new game");
    Ok(competition)
}

fn stored_precision(date: DateTime<Utc>) -> Option<DateTime<Utc>> {
    date.duration_trunc(Duration::microseconds(1)).ok()
}
