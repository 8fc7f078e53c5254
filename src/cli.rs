/*!
 * Command line entry points to the competition engine
 */

use std::collections::HashSet;

use clap::{Parser, Subcommand};
use itertools::Itertools;

use crate::competition;
use crate::error::Result;
use crate::models::{Competition, CompetitionPlayer, Game};
use crate::store::{CompetitionStore, GameCatalog, Roster, UserDirectory, VoteLedger};

#[derive(Parser, Debug)]
#[command(version, author, about = "Steam game competitions between friends")]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show one competition
    Show { competition_id: i32 },
    /// Find the competition of a player about a game
    Find { competition_id: i32, steam_id: String, game_id: i32 },
    /// Competitions of an account running right now
    Current { steam_id: String },
    /// Competitions of an account that are over
    Previous { steam_id: String },
    /// Number of players of a competition
    Players { competition_id: i32 },
    /// Vote counts and whether the ballot passed
    Tally { competition_id: i32 },
    /// Cast a vote, yes unless `--no` is given
    Vote {
        competition_id: i32,
        steam_id: String,
        #[arg(long)]
        no: bool,
    },
    /// Games every player of a competition owns
    SharedGames { competition_id: i32 },
    /// Move a competition to another game and restart it
    Reassign { competition_id: i32, game_id: i32 },
}

/// Run a command against `store`, returning what to print.
pub async fn run<S>(command: &Command, store: &mut S) -> Result<String>
where
    S: CompetitionStore + Roster + VoteLedger + GameCatalog + UserDirectory,
{
    Ok(match command {
        Command::Show { competition_id } => match competition::competition_by_id(store, *competition_id).await? {
            Some(c) => describe(&c),
            None => format!("No competition {}", competition_id),
        },
        Command::Find { competition_id, steam_id, game_id } => {
            let player = CompetitionPlayer { id: 0, competition_id: *competition_id, steam_id: Some(steam_id.clone()) };
            match competition::competition_by_player_and_game(store, &player, *game_id).await? {
                Some(c) => describe(&c),
                None => "No matching competition".to_owned(),
            }
        }
        Command::Current { steam_id } => {
            list(competition::current_competitions_by_steam_id(store, steam_id).await?)
        }
        Command::Previous { steam_id } => {
            list(competition::previous_competitions_by_steam_id(store, steam_id).await?)
        }
        Command::Players { competition_id } => competition::total_users(store, *competition_id).await?.to_string(),
        Command::Tally { competition_id } => {
            let tally = competition::vote_tally(store, *competition_id).await?;
            format!(
                "{}/{} positive votes, {}",
                tally.positive_votes,
                tally.total_users,
                if tally.succeeded { "passed" } else { "not passed" },
            )
        }
        Command::Vote { competition_id, steam_id, no } => {
            let passed = competition::cast_vote(store, *competition_id, steam_id, !no).await?;
            format!("Vote recorded, ballot {}", if passed { "passed" } else { "still open" })
        }
        Command::SharedGames { competition_id } => {
            games(&competition::shared_games(store, *competition_id).await?)
        }
        Command::Reassign { competition_id, game_id } => {
            describe(&competition::update_game_for_competition(store, *competition_id, *game_id).await?)
        }
    })
}

fn describe(c: &Competition) -> String {
    format!(
        "#{} game {} from {} to {} (status {}), {} players, {} votes",
        c.id,
        c.game_id,
        c.start_date.format("%Y-%m-%d %H:%M"),
        c.end_date.format("%Y-%m-%d %H:%M"),
        c.status_id,
        c.players.len(),
        c.votes.len(),
    )
}

fn list(competitions: Option<Vec<Competition>>) -> String {
    match competitions {
        None => "Not part of any competition".to_owned(),
        Some(competitions) if competitions.is_empty() => "No competition".to_owned(),
        Some(competitions) => competitions.iter().map(describe).join("\n"),
    }
}

fn games(games: &HashSet<Game>) -> String {
    if games.is_empty() {
        return "No shared game".to_owned();
    }
    games
        .iter()
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .map(|g| format!("{} ({})", g.name, g.app_id))
        .join("\n")
}
