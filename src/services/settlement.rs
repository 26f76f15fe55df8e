//! Settlement pass bodies.
//!
//! Each public method is one scheduler tick: refresh scores and settle
//! newly final games, lock picks on started games, advance competition
//! lifecycles, and sweep accounts past their deletion grace period.
//! Every method opens and finishes its own database work so a failed
//! tick rolls back cleanly and the next tick starts fresh.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Postgres, Transaction};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::adapters::{GameResultUpdate, PickScore, PostgresStore};
use crate::coordination::CompetitionLocks;
use crate::domain::{
    decide_winner, AnonymizedIdentity, CompetitionStatus, Game, GameStatus, NormalizedResult,
    ParticipantTotals,
};
use crate::error::Result;

use super::sports_data::SportsDataService;

/// Outcome of one score refresh tick
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshSummary {
    pub games_updated: usize,
    pub games_settled: usize,
    pub picks_scored: usize,
    pub leagues_failed: usize,
}

/// Outcome of one lifecycle tick
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleSummary {
    pub activated: usize,
    pub completed: usize,
    pub selections_locked: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct LeagueRefresh {
    updated: usize,
    settled: usize,
    picks_scored: usize,
}

pub struct SettlementService {
    store: PostgresStore,
    sports: Arc<SportsDataService>,
    locks: CompetitionLocks,
}

impl SettlementService {
    pub fn new(store: PostgresStore, sports: Arc<SportsDataService>) -> Self {
        Self {
            store,
            sports,
            locks: CompetitionLocks::new(),
        }
    }

    /// Refresh scores for every game still awaiting a result.
    ///
    /// Games are batched by league; each league gets one live-scores fetch
    /// and one transaction, so a failing league rolls back alone and the
    /// others commit. A game's first observed transition into Final settles
    /// its picks within the same transaction.
    pub async fn refresh_scores(&self) -> Result<RefreshSummary> {
        let now = Utc::now();
        let pending = self.store.games_pending_refresh().await?;

        if pending.is_empty() {
            debug!("No active games to update");
            return Ok(RefreshSummary::default());
        }

        info!("Found {} games to update", pending.len());

        let mut by_league: BTreeMap<String, Vec<Game>> = BTreeMap::new();
        for item in pending {
            by_league.entry(item.league).or_default().push(item.game);
        }

        let mut summary = RefreshSummary::default();
        let mut affected_competitions: BTreeSet<Uuid> = BTreeSet::new();

        for (league, games) in by_league {
            match self
                .refresh_league(&league, &games, now, &mut affected_competitions)
                .await
            {
                Ok(outcome) => {
                    summary.games_updated += outcome.updated;
                    summary.games_settled += outcome.settled;
                    summary.picks_scored += outcome.picks_scored;
                    info!("Updated {} games for {}", outcome.updated, league);
                }
                Err(e) => {
                    error!("Error updating scores for {}: {}", league, e);
                    summary.leagues_failed += 1;
                }
            }
        }

        // Leaderboards are rebuilt lazily by readers; dropping the cached
        // copy after commit is all settlement has to do.
        for competition_id in affected_competitions {
            let key = format!("leaderboard:{}", competition_id);
            if self.sports.cache().remove(&key) {
                debug!("Invalidated cache entry {}", key);
            }
        }

        info!(
            "Score update completed: {} games updated, {} settled",
            summary.games_updated, summary.games_settled
        );
        Ok(summary)
    }

    async fn refresh_league(
        &self,
        league: &str,
        games: &[Game],
        now: DateTime<Utc>,
        affected_competitions: &mut BTreeSet<Uuid>,
    ) -> Result<LeagueRefresh> {
        let live = self.sports.get_live_results(league, true).await?;
        let results_by_id: HashMap<&str, &NormalizedResult> = live
            .iter()
            .map(|result| (result.external_id.as_str(), result))
            .collect();

        let mut tx = self.store.begin().await?;
        let mut outcome = LeagueRefresh::default();

        for game in games {
            let Some(result) = results_by_id.get(game.external_id.as_str()) else {
                continue;
            };

            let was_final = game.status == GameStatus::Final;
            let winner = decide_winner(
                result.status,
                result.home_score,
                result.away_score,
                game.home_team_id,
                game.away_team_id,
            );

            self.store
                .update_game_from_result(
                    &mut tx,
                    &GameResultUpdate {
                        game_id: game.id,
                        status: result.status,
                        home_score: result.home_score,
                        away_score: result.away_score,
                        winner_team_id: winner,
                        api_data: result.raw.clone(),
                        now,
                    },
                )
                .await?;
            outcome.updated += 1;

            if !was_final && result.status == GameStatus::Final {
                outcome.picks_scored += self.settle_game(&mut tx, game, winner, now).await?;
                outcome.settled += 1;
                affected_competitions.insert(game.competition_id);
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    /// Score every pick on a game that just went final, then recompute the
    /// aggregates for each affected (user, competition) pair from scratch.
    /// Runs under the competition lock so lifecycle writes never interleave.
    async fn settle_game(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        game: &Game,
        winner: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let picks = self.store.picks_for_game(tx, game.id).await?;
        if picks.is_empty() {
            debug!("No picks found for game {}", game.id);
            return Ok(0);
        }

        let _guard = self.locks.acquire(game.competition_id).await;

        let scores: Vec<PickScore> = picks
            .iter()
            .map(|pick| {
                let (is_correct, points_earned) = pick.score(winner);
                PickScore {
                    pick_id: pick.id,
                    is_correct,
                    points_earned,
                }
            })
            .collect();

        self.store.apply_pick_scores(tx, &scores, now).await?;
        info!("Scored {} picks for game {}", scores.len(), game.id);

        let pairs: BTreeSet<(Uuid, Uuid)> = picks
            .iter()
            .map(|pick| (pick.user_id, pick.competition_id))
            .collect();

        for (user_id, competition_id) in pairs {
            let scored = self.store.scored_picks(tx, user_id, competition_id).await?;
            let totals = ParticipantTotals::from_picks(&scored);
            self.store
                .update_participant_totals(tx, user_id, competition_id, &totals)
                .await?;
        }

        Ok(scores.len())
    }

    /// Lock unlocked picks on games whose scheduled start has passed.
    pub async fn lock_picks(&self) -> Result<u64> {
        let locked = self.store.lock_picks_for_started_games(Utc::now()).await?;
        if locked > 0 {
            info!("Locked {} picks for started games", locked);
        }
        Ok(locked)
    }

    /// Advance competition lifecycles.
    ///
    /// Upcoming competitions past their start date activate and have their
    /// fixed selections bulk-locked; active competitions past their end date
    /// complete once every game has reached a terminal status. The guarded
    /// database transition makes a repeated or racing pass a no-op.
    pub async fn run_lifecycle(&self) -> Result<LifecycleSummary> {
        let now = Utc::now();
        let mut summary = LifecycleSummary::default();

        for competition in self.store.competitions_to_activate(now).await? {
            if !competition.should_activate(now) {
                continue;
            }

            let _guard = self.locks.acquire(competition.id).await;
            let applied = self
                .store
                .transition_competition(
                    competition.id,
                    CompetitionStatus::Upcoming,
                    CompetitionStatus::Active,
                    now,
                )
                .await?;

            if applied {
                let locked = self.store.lock_fixed_selections(competition.id, now).await?;
                info!(
                    "Competition {} ({}) transitioned to active, locked {} fixed selections",
                    competition.id, competition.name, locked
                );
                summary.activated += 1;
                summary.selections_locked += locked;
            }
        }

        for competition in self.store.competitions_past_end(now).await? {
            let statuses = self
                .store
                .game_statuses_for_competition(competition.id)
                .await?;

            if !competition.should_complete(now, &statuses) {
                debug!(
                    "Competition {} ({}) past end date but games still pending",
                    competition.id, competition.name
                );
                continue;
            }

            let _guard = self.locks.acquire(competition.id).await;
            let applied = self
                .store
                .transition_competition(
                    competition.id,
                    CompetitionStatus::Active,
                    CompetitionStatus::Completed,
                    now,
                )
                .await?;

            if applied {
                info!(
                    "Competition {} ({}) transitioned to completed",
                    competition.id, competition.name
                );
                summary.completed += 1;
            }
        }

        Ok(summary)
    }

    /// Anonymize accounts whose deletion request has aged past the grace
    /// period. Picks and participant rows stay behind for standings.
    pub async fn sweep_deletions(&self, grace_days: i64) -> Result<u64> {
        let now = Utc::now();
        let cutoff = now - Duration::days(grace_days);
        let accounts = self.store.accounts_pending_deletion(cutoff).await?;

        if accounts.is_empty() {
            info!("No pending deletions to process");
            return Ok(0);
        }

        info!("Found {} accounts to anonymize", accounts.len());
        for account in &accounts {
            let identity = AnonymizedIdentity::for_account(account.id);
            self.store
                .anonymize_account(account.id, &identity, now)
                .await?;
        }

        Ok(accounts.len() as u64)
    }
}
