use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{
    Account, AccountStatus, AnonymizedIdentity, Competition, CompetitionStatus, Game, GameStatus,
    ParticipantTotals, Pick,
};
use crate::error::Result;

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a PostgreSQL store from an existing connection pool (zero-cost reuse)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a transaction. The refresh pass commits one per league batch so
    /// a failing league never rolls back another league's updates.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    // ==================== Games ====================

    /// Games still awaiting a result, with the league name reached via
    /// competition, ordered so per-league batches come out contiguous.
    #[instrument(skip(self))]
    pub async fn games_pending_refresh(&self) -> Result<Vec<PendingGame>> {
        let rows = sqlx::query(
            r#"
            SELECT g.id, g.competition_id, g.external_id, g.home_team_id, g.away_team_id,
                   g.scheduled_start_time, g.status, g.home_team_score, g.away_team_score,
                   g.winner_team_id, g.venue_name, g.api_data,
                   g.score_corrected_at, g.score_correction_count, g.updated_at,
                   l.name AS league
            FROM games g
            JOIN competitions c ON c.id = g.competition_id
            JOIN leagues l ON l.id = c.league_id
            WHERE g.status IN ('scheduled', 'in_progress')
            ORDER BY l.name, g.scheduled_start_time ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let games = rows
            .iter()
            .map(|row| PendingGame {
                game: game_from_row(row),
                league: row.get("league"),
            })
            .collect();

        Ok(games)
    }

    /// Apply a provider result to a game inside the league transaction
    pub async fn update_game_from_result(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        update: &GameResultUpdate,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE games
            SET status = $2, home_team_score = $3, away_team_score = $4,
                winner_team_id = $5, api_data = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(update.game_id)
        .bind(update.status.as_str())
        .bind(update.home_score)
        .bind(update.away_score)
        .bind(update.winner_team_id)
        .bind(&update.api_data)
        .bind(update.now)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// All picks riding on a game, read through the open transaction so the
    /// settlement pass sees them consistently with its own game update.
    pub async fn picks_for_game(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        game_id: Uuid,
    ) -> Result<Vec<Pick>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, competition_id, game_id, predicted_winner_team_id,
                   is_locked, locked_at, is_correct, points_earned, updated_at
            FROM picks
            WHERE game_id = $1
            "#,
        )
        .bind(game_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.iter().map(pick_from_row).collect())
    }

    /// Write settlement outcomes for a batch of picks
    pub async fn apply_pick_scores(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        scores: &[PickScore],
        now: DateTime<Utc>,
    ) -> Result<()> {
        for score in scores {
            sqlx::query(
                r#"
                UPDATE picks
                SET is_correct = $2, points_earned = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(score.pick_id)
            .bind(score.is_correct)
            .bind(score.points_earned)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }

        debug!("Applied scores to {} picks", scores.len());
        Ok(())
    }

    /// Scored picks for one (user, competition) pair. Reads through the
    /// transaction so scores applied moments ago count toward the totals.
    pub async fn scored_picks(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        competition_id: Uuid,
    ) -> Result<Vec<Pick>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, competition_id, game_id, predicted_winner_team_id,
                   is_locked, locked_at, is_correct, points_earned, updated_at
            FROM picks
            WHERE user_id = $1 AND competition_id = $2 AND is_correct IS NOT NULL
            "#,
        )
        .bind(user_id)
        .bind(competition_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.iter().map(pick_from_row).collect())
    }

    // ==================== Pick locking ====================

    /// Lock every unlocked pick on games whose scheduled start has passed.
    /// Wall-clock only; returns the number of picks locked.
    #[instrument(skip(self))]
    pub async fn lock_picks_for_started_games(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE picks
            SET is_locked = TRUE, locked_at = $1, updated_at = $1
            WHERE is_locked = FALSE
              AND game_id IN (
                  SELECT id FROM games
                  WHERE scheduled_start_time <= $1
                    AND status IN ('scheduled', 'in_progress')
              )
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ==================== Participants ====================

    /// Overwrite a participant's aggregates with freshly recomputed totals
    pub async fn update_participant_totals(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        competition_id: Uuid,
        totals: &ParticipantTotals,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE participants
            SET total_points = $3, total_wins = $4, total_losses = $5,
                accuracy_percentage = $6
            WHERE user_id = $1 AND competition_id = $2
            "#,
        )
        .bind(user_id)
        .bind(competition_id)
        .bind(totals.total_points)
        .bind(totals.total_wins)
        .bind(totals.total_losses)
        .bind(totals.accuracy_percentage)
        .execute(&mut **tx)
        .await?;

        debug!(
            "Updated participant totals: user={} competition={} points={} wins={} losses={}",
            user_id, competition_id, totals.total_points, totals.total_wins, totals.total_losses
        );
        Ok(())
    }

    // ==================== Competitions ====================

    /// Upcoming competitions whose start date has passed
    pub async fn competitions_to_activate(&self, now: DateTime<Utc>) -> Result<Vec<Competition>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, status, start_date, end_date
            FROM competitions
            WHERE status = 'upcoming' AND start_date <= $1
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(competition_from_row).collect())
    }

    /// Active competitions whose end date has passed. Whether they complete
    /// still depends on every game having reached a terminal status.
    pub async fn competitions_past_end(&self, now: DateTime<Utc>) -> Result<Vec<Competition>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, status, start_date, end_date
            FROM competitions
            WHERE status = 'active' AND end_date <= $1
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(competition_from_row).collect())
    }

    /// Statuses of every game in a competition
    pub async fn game_statuses_for_competition(
        &self,
        competition_id: Uuid,
    ) -> Result<Vec<GameStatus>> {
        let rows = sqlx::query("SELECT status FROM games WHERE competition_id = $1")
            .bind(competition_id)
            .fetch_all(&self.pool)
            .await?;

        let statuses = rows
            .iter()
            .map(|row| {
                let status: String = row.get("status");
                GameStatus::try_from(status.as_str()).unwrap_or(GameStatus::Scheduled)
            })
            .collect();

        Ok(statuses)
    }

    /// Guarded status transition. The WHERE clause pins the expected current
    /// status, so a concurrent or repeated pass updates zero rows instead of
    /// regressing the lifecycle. Returns whether the transition applied.
    pub async fn transition_competition(
        &self,
        competition_id: Uuid,
        from: CompetitionStatus,
        to: CompetitionStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE competitions
            SET status = $3, updated_at = $4
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(competition_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Bulk-lock fixed team selections when a competition activates
    pub async fn lock_fixed_selections(
        &self,
        competition_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE fixed_selections
            SET is_locked = TRUE, locked_at = $2, updated_at = $2
            WHERE competition_id = $1 AND is_locked = FALSE
            "#,
        )
        .bind(competition_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ==================== Accounts ====================

    /// Accounts flagged for deletion whose grace period has elapsed
    pub async fn accounts_pending_deletion(&self, cutoff: DateTime<Utc>) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, username, status, deletion_requested_at
            FROM accounts
            WHERE status = 'pending_deletion' AND deletion_requested_at <= $1
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(account_from_row).collect())
    }

    /// Overwrite an account with its anonymized identity. Picks and
    /// participant rows keep referencing the id so past standings survive.
    #[instrument(skip(self, identity))]
    pub async fn anonymize_account(
        &self,
        account_id: Uuid,
        identity: &AnonymizedIdentity,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET email = $2, username = $3, hashed_password = '',
                status = 'deleted', updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .bind(&identity.email)
        .bind(&identity.username)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!("Anonymized account {}", account_id);
        Ok(())
    }
}

fn game_from_row(row: &PgRow) -> Game {
    let status: String = row.get("status");
    Game {
        id: row.get("id"),
        competition_id: row.get("competition_id"),
        external_id: row.get("external_id"),
        home_team_id: row.get("home_team_id"),
        away_team_id: row.get("away_team_id"),
        scheduled_start_time: row.get("scheduled_start_time"),
        status: GameStatus::try_from(status.as_str()).unwrap_or(GameStatus::Scheduled),
        home_team_score: row.get("home_team_score"),
        away_team_score: row.get("away_team_score"),
        winner_team_id: row.get("winner_team_id"),
        venue_name: row.get("venue_name"),
        api_data: row.get("api_data"),
        score_corrected_at: row.get("score_corrected_at"),
        score_correction_count: row.get("score_correction_count"),
        updated_at: row.get("updated_at"),
    }
}

fn pick_from_row(row: &PgRow) -> Pick {
    Pick {
        id: row.get("id"),
        user_id: row.get("user_id"),
        competition_id: row.get("competition_id"),
        game_id: row.get("game_id"),
        predicted_winner_team_id: row.get("predicted_winner_team_id"),
        is_locked: row.get("is_locked"),
        locked_at: row.get("locked_at"),
        is_correct: row.get("is_correct"),
        points_earned: row.get("points_earned"),
        updated_at: row.get("updated_at"),
    }
}

fn competition_from_row(row: &PgRow) -> Competition {
    let status: String = row.get("status");
    Competition {
        id: row.get("id"),
        name: row.get("name"),
        status: CompetitionStatus::try_from(status.as_str()).unwrap_or(CompetitionStatus::Upcoming),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
    }
}

fn account_from_row(row: &PgRow) -> Account {
    let status: String = row.get("status");
    Account {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        status: AccountStatus::try_from(status.as_str()).unwrap_or(AccountStatus::Active),
        deletion_requested_at: row.get("deletion_requested_at"),
    }
}

/// A game awaiting a result, paired with its league name for batching
#[derive(Debug, Clone)]
pub struct PendingGame {
    pub game: Game,
    pub league: String,
}

/// New state for one game as computed by the refresh pass
#[derive(Debug, Clone)]
pub struct GameResultUpdate {
    pub game_id: Uuid,
    pub status: GameStatus,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub winner_team_id: Option<Uuid>,
    pub api_data: serde_json::Value,
    pub now: DateTime<Utc>,
}

/// Settlement outcome for one pick
#[derive(Debug, Clone, Copy)]
pub struct PickScore {
    pub pick_id: Uuid,
    pub is_correct: bool,
    pub points_earned: i32,
}
