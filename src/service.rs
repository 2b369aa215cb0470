// Bracket orchestration: create/update brackets, seed rounds of heats,
// dispatch heat games to the engine, record results, export CSV.

use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Serialize;
use thiserror::Error;

use crate::bracket::{self, BracketError, RoundSummary};
use crate::db::{Bracket, Database, Heat, HeatGame, Snake};
use crate::engine::{EngineError, GameEngine};
use crate::export;
use crate::metrics;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    InvalidState(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<BracketError> for ServiceError {
    fn from(e: BracketError) -> Self {
        ServiceError::InvalidInput(e.to_string())
    }
}

/// A bracket with its roster and progression preview.
#[derive(Debug, Serialize)]
pub struct BracketDetail {
    pub bracket: Bracket,
    pub snakes: Vec<Snake>,
    pub progression: Vec<RoundSummary>,
}

/// One heat of the latest round, with its newest game (if any).
#[derive(Debug, Serialize)]
pub struct GameDetail {
    pub heat_id: i64,
    pub heat_name: String,
    pub round: i64,
    pub snakes: Vec<String>,
    pub game: Option<HeatGame>,
}

#[derive(Debug, Serialize)]
pub struct SeededHeat {
    pub heat: Heat,
    pub snakes: Vec<Snake>,
}

#[derive(Debug, Serialize)]
pub struct SeededRound {
    pub round: i64,
    pub heats: Vec<SeededHeat>,
}

/// A rendered CSV export, ready to serve as an attachment.
#[derive(Debug, Serialize)]
pub struct CsvExport {
    pub filename: String,
    pub content: String,
}

/// The operations behind the tournament-bracket admin API. Every method
/// takes explicit ids and returns an explicit result; nothing here touches
/// the request context.
pub struct BracketService {
    db: Arc<Database>,
    engine: Arc<dyn GameEngine>,
}

impl BracketService {
    pub fn new(db: Arc<Database>, engine: Arc<dyn GameEngine>) -> Self {
        Self { db, engine }
    }

    async fn bracket(&self, bracket_id: i64) -> Result<Bracket, ServiceError> {
        self.db
            .get_bracket(bracket_id)
            .await?
            .ok_or(ServiceError::NotFound("bracket"))
    }

    async fn heat(&self, heat_id: i64) -> Result<Heat, ServiceError> {
        self.db
            .get_heat(heat_id)
            .await?
            .ok_or(ServiceError::NotFound("heat"))
    }

    /// Verify every id refers to a registered snake.
    async fn check_snakes_exist(&self, snake_ids: &[i64]) -> Result<(), ServiceError> {
        for &id in snake_ids {
            if self.db.get_snake(id).await?.is_none() {
                return Err(ServiceError::NotFound("snake"));
            }
        }
        Ok(())
    }

    /// Create a bracket in a tournament and assign the given snakes to it.
    /// Snakes are entered into the tournament first if they aren't already.
    pub async fn create_bracket(
        &self,
        tournament_id: i64,
        name: &str,
        snake_ids: &[i64],
    ) -> Result<Bracket, ServiceError> {
        if name.is_empty() {
            return Err(ServiceError::InvalidInput("name is required".to_string()));
        }
        let tournament = self
            .db
            .get_tournament(tournament_id)
            .await?
            .ok_or(ServiceError::NotFound("tournament"))?;
        self.check_snakes_exist(snake_ids).await?;

        let bracket = self.db.create_bracket(tournament_id, name).await?;
        for &snake_id in snake_ids {
            self.db
                .assign_snake_to_bracket(tournament_id, snake_id, bracket.id)
                .await?;
        }

        metrics::BRACKETS_CREATED_TOTAL.inc();
        tracing::info!(
            bracket_id = bracket.id,
            tournament = %tournament.name,
            snakes = snake_ids.len(),
            "bracket created"
        );
        Ok(bracket)
    }

    /// Rename a bracket and assign additional snakes. Snakes omitted from
    /// `snake_ids` keep whatever assignment they already had.
    pub async fn update_bracket(
        &self,
        bracket_id: i64,
        name: &str,
        snake_ids: &[i64],
    ) -> Result<Bracket, ServiceError> {
        if name.is_empty() {
            return Err(ServiceError::InvalidInput("name is required".to_string()));
        }
        let bracket = self.bracket(bracket_id).await?;
        self.check_snakes_exist(snake_ids).await?;

        let bracket = self
            .db
            .rename_bracket(bracket.id, name)
            .await?
            .ok_or(ServiceError::NotFound("bracket"))?;
        for &snake_id in snake_ids {
            self.db
                .assign_snake_to_bracket(bracket.tournament_id, snake_id, bracket.id)
                .await?;
        }
        Ok(bracket)
    }

    /// The round-by-round progression preview for a bracket's current field.
    pub async fn progression(&self, bracket_id: i64) -> Result<Vec<RoundSummary>, ServiceError> {
        let bracket = self.bracket(bracket_id).await?;
        let total_snakes = self.db.count_bracket_snakes(bracket.id).await?;
        let rounds = bracket::progression(total_snakes)?;
        for r in &rounds {
            tracing::debug!(
                bracket_id,
                round = r.round,
                num_games = r.num_games,
                snakes_per_game = %r.snakes_per_game,
                advancing = r.advancing,
            );
        }
        Ok(rounds)
    }

    /// Bracket with roster and progression preview, for the detail view.
    pub async fn bracket_detail(&self, bracket_id: i64) -> Result<BracketDetail, ServiceError> {
        let bracket = self.bracket(bracket_id).await?;
        let snakes = self.db.list_bracket_snakes(bracket.id).await?;
        let progression = self.progression(bracket_id).await?;
        Ok(BracketDetail {
            bracket,
            snakes,
            progression,
        })
    }

    /// The latest round's heats with their newest game each, for the live
    /// dashboard.
    pub async fn current_games(&self, bracket_id: i64) -> Result<Vec<GameDetail>, ServiceError> {
        let bracket = self.bracket(bracket_id).await?;
        let round = match self.db.max_round(bracket.id).await? {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };

        let mut details = Vec::new();
        for heat in self.db.list_round_heats(bracket.id, round).await? {
            let snakes = self
                .db
                .list_heat_snakes(heat.id)
                .await?
                .into_iter()
                .map(|s| s.name)
                .collect();
            let game = self.db.latest_heat_game(heat.id).await?;
            details.push(GameDetail {
                heat_id: heat.id,
                heat_name: heat.name,
                round: heat.round,
                snakes,
                game,
            });
        }
        Ok(details)
    }

    /// Advancers from one heat: winner and runner-up of its latest game.
    async fn heat_advancers(&self, heat: &Heat) -> Result<Vec<i64>, ServiceError> {
        let game = self
            .db
            .latest_heat_game(heat.id)
            .await?
            .filter(|g| g.status == "complete");
        match game {
            Some(g) => match (g.winner_snake_id, g.runner_up_snake_id) {
                (Some(w), Some(r)) => Ok(vec![w, r]),
                _ => Err(ServiceError::InvalidState(format!(
                    "{} has a completed game without a recorded result",
                    heat.name
                ))),
            },
            None => Err(ServiceError::InvalidState(format!(
                "{} has no completed game yet",
                heat.name
            ))),
        }
    }

    /// Seed the next round of heats.
    ///
    /// Round 1 takes the bracket's full roster; later rounds take the two
    /// advancers of every heat in the round before, which must all have a
    /// completed game. A round with a single heat is the final; once it
    /// exists the bracket cannot advance further.
    pub async fn advance_round(&self, bracket_id: i64) -> Result<SeededRound, ServiceError> {
        let bracket = self.bracket(bracket_id).await?;

        let (round, mut field): (i64, Vec<i64>) = match self.db.max_round(bracket.id).await? {
            None => {
                let roster = self.db.list_bracket_snakes(bracket.id).await?;
                if roster.is_empty() {
                    return Err(ServiceError::InvalidInput(
                        "bracket has no snakes assigned".to_string(),
                    ));
                }
                (1, roster.into_iter().map(|s| s.id).collect())
            }
            Some(current) => {
                let heats = self.db.list_round_heats(bracket.id, current).await?;
                if heats.len() == 1 {
                    return Err(ServiceError::InvalidState(format!(
                        "round {current} is the final round; nothing to advance"
                    )));
                }
                let mut advancers = Vec::new();
                for heat in &heats {
                    advancers.extend(self.heat_advancers(heat).await?);
                }
                (current + 1, advancers)
            }
        };

        field.shuffle(&mut rand::thread_rng());

        let sizes = bracket::game_sizes(field.len() as i64)?;
        let mut heats = Vec::new();
        let mut cursor = field.into_iter();
        for (i, size) in sizes.iter().enumerate() {
            let number = i as i64 + 1;
            let heat = self
                .db
                .create_heat(
                    bracket.id,
                    round,
                    number,
                    &format!("Round {round} Heat {number}"),
                )
                .await?;
            for _ in 0..*size {
                // game_sizes sums to the field size, so the cursor cannot run dry
                let snake_id = cursor.next().expect("sizes sum to field length");
                self.db.add_heat_snake(heat.id, snake_id).await?;
            }
            let snakes = self.db.list_heat_snakes(heat.id).await?;
            heats.push(SeededHeat { heat, snakes });
        }

        metrics::ROUNDS_SEEDED_TOTAL.inc();
        tracing::info!(bracket_id, round, heats = heats.len(), "round seeded");
        Ok(SeededRound { round, heats })
    }

    /// Append the next numbered game to a heat. The heat's previous game
    /// must be finished first.
    pub async fn create_game(&self, heat_id: i64) -> Result<HeatGame, ServiceError> {
        let heat = self.heat(heat_id).await?;
        if let Some(game) = self.db.latest_heat_game(heat.id).await? {
            if game.status != "complete" {
                return Err(ServiceError::InvalidState(format!(
                    "game {} of {} is still {}",
                    game.number, heat.name, game.status
                )));
            }
        }
        Ok(self.db.create_heat_game(heat.id).await?)
    }

    /// Dispatch a heat game to the engine. Idempotent: a game that already
    /// has an engine id is returned unchanged.
    pub async fn run_game(&self, heat_id: i64, number: i64) -> Result<HeatGame, ServiceError> {
        let heat = self.heat(heat_id).await?;
        let game = self
            .db
            .get_heat_game(heat.id, number)
            .await?
            .ok_or(ServiceError::NotFound("game"))?;

        if game.engine_id.is_some() {
            return Ok(game);
        }

        let snakes = self.db.list_heat_snakes(heat.id).await?;
        if snakes.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "{} has no snakes",
                heat.name
            )));
        }
        let names: Vec<String> = snakes.into_iter().map(|s| s.name).collect();

        let engine_id = self.engine.create_game(&names)?;
        self.engine.run_game(&engine_id)?;
        self.db
            .set_heat_game_engine(game.id, &engine_id, "running")
            .await?;

        metrics::GAMES_STARTED_TOTAL.inc();
        metrics::ACTIVE_GAMES.inc();
        tracing::info!(heat_id, number, engine_id = %engine_id, "game dispatched");

        self.db
            .get_heat_game(heat.id, number)
            .await?
            .ok_or(ServiceError::NotFound("game"))
    }

    /// Record the outcome of a heat game. Winner and runner-up must be two
    /// different members of the heat.
    pub async fn record_result(
        &self,
        heat_id: i64,
        number: i64,
        winner_snake_id: i64,
        runner_up_snake_id: i64,
    ) -> Result<HeatGame, ServiceError> {
        let heat = self.heat(heat_id).await?;
        let game = self
            .db
            .get_heat_game(heat.id, number)
            .await?
            .ok_or(ServiceError::NotFound("game"))?;

        if winner_snake_id == runner_up_snake_id {
            return Err(ServiceError::InvalidInput(
                "winner and runner-up must be different snakes".to_string(),
            ));
        }
        let roster: Vec<i64> = self
            .db
            .list_heat_snakes(heat.id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        for id in [winner_snake_id, runner_up_snake_id] {
            if !roster.contains(&id) {
                return Err(ServiceError::InvalidInput(format!(
                    "snake {id} is not in {}",
                    heat.name
                )));
            }
        }

        if game.status == "running" {
            metrics::ACTIVE_GAMES.dec();
        }
        self.db
            .record_heat_game_result(game.id, winner_snake_id, runner_up_snake_id)
            .await?;
        metrics::RESULTS_RECORDED_TOTAL.inc();

        self.db
            .get_heat_game(heat.id, number)
            .await?
            .ok_or(ServiceError::NotFound("game"))
    }

    /// Export a bracket's heats and games as CSV.
    pub async fn export_csv(&self, bracket_id: i64) -> Result<CsvExport, ServiceError> {
        let bracket = self.bracket(bracket_id).await?;
        let tournament = self
            .db
            .get_tournament(bracket.tournament_id)
            .await?
            .ok_or(ServiceError::NotFound("tournament"))?;

        let mut rows = vec![vec![
            "Round".to_string(),
            "Heat".to_string(),
            "Game".to_string(),
            "Status".to_string(),
            "Winner".to_string(),
            "Runner-up".to_string(),
            "Snakes".to_string(),
        ]];

        for heat in self.db.list_heats(bracket.id).await? {
            let roster = self
                .db
                .list_heat_snakes(heat.id)
                .await?
                .into_iter()
                .map(|s| s.name)
                .collect::<Vec<_>>()
                .join(", ");

            let games = self.db.list_heat_games(heat.id).await?;
            if games.is_empty() {
                rows.push(vec![
                    heat.round.to_string(),
                    heat.name.clone(),
                    String::new(),
                    "pending".to_string(),
                    String::new(),
                    String::new(),
                    roster.clone(),
                ]);
                continue;
            }
            for game in games {
                rows.push(vec![
                    heat.round.to_string(),
                    heat.name.clone(),
                    game.number.to_string(),
                    game.status.clone(),
                    self.snake_name(game.winner_snake_id).await?,
                    self.snake_name(game.runner_up_snake_id).await?,
                    roster.clone(),
                ]);
            }
        }

        metrics::CSV_EXPORTS_TOTAL.inc();
        Ok(CsvExport {
            filename: export::export_filename(&tournament.name, &bracket.name),
            content: export::render_document(&rows),
        })
    }

    async fn snake_name(&self, snake_id: Option<i64>) -> Result<String, ServiceError> {
        match snake_id {
            Some(id) => Ok(self
                .db
                .get_snake(id)
                .await?
                .map(|s| s.name)
                .unwrap_or_default()),
            None => Ok(String::new()),
        }
    }
}
