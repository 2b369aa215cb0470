// Board engine boundary. The board simulation itself runs elsewhere; this
// side registers games, hands out engine ids, and tracks what was
// dispatched so launch calls stay idempotent.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine game {0} not found")]
    UnknownGame(String),
    #[error("engine game {0} is already running")]
    AlreadyRunning(String),
}

/// A game as the engine sees it.
#[derive(Debug, Clone)]
pub struct EngineGame {
    pub engine_id: String,
    pub snake_names: Vec<String>,
    pub dispatched_at: DateTime<Utc>,
    pub running: bool,
}

/// Boundary to the board engine that plays games out.
pub trait GameEngine: Send + Sync {
    /// Register a game with the engine, returning its engine id.
    fn create_game(&self, snake_names: &[String]) -> Result<String, EngineError>;
    /// Start a previously registered game.
    fn run_game(&self, engine_id: &str) -> Result<(), EngineError>;
    /// Look up a dispatched game.
    fn get_game(&self, engine_id: &str) -> Option<EngineGame>;
}

/// In-process engine: allocates UUID engine ids and keeps a registry of
/// dispatched games. A remote engine client would implement [`GameEngine`]
/// over HTTP instead.
pub struct LocalEngine {
    games: Mutex<HashMap<String, EngineGame>>,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self {
            games: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEngine for LocalEngine {
    fn create_game(&self, snake_names: &[String]) -> Result<String, EngineError> {
        let engine_id = Uuid::new_v4().to_string();
        let game = EngineGame {
            engine_id: engine_id.clone(),
            snake_names: snake_names.to_vec(),
            dispatched_at: Utc::now(),
            running: false,
        };
        self.games.lock().unwrap().insert(engine_id.clone(), game);
        Ok(engine_id)
    }

    fn run_game(&self, engine_id: &str) -> Result<(), EngineError> {
        let mut games = self.games.lock().unwrap();
        let game = games
            .get_mut(engine_id)
            .ok_or_else(|| EngineError::UnknownGame(engine_id.to_string()))?;
        if game.running {
            return Err(EngineError::AlreadyRunning(engine_id.to_string()));
        }
        game.running = true;
        Ok(())
    }

    fn get_game(&self, engine_id: &str) -> Option<EngineGame> {
        self.games.lock().unwrap().get(engine_id).cloned()
    }
}
