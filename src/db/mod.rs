// Database access layer (SQLite via sqlx).

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Snake {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tournament {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bracket {
    pub id: i64,
    pub tournament_id: i64,
    pub name: String,
    pub created_at: String,
}

/// A snake's entry in a tournament, optionally assigned to a bracket.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TournamentSnake {
    pub id: i64,
    pub tournament_id: i64,
    pub snake_id: i64,
    pub bracket_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Heat {
    pub id: i64,
    pub bracket_id: i64,
    pub round: i64,
    pub number: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HeatGame {
    pub id: i64,
    pub heat_id: i64,
    pub number: i64,
    pub engine_id: Option<String>,
    pub status: String,
    pub winner_snake_id: Option<i64>,
    pub runner_up_snake_id: Option<i64>,
    pub created_at: String,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        // An in-memory SQLite database exists per connection, so the pool
        // must stay at one connection for every query to see the same data.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snakes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tournaments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'created',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS brackets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tournament_id INTEGER NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tournament_snakes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tournament_id INTEGER NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
                snake_id INTEGER NOT NULL REFERENCES snakes(id) ON DELETE CASCADE,
                bracket_id INTEGER REFERENCES brackets(id) ON DELETE SET NULL,
                UNIQUE(tournament_id, snake_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS heats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bracket_id INTEGER NOT NULL REFERENCES brackets(id) ON DELETE CASCADE,
                round INTEGER NOT NULL,
                number INTEGER NOT NULL,
                name TEXT NOT NULL,
                UNIQUE(bracket_id, round, number)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS heat_snakes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                heat_id INTEGER NOT NULL REFERENCES heats(id) ON DELETE CASCADE,
                snake_id INTEGER NOT NULL REFERENCES snakes(id) ON DELETE CASCADE,
                UNIQUE(heat_id, snake_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS heat_games (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                heat_id INTEGER NOT NULL REFERENCES heats(id) ON DELETE CASCADE,
                number INTEGER NOT NULL,
                engine_id TEXT,
                status TEXT NOT NULL DEFAULT 'created',
                winner_snake_id INTEGER,
                runner_up_snake_id INTEGER,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(heat_id, number)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Snake CRUD ────────────────────────────────────────────────────

    pub async fn create_snake(&self, name: &str, url: &str) -> Result<Snake, sqlx::Error> {
        let row = sqlx::query_as::<_, Snake>(
            "INSERT INTO snakes (name, url) VALUES (?, ?) RETURNING id, name, url, created_at, updated_at",
        )
        .bind(name)
        .bind(url)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_snakes(&self) -> Result<Vec<Snake>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Snake>(
            "SELECT id, name, url, created_at, updated_at FROM snakes ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_snake(&self, id: i64) -> Result<Option<Snake>, sqlx::Error> {
        let row = sqlx::query_as::<_, Snake>(
            "SELECT id, name, url, created_at, updated_at FROM snakes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_snake(
        &self,
        id: i64,
        name: &str,
        url: &str,
    ) -> Result<Option<Snake>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE snakes SET name = ?, url = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(name)
        .bind(url)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_snake(id).await
    }

    pub async fn delete_snake(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM snakes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Tournaments ───────────────────────────────────────────────────

    // Tournaments are provisioned outside this service; creation exists
    // for seeding and tests.
    pub async fn create_tournament(&self, name: &str) -> Result<Tournament, sqlx::Error> {
        let row = sqlx::query_as::<_, Tournament>(
            "INSERT INTO tournaments (name) VALUES (?) RETURNING id, name, status, created_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_tournament(&self, id: i64) -> Result<Option<Tournament>, sqlx::Error> {
        let row = sqlx::query_as::<_, Tournament>(
            "SELECT id, name, status, created_at FROM tournaments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // ── Brackets ──────────────────────────────────────────────────────

    pub async fn create_bracket(
        &self,
        tournament_id: i64,
        name: &str,
    ) -> Result<Bracket, sqlx::Error> {
        let row = sqlx::query_as::<_, Bracket>(
            "INSERT INTO brackets (tournament_id, name) VALUES (?, ?) RETURNING id, tournament_id, name, created_at",
        )
        .bind(tournament_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_bracket(&self, id: i64) -> Result<Option<Bracket>, sqlx::Error> {
        let row = sqlx::query_as::<_, Bracket>(
            "SELECT id, tournament_id, name, created_at FROM brackets WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_brackets(&self, tournament_id: i64) -> Result<Vec<Bracket>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Bracket>(
            "SELECT id, tournament_id, name, created_at FROM brackets WHERE tournament_id = ? ORDER BY id",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn rename_bracket(&self, id: i64, name: &str) -> Result<Option<Bracket>, sqlx::Error> {
        let result = sqlx::query("UPDATE brackets SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_bracket(id).await
    }

    // ── Tournament entries ────────────────────────────────────────────

    /// Enter a snake into a tournament (if not already entered) and point
    /// its entry at the given bracket.
    pub async fn assign_snake_to_bracket(
        &self,
        tournament_id: i64,
        snake_id: i64,
        bracket_id: i64,
    ) -> Result<TournamentSnake, sqlx::Error> {
        sqlx::query(
            "INSERT INTO tournament_snakes (tournament_id, snake_id, bracket_id) VALUES (?, ?, ?)
             ON CONFLICT(tournament_id, snake_id) DO UPDATE SET bracket_id = excluded.bracket_id",
        )
        .bind(tournament_id)
        .bind(snake_id)
        .bind(bracket_id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, TournamentSnake>(
            "SELECT id, tournament_id, snake_id, bracket_id FROM tournament_snakes
             WHERE tournament_id = ? AND snake_id = ?",
        )
        .bind(tournament_id)
        .bind(snake_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Snakes assigned to a bracket, in registration order.
    pub async fn list_bracket_snakes(&self, bracket_id: i64) -> Result<Vec<Snake>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Snake>(
            "SELECT s.id, s.name, s.url, s.created_at, s.updated_at
             FROM snakes s
             JOIN tournament_snakes ts ON ts.snake_id = s.id
             WHERE ts.bracket_id = ?
             ORDER BY ts.id",
        )
        .bind(bracket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_bracket_snakes(&self, bracket_id: i64) -> Result<i64, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tournament_snakes WHERE bracket_id = ?")
                .bind(bracket_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    // ── Heats ─────────────────────────────────────────────────────────

    pub async fn create_heat(
        &self,
        bracket_id: i64,
        round: i64,
        number: i64,
        name: &str,
    ) -> Result<Heat, sqlx::Error> {
        let row = sqlx::query_as::<_, Heat>(
            "INSERT INTO heats (bracket_id, round, number, name) VALUES (?, ?, ?, ?)
             RETURNING id, bracket_id, round, number, name",
        )
        .bind(bracket_id)
        .bind(round)
        .bind(number)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_heat(&self, id: i64) -> Result<Option<Heat>, sqlx::Error> {
        let row = sqlx::query_as::<_, Heat>(
            "SELECT id, bracket_id, round, number, name FROM heats WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_heats(&self, bracket_id: i64) -> Result<Vec<Heat>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Heat>(
            "SELECT id, bracket_id, round, number, name FROM heats WHERE bracket_id = ?
             ORDER BY round, number",
        )
        .bind(bracket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_round_heats(
        &self,
        bracket_id: i64,
        round: i64,
    ) -> Result<Vec<Heat>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Heat>(
            "SELECT id, bracket_id, round, number, name FROM heats
             WHERE bracket_id = ? AND round = ? ORDER BY number",
        )
        .bind(bracket_id)
        .bind(round)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Highest round number seeded so far, if any.
    pub async fn max_round(&self, bracket_id: i64) -> Result<Option<i64>, sqlx::Error> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(round) FROM heats WHERE bracket_id = ?")
                .bind(bracket_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
    }

    pub async fn add_heat_snake(&self, heat_id: i64, snake_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO heat_snakes (heat_id, snake_id) VALUES (?, ?)")
            .bind(heat_id)
            .bind(snake_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_heat_snakes(&self, heat_id: i64) -> Result<Vec<Snake>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Snake>(
            "SELECT s.id, s.name, s.url, s.created_at, s.updated_at
             FROM snakes s
             JOIN heat_snakes hs ON hs.snake_id = s.id
             WHERE hs.heat_id = ?
             ORDER BY hs.id",
        )
        .bind(heat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ── Heat games ────────────────────────────────────────────────────

    pub async fn create_heat_game(&self, heat_id: i64) -> Result<HeatGame, sqlx::Error> {
        // Determine the next game number for this heat
        let max_number: Option<i64> =
            sqlx::query_scalar("SELECT MAX(number) FROM heat_games WHERE heat_id = ?")
                .bind(heat_id)
                .fetch_one(&self.pool)
                .await?;

        let next_number = max_number.unwrap_or(0) + 1;

        let row = sqlx::query_as::<_, HeatGame>(
            "INSERT INTO heat_games (heat_id, number) VALUES (?, ?)
             RETURNING id, heat_id, number, engine_id, status, winner_snake_id, runner_up_snake_id, created_at",
        )
        .bind(heat_id)
        .bind(next_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_heat_game(
        &self,
        heat_id: i64,
        number: i64,
    ) -> Result<Option<HeatGame>, sqlx::Error> {
        let row = sqlx::query_as::<_, HeatGame>(
            "SELECT id, heat_id, number, engine_id, status, winner_snake_id, runner_up_snake_id, created_at
             FROM heat_games WHERE heat_id = ? AND number = ?",
        )
        .bind(heat_id)
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn latest_heat_game(&self, heat_id: i64) -> Result<Option<HeatGame>, sqlx::Error> {
        let row = sqlx::query_as::<_, HeatGame>(
            "SELECT id, heat_id, number, engine_id, status, winner_snake_id, runner_up_snake_id, created_at
             FROM heat_games WHERE heat_id = ? ORDER BY number DESC LIMIT 1",
        )
        .bind(heat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_heat_games(&self, heat_id: i64) -> Result<Vec<HeatGame>, sqlx::Error> {
        let rows = sqlx::query_as::<_, HeatGame>(
            "SELECT id, heat_id, number, engine_id, status, winner_snake_id, runner_up_snake_id, created_at
             FROM heat_games WHERE heat_id = ? ORDER BY number",
        )
        .bind(heat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn set_heat_game_engine(
        &self,
        id: i64,
        engine_id: &str,
        status: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE heat_games SET engine_id = ?, status = ? WHERE id = ?")
            .bind(engine_id)
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn record_heat_game_result(
        &self,
        id: i64,
        winner_snake_id: i64,
        runner_up_snake_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE heat_games SET winner_snake_id = ?, runner_up_snake_id = ?, status = 'complete'
             WHERE id = ?",
        )
        .bind(winner_snake_id)
        .bind(runner_up_snake_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
