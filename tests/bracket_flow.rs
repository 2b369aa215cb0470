// Integration tests for the full bracket lifecycle: roster in, rounds
// seeded, games dispatched and resolved, winners advanced, CSV out.

use std::sync::Arc;

use snakepit_backend::db::Database;
use snakepit_backend::engine::LocalEngine;
use snakepit_backend::service::{BracketService, ServiceError};

async fn test_service() -> (BracketService, Arc<Database>) {
    let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
    let service = BracketService::new(db.clone(), Arc::new(LocalEngine::new()));
    (service, db)
}

async fn register_snakes(db: &Database, n: usize) -> Vec<i64> {
    let mut ids = Vec::new();
    for i in 0..n {
        let snake = db
            .create_snake(&format!("Snake {i}"), &format!("https://snek.example/{i}"))
            .await
            .unwrap();
        ids.push(snake.id);
    }
    ids
}

/// Run every heat of a seeded round to completion, returning the advancing
/// snake ids (winner and runner-up per heat).
async fn play_out_round(
    service: &BracketService,
    round: &snakepit_backend::service::SeededRound,
) -> Vec<i64> {
    let mut advancers = Vec::new();
    for seeded in &round.heats {
        let heat_id = seeded.heat.id;
        let game = service.create_game(heat_id).await.unwrap();

        let running = service.run_game(heat_id, game.number).await.unwrap();
        assert_eq!(running.status, "running");
        assert!(running.engine_id.is_some());

        let winner = seeded.snakes[0].id;
        let runner_up = seeded.snakes[1].id;
        let done = service
            .record_result(heat_id, game.number, winner, runner_up)
            .await
            .unwrap();
        assert_eq!(done.status, "complete");

        advancers.push(winner);
        advancers.push(runner_up);
    }
    advancers
}

#[tokio::test]
async fn test_sixteen_snake_bracket_runs_to_the_final() {
    let (service, db) = test_service().await;

    let tournament = db.create_tournament("Autumn Arena").await.unwrap();
    let ids = register_snakes(&db, 16).await;
    let bracket = service
        .create_bracket(tournament.id, "Main Event", &ids)
        .await
        .unwrap();

    // Preview: 16 snakes -> 2 games of 8, then a final of 4
    let preview = service.progression(bracket.id).await.unwrap();
    assert_eq!(preview.len(), 2);
    assert_eq!(preview[0].num_games, 2);
    assert_eq!(preview[0].snakes_per_game, "8");
    assert_eq!(preview[0].advancing, 4);
    assert_eq!(preview[1].num_games, 1);

    // Nothing seeded yet
    assert!(service.current_games(bracket.id).await.unwrap().is_empty());

    // Round 1: two heats of eight
    let round1 = service.advance_round(bracket.id).await.unwrap();
    assert_eq!(round1.round, 1);
    assert_eq!(round1.heats.len(), 2);
    for seeded in &round1.heats {
        assert_eq!(seeded.snakes.len(), 8);
    }

    let dashboard = service.current_games(bracket.id).await.unwrap();
    assert_eq!(dashboard.len(), 2);
    assert!(dashboard[0].game.is_none());

    let advancers = play_out_round(&service, &round1).await;
    assert_eq!(advancers.len(), 4);

    // Round 2 is the final: one heat holding exactly the advancers
    let round2 = service.advance_round(bracket.id).await.unwrap();
    assert_eq!(round2.round, 2);
    assert_eq!(round2.heats.len(), 1);

    let mut seeded_ids: Vec<i64> = round2.heats[0].snakes.iter().map(|s| s.id).collect();
    seeded_ids.sort();
    let mut expected = advancers.clone();
    expected.sort();
    assert_eq!(seeded_ids, expected);

    // Dashboard follows the latest round
    let dashboard = service.current_games(bracket.id).await.unwrap();
    assert_eq!(dashboard.len(), 1);
    assert_eq!(dashboard[0].round, 2);
    assert_eq!(dashboard[0].snakes.len(), 4);

    play_out_round(&service, &round2).await;

    // The final has been played; the bracket cannot advance further
    let err = service.advance_round(bracket.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn test_nine_snake_bracket_splits_unevenly() {
    let (service, db) = test_service().await;

    let tournament = db.create_tournament("Winter Cup").await.unwrap();
    let ids = register_snakes(&db, 9).await;
    let bracket = service
        .create_bracket(tournament.id, "Open", &ids)
        .await
        .unwrap();

    let round1 = service.advance_round(bracket.id).await.unwrap();
    assert_eq!(round1.heats.len(), 2);

    let mut sizes: Vec<usize> = round1.heats.iter().map(|h| h.snakes.len()).collect();
    sizes.sort();
    assert_eq!(sizes, vec![4, 5]);

    play_out_round(&service, &round1).await;

    let round2 = service.advance_round(bracket.id).await.unwrap();
    assert_eq!(round2.heats.len(), 1);
    assert_eq!(round2.heats[0].snakes.len(), 4);
}

#[tokio::test]
async fn test_advance_blocks_on_unfinished_heats() {
    let (service, db) = test_service().await;

    let tournament = db.create_tournament("T").await.unwrap();
    let ids = register_snakes(&db, 12).await;
    let bracket = service
        .create_bracket(tournament.id, "Main", &ids)
        .await
        .unwrap();

    let round1 = service.advance_round(bracket.id).await.unwrap();
    assert_eq!(round1.heats.len(), 2);

    // Finish only the first heat
    let first = &round1.heats[0];
    let game = service.create_game(first.heat.id).await.unwrap();
    service.run_game(first.heat.id, game.number).await.unwrap();
    service
        .record_result(
            first.heat.id,
            game.number,
            first.snakes[0].id,
            first.snakes[1].id,
        )
        .await
        .unwrap();

    let err = service.advance_round(bracket.id).await.unwrap_err();
    match err {
        ServiceError::InvalidState(msg) => assert!(msg.contains("no completed game")),
        other => panic!("expected InvalidState, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rerun_after_inconclusive_game() {
    let (service, db) = test_service().await;

    let tournament = db.create_tournament("T").await.unwrap();
    let ids = register_snakes(&db, 9).await;
    let bracket = service
        .create_bracket(tournament.id, "Main", &ids)
        .await
        .unwrap();
    let round1 = service.advance_round(bracket.id).await.unwrap();
    assert_eq!(round1.heats.len(), 2);

    // First heat: game 1 completes, then the heat is re-run as game 2
    // with a different outcome
    let first = &round1.heats[0];
    let g1 = service.create_game(first.heat.id).await.unwrap();
    service.run_game(first.heat.id, g1.number).await.unwrap();
    service
        .record_result(
            first.heat.id,
            g1.number,
            first.snakes[0].id,
            first.snakes[1].id,
        )
        .await
        .unwrap();

    let g2 = service.create_game(first.heat.id).await.unwrap();
    assert_eq!(g2.number, 2);
    service.run_game(first.heat.id, g2.number).await.unwrap();
    service
        .record_result(
            first.heat.id,
            g2.number,
            first.snakes[2].id,
            first.snakes[3].id,
        )
        .await
        .unwrap();

    // Second heat plays a single game
    let second = &round1.heats[1];
    let g = service.create_game(second.heat.id).await.unwrap();
    service.run_game(second.heat.id, g.number).await.unwrap();
    service
        .record_result(
            second.heat.id,
            g.number,
            second.snakes[0].id,
            second.snakes[1].id,
        )
        .await
        .unwrap();

    // The latest game decides who advances out of the first heat
    let round2 = service.advance_round(bracket.id).await.unwrap();
    let mut seeded_ids: Vec<i64> = round2.heats[0].snakes.iter().map(|s| s.id).collect();
    seeded_ids.sort();
    let mut expected = vec![
        first.snakes[2].id,
        first.snakes[3].id,
        second.snakes[0].id,
        second.snakes[1].id,
    ];
    expected.sort();
    assert_eq!(seeded_ids, expected);
}

#[tokio::test]
async fn test_csv_export_reflects_played_games() {
    let (service, db) = test_service().await;

    let tournament = db.create_tournament("Spring Open").await.unwrap();
    let ids = register_snakes(&db, 9).await;
    let bracket = service
        .create_bracket(tournament.id, "Beginner", &ids)
        .await
        .unwrap();

    let round1 = service.advance_round(bracket.id).await.unwrap();
    play_out_round(&service, &round1).await;
    service.advance_round(bracket.id).await.unwrap();

    let export = service.export_csv(bracket.id).await.unwrap();
    assert_eq!(export.filename, "Spring Open_Beginner.csv");

    let lines: Vec<&str> = export.content.lines().collect();
    assert_eq!(lines[0], "Round,Heat,Game,Status,Winner,Runner-up,Snakes");
    // Two played round-1 heats plus the pending final
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("1,Round 1 Heat 1,1,complete,"));
    assert!(lines[2].starts_with("1,Round 1 Heat 2,1,complete,"));
    assert!(lines[3].starts_with("2,Round 2 Heat 1,,pending,"));

    // Winner names from the heat rosters appear in the rows
    let winner_name = &round1.heats[0].snakes[0].name;
    assert!(lines[1].contains(winner_name.as_str()));
}
