// Bracket progression math: how a field of snakes shrinks round by round
// until a final game of at most eight.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest number of snakes a single game can hold.
pub const MAX_SNAKES_PER_GAME: i64 = 8;

/// Snakes that advance out of each game, regardless of game size.
pub const ADVANCING_PER_GAME: i64 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BracketError {
    #[error("bracket needs at least one snake, got {0}")]
    InvalidInput(i64),
}

/// Summary of one round of a bracket's progression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// 1-based round number.
    pub round: i64,
    /// Games needed this round.
    pub num_games: i64,
    /// Game size as shown to organizers: `"6"`, or `"5-6"` when the field
    /// doesn't split evenly.
    pub snakes_per_game: String,
    /// Snakes that move on to the next round.
    pub advancing: i64,
}

fn div_ceil(n: i64, d: i64) -> i64 {
    (n + d - 1) / d
}

/// Compute the round-by-round progression for a field of `total_snakes`.
///
/// A round of `n` snakes needs `ceil(n / 8)` games, and exactly two snakes
/// advance from each game. Rounds are recomputed from the shrinking field
/// until a round starts with eight or fewer snakes; that round is the
/// final. The result is never empty: a field already at eight or fewer
/// yields a single one-game round.
pub fn progression(total_snakes: i64) -> Result<Vec<RoundSummary>, BracketError> {
    if total_snakes < 1 {
        return Err(BracketError::InvalidInput(total_snakes));
    }

    let mut rounds = Vec::new();
    let mut field = total_snakes;
    let mut round = 1;
    loop {
        let num_games = div_ceil(field, MAX_SNAKES_PER_GAME);
        let min = field / num_games;
        let max = div_ceil(field, num_games);
        let advancing = num_games * ADVANCING_PER_GAME;
        let snakes_per_game = if min == max {
            min.to_string()
        } else {
            format!("{min}-{max}")
        };
        rounds.push(RoundSummary {
            round,
            num_games,
            snakes_per_game,
            advancing,
        });

        if field <= MAX_SNAKES_PER_GAME {
            return Ok(rounds);
        }
        field = advancing;
        round += 1;
    }
}

/// Concrete game sizes for a round of `n` snakes.
///
/// `ceil(n / 8)` games whose sizes differ by at most one, larger games
/// first, summing to `n`. This is the partition behind the min-max range
/// reported by [`progression`].
pub fn game_sizes(n: i64) -> Result<Vec<i64>, BracketError> {
    if n < 1 {
        return Err(BracketError::InvalidInput(n));
    }
    let num_games = div_ceil(n, MAX_SNAKES_PER_GAME);
    let base = n / num_games;
    let remainder = n % num_games;
    Ok((0..num_games)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_fields_are_a_single_final() {
        for n in 1..=8 {
            let rounds = progression(n).unwrap();
            assert_eq!(rounds.len(), 1, "field of {n}");
            assert_eq!(rounds[0].round, 1);
            assert_eq!(rounds[0].num_games, 1);
            assert_eq!(rounds[0].snakes_per_game, n.to_string());
            assert_eq!(rounds[0].advancing, 2);
        }
    }

    #[test]
    fn test_nine_snakes_split_unevenly() {
        let rounds = progression(9).unwrap();
        assert_eq!(rounds.len(), 2);

        assert_eq!(rounds[0].num_games, 2);
        assert_eq!(rounds[0].snakes_per_game, "4-5");
        assert_eq!(rounds[0].advancing, 4);

        assert_eq!(rounds[1].num_games, 1);
        assert_eq!(rounds[1].snakes_per_game, "4");
        assert_eq!(rounds[1].advancing, 2);
    }

    #[test]
    fn test_sixteen_snakes() {
        let rounds = progression(16).unwrap();
        assert_eq!(rounds.len(), 2);

        assert_eq!(rounds[0].num_games, 2);
        assert_eq!(rounds[0].snakes_per_game, "8");
        assert_eq!(rounds[0].advancing, 4);

        assert_eq!(rounds[1].num_games, 1);
        assert_eq!(rounds[1].snakes_per_game, "4");
        assert_eq!(rounds[1].advancing, 2);
    }

    #[test]
    fn test_sixty_four_snakes_take_three_rounds() {
        let rounds = progression(64).unwrap();
        assert_eq!(rounds.len(), 3);

        assert_eq!(rounds[0].num_games, 8);
        assert_eq!(rounds[0].snakes_per_game, "8");
        assert_eq!(rounds[0].advancing, 16);

        assert_eq!(rounds[1].num_games, 2);
        assert_eq!(rounds[1].snakes_per_game, "8");
        assert_eq!(rounds[1].advancing, 4);

        assert_eq!(rounds[2].num_games, 1);
        assert_eq!(rounds[2].snakes_per_game, "4");
        assert_eq!(rounds[2].advancing, 2);
    }

    // Each round's figures come from its own field, not round 1's. A loop
    // that froze round-1 figures would repeat "2 games of 8" here forever.
    #[test]
    fn test_recomputes_each_round_from_shrunk_field() {
        let rounds = progression(16).unwrap();
        assert_ne!(rounds[0], rounds[1]);
        assert_eq!(rounds[1].num_games, 1);
    }

    #[test]
    fn test_zero_and_negative_are_rejected() {
        assert_eq!(progression(0), Err(BracketError::InvalidInput(0)));
        assert_eq!(progression(-5), Err(BracketError::InvalidInput(-5)));
    }

    #[test]
    fn test_round_numbers_are_contiguous() {
        for n in [1, 9, 33, 100, 500] {
            let rounds = progression(n).unwrap();
            for (i, r) in rounds.iter().enumerate() {
                assert_eq!(r.round, i as i64 + 1);
            }
        }
    }

    #[test]
    fn test_advancing_feeds_the_next_round() {
        let rounds = progression(200).unwrap();
        for pair in rounds.windows(2) {
            let field = pair[0].advancing;
            assert_eq!(pair[1].num_games, div_ceil(field, MAX_SNAKES_PER_GAME));
        }
        // Terminal round starts at eight or fewer.
        assert_eq!(rounds.last().unwrap().num_games, 1);
    }

    #[test]
    fn test_game_sizes_sum_and_bounds() {
        for n in [1, 7, 8, 9, 16, 17, 33, 100] {
            let sizes = game_sizes(n).unwrap();
            assert_eq!(sizes.len() as i64, div_ceil(n, MAX_SNAKES_PER_GAME));
            assert_eq!(sizes.iter().sum::<i64>(), n);
            let min = *sizes.iter().min().unwrap();
            let max = *sizes.iter().max().unwrap();
            assert!(max - min <= 1);
            assert!(max <= MAX_SNAKES_PER_GAME);
        }
    }

    #[test]
    fn test_game_sizes_match_the_displayed_range() {
        let sizes = game_sizes(9).unwrap();
        assert_eq!(sizes, vec![5, 4]);

        let rounds = progression(9).unwrap();
        assert_eq!(rounds[0].snakes_per_game, "4-5");
    }

    #[test]
    fn test_game_sizes_reject_empty_field() {
        assert_eq!(game_sizes(0), Err(BracketError::InvalidInput(0)));
    }
}
