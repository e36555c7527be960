//! Very small Elo helper (K-factor 32 by default)

/// A decided ranked game moves both ratings by at least this much.
pub const MIN_ELO_SWING: i32 = 1;

/// Expected score of `rating` against `opponent` on the logistic curve.
pub fn expected_score(rating: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) as f64 / 400.0))
}

/// Returns `(winner_delta, loser_delta)` for a decided game.
///
/// `winner_delta > 0` and `loser_delta < 0`; with equal ratings the two
/// have the same magnitude. A heavy favourite still takes [`MIN_ELO_SWING`]
/// from the loser instead of rounding to a no-op.
pub fn elo_delta(winner_elo: i32, loser_elo: i32, k: f64) -> (i32, i32) {
    let expected_winner = expected_score(winner_elo, loser_elo);
    let winner_delta = (k * (1.0 - expected_winner)).round() as i32;
    let loser_delta = (k * (0.0 - (1.0 - expected_winner))).round() as i32;
    (winner_delta.max(MIN_ELO_SWING), loser_delta.min(-MIN_ELO_SWING))
}
