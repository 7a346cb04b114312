//! Square activation: select a piece or attempt a move.

use chess::Square;

use crate::{models::GamePatch, reconcile::GameState};

/// Result of activating a square.
#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    /// Nothing happened (not our turn, history view, game over, empty square).
    Ignored,
    /// One of our pieces is now selected.
    Selected(Square),
    /// The move was applied locally; write the patch.
    Moved(GamePatch),
    /// The attempted move was illegal and the selection was dropped.
    Rejected,
}

/// Handle a click or the select key on `square`.
pub fn activate(state: &mut GameState, square: Square, now: i64) -> InputOutcome {
    if !state.accepts_moves() {
        return InputOutcome::Ignored;
    }
    if state.game().board().color_on(square) == Some(state.color()) {
        state.select(square);
        return InputOutcome::Selected(square);
    }
    let Some(from) = state.selection() else {
        return InputOutcome::Ignored;
    };
    match state.apply_local_move(from, square, now) {
        Some(patch) => InputOutcome::Moved(patch),
        None => {
            state.clear_selection();
            InputOutcome::Rejected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::Roster, game::parse_square, models::Identity};

    fn sq(name: &str) -> Square {
        parse_square(name).expect("valid square")
    }

    fn white_state() -> GameState {
        let roster = Roster::new("Benji", "Sanaa").expect("valid roster");
        GameState::new(Identity("Benji".to_string()), roster)
    }

    #[test]
    fn select_then_move() {
        let mut state = white_state();
        assert_eq!(activate(&mut state, sq("e4"), 0), InputOutcome::Ignored);
        assert_eq!(activate(&mut state, sq("e2"), 0), InputOutcome::Selected(sq("e2")));
        assert_eq!(state.marks().hints.len(), 2);
        assert_eq!(activate(&mut state, sq("g1"), 0), InputOutcome::Selected(sq("g1")));
        match activate(&mut state, sq("f3"), 0) {
            InputOutcome::Moved(patch) => assert_eq!(patch.last_move.as_deref(), Some("g1-f3")),
            other => panic!("expected a move, got {other:?}"),
        }
        assert_eq!(state.selection(), None);
    }

    #[test]
    fn illegal_target_drops_selection() {
        let mut state = white_state();
        activate(&mut state, sq("e2"), 0);
        assert_eq!(activate(&mut state, sq("e5"), 0), InputOutcome::Rejected);
        assert_eq!(state.selection(), None);
    }

    #[test]
    fn opponent_turn_ignores_input() {
        let mut state = white_state();
        activate(&mut state, sq("e2"), 0);
        activate(&mut state, sq("e4"), 0);
        assert_eq!(activate(&mut state, sq("d2"), 0), InputOutcome::Ignored);
        assert_eq!(activate(&mut state, sq("e7"), 0), InputOutcome::Ignored);
    }
}
