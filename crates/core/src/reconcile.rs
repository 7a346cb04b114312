//! Local session state and reconciliation against the shared row.
//!
//! [`GameState`] is owned by the event loop. Remote records are folded into
//! it with [`reconcile`], which reports whether anything visible changed so
//! the caller only redraws the board when needed. Local moves and new games
//! are applied optimistically and yield the [`GamePatch`] to write.

use chess::{Board, Color, Square};
use tracing::{debug, warn};

use crate::{
    auth::Roster,
    board::{BoardView, Marks},
    clock::GameClock,
    game::{fen_key, parse_square, pgn, ChessGame, Outcome, START_FEN},
    history::HistoryCursor,
    models::{GamePatch, GameRecord, Identity},
};

/// What a reconciliation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// The board must be redrawn.
    pub render_needed: bool,
    /// The assigned colour differs from before.
    pub colour_changed: bool,
    /// The position was reset to the start after missing or invalid data.
    pub position_reset: bool,
}

/// Everything the client knows about the shared game.
#[derive(Debug, Clone)]
pub struct GameState {
    identity: Identity,
    roster: Roster,
    color: Color,
    flipped: bool,
    selection: Option<Square>,
    highlight: Option<(Square, Square)>,
    game: ChessGame,
    clock: GameClock,
    cursor: HistoryCursor,
    // Move counts of optimistic writes not yet echoed back.
    pending: Vec<usize>,
    outcome: Option<Outcome>,
    announced: Option<Outcome>,
    rendered: bool,
}

impl GameState {
    /// Fresh state for `identity`, using the fallback pairing until a record arrives.
    pub fn new(identity: Identity, roster: Roster) -> Self {
        let color = fallback_color(&identity, &roster);
        Self {
            identity,
            roster,
            color,
            flipped: color == Color::Black,
            selection: None,
            highlight: None,
            game: ChessGame::new(),
            clock: GameClock::default(),
            cursor: HistoryCursor::live(),
            pending: Vec::new(),
            outcome: None,
            announced: None,
            rendered: false,
        }
    }

    /// Own identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The other participant.
    pub fn opponent(&self) -> &str {
        self.roster.opponent_of(self.identity.as_str())
    }

    /// Assigned colour.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Whether black is drawn at the bottom.
    pub fn flipped(&self) -> bool {
        self.flipped
    }

    /// Flip the board locally; the next record re-derives orientation.
    pub fn toggle_flip(&mut self) {
        self.flipped = !self.flipped;
    }

    /// Selected square.
    pub fn selection(&self) -> Option<Square> {
        self.selection
    }

    /// Highlighted last move.
    pub fn highlight(&self) -> Option<(Square, Square)> {
        self.highlight
    }

    /// Local mirror of the position.
    pub fn game(&self) -> &ChessGame {
        &self.game
    }

    /// Clock snapshot.
    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    /// History cursor.
    pub fn cursor(&self) -> HistoryCursor {
        self.cursor
    }

    /// Mutable history cursor; leaving live drops the selection.
    pub fn cursor_mut(&mut self) -> &mut HistoryCursor {
        self.selection = None;
        &mut self.cursor
    }

    /// Game-over state, if any.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Whether it is this client's turn.
    pub fn is_my_turn(&self) -> bool {
        self.game.turn() == self.color
    }

    /// Whether input may select or move pieces.
    pub fn accepts_moves(&self) -> bool {
        self.cursor.is_live() && self.outcome.is_none() && self.is_my_turn()
    }

    /// Select `square`.
    pub fn select(&mut self, square: Square) {
        self.selection = Some(square);
    }

    /// Drop the selection.
    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Board shown for the current cursor position.
    pub fn viewed_board(&self) -> Board {
        match self.cursor.index() {
            None => *self.game.board(),
            Some(ply) => self.game.board_at(ply),
        }
    }

    /// Decorations for the viewed position.
    pub fn marks(&self) -> Marks {
        match self.cursor.index() {
            None => Marks {
                selection: self.selection,
                hints: self
                    .selection
                    .map(|square| self.game.legal_targets(square))
                    .unwrap_or_default(),
                last_move: self.highlight.filter(|_| self.is_my_turn()),
                check: self.game.checked_king(),
            },
            Some(ply) => Marks {
                last_move: usize::try_from(ply)
                    .ok()
                    .and_then(|index| self.game.moves().get(index))
                    .map(|played| (played.from(), played.to())),
                ..Marks::default()
            },
        }
    }

    /// Display projection of the viewed position.
    pub fn project(&self) -> BoardView {
        BoardView::project(&self.viewed_board(), self.flipped, &self.marks())
    }

    /// Live remaining times `(white, black)`; frozen once the game is over.
    pub fn live_clock(&self, now: i64) -> (i64, i64) {
        if self.outcome.is_some() {
            (self.clock.white_ms.max(0), self.clock.black_ms.max(0))
        } else {
            self.clock.live(now, self.game.turn())
        }
    }

    /// Apply a local move optimistically.
    ///
    /// Returns the patch to write, or `None` when the move is refused.
    pub fn apply_local_move(&mut self, from: Square, to: Square, now: i64) -> Option<GamePatch> {
        if !self.cursor.is_live() || self.outcome.is_some() {
            return None;
        }
        let mover = self.game.turn();
        let Some(played) = self.game.try_move(from, to) else {
            self.selection = None;
            return None;
        };
        self.clock.commit_move(mover, now);
        self.selection = None;
        self.highlight = Some((from, to));
        self.pending.push(self.game.moves().len());
        self.outcome = self.game.outcome();
        debug!(mv = %played.san, "Applied local move");

        Some(GamePatch {
            fen: Some(self.game.fen()),
            pgn: Some(self.game.pgn()),
            last_move: Some(played.wire()),
            white_time: Some(self.clock.white_ms),
            black_time: Some(self.clock.black_ms),
            last_move_ts: Some(self.clock.last_move_ts),
            ..GamePatch::default()
        })
    }

    /// Start a new game with this client playing `color`.
    pub fn start_new_game(&mut self, color: Color, time_control: i64, now: i64) -> GamePatch {
        let white_player = match color {
            Color::White => self.identity.as_str().to_string(),
            Color::Black => self.opponent().to_string(),
        };
        self.color = color;
        self.flipped = color == Color::Black;
        self.game = ChessGame::new();
        self.highlight = None;
        self.selection = None;
        self.cursor.jump_live();
        self.clock.reset(time_control, now);
        self.outcome = None;
        self.announced = None;
        self.pending = vec![0];
        self.rendered = true;

        GamePatch {
            fen: Some(START_FEN.to_string()),
            pgn: Some(String::new()),
            white_player: Some(white_player),
            last_move: Some(String::new()),
            white_time: Some(self.clock.white_ms),
            black_time: Some(self.clock.black_ms),
            last_move_ts: Some(now),
            time_control: Some(self.clock.time_control),
        }
    }

    /// Declare a time forfeit when the side to move has run out.
    pub fn check_flag(&mut self, now: i64) -> Option<Outcome> {
        if self.outcome.is_some() {
            return None;
        }
        let turn = self.game.turn();
        let flagged = self.clock.flagged(now, turn)?;
        let (white, black) = self.clock.live(now, turn);
        self.clock.white_ms = white;
        self.clock.black_ms = black;
        self.clock.last_move_ts = now;
        let outcome = Outcome::Timeout { winner: !flagged };
        self.outcome = Some(outcome);
        Some(outcome)
    }

    /// Game-over result not yet shown to the user.
    pub fn take_announcement(&mut self) -> Option<Outcome> {
        match self.outcome {
            Some(outcome) if self.announced != Some(outcome) => {
                self.announced = Some(outcome);
                Some(outcome)
            }
            _ => None,
        }
    }

    fn at_start(&self) -> bool {
        self.game.moves().is_empty() && self.game.start_fen().is_none()
    }

    /// Back to the standard start; returns `(changed, reset)`.
    fn reset_position(&mut self) -> (bool, bool) {
        if self.at_start() {
            return (false, true);
        }
        self.game = ChessGame::new();
        (true, true)
    }

    fn same_moves(&self, incoming: &pgn::PgnText) -> bool {
        start_key(incoming.start_fen.as_deref()) == start_key(self.game.start_fen())
            && incoming.moves.len() == self.game.moves().len()
            && self.is_move_prefix(&incoming.moves)
    }

    fn is_move_prefix(&self, tokens: &[String]) -> bool {
        tokens.len() <= self.game.moves().len()
            && tokens
                .iter()
                .zip(self.game.moves())
                .all(|(token, played)| *token == played.san)
    }

    /// Whether `record` echoes an older optimistic write of ours.
    fn is_stale_echo(&self, record: &GameRecord) -> bool {
        let Some(newest) = self.pending.last() else {
            return false;
        };
        let (start, tokens) = match record.pgn_text() {
            Some(text) => {
                let parsed = pgn::read(text);
                (parsed.start_fen, parsed.moves)
            }
            None => {
                // A new-game write carries an empty move list and the start position.
                let at_start = record
                    .fen_text()
                    .map_or(true, |fen| fen_key(fen) == fen_key(START_FEN));
                if !at_start {
                    return false;
                }
                (None, Vec::new())
            }
        };
        tokens.len() < *newest
            && self.pending.contains(&tokens.len())
            && start_key(start.as_deref()) == start_key(self.game.start_fen())
            && self.is_move_prefix(&tokens)
    }

    fn confirm_pending(&mut self, upto: usize) {
        self.pending.retain(|count| *count > upto);
    }

    fn apply_clock(&mut self, record: &GameRecord) {
        if let Some(time_control) = record.time_control {
            self.clock.time_control = time_control.max(0);
        }
        if let Some(white) = record.white_time {
            self.clock.white_ms = white;
        }
        if let Some(black) = record.black_time {
            self.clock.black_ms = black;
        }
        if let Some(ts) = record.last_move_ts {
            self.clock.last_move_ts = ts;
        }
    }

    /// Load `fen`, or reset when it is missing or invalid; returns `(changed, reset)`.
    fn load_fen(&mut self, fen: Option<&str>) -> (bool, bool) {
        let Some(fen) = fen else {
            return self.reset_position();
        };
        if fen_key(fen) == fen_key(&self.game.fen()) {
            return (false, false);
        }
        match ChessGame::from_fen(fen) {
            Ok(game) => {
                self.game = game;
                (true, false)
            }
            Err(err) => {
                warn!("Remote position rejected, resetting: {err}");
                self.reset_position()
            }
        }
    }

    /// Returns `(changed, reset)`.
    fn apply_position(&mut self, record: &GameRecord) -> (bool, bool) {
        match (record.pgn_text(), record.fen_text()) {
            (None, None) => {
                self.pending.clear();
                self.reset_position()
            }
            (Some(text), fen) => {
                let parsed = pgn::read(text);
                if self.same_moves(&parsed) {
                    self.confirm_pending(parsed.moves.len());
                    return (false, false);
                }
                self.pending.clear();
                match ChessGame::from_pgn(text) {
                    Ok(game) => {
                        self.game = game;
                        (true, false)
                    }
                    Err(err) => {
                        warn!("Remote move list rejected: {err}");
                        self.load_fen(fen)
                    }
                }
            }
            (None, Some(fen)) => {
                if fen_key(fen) == fen_key(&self.game.fen()) {
                    self.confirm_pending(self.game.moves().len());
                    return (false, false);
                }
                self.pending.clear();
                self.load_fen(Some(fen))
            }
        }
    }
}

fn fallback_color(identity: &Identity, roster: &Roster) -> Color {
    if identity.as_str() == roster.default_white() {
        Color::White
    } else {
        Color::Black
    }
}

fn clock_replaced(flagged: &GameClock, incoming: &GameClock, loser: Color) -> bool {
    incoming.last_move_ts != flagged.last_move_ts
        || incoming.time_control != flagged.time_control
        || incoming.stored(loser) != flagged.stored(loser)
}

fn start_key(start_fen: Option<&str>) -> String {
    fen_key(start_fen.unwrap_or(START_FEN))
}

/// Parse `"<from>-<to>"`; empty or malformed values clear the highlight.
pub fn parse_last_move(text: Option<&str>) -> Option<(Square, Square)> {
    let (from, to) = text?.trim().split_once('-')?;
    Some((parse_square(from)?, parse_square(to)?))
}

/// Fold a remote record into the local state.
pub fn reconcile(state: &mut GameState, record: &GameRecord) -> Reconciled {
    let mut result = Reconciled::default();

    if state.is_stale_echo(record) {
        debug!("Ignoring stale echo of an earlier local write");
        let tokens = record.pgn_text().map_or(0, |text| pgn::read(text).moves.len());
        state.confirm_pending(tokens);
        let newer_clock = record
            .last_move_ts
            .map_or(false, |ts| ts >= state.clock.last_move_ts);
        if newer_clock {
            state.apply_clock(record);
        }
        if !state.rendered {
            state.rendered = true;
            result.render_needed = true;
        }
        return result;
    }

    let previous_clock = state.clock;
    state.apply_clock(record);

    let highlight = parse_last_move(record.last_move.as_deref());
    let highlight_changed = highlight != state.highlight;
    state.highlight = highlight;

    let color = match record.white_player.as_deref().filter(|name| !name.is_empty()) {
        Some(white) if white == state.identity.as_str() => Color::White,
        Some(_) => Color::Black,
        None => fallback_color(&state.identity, &state.roster),
    };
    result.colour_changed = color != state.color;
    state.color = color;
    let flipped = color == Color::Black;
    let flip_changed = flipped != state.flipped;
    state.flipped = flipped;

    let (position_changed, reset) = state.apply_position(record);
    result.position_reset = reset;
    if position_changed {
        state.selection = None;
        state.cursor.clamp(state.game.moves().len());
        state.outcome = state.game.outcome();
        if state.outcome.is_none() {
            state.announced = None;
        }
    } else if let Some(Outcome::Timeout { winner }) = state.outcome {
        // A forfeit holds until the row carries a clock that supersedes it.
        if clock_replaced(&previous_clock, &state.clock, !winner) {
            state.outcome = state.game.outcome();
            if state.clock.last_move_ts > previous_clock.last_move_ts {
                state.announced = None;
            }
        }
    } else {
        state.outcome = state.game.outcome();
    }
    if result.colour_changed {
        state.selection = None;
    }

    result.render_needed =
        position_changed || highlight_changed || flip_changed || result.colour_changed || !state.rendered;
    state.rendered = true;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sq(name: &str) -> Square {
        parse_square(name).expect("valid square")
    }

    fn roster() -> Roster {
        Roster::new("Benji", "Sanaa").expect("valid roster")
    }

    fn state(name: &str) -> GameState {
        GameState::new(Identity(name.to_string()), roster())
    }

    #[test]
    fn fallback_pairing_before_any_record() {
        assert_eq!(state("Benji").color(), Color::White);
        let black = state("Sanaa");
        assert_eq!(black.color(), Color::Black);
        assert!(black.flipped());
    }

    #[test]
    fn parse_last_move_values() {
        assert_eq!(parse_last_move(Some("e2-e4")), Some((sq("e2"), sq("e4"))));
        assert_eq!(parse_last_move(Some("")), None);
        assert_eq!(parse_last_move(Some("e2e4")), None);
        assert_eq!(parse_last_move(None), None);
    }

    #[test]
    fn first_record_always_renders() {
        let mut local = state("Benji");
        let outcome = reconcile(&mut local, &GameRecord::default());
        assert!(outcome.render_needed);
        assert!(!outcome.position_reset);
        assert!(!reconcile(&mut local, &GameRecord::default()).render_needed);
    }

    #[test]
    fn absent_clock_fields_leave_clock_untouched() {
        let mut local = state("Benji");
        reconcile(
            &mut local,
            &GameRecord {
                white_time: Some(10_000),
                black_time: Some(20_000),
                last_move_ts: Some(5),
                time_control: Some(60_000),
                ..GameRecord::default()
            },
        );
        reconcile(&mut local, &GameRecord::default());
        assert_eq!(local.clock().white_ms, 10_000);
        assert_eq!(local.clock().black_ms, 20_000);
        assert_eq!(local.clock().time_control, 60_000);
    }

    #[test]
    fn last_move_highlight_only_on_my_turn() {
        let mut local = state("Benji");
        reconcile(
            &mut local,
            &GameRecord {
                pgn: Some("1. e4".to_string()),
                last_move: Some("e2-e4".to_string()),
                white_player: Some("Sanaa".to_string()),
                ..GameRecord::default()
            },
        );
        assert_eq!(local.color(), Color::Black);
        assert_eq!(local.highlight(), Some((sq("e2"), sq("e4"))));
        assert_eq!(local.marks().last_move, Some((sq("e2"), sq("e4"))));

        let mut other = state("Sanaa");
        reconcile(
            &mut other,
            &GameRecord {
                pgn: Some("1. e4".to_string()),
                last_move: Some("e2-e4".to_string()),
                white_player: Some("Sanaa".to_string()),
                ..GameRecord::default()
            },
        );
        assert_eq!(other.marks().last_move, None);
    }

    #[test]
    fn local_move_produces_patch_and_charges_clock() {
        let mut local = state("Benji");
        reconcile(
            &mut local,
            &GameRecord {
                white_player: Some("Benji".to_string()),
                white_time: Some(60_000),
                black_time: Some(60_000),
                last_move_ts: Some(1_000),
                time_control: Some(60_000),
                ..GameRecord::default()
            },
        );
        let patch = local
            .apply_local_move(sq("e2"), sq("e4"), 4_000)
            .expect("legal move");
        assert_eq!(patch.pgn.as_deref(), Some("1. e4"));
        assert_eq!(patch.last_move.as_deref(), Some("e2-e4"));
        assert_eq!(patch.white_time, Some(57_000));
        assert_eq!(patch.black_time, Some(60_000));
        assert_eq!(patch.last_move_ts, Some(4_000));
        assert_eq!(patch.white_player, None);
        assert!(local.apply_local_move(sq("e4"), sq("e6"), 5_000).is_none());
    }

    #[test]
    fn history_view_blocks_moves() {
        let mut local = state("Benji");
        local.apply_local_move(sq("e2"), sq("e4"), 0);
        local.apply_local_move(sq("e7"), sq("e5"), 0);
        let len = local.game().moves().len();
        local.cursor_mut().step_back(len);
        assert!(!local.accepts_moves());
        assert!(local.apply_local_move(sq("g1"), sq("f3"), 0).is_none());
        assert_eq!(local.viewed_board().side_to_move(), Color::Black);
        assert_eq!(local.marks().last_move, Some((sq("e2"), sq("e4"))));
    }

    #[test]
    fn invalid_fen_resets_to_start() {
        let mut local = state("Benji");
        local.apply_local_move(sq("e2"), sq("e4"), 0);
        let outcome = reconcile(
            &mut local,
            &GameRecord {
                fen: Some("garbage".to_string()),
                ..GameRecord::default()
            },
        );
        assert!(outcome.render_needed);
        assert!(outcome.position_reset);
        assert_eq!(local.game().fen(), START_FEN);
    }

    #[test]
    fn bad_pgn_falls_back_to_fen() {
        let mut local = state("Benji");
        let fen = "4k3/8/8/8/8/8/8/4K2R w K - 0 1";
        reconcile(
            &mut local,
            &GameRecord {
                pgn: Some("1. Zz9".to_string()),
                fen: Some(fen.to_string()),
                ..GameRecord::default()
            },
        );
        assert_eq!(local.game().fen(), fen);
    }

    #[test]
    fn timeout_is_declared_once() {
        let mut local = state("Benji");
        local.start_new_game(Color::White, 1_000, 0);
        assert_eq!(local.check_flag(500), None);
        assert_eq!(
            local.check_flag(1_000),
            Some(Outcome::Timeout {
                winner: Color::Black
            })
        );
        assert_eq!(local.check_flag(2_000), None);
        assert_eq!(local.live_clock(5_000), (0, 1_000));
        assert!(local.take_announcement().is_some());
        assert!(local.take_announcement().is_none());
        assert!(!local.accepts_moves());
    }

    #[test]
    fn new_game_clears_forfeit_when_position_is_unchanged() {
        let mut local = state("Sanaa");
        reconcile(
            &mut local,
            &GameRecord {
                fen: Some(START_FEN.to_string()),
                pgn: Some(String::new()),
                white_player: Some("Benji".to_string()),
                white_time: Some(60_000),
                black_time: Some(60_000),
                last_move_ts: Some(1_000),
                time_control: Some(60_000),
                ..GameRecord::default()
            },
        );
        assert_eq!(
            local.check_flag(61_000),
            Some(Outcome::Timeout {
                winner: Color::Black
            })
        );
        assert!(local.take_announcement().is_some());

        let outcome = reconcile(
            &mut local,
            &GameRecord {
                fen: Some(START_FEN.to_string()),
                pgn: Some(String::new()),
                white_player: Some("Sanaa".to_string()),
                last_move: Some(String::new()),
                white_time: Some(300_000),
                black_time: Some(300_000),
                last_move_ts: Some(90_000),
                time_control: Some(300_000),
                ..GameRecord::default()
            },
        );
        assert!(outcome.colour_changed);
        assert_eq!(local.color(), Color::White);
        assert_eq!(local.outcome(), None);
        assert!(local.accepts_moves());
        assert_eq!(local.live_clock(100_000), (290_000, 300_000));
    }

    #[test]
    fn forfeit_survives_record_with_flagged_clock() {
        let mut local = state("Benji");
        local.start_new_game(Color::White, 1_000, 0);
        local.check_flag(1_500);
        assert!(local.take_announcement().is_some());
        let clock = *local.clock();
        reconcile(
            &mut local,
            &GameRecord {
                white_player: Some("Benji".to_string()),
                white_time: Some(clock.white_ms),
                black_time: Some(clock.black_ms),
                last_move_ts: Some(clock.last_move_ts),
                time_control: Some(clock.time_control),
                ..GameRecord::default()
            },
        );
        assert_eq!(
            local.outcome(),
            Some(Outcome::Timeout {
                winner: Color::Black
            })
        );
        assert!(local.take_announcement().is_none());
    }

    #[test]
    fn manual_flip_is_rederived_by_next_record() {
        let mut local = state("Benji");
        reconcile(&mut local, &GameRecord::default());
        local.toggle_flip();
        assert!(local.flipped());
        let outcome = reconcile(&mut local, &GameRecord::default());
        assert!(outcome.render_needed);
        assert!(!local.flipped());
    }
}
