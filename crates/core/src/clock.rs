//! Per-side countdown bookkeeping.
//!
//! Remaining times are snapshots taken at `last_move_ts`; the live value for
//! the side to move is extrapolated from the wall clock on every redraw.

use chess::Color;

/// Remaining time below which a clock is shown as low.
pub const LOW_TIME_MS: i64 = 30_000;

/// Clock snapshot shared by both clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameClock {
    /// Milliseconds per side, `0` for untimed.
    pub time_control: i64,
    /// White's remaining time at the start of the current turn.
    pub white_ms: i64,
    /// Black's remaining time at the start of the current turn.
    pub black_ms: i64,
    /// Epoch milliseconds of the snapshot.
    pub last_move_ts: i64,
}

impl GameClock {
    /// Fresh clock for a new game.
    pub fn new(time_control: i64, now: i64) -> Self {
        let time_control = time_control.max(0);
        Self {
            time_control,
            white_ms: time_control,
            black_ms: time_control,
            last_move_ts: now,
        }
    }

    /// Restart both sides at `time_control`.
    pub fn reset(&mut self, time_control: i64, now: i64) {
        *self = Self::new(time_control, now);
    }

    /// Whether the game has no time limit.
    pub fn is_untimed(&self) -> bool {
        self.time_control == 0
    }

    /// Stored remaining time for `color`.
    pub fn stored(&self, color: Color) -> i64 {
        match color {
            Color::White => self.white_ms,
            Color::Black => self.black_ms,
        }
    }

    fn stored_mut(&mut self, color: Color) -> &mut i64 {
        match color {
            Color::White => &mut self.white_ms,
            Color::Black => &mut self.black_ms,
        }
    }

    /// Live remaining time `(white, black)` with `turn` to move, floored at zero.
    pub fn live(&self, now: i64, turn: Color) -> (i64, i64) {
        let elapsed = (now - self.last_move_ts).max(0);
        let mut white = self.white_ms;
        let mut black = self.black_ms;
        if !self.is_untimed() {
            match turn {
                Color::White => white -= elapsed,
                Color::Black => black -= elapsed,
            }
        }
        (white.max(0), black.max(0))
    }

    /// Live remaining time for one side.
    pub fn live_for(&self, now: i64, turn: Color, color: Color) -> i64 {
        let (white, black) = self.live(now, turn);
        match color {
            Color::White => white,
            Color::Black => black,
        }
    }

    /// Charge the elapsed time to `mover` and start the opponent's turn.
    pub fn commit_move(&mut self, mover: Color, now: i64) {
        if !self.is_untimed() {
            let elapsed = (now - self.last_move_ts).max(0);
            let remaining = self.stored_mut(mover);
            *remaining = (*remaining - elapsed).max(0);
        }
        self.last_move_ts = now;
    }

    /// Side whose live time has run out, if any.
    pub fn flagged(&self, now: i64, turn: Color) -> Option<Color> {
        if self.is_untimed() {
            return None;
        }
        let (white, black) = self.live(now, turn);
        if white <= 0 {
            Some(Color::White)
        } else if black <= 0 {
            Some(Color::Black)
        } else {
            None
        }
    }
}

/// `m:ss` display of a remaining time.
pub fn format_ms(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Whether a remaining time should be highlighted as low.
pub fn is_low(ms: i64) -> bool {
    ms > 0 && ms < LOW_TIME_MS
}
