//! Read-only navigation through the move list.

/// Position being viewed: `None` is live, `Some(-1)` the initial position,
/// `Some(n)` the position after move `n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryCursor {
    index: Option<isize>,
}

impl HistoryCursor {
    /// Cursor on the live position.
    pub fn live() -> Self {
        Self { index: None }
    }

    /// Viewed ply, `None` when live.
    pub fn index(&self) -> Option<isize> {
        self.index
    }

    /// Whether the live position is shown (and accepts moves).
    pub fn is_live(&self) -> bool {
        self.index.is_none()
    }

    /// Step one move back.
    ///
    /// From live this lands on the position before the most recent move so
    /// the last move can be reviewed first.
    pub fn step_back(&mut self, move_count: usize) {
        let len = move_count as isize;
        self.index = match self.index {
            None if len == 0 => None,
            None => Some(len - 2),
            Some(idx) => Some((idx - 1).max(-1)),
        };
    }

    /// Step one move forward, snapping to live past the last move.
    pub fn step_forward(&mut self, move_count: usize) {
        let len = move_count as isize;
        self.index = match self.index {
            None => None,
            Some(idx) if idx + 1 >= len - 1 => None,
            Some(idx) => Some(idx + 1),
        };
    }

    /// Jump to the initial position.
    pub fn jump_start(&mut self, move_count: usize) {
        if move_count > 0 {
            self.index = Some(-1);
        }
    }

    /// Return to the live position.
    pub fn jump_live(&mut self) {
        self.index = None;
    }

    /// Snap to live if the viewed ply no longer exists.
    pub fn clamp(&mut self, move_count: usize) {
        if let Some(idx) = self.index {
            if idx >= move_count as isize - 1 {
                self.index = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_from_live_reviews_last_move() {
        let mut cursor = HistoryCursor::live();
        cursor.step_back(4);
        assert_eq!(cursor.index(), Some(2));
        assert!(!cursor.is_live());
    }

    #[test]
    fn back_is_clamped_at_initial_position() {
        let mut cursor = HistoryCursor::live();
        for _ in 0..10 {
            cursor.step_back(3);
        }
        assert_eq!(cursor.index(), Some(-1));
    }

    #[test]
    fn empty_history_stays_live() {
        let mut cursor = HistoryCursor::live();
        cursor.step_back(0);
        assert!(cursor.is_live());
        cursor.jump_start(0);
        assert!(cursor.is_live());
    }

    #[test]
    fn back_then_forward_returns_to_live() {
        for len in 1..6usize {
            for steps in 1..8usize {
                let mut cursor = HistoryCursor::live();
                let mut taken = 0;
                for _ in 0..steps {
                    let before = cursor;
                    cursor.step_back(len);
                    if cursor != before {
                        taken += 1;
                    }
                    if let Some(idx) = cursor.index() {
                        assert!(idx >= -1 && idx <= len as isize - 1);
                    }
                }
                for _ in 0..taken {
                    cursor.step_forward(len);
                }
                assert!(cursor.is_live(), "len={len} steps={steps}");
            }
        }
    }

    #[test]
    fn clamp_snaps_to_live_when_history_shrinks() {
        let mut cursor = HistoryCursor::live();
        cursor.step_back(6);
        assert_eq!(cursor.index(), Some(4));
        cursor.clamp(3);
        assert!(cursor.is_live());
    }
}
