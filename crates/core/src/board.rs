//! Projection of a position into display cells.

use chess::{Board, Color, File, Piece, Rank, Square};

use crate::game::MoveHint;

/// Squares and hints to decorate on top of the position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Marks {
    /// Selected square.
    pub selection: Option<Square>,
    /// Legal destinations of the selected piece.
    pub hints: Vec<MoveHint>,
    /// Origin and destination of the highlighted move.
    pub last_move: Option<(Square, Square)>,
    /// King in check.
    pub check: Option<Square>,
}

/// One square of the projected board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Square shown in this cell.
    pub square: Square,
    /// Occupying piece and its colour.
    pub piece: Option<(Piece, Color)>,
    /// Light square.
    pub light: bool,
    /// Currently selected.
    pub selected: bool,
    /// Part of the highlighted move.
    pub last_move: bool,
    /// Quiet move target of the selection.
    pub hint: bool,
    /// Capture target of the selection.
    pub capture_hint: bool,
    /// King in check.
    pub check: bool,
}

/// 8x8 cells in display order, top-left first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    cells: Vec<Cell>,
    flipped: bool,
}

impl BoardView {
    /// Project `board` with `marks` applied, oriented by `flipped`.
    pub fn project(board: &Board, flipped: bool, marks: &Marks) -> Self {
        let mut cells = Vec::with_capacity(64);
        for row in 0..8 {
            for col in 0..8 {
                let square = square_at(row, col, flipped);
                let piece = board
                    .piece_on(square)
                    .zip(board.color_on(square));
                let hint = marks.hints.iter().find(|hint| hint.to == square);
                cells.push(Cell {
                    square,
                    piece,
                    light: is_light(square),
                    selected: marks.selection == Some(square),
                    last_move: marks
                        .last_move
                        .map_or(false, |(from, to)| from == square || to == square),
                    hint: hint.map_or(false, |hint| !hint.capture),
                    capture_hint: hint.map_or(false, |hint| hint.capture),
                    check: marks.check == Some(square),
                });
            }
        }
        Self { cells, flipped }
    }

    /// Cells row by row from the top.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(8)
    }

    /// Cell at a display position.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        (row < 8 && col < 8).then(|| &self.cells[row * 8 + col])
    }

    /// Whether black is at the bottom.
    pub fn flipped(&self) -> bool {
        self.flipped
    }

    /// File letters left to right.
    pub fn file_labels(&self) -> [char; 8] {
        let mut labels = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];
        if self.flipped {
            labels.reverse();
        }
        labels
    }

    /// Rank digits top to bottom.
    pub fn rank_labels(&self) -> [char; 8] {
        let mut labels = ['8', '7', '6', '5', '4', '3', '2', '1'];
        if self.flipped {
            labels.reverse();
        }
        labels
    }
}

/// Square shown at a display position; row 0 is the top edge.
pub fn square_at(row: usize, col: usize, flipped: bool) -> Square {
    let (rank, file) = if flipped {
        (row, 7 - col)
    } else {
        (7 - row, col)
    };
    Square::make_square(Rank::from_index(rank), File::from_index(file))
}

fn is_light(square: Square) -> bool {
    (square.get_rank().to_index() + square.get_file().to_index()) % 2 == 1
}

/// Unicode glyph for a piece.
pub fn piece_glyph(piece: Piece, color: Color) -> char {
    match (color, piece) {
        (Color::White, Piece::King) => '♔',
        (Color::White, Piece::Queen) => '♕',
        (Color::White, Piece::Rook) => '♖',
        (Color::White, Piece::Bishop) => '♗',
        (Color::White, Piece::Knight) => '♘',
        (Color::White, Piece::Pawn) => '♙',
        (Color::Black, Piece::King) => '♚',
        (Color::Black, Piece::Queen) => '♛',
        (Color::Black, Piece::Rook) => '♜',
        (Color::Black, Piece::Bishop) => '♝',
        (Color::Black, Piece::Knight) => '♞',
        (Color::Black, Piece::Pawn) => '♟',
    }
}

/// Keyboard cursor over display positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardCursor {
    /// Display row, 0 at the top.
    pub row: usize,
    /// Display column, 0 at the left.
    pub col: usize,
}

impl Default for BoardCursor {
    fn default() -> Self {
        // e2 from white's side
        Self { row: 6, col: 4 }
    }
}

impl BoardCursor {
    /// Move by a delta, clamped to the board.
    pub fn shift(&mut self, d_row: isize, d_col: isize) {
        self.row = (self.row as isize + d_row).clamp(0, 7) as usize;
        self.col = (self.col as isize + d_col).clamp(0, 7) as usize;
    }

    /// Square under the cursor.
    pub fn square(&self, flipped: bool) -> Square {
        square_at(self.row, self.col, flipped)
    }
}
