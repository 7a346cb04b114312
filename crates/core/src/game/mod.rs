//! Game state on top of the `chess` rules engine.
//!
//! The rules engine only knows single positions; this wrapper keeps the
//! starting position and the played moves so the move list (PGN) can be
//! written, replayed and browsed.

pub mod pgn;
pub mod san;

use std::str::FromStr;

use chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece, Square, ALL_SQUARES, EMPTY};
use thiserror::Error;

pub use san::{parse_square, square_name};

/// Standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Errors raised when loading remote position data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PositionError {
    /// The position string could not be parsed.
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
    /// A move in the list was not legal in the replayed position.
    #[error("illegal move '{token}' at ply {ply}")]
    IllegalMove {
        /// Offending SAN token.
        token: String,
        /// Zero-based ply index.
        ply: usize,
    },
    /// The move list contained no moves and no starting position.
    #[error("empty move list")]
    EmptyPgn,
}

/// A move that has been applied, with the data the UI needs to show it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    /// Engine move.
    pub mv: ChessMove,
    /// SAN as written to the move list.
    pub san: String,
    /// Side that made the move.
    pub mover: Color,
    /// Piece captured by the move, if any.
    pub captured: Option<Piece>,
}

impl PlayedMove {
    /// Origin square.
    pub fn from(&self) -> Square {
        self.mv.get_source()
    }

    /// Destination square.
    pub fn to(&self) -> Square {
        self.mv.get_dest()
    }

    /// `"<from>-<to>"` as stored in the shared row.
    pub fn wire(&self) -> String {
        format!("{}-{}", square_name(self.from()), square_name(self.to()))
    }
}

/// Legal destination for the selected piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveHint {
    /// Destination square.
    pub to: Square,
    /// Whether the move captures (en passant included).
    pub capture: bool,
}

/// Terminal state of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The side to move is mated.
    Checkmate {
        /// Side that delivered mate.
        winner: Color,
    },
    /// The side to move has no legal move and is not in check.
    Stalemate,
    /// Neither side can mate.
    InsufficientMaterial,
    /// The same position occurred three times.
    ThreefoldRepetition,
    /// Fifty moves by each side without a capture or pawn move.
    FiftyMoveRule,
    /// A clock reached zero.
    Timeout {
        /// Side that still had time.
        winner: Color,
    },
}

impl Outcome {
    /// Winning side, `None` for draws.
    pub fn winner(&self) -> Option<Color> {
        match self {
            Outcome::Checkmate { winner } | Outcome::Timeout { winner } => Some(*winner),
            _ => None,
        }
    }

    /// Short description for the status line.
    pub fn describe(&self) -> &'static str {
        match self {
            Outcome::Checkmate { .. } => "Checkmate",
            Outcome::Stalemate => "Stalemate",
            Outcome::InsufficientMaterial => "Draw by insufficient material",
            Outcome::ThreefoldRepetition => "Draw by threefold repetition",
            Outcome::FiftyMoveRule => "Draw by fifty-move rule",
            Outcome::Timeout { .. } => "Time forfeit",
        }
    }
}

/// Pieces captured from each side, in `p n b r q` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    /// White pieces no longer on the board.
    pub white: Vec<Piece>,
    /// Black pieces no longer on the board.
    pub black: Vec<Piece>,
}

impl Captured {
    /// Pieces of `color` that have been taken.
    pub fn of(&self, color: Color) -> &[Piece] {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}

/// Chess game with full move history.
#[derive(Debug, Clone)]
pub struct ChessGame {
    start: Board,
    start_fen: Option<String>,
    start_fullmove: u32,
    board: Board,
    moves: Vec<PlayedMove>,
    halfmove_clock: u32,
    positions: Vec<u64>,
}

impl Default for ChessGame {
    fn default() -> Self {
        Self::new()
    }
}

impl ChessGame {
    /// Game at the standard starting position.
    pub fn new() -> Self {
        Self::from_board(Board::default(), None, 0, 1)
    }

    fn from_board(board: Board, start_fen: Option<String>, halfmove: u32, fullmove: u32) -> Self {
        Self {
            start: board,
            start_fen,
            start_fullmove: fullmove.max(1),
            board,
            moves: Vec::new(),
            halfmove_clock: halfmove,
            positions: vec![board.get_hash()],
        }
    }

    /// Game starting from an arbitrary position.
    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let fen = fen.trim();
        let board =
            Board::from_str(fen).map_err(|_| PositionError::InvalidFen(fen.to_string()))?;
        let mut fields = fen.split_whitespace().skip(4);
        let halfmove = fields.next().and_then(|v| v.parse().ok()).unwrap_or(0);
        let fullmove = fields.next().and_then(|v| v.parse().ok()).unwrap_or(1);
        let start_fen = if fen_key(fen) == fen_key(START_FEN) {
            None
        } else {
            Some(fen.to_string())
        };
        Ok(Self::from_board(board, start_fen, halfmove, fullmove))
    }

    /// Replay a move list.
    pub fn from_pgn(text: &str) -> Result<Self, PositionError> {
        let parsed = pgn::read(text);
        if parsed.moves.is_empty() && parsed.start_fen.is_none() {
            return Err(PositionError::EmptyPgn);
        }
        let mut game = match parsed.start_fen.as_deref() {
            Some(fen) => Self::from_fen(fen)?,
            None => Self::new(),
        };
        for (ply, token) in parsed.moves.iter().enumerate() {
            let mv = san::from_san(&game.board, token).ok_or_else(|| PositionError::IllegalMove {
                token: token.clone(),
                ply,
            })?;
            game.push(mv);
        }
        Ok(game)
    }

    fn push(&mut self, mv: ChessMove) -> PlayedMove {
        let mover = self.board.side_to_move();
        let piece = self.board.piece_on(mv.get_source());
        let en_passant = piece == Some(Piece::Pawn)
            && mv.get_source().get_file() != mv.get_dest().get_file()
            && self.board.piece_on(mv.get_dest()).is_none();
        let captured = if en_passant {
            Some(Piece::Pawn)
        } else {
            self.board.piece_on(mv.get_dest())
        };
        let san = san::to_san(&self.board, mv);

        if piece == Some(Piece::Pawn) || captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        self.board = self.board.make_move_new(mv);
        self.positions.push(self.board.get_hash());
        let played = PlayedMove {
            mv,
            san,
            mover,
            captured,
        };
        self.moves.push(played.clone());
        played
    }

    /// Attempt a move from `from` to `to`, promoting to a queen when needed.
    ///
    /// Returns `None` when the move is not legal in the current position.
    pub fn try_move(&mut self, from: Square, to: Square) -> Option<PlayedMove> {
        let promotion = (self.board.piece_on(from) == Some(Piece::Pawn)
            && matches!(to.get_rank().to_index(), 0 | 7))
        .then_some(Piece::Queen);
        let mv = ChessMove::new(from, to, promotion);
        if !self.board.legal(mv) {
            return None;
        }
        Some(self.push(mv))
    }

    /// Legal destinations for the piece on `from`.
    pub fn legal_targets(&self, from: Square) -> Vec<MoveHint> {
        let mut hints: Vec<MoveHint> = MoveGen::new_legal(&self.board)
            .filter(|mv| mv.get_source() == from)
            .map(|mv| MoveHint {
                to: mv.get_dest(),
                capture: self.board.piece_on(mv.get_dest()).is_some()
                    || (self.board.piece_on(from) == Some(Piece::Pawn)
                        && from.get_file() != mv.get_dest().get_file()),
            })
            .collect();
        hints.dedup_by_key(|hint| hint.to);
        hints
    }

    /// Current position.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Starting position, `None` for the standard one.
    pub fn start_fen(&self) -> Option<&str> {
        self.start_fen.as_deref()
    }

    /// Side to move.
    pub fn turn(&self) -> Color {
        self.board.side_to_move()
    }

    /// Moves played so far.
    pub fn moves(&self) -> &[PlayedMove] {
        &self.moves
    }

    /// Most recent move.
    pub fn last_move(&self) -> Option<&PlayedMove> {
        self.moves.last()
    }

    /// Whether the side to move is in check.
    pub fn in_check(&self) -> bool {
        *self.board.checkers() != EMPTY
    }

    /// Square of the king in check, if any.
    pub fn checked_king(&self) -> Option<Square> {
        self.in_check()
            .then(|| self.board.king_square(self.board.side_to_move()))
    }

    /// Current position in FEN, including move counters.
    pub fn fen(&self) -> String {
        let fullmove = self.start_fullmove
            + (self.moves.len() as u32 + u32::from(self.start.side_to_move() == Color::Black))
                / 2;
        let placement = self.board.to_string();
        let fields: Vec<&str> = placement.split_whitespace().take(4).collect();
        format!("{} {} {}", fields.join(" "), self.halfmove_clock, fullmove)
    }

    /// Move list in PGN movetext.
    pub fn pgn(&self) -> String {
        let sans: Vec<String> = self.moves.iter().map(|m| m.san.clone()).collect();
        pgn::write(
            self.start_fen.as_deref(),
            self.start.side_to_move(),
            self.start_fullmove,
            &sans,
        )
    }

    /// Position after `ply + 1` moves; `-1` is the starting position.
    pub fn board_at(&self, ply: isize) -> Board {
        let count = (ply + 1).clamp(0, self.moves.len() as isize) as usize;
        self.moves[..count]
            .iter()
            .fold(self.start, |board, played| board.make_move_new(played.mv))
    }

    /// Terminal state of the current position, ignoring clocks.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.board.status() {
            BoardStatus::Checkmate => {
                return Some(Outcome::Checkmate {
                    winner: !self.board.side_to_move(),
                })
            }
            BoardStatus::Stalemate => return Some(Outcome::Stalemate),
            BoardStatus::Ongoing => {}
        }
        if has_insufficient_material(&self.board) {
            return Some(Outcome::InsufficientMaterial);
        }
        let current = self.board.get_hash();
        if self.positions.iter().filter(|hash| **hash == current).count() >= 3 {
            return Some(Outcome::ThreefoldRepetition);
        }
        if self.halfmove_clock >= 100 {
            return Some(Outcome::FiftyMoveRule);
        }
        None
    }

    /// Pieces missing from the standard set, per side.
    pub fn captured(&self) -> Captured {
        const ORDER: [(Piece, usize); 5] = [
            (Piece::Pawn, 8),
            (Piece::Knight, 2),
            (Piece::Bishop, 2),
            (Piece::Rook, 2),
            (Piece::Queen, 1),
        ];
        let mut captured = Captured::default();
        for color in [Color::White, Color::Black] {
            for (piece, initial) in ORDER {
                let on_board = ALL_SQUARES
                    .iter()
                    .filter(|sq| {
                        self.board.piece_on(**sq) == Some(piece)
                            && self.board.color_on(**sq) == Some(color)
                    })
                    .count();
                let missing = initial.saturating_sub(on_board);
                let target = match color {
                    Color::White => &mut captured.white,
                    Color::Black => &mut captured.black,
                };
                target.extend(std::iter::repeat(piece).take(missing));
            }
        }
        captured
    }

    /// History rows formatted as `"1. e4 e5"`.
    pub fn history_rows(&self) -> Vec<String> {
        let mut rows = Vec::new();
        let mut number = self.start_fullmove;
        let mut iter = self.moves.iter().peekable();
        if self.start.side_to_move() == Color::Black {
            if let Some(first) = iter.next() {
                rows.push(format!("{number}. … {}", first.san));
                number += 1;
            }
        }
        while let Some(white) = iter.next() {
            match iter.next() {
                Some(black) => rows.push(format!("{number}. {} {}", white.san, black.san)),
                None => rows.push(format!("{number}. {}", white.san)),
            }
            number += 1;
        }
        rows
    }
}

/// First four FEN fields (placement, side, castling, en passant).
///
/// Move counters are ignored when deciding whether two positions match.
pub fn fen_key(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

/// Neither side has enough material to deliver mate.
pub fn has_insufficient_material(board: &Board) -> bool {
    let mut minors: Vec<(Color, Piece, bool)> = Vec::new();
    for square in ALL_SQUARES {
        let (Some(piece), Some(color)) = (board.piece_on(square), board.color_on(square)) else {
            continue;
        };
        match piece {
            Piece::King => {}
            Piece::Knight | Piece::Bishop => {
                let light = (square.get_rank().to_index() + square.get_file().to_index()) % 2 == 1;
                minors.push((color, piece, light));
            }
            Piece::Pawn | Piece::Rook | Piece::Queen => return false,
        }
    }
    match minors.as_slice() {
        [] | [_] => true,
        [(c1, Piece::Bishop, l1), (c2, Piece::Bishop, l2)] => c1 != c2 && l1 == l2,
        _ => false,
    }
}
