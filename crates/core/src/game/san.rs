//! Standard algebraic notation on top of the `chess` move generator.

use chess::{Board, BoardStatus, ChessMove, File, MoveGen, Piece, Rank, Square, EMPTY};

/// Two-character name of a square, e.g. `e4`.
pub fn square_name(square: Square) -> String {
    format!(
        "{}{}",
        file_char(square.get_file()),
        square.get_rank().to_index() + 1
    )
}

/// Parse a square name such as `e4`.
pub fn parse_square(text: &str) -> Option<Square> {
    let mut chars = text.trim().chars();
    let file = chars.next()?;
    let rank = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    if !('a'..='h').contains(&file) || !('1'..='8').contains(&rank) {
        return None;
    }
    let file_idx = (file as u8 - b'a') as usize;
    let rank_idx = (rank as u8 - b'1') as usize;
    Some(Square::make_square(
        Rank::from_index(rank_idx),
        File::from_index(file_idx),
    ))
}

fn file_char(file: File) -> char {
    (b'a' + file.to_index() as u8) as char
}

fn rank_char(rank: Rank) -> char {
    (b'1' + rank.to_index() as u8) as char
}

/// Upper-case SAN letter for a piece (empty for pawns).
pub fn piece_letter(piece: Piece) -> Option<char> {
    match piece {
        Piece::Pawn => None,
        Piece::Knight => Some('N'),
        Piece::Bishop => Some('B'),
        Piece::Rook => Some('R'),
        Piece::Queen => Some('Q'),
        Piece::King => Some('K'),
    }
}

/// Render a legal move in SAN, including check and mate suffixes.
pub fn to_san(board: &Board, mv: ChessMove) -> String {
    let from = mv.get_source();
    let to = mv.get_dest();
    let Some(piece) = board.piece_on(from) else {
        return format!("{}{}", square_name(from), square_name(to));
    };

    let file_delta = to.get_file().to_index() as i32 - from.get_file().to_index() as i32;
    let mut san = String::new();
    if piece == Piece::King && file_delta.abs() == 2 {
        san.push_str(if file_delta > 0 { "O-O" } else { "O-O-O" });
    } else if piece == Piece::Pawn {
        let capture = file_delta != 0;
        if capture {
            san.push(file_char(from.get_file()));
            san.push('x');
        }
        san.push_str(&square_name(to));
        if let Some(letter) = mv.get_promotion().and_then(piece_letter) {
            san.push('=');
            san.push(letter);
        }
    } else {
        if let Some(letter) = piece_letter(piece) {
            san.push(letter);
        }
        let rivals: Vec<Square> = MoveGen::new_legal(board)
            .filter(|other| {
                other.get_dest() == to
                    && other.get_source() != from
                    && board.piece_on(other.get_source()) == Some(piece)
            })
            .map(|other| other.get_source())
            .collect();
        if !rivals.is_empty() {
            let shares_file = rivals
                .iter()
                .any(|sq| sq.get_file() == from.get_file());
            let shares_rank = rivals
                .iter()
                .any(|sq| sq.get_rank() == from.get_rank());
            if !shares_file {
                san.push(file_char(from.get_file()));
            } else if !shares_rank {
                san.push(rank_char(from.get_rank()));
            } else {
                san.push(file_char(from.get_file()));
                san.push(rank_char(from.get_rank()));
            }
        }
        if board.piece_on(to).is_some() {
            san.push('x');
        }
        san.push_str(&square_name(to));
    }

    let after = board.make_move_new(mv);
    if after.status() == BoardStatus::Checkmate {
        san.push('#');
    } else if *after.checkers() != EMPTY {
        san.push('+');
    }
    san
}

fn normalize(token: &str) -> String {
    let trimmed = token
        .trim()
        .trim_end_matches(|ch| matches!(ch, '+' | '#' | '!' | '?'))
        .trim_end_matches("e.p.")
        .trim();
    let castles = trimmed.replace('0', "O");
    let base = if castles == "O-O" || castles == "O-O-O" {
        castles
    } else {
        trimmed.to_string()
    };
    base.replace('=', "")
}

/// Resolve a SAN token against the legal moves of `board`.
pub fn from_san(board: &Board, token: &str) -> Option<ChessMove> {
    let wanted = normalize(token);
    if wanted.is_empty() {
        return None;
    }
    MoveGen::new_legal(board).find(|mv| normalize(&to_san(board, *mv)) == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn mv(board: &Board, from: &str, to: &str, promotion: Option<Piece>) -> ChessMove {
        let mv = ChessMove::new(
            parse_square(from).expect("from square"),
            parse_square(to).expect("to square"),
            promotion,
        );
        assert!(board.legal(mv), "{from}{to} should be legal");
        mv
    }

    #[test]
    fn square_names_round_trip() {
        for name in ["a1", "e4", "h8", "c7"] {
            let square = parse_square(name).expect("valid square");
            assert_eq!(square_name(square), name);
        }
        assert!(parse_square("i9").is_none());
        assert!(parse_square("e44").is_none());
    }

    #[test]
    fn opening_moves() {
        let board = Board::default();
        assert_eq!(to_san(&board, mv(&board, "e2", "e4", None)), "e4");
        assert_eq!(to_san(&board, mv(&board, "g1", "f3", None)), "Nf3");
    }

    #[test]
    fn castling_and_check() {
        let board =
            Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").expect("valid fen");
        assert_eq!(to_san(&board, mv(&board, "e1", "g1", None)), "O-O");
        assert_eq!(to_san(&board, mv(&board, "e1", "c1", None)), "O-O-O");
        // Rook a1 to a8 captures with check.
        assert_eq!(to_san(&board, mv(&board, "a1", "a8", None)), "Rxa8+");
    }

    #[test]
    fn disambiguates_by_file_then_rank() {
        let board = Board::from_str("4k3/8/8/8/8/8/4K3/R6R w - - 0 1").expect("valid fen");
        assert_eq!(to_san(&board, mv(&board, "a1", "d1", None)), "Rad1");
        let board = Board::from_str("R7/8/7k/8/8/8/8/R3K3 w - - 0 1").expect("valid fen");
        assert_eq!(to_san(&board, mv(&board, "a1", "a4", None)), "R1a4");
    }

    #[test]
    fn promotion_and_mate() {
        let board = Board::from_str("7k/P7/6K1/8/8/8/8/8 w - - 0 1").expect("valid fen");
        assert_eq!(
            to_san(&board, mv(&board, "a7", "a8", Some(Piece::Queen))),
            "a8=Q#"
        );
    }

    #[test]
    fn parses_tokens_with_annotations() {
        let board = Board::default();
        let parsed = from_san(&board, "Nf3!?").expect("legal move");
        assert_eq!(parsed, mv(&board, "g1", "f3", None));
        assert!(from_san(&board, "Ke2").is_none());

        let board =
            Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").expect("valid fen");
        assert_eq!(
            from_san(&board, "0-0"),
            Some(mv(&board, "e1", "g1", None))
        );
    }
}
