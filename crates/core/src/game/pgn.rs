//! Minimal PGN reading and writing for the shared move list.

use chess::Color;
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[\s*(\w+)\s+"([^"]*)"\s*\]"#).expect("invalid PGN header regex")
});
static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^}]*\}|;[^\n]*|\([^()]*\)").expect("invalid PGN comment regex"));
static MOVE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.(\.\.)?").expect("invalid PGN move number regex"));

/// Movetext and tags extracted from a PGN document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PgnText {
    /// Starting position from a `FEN` tag, if any.
    pub start_fen: Option<String>,
    /// SAN tokens in game order.
    pub moves: Vec<String>,
}

/// Split a PGN document into its starting position and SAN tokens.
pub fn read(text: &str) -> PgnText {
    let mut start_fen = None;
    for capture in HEADER_RE.captures_iter(text) {
        if capture[1].eq_ignore_ascii_case("FEN") {
            start_fen = Some(capture[2].trim().to_string());
        }
    }
    let body = HEADER_RE.replace_all(text, " ");
    let mut body = body.into_owned();
    // Variations may nest; strip innermost first until stable.
    loop {
        let stripped = COMMENT_RE.replace_all(&body, " ").into_owned();
        if stripped == body {
            break;
        }
        body = stripped;
    }

    let moves = body
        .split_whitespace()
        .filter_map(|token| {
            let token = MOVE_NUMBER_RE.replace(token, "");
            let token = token.trim();
            if token.is_empty()
                || token.starts_with('$')
                || matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*")
            {
                None
            } else {
                Some(token.to_string())
            }
        })
        .collect();

    PgnText { start_fen, moves }
}

/// Render a move list the way the shared row stores it.
///
/// A non-standard start adds `SetUp`/`FEN` tags so the list replays from the
/// right position.
pub fn write(
    start_fen: Option<&str>,
    first_mover: Color,
    first_fullmove: u32,
    sans: &[String],
) -> String {
    let mut out = String::new();
    if let Some(fen) = start_fen {
        out.push_str("[SetUp \"1\"]\n[FEN \"");
        out.push_str(fen);
        out.push_str("\"]\n\n");
    }

    let mut number = first_fullmove.max(1);
    let mut to_move = first_mover;
    let mut parts: Vec<String> = Vec::with_capacity(sans.len() + sans.len() / 2 + 1);
    for (idx, san) in sans.iter().enumerate() {
        match to_move {
            Color::White => parts.push(format!("{number}. {san}")),
            Color::Black if idx == 0 => parts.push(format!("{number}... {san}")),
            Color::Black => parts.push(san.clone()),
        }
        if to_move == Color::Black {
            number += 1;
        }
        to_move = !to_move;
    }
    out.push_str(&parts.join(" "));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sans(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn writes_numbered_pairs() {
        let text = write(None, Color::White, 1, &sans(&["e4", "e5", "Nf3"]));
        assert_eq!(text, "1. e4 e5 2. Nf3");
    }

    #[test]
    fn writes_black_first_with_ellipsis_and_tags() {
        let fen = "4k3/8/8/8/8/8/8/4K3 b - - 0 12";
        let text = write(Some(fen), Color::Black, 12, &sans(&["Kd7", "Kd2", "Ke6"]));
        assert_eq!(
            text,
            "[SetUp \"1\"]\n[FEN \"4k3/8/8/8/8/8/8/4K3 b - - 0 12\"]\n\n12... Kd7 13. Kd2 Ke6"
        );
        let parsed = read(&text);
        assert_eq!(parsed.start_fen.as_deref(), Some(fen));
        assert_eq!(parsed.moves, sans(&["Kd7", "Kd2", "Ke6"]));
    }

    #[test]
    fn reads_comments_variations_and_results() {
        let parsed = read(
            "[Event \"Casual\"]\n1. e4 {best by test} e5 (1... c5 2. Nf3 (2. c3)) 2. Nf3 $1 Nc6 1-0",
        );
        assert_eq!(parsed.start_fen, None);
        assert_eq!(parsed.moves, sans(&["e4", "e5", "Nf3", "Nc6"]));
    }

    #[test]
    fn reads_compact_move_numbers() {
        let parsed = read("1.e4 e5 2.Nf3 2...Nc6");
        assert_eq!(parsed.moves, sans(&["e4", "e5", "Nf3", "Nc6"]));
    }

    #[test]
    fn empty_text_has_no_moves() {
        assert_eq!(read("   "), PgnText::default());
    }
}
