use chess::Color as Side;
use duochess_core::{
    backend::ConnectionStatus,
    board::{piece_glyph, BoardCursor, BoardView, Cell},
    chat::reaction_side,
    clock::{format_ms, is_low},
    models::now_ms,
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::{
    app::{
        BoardGeometry, ColourChoice, DuoChessApp, GameOverModal, Modal, NewGameModal, Screen,
        Session, TIME_CHOICES,
    },
    theme::Theme,
};

const RANK_LABEL_WIDTH: u16 = 2;
const BAR_HEIGHT: u16 = 2;
const SIDE_MIN_WIDTH: u16 = 28;
// Cell sizes tried from largest to smallest; terminal cells are about twice as tall as wide.
const CELL_SIZES: [(u16, u16); 3] = [(7, 3), (5, 2), (3, 1)];

pub fn draw(frame: &mut Frame, app: &mut DuoChessApp) {
    let area = frame.size();
    frame.render_widget(
        Block::default().style(
            Style::default()
                .bg(app.theme.primary_bg)
                .fg(app.theme.primary_fg),
        ),
        area,
    );
    match app.screen {
        Screen::Login => draw_login(frame, app),
        Screen::Game => draw_game(frame, app),
    }
}

fn draw_login(frame: &mut Frame, app: &DuoChessApp) {
    let theme = &app.theme;
    let area = centered_rect(48, 9, frame.size());
    frame.render_widget(Clear, area);

    let masked = "•".repeat(app.login.len());
    let mut lines = vec![
        Line::from("Access code"),
        Line::from(vec![
            Span::styled("> ", Style::default().fg(theme.accent)),
            Span::raw(masked),
        ]),
        Line::from(""),
    ];
    match &app.login_error {
        Some(error) => lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default()
                .fg(theme.danger)
                .add_modifier(Modifier::BOLD),
        ))),
        None => lines.push(Line::from("")),
    }
    lines.push(Line::from(vec![
        Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" sign in  "),
        Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" quit"),
    ]));
    if !app.status.is_empty() {
        lines.push(Line::from(Span::styled(
            app.status.clone(),
            Style::default().fg(theme.muted),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.accent))
                .title("DuoChess")
                .style(Style::default().bg(theme.card_bg)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);

    let cursor_x = (area.x + 3 + app.login.cursor() as u16).min(area.right().saturating_sub(2));
    frame.set_cursor(cursor_x, area.y + 2);
}

fn draw_game(frame: &mut Frame, app: &mut DuoChessApp) {
    let area = frame.size();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(area);

    let Some(session) = app.session.as_ref() else {
        return;
    };
    let theme = &app.theme;
    let now = now_ms();

    render_header(frame, rows[0], theme, session, app.connection);

    let (cell_width, cell_height) = cell_size(rows[1]);
    let board_width = 8 * cell_width + RANK_LABEL_WIDTH;
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(board_width + 2), Constraint::Min(0)])
        .split(rows[1]);

    let board_column = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(BAR_HEIGHT),
            Constraint::Length(8 * cell_height + 1),
            Constraint::Length(BAR_HEIGHT),
            Constraint::Min(0),
        ])
        .split(body[0]);

    let top_side = if session.view.flipped() {
        Side::White
    } else {
        Side::Black
    };
    render_player_bar(frame, board_column[0], theme, session, top_side, now);
    let geometry = render_board(
        frame,
        board_column[1],
        theme,
        &session.view,
        session.cursor,
        (cell_width, cell_height),
    );
    render_player_bar(frame, board_column[2], theme, session, !top_side, now);

    render_side_panel(frame, body[1], theme, session);
    render_status(frame, rows[2], theme, &app.status);

    match &session.modal {
        Some(Modal::NewGame(dialog)) => render_new_game(frame, theme, dialog),
        Some(Modal::GameOver(dialog)) => render_game_over(frame, theme, dialog),
        Some(Modal::Help) => render_help(frame, theme),
        None => {}
    }

    app.board_geometry = Some(geometry);
}

fn cell_size(area: Rect) -> (u16, u16) {
    for (width, height) in CELL_SIZES {
        let board_width = 8 * width + RANK_LABEL_WIDTH + 2;
        let board_height = 8 * height + 1 + 2 * BAR_HEIGHT;
        if board_width + SIDE_MIN_WIDTH <= area.width && board_height <= area.height {
            return (width, height);
        }
    }
    CELL_SIZES[CELL_SIZES.len() - 1]
}

fn render_header(
    frame: &mut Frame,
    area: Rect,
    theme: &Theme,
    session: &Session,
    connection: Option<ConnectionStatus>,
) {
    let state = &session.state;
    let (label, colour) = match connection {
        Some(ConnectionStatus::Joined) => ("● live", theme.success),
        Some(ConnectionStatus::Connecting) | None => ("● connecting", theme.warning),
        Some(ConnectionStatus::Closed) | Some(ConnectionStatus::Errored) => {
            ("● offline", theme.danger)
        }
    };
    let mut spans = vec![
        Span::styled(
            " DuoChess ",
            Style::default()
                .fg(theme.on_accent)
                .bg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "  {} ({}) vs {}  ",
            state.identity(),
            side_name(state.color()),
            state.opponent()
        )),
        Span::styled(label, Style::default().fg(colour)),
        Span::styled(
            format!("  theme: {}", theme.name),
            Style::default().fg(theme.muted),
        ),
    ];
    if session.chat.has_unread() {
        spans.push(Span::styled(
            "  ✉ new message",
            Style::default()
                .fg(theme.warning)
                .add_modifier(Modifier::BOLD),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_player_bar(
    frame: &mut Frame,
    area: Rect,
    theme: &Theme,
    session: &Session,
    side: Side,
    now: i64,
) {
    let state = &session.state;
    let name = if side == state.color() {
        state.identity().as_str()
    } else {
        state.opponent()
    };
    let to_move = state.outcome().is_none() && state.game().turn() == side;

    let mut first = vec![
        Span::styled(
            format!(" {} ", piece_glyph(chess::Piece::King, side)),
            Style::default().fg(theme.accent),
        ),
        Span::styled(
            name.to_string(),
            if to_move {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            },
        ),
    ];
    if !state.clock().is_untimed() {
        let (white, black) = state.live_clock(now);
        let remaining = if side == Side::White { white } else { black };
        let mut style = Style::default().add_modifier(Modifier::BOLD);
        if is_low(remaining) || remaining == 0 {
            style = style.fg(theme.danger);
        } else if to_move {
            style = style.fg(theme.accent);
        }
        first.push(Span::raw("  "));
        first.push(Span::styled(format!("⏱ {}", format_ms(remaining)), style));
    }

    let taken: String = state
        .game()
        .captured()
        .of(!side)
        .iter()
        .map(|piece| piece_glyph(*piece, !side))
        .collect();
    let mut second = vec![Span::styled(
        format!("   {taken}"),
        Style::default().fg(theme.muted),
    )];
    let own_name = state.identity().as_str();
    for reaction in session.chat.active_reactions(now) {
        if reaction_side(reaction, own_name, state.color()) != side {
            continue;
        }
        let style = if reaction.is_fading(now) {
            Style::default().fg(theme.muted)
        } else {
            Style::default()
                .fg(theme.warning)
                .add_modifier(Modifier::BOLD)
        };
        second.push(Span::styled(format!("  {}", reaction.text), style));
    }

    frame.render_widget(
        Paragraph::new(vec![Line::from(first), Line::from(second)]),
        area,
    );
}

fn render_board(
    frame: &mut Frame,
    area: Rect,
    theme: &Theme,
    view: &BoardView,
    cursor: BoardCursor,
    (cell_width, cell_height): (u16, u16),
) -> BoardGeometry {
    let width = usize::from(cell_width);
    let middle = cell_height / 2;
    let ranks = view.rank_labels();
    let mut lines = Vec::with_capacity(usize::from(8 * cell_height + 1));

    for (row, cells) in view.rows().enumerate() {
        for sub_row in 0..cell_height {
            let label = if sub_row == middle {
                format!("{} ", ranks[row])
            } else {
                "  ".to_string()
            };
            let mut spans = vec![Span::styled(label, Style::default().fg(theme.muted))];
            for (col, cell) in cells.iter().enumerate() {
                let focused = cursor.row == row && cursor.col == col;
                let text = if sub_row == middle {
                    cell_text(cell, width, focused)
                } else {
                    " ".repeat(width)
                };
                spans.push(Span::styled(text, cell_style(theme, cell)));
            }
            lines.push(Line::from(spans));
        }
    }

    let mut files = " ".repeat(usize::from(RANK_LABEL_WIDTH));
    for file in view.file_labels() {
        files.push_str(&format!("{file:^width$}"));
    }
    lines.push(Line::from(Span::styled(files, Style::default().fg(theme.muted))));

    let board_area = Rect {
        x: area.x + 1,
        width: area.width.saturating_sub(1),
        ..area
    };
    frame.render_widget(Paragraph::new(lines), board_area);

    BoardGeometry {
        x: board_area.x + RANK_LABEL_WIDTH,
        y: board_area.y,
        cell_width,
        cell_height,
    }
}

fn cell_text(cell: &Cell, width: usize, focused: bool) -> String {
    let glyph = match cell.piece {
        Some((piece, colour)) => piece_glyph(piece, colour),
        None if cell.hint => '•',
        None => ' ',
    };
    let mut chars = vec![' '; width];
    let centre = width / 2;
    chars[centre] = glyph;
    if focused && width >= 3 {
        chars[centre - 1] = '[';
        chars[centre + 1] = ']';
    }
    chars.into_iter().collect()
}

fn cell_style(theme: &Theme, cell: &Cell) -> Style {
    let bg = if cell.check {
        theme.danger
    } else if cell.selected {
        theme.selection_bg
    } else if cell.capture_hint {
        theme.hint
    } else if cell.last_move {
        theme.last_move_bg
    } else if cell.light {
        theme.board_light
    } else {
        theme.board_dark
    };
    let fg = if cell.hint && cell.piece.is_none() {
        theme.hint
    } else {
        theme.piece_fg(bg)
    };
    Style::default().bg(bg).fg(fg).add_modifier(Modifier::BOLD)
}

fn render_side_panel(frame: &mut Frame, area: Rect, theme: &Theme, session: &Session) {
    let constraints = if session.chat_open {
        vec![
            Constraint::Length(5),
            Constraint::Percentage(40),
            Constraint::Min(6),
        ]
    } else {
        vec![Constraint::Length(5), Constraint::Min(3)]
    };
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    render_game_info(frame, sections[0], theme, session);
    render_history(frame, sections[1], theme, session);
    if session.chat_open {
        render_chat(frame, sections[2], theme, session);
    }
}

fn render_game_info(frame: &mut Frame, area: Rect, theme: &Theme, session: &Session) {
    let state = &session.state;
    let game = state.game();
    let headline = if let Some(outcome) = state.outcome() {
        let suffix = match outcome.winner() {
            Some(winner) if winner == state.color() => " · you win",
            Some(_) => " · you lose",
            None => "",
        };
        Span::styled(
            format!("{}{suffix}", outcome.describe()),
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )
    } else if !session.loaded {
        Span::styled("Loading…", Style::default().fg(theme.muted))
    } else if state.is_my_turn() {
        Span::styled(
            "Your move",
            Style::default()
                .fg(theme.success)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::raw(format!("{} to move", state.opponent()))
    };

    let mut lines = vec![Line::from(headline)];
    if game.in_check() && state.outcome().is_none() {
        lines.push(Line::from(Span::styled(
            "Check!",
            Style::default()
                .fg(theme.danger)
                .add_modifier(Modifier::BOLD),
        )));
    }
    if let Some(ply) = state.cursor().index() {
        lines.push(Line::from(Span::styled(
            format!(
                "Viewing move {}/{}  (End: back to game)",
                ply + 1,
                game.moves().len()
            ),
            Style::default().fg(theme.warning),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Game")
        .style(Style::default().bg(theme.card_bg));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn render_history(frame: &mut Frame, area: Rect, theme: &Theme, session: &Session) {
    let game = session.state.game();
    let rows = game.history_rows();
    let black_first = game
        .moves()
        .first()
        .is_some_and(|played| played.mover == Side::Black);
    let viewed_ply = match session.state.cursor().index() {
        Some(ply) => ply,
        None => game.moves().len() as isize - 1,
    };
    let highlighted = (viewed_ply >= 0).then(|| {
        let ply = viewed_ply as usize;
        if black_first {
            (ply + 1) / 2
        } else {
            ply / 2
        }
    });

    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            if Some(index) == highlighted {
                Line::from(Span::styled(
                    row.clone(),
                    Style::default()
                        .fg(theme.on_accent)
                        .bg(theme.accent),
                ))
            } else {
                Line::from(row.clone())
            }
        })
        .collect();

    let visible = usize::from(area.height.saturating_sub(2)).max(1);
    let focus = highlighted.unwrap_or(0);
    let offset = focus.saturating_sub(visible - 1);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Moves")
        .style(Style::default().bg(theme.card_bg));
    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((offset as u16, 0));
    frame.render_widget(paragraph, area);
}

fn render_chat(frame: &mut Frame, area: Rect, theme: &Theme, session: &Session) {
    let own = session.state.identity().as_str();
    let inner_height = usize::from(area.height.saturating_sub(3));
    let messages = session.chat.messages();
    let start = messages.len().saturating_sub(inner_height);
    let mut lines: Vec<Line> = messages[start..]
        .iter()
        .map(|message| {
            let colour = if message.sender == own {
                theme.accent
            } else {
                theme.warning
            };
            Line::from(vec![
                Span::styled(
                    format!("{}: ", message.sender),
                    Style::default().fg(colour).add_modifier(Modifier::BOLD),
                ),
                Span::raw(message.text.clone()),
            ])
        })
        .collect();
    while lines.len() < inner_height {
        lines.insert(0, Line::from(""));
    }

    let input_width = usize::from(area.width.saturating_sub(4));
    let (text, cursor) = session.chat_input.visible(input_width);
    if session.chat_focus {
        lines.push(Line::from(vec![
            Span::styled("> ", Style::default().fg(theme.accent)),
            Span::raw(text),
        ]));
    } else {
        lines.push(Line::from(Span::styled(
            "c to type · C to close",
            Style::default().fg(theme.muted),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Chat")
        .style(Style::default().bg(theme.card_bg));
    frame.render_widget(Paragraph::new(lines).block(block), area);

    if session.chat_focus && session.modal.is_none() {
        let x = area.x + 3 + cursor as u16;
        let y = area.bottom().saturating_sub(2);
        frame.set_cursor(x.min(area.right().saturating_sub(2)), y);
    }
}

fn render_status(frame: &mut Frame, area: Rect, theme: &Theme, status: &str) {
    let helper = Line::from(vec![
        Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" select/move  "),
        Span::styled("[ ]", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" history  "),
        Span::styled("n", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" new game  "),
        Span::styled("c", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" chat  "),
        Span::styled("?", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" help  "),
        Span::styled("q", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" quit"),
    ]);
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(theme.muted));
    let paragraph = Paragraph::new(vec![Line::from(status.to_string()), helper]).block(block);
    frame.render_widget(paragraph, area);
}

fn render_new_game(frame: &mut Frame, theme: &Theme, dialog: &NewGameModal) {
    let area = centered_rect(46, 11, frame.size());
    frame.render_widget(Clear, area);

    let option = |label: String, active: bool| {
        if active {
            Span::styled(
                format!(" {label} "),
                Style::default()
                    .fg(theme.on_accent)
                    .bg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::raw(format!(" {label} "))
        }
    };

    let mut colours = vec![Span::raw("Colour ")];
    for choice in ColourChoice::ALL {
        colours.push(option(
            choice.label().to_string(),
            dialog.colour == Some(choice),
        ));
    }
    let mut times = vec![Span::raw("Time   ")];
    for (index, minutes) in TIME_CHOICES.iter().enumerate() {
        let label = if *minutes == 0 {
            "∞".to_string()
        } else {
            minutes.to_string()
        };
        times.push(option(label, dialog.time_index == index));
    }
    let confirm = if dialog.colour.is_some() {
        Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD))
    } else {
        Span::styled("Enter", Style::default().fg(theme.muted))
    };

    let lines = vec![
        Line::from(colours),
        Line::from(""),
        Line::from(times),
        Line::from(Span::styled("minutes per side", Style::default().fg(theme.muted))),
        Line::from(""),
        Line::from(vec![
            Span::styled("←/→", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" colour  "),
            Span::styled("↑/↓", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" time"),
        ]),
        Line::from(vec![
            confirm,
            Span::raw(" start  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ]),
    ];
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent))
            .title("New Game")
            .style(Style::default().bg(theme.card_bg)),
    );
    frame.render_widget(paragraph, area);
}

fn render_game_over(frame: &mut Frame, theme: &Theme, dialog: &GameOverModal) {
    let area = centered_rect(44, 8, frame.size());
    frame.render_widget(Clear, area);
    let colour = match dialog.title {
        "Victory" => theme.success,
        "Defeat" => theme.danger,
        _ => theme.accent,
    };
    let lines = vec![
        Line::from(Span::styled(
            dialog.title,
            Style::default().fg(colour).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(dialog.detail, Style::default().fg(theme.muted))),
        Line::from(""),
        Line::from(dialog.message.clone()),
        Line::from(""),
        Line::from(vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" close"),
        ]),
    ];
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(colour))
                .style(Style::default().bg(theme.card_bg)),
        );
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame, theme: &Theme) {
    let area = centered_rect(52, 18, frame.size());
    frame.render_widget(Clear, area);
    let entries = [
        ("arrows / hjkl", "move the cursor"),
        ("Enter / Space", "select a piece or move"),
        ("mouse click", "select a piece or move"),
        ("Esc", "drop the selection"),
        ("[ / ]", "step through history"),
        ("Home / End", "first position / back to game"),
        ("f", "flip the board"),
        ("n", "new game"),
        ("c / C", "open / close chat"),
        ("Ctrl-L", "clear chat (in chat)"),
        ("t", "next theme"),
        ("r", "refresh from server"),
        ("L", "sign out"),
        ("q", "quit"),
    ];
    let lines: Vec<Line> = entries
        .iter()
        .map(|(keys, action)| {
            Line::from(vec![
                Span::styled(
                    format!("{keys:<16}"),
                    Style::default()
                        .fg(theme.accent)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(*action),
            ])
        })
        .collect();
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Keys")
            .style(Style::default().bg(theme.card_bg)),
    );
    frame.render_widget(paragraph, area);
}

fn side_name(side: Side) -> &'static str {
    match side {
        Side::White => "White",
        Side::Black => "Black",
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Square;

    fn empty_cell() -> Cell {
        Cell {
            square: Square::E4,
            piece: None,
            light: true,
            selected: false,
            last_move: false,
            hint: false,
            capture_hint: false,
            check: false,
        }
    }

    #[test]
    fn cell_text_centres_glyph_and_marks_cursor() {
        let cell = Cell {
            piece: Some((chess::Piece::Knight, Side::White)),
            ..empty_cell()
        };
        assert_eq!(cell_text(&cell, 5, false), "  ♘  ");
        assert_eq!(cell_text(&cell, 5, true), " [♘] ");
        let hint = Cell {
            hint: true,
            ..empty_cell()
        };
        assert_eq!(cell_text(&hint, 3, false), " • ");
    }

    #[test]
    fn check_outranks_other_highlights() {
        let theme = Theme::default();
        let cell = Cell {
            check: true,
            selected: true,
            last_move: true,
            ..empty_cell()
        };
        assert_eq!(cell_style(&theme, &cell).bg, Some(theme.danger));
    }

    #[test]
    fn board_shrinks_to_fit() {
        assert_eq!(cell_size(Rect::new(0, 0, 120, 40)), (7, 3));
        assert_eq!(cell_size(Rect::new(0, 0, 80, 24)), (5, 2));
        assert_eq!(cell_size(Rect::new(0, 0, 40, 12)), (3, 1));
    }
}
