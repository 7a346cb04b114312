use std::{io, thread, time::Duration};

use anyhow::{Context, Result};
use chess::Color as Side;
use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
        MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use duochess_core::{
    auth::{AuthError, IdentityStore, Roster, SessionGate},
    backend::{ConnectionStatus, RemoteEvent},
    board::{BoardCursor, BoardView},
    chat::{prepare_outgoing, ChatLog, MAX_MESSAGE_CHARS},
    game::Outcome,
    input::{activate, InputOutcome},
    models::{now_ms, GameRecord, Identity},
    prefs::{Prefs, PrefsStore},
    reconcile::{reconcile, GameState, Reconciled},
    sync::{LoadSource, SyncEvent, SyncHandle},
};
use rand::seq::IndexedRandom;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{input::TextInput, theme::Theme, ui};

const TICK_RATE: Duration = Duration::from_millis(100);
const MAX_SECRET_LEN: usize = 128;

/// Minutes per side offered in the new-game dialog; 0 is untimed.
pub const TIME_CHOICES: [i64; 6] = [0, 1, 3, 5, 10, 15];
const DEFAULT_TIME_INDEX: usize = 3;

const VICTORY_MESSAGES: [&str; 4] = [
    "Well played, the board is yours.",
    "A clean finish. Take a bow.",
    "That one goes in the highlight reel.",
    "Checkmate energy all game long.",
];
const DEFEAT_MESSAGES: [&str; 4] = [
    "Not this time. Rematch?",
    "Every loss is a lesson in disguise.",
    "Your opponent was on fire today.",
    "Shake it off and set up the pieces again.",
];
const DRAW_MESSAGES: [&str; 3] = [
    "Perfectly balanced.",
    "Nobody blinked.",
    "Honours even. Play another?",
];

enum AppEvent {
    Input(Event),
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Game,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourChoice {
    White,
    Black,
    Random,
}

impl ColourChoice {
    pub const ALL: [ColourChoice; 3] = [
        ColourChoice::White,
        ColourChoice::Black,
        ColourChoice::Random,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ColourChoice::White => "White",
            ColourChoice::Black => "Black",
            ColourChoice::Random => "Random",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewGameModal {
    pub colour: Option<ColourChoice>,
    pub time_index: usize,
}

impl NewGameModal {
    fn new() -> Self {
        Self {
            colour: None,
            time_index: DEFAULT_TIME_INDEX,
        }
    }

    fn shift_colour(&mut self, delta: isize) {
        let len = ColourChoice::ALL.len() as isize;
        let next = match self.colour {
            None if delta < 0 => len - 1,
            None => 0,
            Some(current) => {
                let index = ColourChoice::ALL
                    .iter()
                    .position(|choice| *choice == current)
                    .unwrap_or(0) as isize;
                (index + delta).rem_euclid(len)
            }
        };
        self.colour = Some(ColourChoice::ALL[next as usize]);
    }

    fn shift_time(&mut self, delta: isize) {
        let last = TIME_CHOICES.len() as isize - 1;
        self.time_index = (self.time_index as isize + delta).clamp(0, last) as usize;
    }

    pub fn minutes(&self) -> i64 {
        TIME_CHOICES[self.time_index]
    }

    /// Side to play, `None` until a colour was picked.
    fn resolve(&self, coin: bool) -> Option<Side> {
        match self.colour? {
            ColourChoice::White => Some(Side::White),
            ColourChoice::Black => Some(Side::Black),
            ColourChoice::Random if coin => Some(Side::White),
            ColourChoice::Random => Some(Side::Black),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameOverModal {
    pub title: &'static str,
    pub message: String,
    pub detail: &'static str,
}

impl GameOverModal {
    fn new(outcome: Outcome, own: Side) -> Self {
        let (title, pool): (_, &[&str]) = match outcome.winner() {
            Some(winner) if winner == own => ("Victory", &VICTORY_MESSAGES[..]),
            Some(_) => ("Defeat", &DEFEAT_MESSAGES[..]),
            None => ("Draw", &DRAW_MESSAGES[..]),
        };
        let message = pool
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or_default()
            .to_string();
        Self {
            title,
            message,
            detail: outcome.describe(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Modal {
    NewGame(NewGameModal),
    GameOver(GameOverModal),
    Help,
}

/// Screen position of the drawn board, for mouse hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardGeometry {
    pub x: u16,
    pub y: u16,
    pub cell_width: u16,
    pub cell_height: u16,
}

impl BoardGeometry {
    /// Display `(row, col)` under a terminal cell.
    pub fn hit(&self, column: u16, row: u16) -> Option<(usize, usize)> {
        if column < self.x || row < self.y || self.cell_width == 0 || self.cell_height == 0 {
            return None;
        }
        let col = usize::from((column - self.x) / self.cell_width);
        let row = usize::from((row - self.y) / self.cell_height);
        (row < 8 && col < 8).then_some((row, col))
    }
}

/// Everything that exists only while someone is logged in.
pub struct Session {
    pub state: GameState,
    pub chat: ChatLog,
    pub view: BoardView,
    pub cursor: BoardCursor,
    pub chat_open: bool,
    pub chat_focus: bool,
    pub chat_input: TextInput,
    pub modal: Option<Modal>,
    pub loaded: bool,
}

impl Session {
    fn new(state: GameState) -> Self {
        let view = state.project();
        Self {
            state,
            chat: ChatLog::default(),
            view,
            cursor: BoardCursor::default(),
            chat_open: false,
            chat_focus: false,
            chat_input: TextInput::new(MAX_MESSAGE_CHARS),
            modal: None,
            loaded: false,
        }
    }

    fn redraw_board(&mut self) {
        self.view = self.state.project();
    }

    fn apply_record(&mut self, record: &GameRecord) -> Reconciled {
        let result = reconcile(&mut self.state, record);
        if result.colour_changed {
            self.cursor = BoardCursor::default();
        }
        if result.render_needed {
            self.redraw_board();
        }
        result
    }

    /// Open the end-of-game dialog once per outcome.
    fn announce(&mut self) {
        if let Some(outcome) = self.state.take_announcement() {
            info!(outcome = outcome.describe(), "Game over");
            self.modal = Some(Modal::GameOver(GameOverModal::new(
                outcome,
                self.state.color(),
            )));
        }
    }

    fn step_history(&mut self, step: impl FnOnce(&mut GameState, usize)) {
        let len = self.state.game().moves().len();
        step(&mut self.state, len);
        self.redraw_board();
    }
}

/// Terminal client state and event loop.
pub struct DuoChessApp {
    gate: SessionGate,
    roster: Roster,
    identities: IdentityStore,
    prefs_store: PrefsStore,
    prefs: Prefs,
    pub(crate) theme: Theme,
    sync: SyncHandle,
    sync_rx: Option<mpsc::Receiver<SyncEvent>>,
    remote_rx: Option<mpsc::Receiver<RemoteEvent>>,
    pub(crate) screen: Screen,
    pub(crate) login: TextInput,
    pub(crate) login_error: Option<String>,
    pub(crate) session: Option<Session>,
    pub(crate) connection: Option<ConnectionStatus>,
    pub(crate) status: String,
    pub(crate) board_geometry: Option<BoardGeometry>,
    should_quit: bool,
}

impl DuoChessApp {
    pub fn new(
        gate: SessionGate,
        roster: Roster,
        identities: IdentityStore,
        prefs_store: PrefsStore,
        sync: SyncHandle,
    ) -> Self {
        let prefs = prefs_store.load();
        let theme = Theme::from_prefs(&prefs);
        Self {
            gate,
            roster,
            identities,
            prefs_store,
            prefs,
            theme,
            sync,
            sync_rx: None,
            remote_rx: None,
            screen: Screen::Login,
            login: TextInput::new(MAX_SECRET_LEN),
            login_error: None,
            session: None,
            connection: None,
            status: String::new(),
            board_geometry: None,
            should_quit: false,
        }
    }

    pub fn attach_sync(&mut self, receiver: mpsc::Receiver<SyncEvent>) {
        self.sync_rx = Some(receiver);
    }

    pub fn attach_remote(&mut self, receiver: mpsc::Receiver<RemoteEvent>) {
        self.remote_rx = Some(receiver);
    }

    pub async fn run(&mut self) -> Result<()> {
        match self.identities.load(&self.roster) {
            Ok(Some(identity)) => {
                info!(player = %identity, "Restoring saved identity");
                self.begin_session(identity);
            }
            Ok(None) => self.set_status("Enter your access code"),
            Err(err) => {
                warn!("Saved identity unreadable: {err:#}");
                self.set_status("Enter your access code");
            }
        }

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableMouseCapture,
            EnableFocusChange
        )
        .context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal).await;
        restore_terminal(&mut terminal)?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        let mut sync_rx = self.sync_rx.take();
        let mut remote_rx = self.remote_rx.take();

        loop {
            terminal.draw(|frame| ui::draw(frame, self))?;
            if self.should_quit {
                break;
            }

            let mut sync_closed = false;
            let mut remote_closed = false;
            tokio::select! {
                maybe_event = event_rx.recv() => {
                    if !self.process_app_event(maybe_event) {
                        break;
                    }
                }
                maybe_sync = recv_or_wait(&mut sync_rx) => {
                    match maybe_sync {
                        Some(event) => self.handle_sync_event(event),
                        None => sync_closed = true,
                    }
                }
                maybe_remote = recv_or_wait(&mut remote_rx) => {
                    match maybe_remote {
                        Some(event) => self.handle_remote_event(event),
                        None => remote_closed = true,
                    }
                }
            }
            if sync_closed {
                warn!("Sync channel closed");
                sync_rx = None;
            }
            if remote_closed {
                warn!("Realtime channel closed");
                remote_rx = None;
            }

            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                self.handle_input(event);
                true
            }
            Some(AppEvent::Tick) => {
                self.handle_tick();
                true
            }
            None => false,
        }
    }

    fn handle_tick(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let now = now_ms();
        if let Some(outcome) = session.state.check_flag(now) {
            info!(outcome = outcome.describe(), "Clock ran out");
            session.redraw_board();
        }
        session.chat.prune(now);
        session.announce();
    }

    fn handle_sync_event(&mut self, event: SyncEvent) {
        let Some(session) = self.session.as_mut() else {
            debug!("Ignoring sync event while logged out");
            return;
        };
        let status = match event {
            SyncEvent::Loaded {
                record,
                chat,
                source,
            } => {
                let result = session.apply_record(&record);
                session.chat.load(chat);
                session.loaded = true;
                info!(?source, render = result.render_needed, "Game loaded");
                match source {
                    LoadSource::Network => Some("Game loaded".to_string()),
                    LoadSource::Cache => Some("Offline: showing the last saved game".to_string()),
                }
            }
            SyncEvent::Unavailable(reason) => {
                session.loaded = true;
                Some(format!("Backend unavailable: {reason}"))
            }
            SyncEvent::Refreshed { record, chat } => {
                let result = session.apply_record(&record);
                session.chat.load(chat);
                debug!(render = result.render_needed, "Refetched after resume");
                None
            }
            SyncEvent::ChatCleared => {
                session.chat.clear_local();
                Some("Chat cleared".to_string())
            }
        };
        session.announce();
        if let Some(status) = status {
            self.set_status(status);
        }
    }

    fn handle_remote_event(&mut self, event: RemoteEvent) {
        if let RemoteEvent::Status(status) = event {
            self.connection = Some(status);
            match status {
                ConnectionStatus::Joined => self.set_status("Live updates connected"),
                ConnectionStatus::Closed | ConnectionStatus::Errored => {
                    self.set_status("Live updates lost; press r to reconnect")
                }
                ConnectionStatus::Connecting => {}
            }
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match event {
            RemoteEvent::GameUpdated(record) => {
                let result = session.apply_record(&record);
                debug!(
                    render = result.render_needed,
                    reset = result.position_reset,
                    "Remote game update"
                );
                session.announce();
            }
            RemoteEvent::ChatInserted(message) => {
                session.chat.push(
                    message,
                    session.state.identity().as_str(),
                    session.chat_open,
                    now_ms(),
                );
            }
            RemoteEvent::ChatDeleted(id) => {
                session.chat.remove(id);
            }
            RemoteEvent::Status(_) => {}
        }
    }

    fn handle_input(&mut self, event: Event) {
        match event {
            Event::Key(key) => {
                if key.kind == KeyEventKind::Release {
                    return;
                }
                if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
                    self.should_quit = true;
                    return;
                }
                match self.screen {
                    Screen::Login => self.handle_login_key(key),
                    Screen::Game => self.handle_game_key(key),
                }
            }
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::FocusGained => {
                if self.session.is_some() {
                    debug!("Focus regained; refreshing");
                    self.sync.spawn_resume();
                }
            }
            Event::FocusLost | Event::Resize(_, _) | Event::Paste(_) => {}
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => self.submit_login(),
            KeyCode::Left => self.login.move_cursor(-1),
            KeyCode::Right => self.login.move_cursor(1),
            KeyCode::Home => self.login.move_home(),
            KeyCode::End => self.login.move_end(),
            KeyCode::Backspace => self.login.backspace(),
            KeyCode::Delete => self.login.delete(),
            KeyCode::Char(ch) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    self.login.insert(ch);
                }
            }
            _ => {}
        }
    }

    fn submit_login(&mut self) {
        match self.gate.authenticate(self.login.value()) {
            Ok(identity) => {
                self.login.clear();
                self.login_error = None;
                if let Err(err) = self.identities.persist(&identity) {
                    warn!("Failed to remember identity: {err:#}");
                }
                self.begin_session(identity);
            }
            Err(AuthError::Empty) => {}
            Err(err) => {
                self.login_error = Some(err.to_string());
                self.login.clear();
            }
        }
    }

    fn begin_session(&mut self, identity: Identity) {
        let state = GameState::new(identity, self.roster.clone());
        self.session = Some(Session::new(state));
        self.screen = Screen::Game;
        self.set_status("Loading game…");
        self.sync.spawn_initial();
    }

    fn logout(&mut self) {
        if let Err(err) = self.identities.clear() {
            warn!("Failed to forget identity: {err:#}");
        }
        if let Some(session) = self.session.take() {
            info!(player = %session.state.identity(), "Signed out");
        }
        self.board_geometry = None;
        self.screen = Screen::Login;
        self.set_status("Signed out");
    }

    fn handle_game_key(&mut self, key: KeyEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.modal.is_some() {
            self.handle_modal_key(key);
            return;
        }
        if session.chat_focus {
            self.handle_chat_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => session.cursor.shift(-1, 0),
            KeyCode::Down | KeyCode::Char('j') => session.cursor.shift(1, 0),
            KeyCode::Left | KeyCode::Char('h') => session.cursor.shift(0, -1),
            KeyCode::Right | KeyCode::Char('l') => session.cursor.shift(0, 1),
            KeyCode::Enter | KeyCode::Char(' ') => self.activate_cursor(),
            KeyCode::Esc => {
                if session.state.selection().is_some() {
                    session.state.clear_selection();
                    session.redraw_board();
                }
            }
            KeyCode::Char('[') => session.step_history(|state, len| state.cursor_mut().step_back(len)),
            KeyCode::Char(']') => {
                session.step_history(|state, len| state.cursor_mut().step_forward(len))
            }
            KeyCode::Home => session.step_history(|state, len| state.cursor_mut().jump_start(len)),
            KeyCode::End => session.step_history(|state, _| state.cursor_mut().jump_live()),
            KeyCode::Char('f') => {
                session.state.toggle_flip();
                session.redraw_board();
            }
            KeyCode::Char('n') => session.modal = Some(Modal::NewGame(NewGameModal::new())),
            KeyCode::Char('c') => {
                session.chat_open = true;
                session.chat_focus = true;
                session.chat.open_panel();
            }
            KeyCode::Char('C') => {
                session.chat_open = false;
                session.chat_focus = false;
            }
            KeyCode::Char('?') => session.modal = Some(Modal::Help),
            KeyCode::Char('r') => {
                self.sync.spawn_resume();
                self.set_status("Refreshing…");
            }
            KeyCode::Char('t') => self.cycle_theme(),
            KeyCode::Char('L') => self.logout(),
            _ => {}
        }
    }

    fn activate_cursor(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let square = session.cursor.square(session.state.flipped());
        let status = match activate(&mut session.state, square, now_ms()) {
            InputOutcome::Ignored => {
                if !session.state.cursor().is_live() {
                    Some("Viewing history; press End to return to the game")
                } else if session.state.outcome().is_none() && !session.state.is_my_turn() {
                    Some("Waiting for your opponent")
                } else {
                    None
                }
            }
            InputOutcome::Selected(_) => {
                session.redraw_board();
                None
            }
            InputOutcome::Moved(patch) => {
                session.redraw_board();
                self.sync.push_patch(patch);
                session.announce();
                Some("")
            }
            InputOutcome::Rejected => {
                session.redraw_board();
                Some("Illegal move")
            }
        };
        if let Some(status) = status {
            self.set_status(status);
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        let Some((row, col)) = self
            .board_geometry
            .and_then(|geometry| geometry.hit(mouse.column, mouse.row))
        else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.modal.is_some() {
            return;
        }
        session.chat_focus = false;
        session.cursor = BoardCursor { row, col };
        self.activate_cursor();
    }

    fn handle_modal_key(&mut self, key: KeyEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(modal) = session.modal.as_mut() else {
            return;
        };
        match modal {
            Modal::NewGame(dialog) => match key.code {
                KeyCode::Esc => session.modal = None,
                KeyCode::Left | KeyCode::Char('h') => dialog.shift_colour(-1),
                KeyCode::Right | KeyCode::Char('l') | KeyCode::Tab => dialog.shift_colour(1),
                KeyCode::Char('w') => dialog.colour = Some(ColourChoice::White),
                KeyCode::Char('b') => dialog.colour = Some(ColourChoice::Black),
                KeyCode::Char('r') => dialog.colour = Some(ColourChoice::Random),
                KeyCode::Up | KeyCode::Char('k') => dialog.shift_time(-1),
                KeyCode::Down | KeyCode::Char('j') => dialog.shift_time(1),
                KeyCode::Enter => {
                    let dialog = dialog.clone();
                    self.confirm_new_game(&dialog);
                }
                _ => {}
            },
            Modal::GameOver(_) | Modal::Help => match key.code {
                KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') | KeyCode::Char('q') => {
                    session.modal = None
                }
                _ => {}
            },
        }
    }

    fn confirm_new_game(&mut self, dialog: &NewGameModal) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(side) = dialog.resolve(rand::random_bool(0.5)) else {
            self.set_status("Pick a colour first");
            return;
        };
        let minutes = dialog.minutes();
        let patch = session
            .state
            .start_new_game(side, minutes * 60_000, now_ms());
        session.modal = None;
        session.cursor = BoardCursor::default();
        session.redraw_board();
        self.sync.push_patch(patch);
        info!(?side, minutes, "Started a new game");
        let clock = if minutes == 0 {
            "no clock".to_string()
        } else {
            format!("{minutes} min")
        };
        self.set_status(format!("New game: you play {side:?}, {clock}"));
    }

    fn handle_chat_key(&mut self, key: KeyEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if key.modifiers == KeyModifiers::CONTROL {
            if let KeyCode::Char('l') = key.code {
                self.sync.clear_chat();
                self.set_status("Clearing chat…");
            }
            return;
        }
        let input = &mut session.chat_input;
        match key.code {
            KeyCode::Esc => session.chat_focus = false,
            KeyCode::Enter => {
                if let Some(text) = prepare_outgoing(input.value()) {
                    self.sync.send_chat(session.state.identity(), text);
                }
                input.clear();
            }
            KeyCode::Left => input.move_cursor(-1),
            KeyCode::Right => input.move_cursor(1),
            KeyCode::Home => input.move_home(),
            KeyCode::End => input.move_end(),
            KeyCode::Backspace => input.backspace(),
            KeyCode::Delete => input.delete(),
            KeyCode::Char(ch) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    input.insert(ch);
                }
            }
            _ => {}
        }
    }

    fn cycle_theme(&mut self) {
        let name = self.prefs.cycle_theme().to_string();
        self.theme = Theme::from_prefs(&self.prefs);
        if let Err(err) = self.prefs_store.persist(&self.prefs) {
            warn!("Failed to save preferences: {err:#}");
        }
        self.set_status(format!("Theme: {name}"));
    }
}

async fn recv_or_wait<T>(receiver: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        DisableMouseCapture,
        LeaveAlternateScreen
    )
    .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_game_dialog_requires_a_colour() {
        let mut dialog = NewGameModal::new();
        assert_eq!(dialog.minutes(), 5);
        assert_eq!(dialog.resolve(true), None);

        dialog.shift_colour(1);
        assert_eq!(dialog.colour, Some(ColourChoice::White));
        dialog.shift_colour(-1);
        assert_eq!(dialog.colour, Some(ColourChoice::Random));
        assert_eq!(dialog.resolve(true), Some(Side::White));
        assert_eq!(dialog.resolve(false), Some(Side::Black));

        dialog.shift_time(10);
        assert_eq!(dialog.minutes(), 15);
        dialog.shift_time(-10);
        assert_eq!(dialog.minutes(), 0);
    }

    #[test]
    fn game_over_title_depends_on_own_colour() {
        let mate = Outcome::Checkmate {
            winner: Side::Black,
        };
        assert_eq!(GameOverModal::new(mate, Side::Black).title, "Victory");
        assert_eq!(GameOverModal::new(mate, Side::White).title, "Defeat");
        let draw = GameOverModal::new(Outcome::Stalemate, Side::White);
        assert_eq!(draw.title, "Draw");
        assert!(DRAW_MESSAGES.contains(&draw.message.as_str()));
    }

    #[test]
    fn board_hit_testing() {
        let geometry = BoardGeometry {
            x: 3,
            y: 2,
            cell_width: 5,
            cell_height: 2,
        };
        assert_eq!(geometry.hit(3, 2), Some((0, 0)));
        assert_eq!(geometry.hit(42, 17), Some((7, 7)));
        assert_eq!(geometry.hit(43, 2), None);
        assert_eq!(geometry.hit(2, 5), None);
    }
}
