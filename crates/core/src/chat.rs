//! Chat log scoped to the shared game.

use chess::Color;

use crate::models::ChatMessage;

/// Longest message shown as a reaction overlay.
pub const REACTION_MAX_CHARS: usize = 4;
/// How long a reaction stays fully visible.
pub const REACTION_DISPLAY_MS: i64 = 2_000;
/// Fade-out time after the display period.
pub const REACTION_FADE_MS: i64 = 1_000;
/// Longest accepted outgoing message.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Short message floating next to the sender's side of the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    /// Sender identity.
    pub sender: String,
    /// Reaction text.
    pub text: String,
    /// Epoch milliseconds when it appeared.
    pub shown_at: i64,
}

impl Reaction {
    /// Whether the reaction is still on screen.
    pub fn is_visible(&self, now: i64) -> bool {
        now - self.shown_at < REACTION_DISPLAY_MS + REACTION_FADE_MS
    }

    /// Whether the reaction is in its fade-out period.
    pub fn is_fading(&self, now: i64) -> bool {
        let age = now - self.shown_at;
        (REACTION_DISPLAY_MS..REACTION_DISPLAY_MS + REACTION_FADE_MS).contains(&age)
    }
}

/// Which side of the board a reaction belongs to.
pub fn reaction_side(reaction: &Reaction, own_name: &str, own_color: Color) -> Color {
    if reaction.sender == own_name {
        own_color
    } else {
        !own_color
    }
}

/// Visible chat messages plus unread and reaction state.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
    unread: bool,
    reactions: Vec<Reaction>,
}

impl ChatLog {
    /// Replace the list with the initial history.
    pub fn load(&mut self, mut messages: Vec<ChatMessage>) {
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        messages.dedup_by_key(|message| message.id);
        self.messages = messages;
    }

    /// Append an incoming message.
    ///
    /// Returns `false` when the message was already listed.
    pub fn push(&mut self, message: ChatMessage, own_name: &str, panel_open: bool, now: i64) -> bool {
        if self.messages.iter().any(|existing| existing.id == message.id) {
            return false;
        }
        let from_self = message.sender == own_name;
        if !panel_open && !from_self {
            self.unread = true;
        }
        let text = message.text.trim();
        if !text.is_empty() && text.chars().count() <= REACTION_MAX_CHARS {
            self.reactions.retain(|reaction| reaction.sender != message.sender);
            self.reactions.push(Reaction {
                sender: message.sender.clone(),
                text: text.to_string(),
                shown_at: now,
            });
        }
        self.messages.push(message);
        true
    }

    /// Drop a message removed on the backend.
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.messages.len();
        self.messages.retain(|message| message.id != id);
        self.messages.len() != before
    }

    /// Empty the visible list after a bulk clear.
    pub fn clear_local(&mut self) {
        self.messages.clear();
        self.reactions.clear();
        self.unread = false;
    }

    /// Mark everything as read.
    pub fn open_panel(&mut self) {
        self.unread = false;
    }

    /// Whether a message arrived while the panel was closed.
    pub fn has_unread(&self) -> bool {
        self.unread
    }

    /// Visible messages, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Reactions still on screen.
    pub fn active_reactions(&self, now: i64) -> impl Iterator<Item = &Reaction> {
        self.reactions
            .iter()
            .filter(move |reaction| reaction.is_visible(now))
    }

    /// Forget reactions that have faded out.
    pub fn prune(&mut self, now: i64) {
        self.reactions.retain(|reaction| reaction.is_visible(now));
    }
}

/// Trim and validate an outgoing message; `None` means nothing to send.
pub fn prepare_outgoing(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_MESSAGE_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(id: i64, sender: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id,
            game_id: 1,
            sender: sender.to_string(),
            text: text.to_string(),
            created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        }
    }

    #[test]
    fn unread_only_for_closed_panel_and_other_sender() {
        let mut log = ChatLog::default();
        log.push(message(1, "Alice", "hello there"), "Alice", false, 0);
        assert!(!log.has_unread());
        log.push(message(2, "Bob", "hi Alice"), "Alice", true, 0);
        assert!(!log.has_unread());
        log.push(message(3, "Bob", "ready?"), "Alice", false, 0);
        assert!(log.has_unread());
        log.open_panel();
        assert!(!log.has_unread());
        assert_eq!(log.messages().len(), 3);
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut log = ChatLog::default();
        assert!(log.push(message(1, "Bob", "gg"), "Alice", true, 0));
        assert!(!log.push(message(1, "Bob", "gg"), "Alice", true, 0));
        assert_eq!(log.messages().len(), 1);
    }

    #[test]
    fn short_messages_become_expiring_reactions() {
        let mut log = ChatLog::default();
        log.push(message(1, "Bob", " gg "), "Alice", true, 1_000);
        log.push(message(2, "Bob", "good game"), "Alice", true, 1_000);
        let active: Vec<_> = log.active_reactions(1_500).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].text, "gg");
        assert!(!active[0].is_fading(1_500));
        assert!(active[0].is_fading(3_500));
        assert_eq!(log.active_reactions(4_000).count(), 0);
        log.prune(4_000);
        assert_eq!(log.active_reactions(0).count(), 0);
    }

    #[test]
    fn reaction_side_follows_sender() {
        let reaction = Reaction {
            sender: "Bob".to_string(),
            text: "!!".to_string(),
            shown_at: 0,
        };
        assert_eq!(reaction_side(&reaction, "Alice", Color::White), Color::Black);
        assert_eq!(reaction_side(&reaction, "Bob", Color::White), Color::White);
    }

    #[test]
    fn deletions_and_clear() {
        let mut log = ChatLog::default();
        log.load(vec![message(2, "Bob", "second"), message(1, "Alice", "first")]);
        assert_eq!(log.messages()[0].id, 1);
        assert!(log.remove(1));
        assert!(!log.remove(1));
        assert_eq!(log.messages().len(), 1);
        log.clear_local();
        assert!(log.messages().is_empty());
    }

    #[test]
    fn outgoing_is_trimmed_and_bounded() {
        assert_eq!(prepare_outgoing("   "), None);
        assert_eq!(prepare_outgoing(" hi "), Some("hi".to_string()));
        let long = "x".repeat(MAX_MESSAGE_CHARS + 10);
        assert_eq!(
            prepare_outgoing(&long).map(|text| text.len()),
            Some(MAX_MESSAGE_CHARS)
        );
    }
}
