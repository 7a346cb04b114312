/// Single-line editable text with a cursor, counted in chars.
#[derive(Debug, Clone)]
pub struct TextInput {
    input: String,
    cursor: usize,
    max_chars: usize,
}

impl TextInput {
    pub fn new(max_chars: usize) -> Self {
        Self {
            input: String::new(),
            cursor: 0,
            max_chars,
        }
    }

    pub fn value(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.input.chars().count()
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.len() as isize;
        self.cursor = (self.cursor as isize + delta).clamp(0, len) as usize;
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.len();
    }

    pub fn insert(&mut self, ch: char) {
        if self.len() >= self.max_chars || ch.is_control() {
            return;
        }
        let at = self.byte_offset(self.cursor);
        self.input.insert(at, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_offset(self.cursor);
        self.input.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.len() {
            let at = self.byte_offset(self.cursor);
            self.input.remove(at);
        }
    }

    /// Text and cursor column, keeping the cursor inside `width` columns.
    pub fn visible(&self, width: usize) -> (String, usize) {
        let width = width.max(1);
        let skip = (self.cursor + 1).saturating_sub(width);
        let text: String = self.input.chars().skip(skip).take(width).collect();
        (text, self.cursor - skip)
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_index)
            .map_or(self.input.len(), |(offset, _)| offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_handles_multibyte_chars() {
        let mut input = TextInput::new(10);
        for ch in "gg👍".chars() {
            input.insert(ch);
        }
        input.move_cursor(-1);
        input.insert('!');
        assert_eq!(input.value(), "gg!👍");
        input.delete();
        assert_eq!(input.value(), "gg!");
        input.move_home();
        input.backspace();
        input.delete();
        assert_eq!(input.value(), "g!");
        assert_eq!(input.cursor(), 0);
    }

    #[test]
    fn insert_stops_at_limit() {
        let mut input = TextInput::new(3);
        for ch in "abcdef".chars() {
            input.insert(ch);
        }
        assert_eq!(input.value(), "abc");
    }

    #[test]
    fn visible_window_follows_cursor() {
        let mut input = TextInput::new(20);
        for ch in "abcdefgh".chars() {
            input.insert(ch);
        }
        assert_eq!(input.visible(4), ("fgh".to_string(), 3));
        input.move_home();
        assert_eq!(input.visible(4), ("abcd".to_string(), 0));
    }
}
