use duochess_core::prefs::{CustomPalette, Prefs};
use ratatui::style::Color;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub primary_bg: Color,
    pub primary_fg: Color,
    pub card_bg: Color,
    pub accent: Color,
    pub muted: Color,
    pub board_light: Color,
    pub board_dark: Color,
    pub selection_bg: Color,
    pub last_move_bg: Color,
    pub hint: Color,
    pub success: Color,
    pub warning: Color,
    pub danger: Color,
    pub on_accent: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    pub fn from_prefs(prefs: &Prefs) -> Self {
        match prefs.theme.as_str() {
            "light" => Self::light(),
            "wood" => Self::wood(),
            "ocean" => Self::ocean(),
            "custom" => {
                let palette = prefs.custom.clone().unwrap_or_default();
                Self::custom(&palette)
            }
            _ => Self::dark(),
        }
    }

    fn dark() -> Self {
        Self {
            name: "dark".to_string(),
            primary_bg: Color::Rgb(0x1e, 0x1e, 0x24),
            primary_fg: Color::Rgb(0xe6, 0xe6, 0xe6),
            card_bg: Color::Rgb(0x2a, 0x2a, 0x33),
            accent: Color::Rgb(0x7a, 0xa2, 0xf7),
            muted: Color::DarkGray,
            board_light: Color::Rgb(0xb8, 0xbc, 0xc8),
            board_dark: Color::Rgb(0x6b, 0x72, 0x85),
            selection_bg: Color::Rgb(0x5b, 0x8d, 0xd9),
            last_move_bg: Color::Rgb(0xc9, 0xb4, 0x58),
            hint: Color::Rgb(0x3f, 0xa3, 0x6b),
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
            on_accent: Color::Black,
        }
    }

    fn light() -> Self {
        Self {
            name: "light".to_string(),
            primary_bg: Color::Rgb(0xf5, 0xf5, 0xf0),
            primary_fg: Color::Rgb(0x22, 0x22, 0x22),
            card_bg: Color::Rgb(0xe4, 0xe4, 0xdc),
            accent: Color::Rgb(0x2f, 0x6f, 0xb5),
            muted: Color::Gray,
            board_light: Color::Rgb(0xee, 0xee, 0xd2),
            board_dark: Color::Rgb(0x76, 0x96, 0x56),
            selection_bg: Color::Rgb(0x8c, 0xb4, 0xe8),
            last_move_bg: Color::Rgb(0xf6, 0xf6, 0x69),
            hint: Color::Rgb(0x2e, 0x7d, 0x32),
            success: Color::Rgb(0x2e, 0x7d, 0x32),
            warning: Color::Rgb(0xb2, 0x6a, 0x00),
            danger: Color::Rgb(0xc6, 0x28, 0x28),
            on_accent: Color::White,
        }
    }

    fn wood() -> Self {
        Self::custom(&CustomPalette::default()).named("wood")
    }

    fn ocean() -> Self {
        Self::custom(&CustomPalette {
            bg: "#0f2233".to_string(),
            card_bg: "#17324a".to_string(),
            board_light: "#cfe3ef".to_string(),
            board_dark: "#4f7ea3".to_string(),
            accent: "#4fc3d9".to_string(),
        })
        .named("ocean")
    }

    fn custom(palette: &CustomPalette) -> Self {
        let base = Self::dark();
        let mut theme = Self {
            name: "custom".to_string(),
            ..base.clone()
        };
        let apply = |slot: &mut Color, value: &str, key: &str| match parse_hex_color(value) {
            Some(color) => *slot = color,
            None => warn!(key, value, "Ignoring unparsable palette colour"),
        };
        apply(&mut theme.primary_bg, &palette.bg, "bg");
        apply(&mut theme.card_bg, &palette.card_bg, "cardBg");
        apply(&mut theme.board_light, &palette.board_light, "boardLight");
        apply(&mut theme.board_dark, &palette.board_dark, "boardDark");
        apply(&mut theme.accent, &palette.accent, "accent");
        theme.primary_fg = contrast_color(&theme.primary_bg, base.primary_fg);
        theme.on_accent = contrast_color(&theme.accent, base.on_accent);
        theme
    }

    fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Foreground for a piece drawn on `square_bg`.
    pub fn piece_fg(&self, square_bg: Color) -> Color {
        contrast_color(&square_bg, Color::Black)
    }
}

pub fn parse_hex_color(input: &str) -> Option<Color> {
    let trimmed = input.trim();
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

pub fn contrast_color(color: &Color, fallback: Color) -> Color {
    match color {
        Color::Rgb(r, g, b) => {
            let luminance =
                0.299 * f64::from(*r) + 0.587 * f64::from(*g) + 0.114 * f64::from(*b);
            if luminance > 186.0 {
                Color::Black
            } else {
                Color::White
            }
        }
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colours_parse_in_long_and_short_form() {
        assert_eq!(parse_hex_color("#f0d9b5"), Some(Color::Rgb(0xf0, 0xd9, 0xb5)));
        assert_eq!(parse_hex_color("abc"), Some(Color::Rgb(0xaa, 0xbb, 0xcc)));
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn custom_palette_falls_back_per_colour() {
        let prefs = Prefs {
            theme: "custom".to_string(),
            custom: Some(CustomPalette {
                bg: "not a colour".to_string(),
                board_light: "#ffffff".to_string(),
                ..CustomPalette::default()
            }),
        };
        let theme = Theme::from_prefs(&prefs);
        assert_eq!(theme.name, "custom");
        assert_eq!(theme.primary_bg, Theme::dark().primary_bg);
        assert_eq!(theme.board_light, Color::Rgb(0xff, 0xff, 0xff));
        assert_eq!(theme.piece_fg(theme.board_light), Color::Black);
    }

    #[test]
    fn unknown_theme_name_uses_dark() {
        let prefs = Prefs {
            theme: "neon".to_string(),
            custom: None,
        };
        assert_eq!(Theme::from_prefs(&prefs).name, "dark");
    }
}
