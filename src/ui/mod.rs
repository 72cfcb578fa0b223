pub mod conversation;

use crate::events::Theme;
use ratatui::style::Color;

/// Colors for one theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub user: Color,
    pub model: Color,
    pub error: Color,
    pub accent: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Palette {
                background: Color::Reset,
                text: Color::White,
                muted: Color::DarkGray,
                user: Color::Cyan,
                model: Color::Green,
                error: Color::Rgb(0xd6, 0x29, 0x39),
                accent: Color::Blue,
            },
            Theme::Light => Palette {
                background: Color::Rgb(0xf5, 0xf5, 0xf5),
                text: Color::Black,
                muted: Color::Gray,
                user: Color::Blue,
                model: Color::Rgb(0x1a, 0x73, 0x3c),
                error: Color::Rgb(0xd6, 0x29, 0x39),
                accent: Color::Magenta,
            },
        }
    }
}
