use ratatui::style::Color;

pub const ACCENT: Color = Color::Rgb(0xc9, 0xa2, 0x27);
pub const BORDER: Color = Color::Rgb(0x4a, 0x5f, 0x4a);
pub const DIM: Color = Color::Rgb(0x6b, 0x72, 0x80);
pub const SUCCESS: Color = Color::Rgb(0x7f, 0xb0, 0x69);
pub const ERROR: Color = Color::Rgb(0xd9, 0x6c, 0x6c);
pub const TEXT: Color = Color::Rgb(0xe0, 0xe0, 0xe0);
