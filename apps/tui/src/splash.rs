pub const BANNER: &[&str] = &[
    "██████  ███████ ███████ ██      ███████ ███    ███ ██ ████████ ██   ██",
    "██   ██ ██      ██      ██      ██      ████  ████ ██    ██    ██   ██",
    "██████  █████   █████   ██      ███████ ██ ████ ██ ██    ██    ███████",
    "██   ██ ██      ██      ██           ██ ██  ██  ██ ██    ██    ██   ██",
    "██   ██ ███████ ███████ ███████ ███████ ██      ██ ██    ██    ██   ██",
];

pub const TAGLINE: &str = "prompt · generate · select · splice";
pub const HINT: &str = "▶ Press ENTER to continue ◀";
