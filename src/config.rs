//! Runtime configuration
//!
//! Everything is read from the environment once at startup. Unset variables
//! keep their defaults; malformed values are errors.

use log::debug;

use crate::input::{KeymapNames, Modifiers};

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: invalid number {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var}: invalid color {value:?}")]
    InvalidColor { var: &'static str, value: String },
    #[error("Unknown modifier {0:?} (expected logo, alt, ctrl or shift)")]
    InvalidModifier(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub seat_name: String,
    /// Rule names handed to the keymap compiler
    pub keymap: KeymapNames,
    /// Key repeat rate (characters per second)
    pub repeat_rate: i32,
    /// Key repeat delay (milliseconds)
    pub repeat_delay: i32,
    /// RGBA clear color
    pub background: [f32; 4],
    /// Cursor shown when the pointer is over no window
    pub default_cursor: String,
    /// Modifier that must be held for compositor bindings
    pub mod_key: Modifiers,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seat_name: "seat0".to_string(),
            keymap: KeymapNames::default(),
            repeat_rate: 25,
            repeat_delay: 600,
            background: [0.3, 0.3, 0.3, 1.0],
            default_cursor: "left_ptr".to_string(),
            mod_key: Modifiers::LOGO,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self {
            keymap: KeymapNames::from_lookup(&lookup),
            ..Self::default()
        };

        if let Some(seat) = lookup("XDG_SEAT") {
            config.seat_name = seat;
        }
        if let Some(rate) = lookup("DRIFTWM_REPEAT_RATE") {
            config.repeat_rate = parse_number("DRIFTWM_REPEAT_RATE", &rate)?;
        }
        if let Some(delay) = lookup("DRIFTWM_REPEAT_DELAY") {
            config.repeat_delay = parse_number("DRIFTWM_REPEAT_DELAY", &delay)?;
        }
        if let Some(color) = lookup("DRIFTWM_BACKGROUND") {
            config.background = parse_color("DRIFTWM_BACKGROUND", &color)?;
        }
        if let Some(cursor) = lookup("DRIFTWM_CURSOR") {
            config.default_cursor = cursor;
        }
        if let Some(name) = lookup("DRIFTWM_MOD") {
            config.mod_key = parse_modifier(&name)?;
        }

        debug!("Loaded config: {:?}", config);
        Ok(config)
    }
}

fn parse_number(var: &'static str, value: &str) -> Result<i32, ConfigError> {
    value
        .trim()
        .parse()
        .ok()
        .filter(|n: &i32| *n >= 0)
        .ok_or_else(|| ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        })
}

fn parse_color(var: &'static str, value: &str) -> Result<[f32; 4], ConfigError> {
    let invalid = || ConfigError::InvalidColor {
        var,
        value: value.to_string(),
    };

    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f32>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [r, g, b, a] => Ok([*r, *g, *b, *a]),
        _ => Err(invalid()),
    }
}

fn parse_modifier(name: &str) -> Result<Modifiers, ConfigError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "logo" | "super" => Ok(Modifiers::LOGO),
        "alt" => Ok(Modifiers::ALT),
        "ctrl" | "control" => Ok(Modifiers::CTRL),
        "shift" => Ok(Modifiers::SHIFT),
        _ => Err(ConfigError::InvalidModifier(name.to_string())),
    }
}
