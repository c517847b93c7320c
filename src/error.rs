use thiserror::Error;

/// Errors surfaced by the draw session and the WASM layer.
///
/// The balancing core does not use these: an impossible draw is an empty
/// team list there.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DrawError {
    #[error("Selected {selected} players, a draw needs between {min} and {max}")]
    InvalidSelectionSize { selected: usize, min: usize, max: usize },

    #[error("Draw is on cooldown for another {remaining_secs}s")]
    CooldownActive { remaining_secs: u64 },

    #[error("Admin mode is required for this operation")]
    AdminRequired,

    #[error("Incorrect admin code")]
    InvalidAdminCode,

    #[error("Player {0} does not exist")]
    UnknownPlayer(u32),

    #[error("Team {0} does not exist")]
    UnknownTeam(String),

    #[error("Team {team_id} already has {capacity} players")]
    TeamFull { team_id: String, capacity: usize },

    #[error("Score {score} is outside {min}..={max}")]
    InvalidScore { score: u8, min: u8, max: u8 },

    #[error("Player name cannot be empty")]
    InvalidName,

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DrawError>;
