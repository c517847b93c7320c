use crate::balancer::team_average;
use crate::error::{DrawError, Result};
use serde::{Deserialize, Serialize};

/// Lowest and highest skill scores
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// A rostered player
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: u32,
    pub name: String,
    /// Skill score, 1 (weakest) to 5 (strongest)
    pub score: u8,
    /// Loose entry filling an empty spot ("avulso")
    #[serde(default)]
    pub is_substitute: bool,
}

impl Player {
    pub fn new(id: u32, name: &str, score: u8) -> Self {
        Self {
            id,
            name: name.to_string(),
            score,
            is_substitute: false,
        }
    }

    pub fn substitute(id: u32, name: &str, score: u8) -> Self {
        Self {
            is_substitute: true,
            ..Self::new(id, name, score)
        }
    }
}

/// Display identity of a drawn team
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TeamIdentity {
    pub id: &'static str,
    pub name: &'static str,
    pub color: &'static str,
}

/// Fixed team palette, cycled by team index
pub const TEAM_PALETTE: [TeamIdentity; 4] = [
    TeamIdentity { id: "time_verde", name: "Verde", color: "bg-green-600" },
    TeamIdentity { id: "time_vermelho", name: "Vermelho", color: "bg-red-600" },
    TeamIdentity { id: "time_cinza", name: "Cinza", color: "bg-gray-600" },
    TeamIdentity { id: "time_amarelo", name: "Amarelo", color: "bg-yellow-500" },
];

impl TeamIdentity {
    pub fn for_index(index: usize) -> TeamIdentity {
        TEAM_PALETTE[index % TEAM_PALETTE.len()]
    }
}

/// A drawn team
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Members, strongest first
    pub players: Vec<Player>,
    /// Mean score rounded to two decimals
    pub average: f64,
}

impl Team {
    pub fn new(identity: TeamIdentity, players: Vec<Player>) -> Self {
        let mut team = Self {
            id: identity.id.to_string(),
            name: identity.name.to_string(),
            color: identity.color.to_string(),
            players,
            average: 0.0,
        };
        team.refresh();
        team
    }

    pub fn size(&self) -> usize {
        self.players.len()
    }

    pub fn contains(&self, player_id: u32) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    /// Re-sort members by descending score and recompute the average
    pub fn refresh(&mut self) {
        // sort_by is stable, equal scores keep their draw order
        self.players.sort_by(|a, b| b.score.cmp(&a.score));
        self.average = team_average(&self.players);
    }
}

/// Where a roster player stands after a draw
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "team_id")]
pub enum PlayerStatus {
    /// Selected but currently in no team
    Unassigned,
    InTeam(String),
    /// Not selected for the draw
    Absent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatusEntry {
    pub player: Player,
    pub status: PlayerStatus,
    pub originally_selected: bool,
}

/// Result of one balancer run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrawOutcome {
    pub teams: Vec<Team>,
    /// Outer attempts consumed by the search
    pub attempts: usize,
    /// Spread of the returned partition
    pub spread: f64,
    /// True when no valid partition was found and teams were sliced blindly
    pub used_fallback: bool,
}

impl DrawOutcome {
    pub fn empty() -> Self {
        Self {
            teams: Vec::new(),
            attempts: 0,
            spread: 0.0,
            used_fallback: false,
        }
    }
}

/// Draw configuration parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// Smallest selection that can be drawn
    pub min_players: usize,
    /// Largest selection that can be drawn
    pub max_players: usize,
    pub ideal_team_size: usize,
    pub max_teams: usize,

    /// Randomized restarts per draw
    pub max_attempts: usize,
    /// Swap passes per restart
    pub max_improvement_iterations: usize,
    /// A swap must shrink the spread by more than this
    pub swap_tolerance: f64,

    /// Selections above this size use the large-draw target
    pub large_draw_threshold: usize,
    /// Stop searching once the spread drops below these
    pub large_draw_target_spread: f64,
    pub small_draw_target_spread: f64,

    /// Score bounds; at most one player of each per team
    pub min_score: u8,
    pub max_score: u8,

    /// Maximum team size when editing teams by hand
    pub team_capacity: usize,
    /// Seconds a non-admin must wait between draws
    pub cooldown_secs: u64,
    pub admin_code: String,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            min_players: 10,
            max_players: 20,
            ideal_team_size: 5,
            max_teams: 4,
            max_attempts: 800,
            max_improvement_iterations: 50,
            swap_tolerance: 0.001,
            large_draw_threshold: 15,
            large_draw_target_spread: 0.2,
            small_draw_target_spread: 0.5,
            min_score: MIN_SCORE,
            max_score: MAX_SCORE,
            team_capacity: 5,
            cooldown_secs: 30 * 60,
            admin_code: "raphaeljogador".to_string(),
        }
    }
}

impl DrawConfig {
    /// Early-exit threshold for a draw of `player_count` players
    pub fn target_spread(&self, player_count: usize) -> f64 {
        if player_count > self.large_draw_threshold {
            self.large_draw_target_spread
        } else {
            self.small_draw_target_spread
        }
    }

    pub fn accepts_player_count(&self, player_count: usize) -> bool {
        (self.min_players..=self.max_players).contains(&player_count)
    }

    pub fn accepts_score(&self, score: u8) -> bool {
        (self.min_score..=self.max_score).contains(&score)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_players == 0 || self.min_players > self.max_players {
            return Err(DrawError::Config(format!(
                "player bounds {}..={} are empty",
                self.min_players, self.max_players
            )));
        }
        if self.ideal_team_size == 0 || self.max_teams == 0 {
            return Err(DrawError::Config(
                "team size and team count must be positive".to_string(),
            ));
        }
        if self.min_score >= self.max_score {
            return Err(DrawError::Config(format!(
                "min_score {} must be below max_score {}",
                self.min_score, self.max_score
            )));
        }
        if self.max_attempts == 0 {
            return Err(DrawError::Config("max_attempts must be positive".to_string()));
        }
        for (name, target) in [
            ("large_draw_target_spread", self.large_draw_target_spread),
            ("small_draw_target_spread", self.small_draw_target_spread),
        ] {
            if !(target.is_finite() && target >= 0.0) {
                return Err(DrawError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, target
                )));
            }
        }
        if self.team_capacity == 0 {
            return Err(DrawError::Config("team_capacity must be positive".to_string()));
        }
        if !(self.swap_tolerance >= 0.0) {
            return Err(DrawError::Config("swap_tolerance must be non-negative".to_string()));
        }
        Ok(())
    }
}

/// The regular group plus six substitute slots, in roster order
pub fn default_roster() -> Vec<Player> {
    let regulars = [
        (1, "Dente", 2),
        (2, "Matsuura", 4),
        (3, "Russo", 3),
        (4, "Jordan", 2),
        (5, "Thiago", 5),
        (6, "Jubao", 3),
        (7, "Igor", 4),
        (8, "Gracco", 1),
        (9, "Beligol", 1),
        (10, "Ale", 3),
        (11, "Jonas", 3),
        (12, "Leo", 4),
        (13, "Fuinha", 4),
        (14, "Abel", 4),
        (15, "Vitor", 5),
        (16, "Adriano", 3),
        (17, "Poneis", 3),
        (18, "Samir", 5),
        (19, "Boy", 5),
        (20, "Magaiver", 4),
        (21, "Caio", 3),
        (22, "Gu Borges", 2),
        (23, "Zé", 4),
        (24, "Rapha", 1),
    ];

    let mut roster: Vec<Player> = regulars
        .iter()
        .map(|&(id, name, score)| Player::new(id, name, score))
        .collect();
    roster.extend((1..=6).map(|i| Player::substitute(24 + i, &format!("Avulso {}", i), 3)));

    sort_roster(&mut roster);
    roster
}

/// Regulars before substitutes, then strongest first, then by name
pub fn sort_roster(roster: &mut [Player]) {
    roster.sort_by(|a, b| {
        a.is_substitute
            .cmp(&b.is_substitute)
            .then_with(|| b.score.cmp(&a.score))
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roster_order() {
        let roster = default_roster();
        assert_eq!(roster.len(), 30);

        // Regulars first, strongest first, alphabetical within a score
        let first: Vec<&str> = roster.iter().take(4).map(|p| p.name.as_str()).collect();
        assert_eq!(first, vec!["Boy", "Samir", "Thiago", "Vitor"]);

        let first_sub = roster.iter().position(|p| p.is_substitute).unwrap();
        assert_eq!(first_sub, 24);
        assert!(roster[first_sub..].iter().all(|p| p.is_substitute && p.score == 3));
        assert_eq!(roster[first_sub].name, "Avulso 1");
    }

    #[test]
    fn test_palette_cycles() {
        assert_eq!(TeamIdentity::for_index(0).name, "Verde");
        assert_eq!(TeamIdentity::for_index(3).name, "Amarelo");
        assert_eq!(TeamIdentity::for_index(4).id, "time_verde");
    }

    #[test]
    fn test_team_refresh_sorts_and_averages() {
        let team = Team::new(
            TeamIdentity::for_index(1),
            vec![
                Player::new(1, "a", 2),
                Player::new(2, "b", 5),
                Player::new(3, "c", 2),
            ],
        );
        let ids: Vec<u32> = team.players.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(team.average, 3.0);
        assert_eq!(team.id, "time_vermelho");
    }

    #[test]
    fn test_config_validation() {
        assert!(DrawConfig::default().validate().is_ok());

        let config = DrawConfig { min_players: 21, ..DrawConfig::default() };
        assert!(matches!(config.validate(), Err(DrawError::Config(_))));

        let config = DrawConfig { min_score: 5, max_score: 5, ..DrawConfig::default() };
        assert!(config.validate().is_err());

        let config = DrawConfig { max_attempts: 0, ..DrawConfig::default() };
        assert!(matches!(config.validate(), Err(DrawError::Config(_))));

        for bad in [-0.1, f64::NAN, f64::INFINITY] {
            let config = DrawConfig { large_draw_target_spread: bad, ..DrawConfig::default() };
            assert!(config.validate().is_err(), "large target {}", bad);
            let config = DrawConfig { small_draw_target_spread: bad, ..DrawConfig::default() };
            assert!(config.validate().is_err(), "small target {}", bad);
        }
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config: DrawConfig = serde_json::from_str(r#"{"cooldown_secs": 60}"#).unwrap();
        assert_eq!(config.cooldown_secs, 60);
        assert_eq!(config.max_attempts, 800);
        assert_eq!(config.target_spread(16), 0.2);
        assert_eq!(config.target_spread(15), 0.5);
    }
}
