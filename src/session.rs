use crate::balancer::TeamBalancer;
use crate::error::{DrawError, Result};
use crate::types::*;
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Render a number of seconds as `MM:SS`
pub fn format_countdown(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Roster, selection and draw state of one organizer session.
///
/// Time is always passed in as Unix milliseconds, so the session never reads
/// a clock and can be persisted and restored by the host.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DrawSession {
    config: DrawConfig,
    /// All known players, in roster order
    roster: Vec<Player>,
    /// Ids picked for the next draw
    selected: HashSet<u32>,
    /// Teams from the latest draw, possibly edited by an admin
    teams: Vec<Team>,
    /// Admin mode never survives a restore
    #[serde(skip)]
    is_admin: bool,
    /// When a non-admin last drew
    last_draw_ms: Option<u64>,
    /// Whether the latest draw had to ignore the extremes rule
    last_draw_used_fallback: bool,
}

impl DrawSession {
    pub fn new(config: DrawConfig, roster: Vec<Player>) -> Result<Self> {
        config.validate()?;

        let mut seen = HashSet::new();
        for player in &roster {
            if !seen.insert(player.id) {
                return Err(DrawError::Config(format!("duplicate player id {}", player.id)));
            }
            if !config.accepts_score(player.score) {
                return Err(DrawError::InvalidScore {
                    score: player.score,
                    min: config.min_score,
                    max: config.max_score,
                });
            }
        }

        let mut roster = roster;
        sort_roster(&mut roster);

        Ok(Self {
            config,
            roster,
            selected: HashSet::new(),
            teams: Vec::new(),
            is_admin: false,
            last_draw_ms: None,
            last_draw_used_fallback: false,
        })
    }

    pub fn with_default_roster(config: DrawConfig) -> Result<Self> {
        Self::new(config, default_roster())
    }

    pub fn config(&self) -> &DrawConfig {
        &self.config
    }

    pub fn roster(&self) -> &[Player] {
        &self.roster
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn last_draw_ms(&self) -> Option<u64> {
        self.last_draw_ms
    }

    pub fn last_draw_used_fallback(&self) -> bool {
        self.last_draw_used_fallback
    }

    pub fn player(&self, player_id: u32) -> Option<&Player> {
        self.roster.iter().find(|p| p.id == player_id)
    }

    pub fn is_selected(&self, player_id: u32) -> bool {
        self.selected.contains(&player_id)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Flip a player's selection. Returns whether the player is selected
    /// afterwards; selecting past the maximum leaves the selection unchanged.
    pub fn toggle_selection(&mut self, player_id: u32) -> Result<bool> {
        if self.player(player_id).is_none() {
            return Err(DrawError::UnknownPlayer(player_id));
        }

        if self.selected.remove(&player_id) {
            return Ok(false);
        }
        if self.selected.len() >= self.config.max_players {
            debug!("Selection full, ignoring player {}", player_id);
            return Ok(false);
        }
        self.selected.insert(player_id);
        Ok(true)
    }

    /// Selected players in roster order
    pub fn selected_players(&self) -> Vec<Player> {
        self.roster
            .iter()
            .filter(|p| self.selected.contains(&p.id))
            .cloned()
            .collect()
    }

    /// Reload a draw timestamp persisted by the host
    pub fn restore_last_draw(&mut self, timestamp_ms: u64) {
        self.last_draw_ms = Some(timestamp_ms);
    }

    pub fn cooldown_remaining_secs(&self, now_ms: u64) -> u64 {
        if self.is_admin {
            return 0;
        }
        match self.last_draw_ms {
            Some(last) => {
                let elapsed = now_ms.saturating_sub(last) / 1000;
                self.config.cooldown_secs.saturating_sub(elapsed)
            }
            None => 0,
        }
    }

    pub fn check_can_draw(&self, now_ms: u64) -> Result<()> {
        let selected = self.selected.len();
        if !self.config.accepts_player_count(selected) {
            return Err(DrawError::InvalidSelectionSize {
                selected,
                min: self.config.min_players,
                max: self.config.max_players,
            });
        }

        let remaining_secs = self.cooldown_remaining_secs(now_ms);
        if remaining_secs > 0 {
            return Err(DrawError::CooldownActive { remaining_secs });
        }
        Ok(())
    }

    pub fn can_draw(&self, now_ms: u64) -> bool {
        self.check_can_draw(now_ms).is_ok()
    }

    /// Draw teams from the current selection and start the cooldown unless
    /// in admin mode
    pub fn draw(&mut self, now_ms: u64, rng: &mut impl Rng) -> Result<&[Team]> {
        self.check_can_draw(now_ms)?;

        let balancer = TeamBalancer::new(self.config.clone())?;
        let outcome = balancer.draw(&self.selected_players(), rng);

        self.teams = outcome.teams;
        self.last_draw_used_fallback = outcome.used_fallback;
        if !self.is_admin {
            self.last_draw_ms = Some(now_ms);
        }

        info!(
            "Drew {} teams from {} players (spread {:.2}, fallback {})",
            self.teams.len(),
            self.selected.len(),
            outcome.spread,
            outcome.used_fallback
        );
        Ok(&self.teams)
    }

    /// Discard drawn teams and go back to selecting
    pub fn clear_teams(&mut self) {
        self.teams.clear();
        self.last_draw_used_fallback = false;
    }

    /// A wrong code also drops any admin mode already held
    pub fn unlock_admin(&mut self, code: &str) -> Result<()> {
        if code == self.config.admin_code {
            self.is_admin = true;
            info!("Admin mode enabled");
            Ok(())
        } else {
            self.is_admin = false;
            warn!("Rejected admin code");
            Err(DrawError::InvalidAdminCode)
        }
    }

    pub fn lock_admin(&mut self) {
        self.is_admin = false;
    }

    fn require_admin(&self) -> Result<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(DrawError::AdminRequired)
        }
    }

    fn team_index(&self, team_id: &str) -> Result<usize> {
        self.teams
            .iter()
            .position(|t| t.id == team_id)
            .ok_or_else(|| DrawError::UnknownTeam(team_id.to_string()))
    }

    fn roster_index(&self, player_id: u32) -> Result<usize> {
        self.roster
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(DrawError::UnknownPlayer(player_id))
    }

    /// Put a roster player into a team, taking them out of any other team
    pub fn assign_player(&mut self, player_id: u32, team_id: &str) -> Result<()> {
        self.require_admin()?;
        let player = self.roster[self.roster_index(player_id)?].clone();
        let target = self.team_index(team_id)?;

        if self.teams[target].contains(player_id) {
            return Ok(());
        }
        if self.teams[target].size() >= self.config.team_capacity {
            return Err(DrawError::TeamFull {
                team_id: team_id.to_string(),
                capacity: self.config.team_capacity,
            });
        }

        self.remove_from_teams(player_id);
        let team = &mut self.teams[target];
        team.players.push(player);
        team.refresh();

        debug!("Moved player {} into {}", player_id, team_id);
        Ok(())
    }

    /// Take a player out of whatever team holds them
    pub fn unassign_player(&mut self, player_id: u32) -> Result<()> {
        self.require_admin()?;
        self.roster_index(player_id)?;
        self.remove_from_teams(player_id);
        Ok(())
    }

    fn remove_from_teams(&mut self, player_id: u32) {
        for team in self.teams.iter_mut().filter(|t| t.contains(player_id)) {
            team.players.retain(|p| p.id != player_id);
            team.refresh();
        }
    }

    pub fn rename_player(&mut self, player_id: u32, name: &str) -> Result<()> {
        self.require_admin()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(DrawError::InvalidName);
        }
        let idx = self.roster_index(player_id)?;
        self.roster[idx].name = name.to_string();
        self.sync_team_copies(idx);
        Ok(())
    }

    pub fn rescore_player(&mut self, player_id: u32, score: u8) -> Result<()> {
        self.require_admin()?;
        if !self.config.accepts_score(score) {
            return Err(DrawError::InvalidScore {
                score,
                min: self.config.min_score,
                max: self.config.max_score,
            });
        }
        let idx = self.roster_index(player_id)?;
        self.roster[idx].score = score;
        self.sync_team_copies(idx);
        Ok(())
    }

    fn sync_team_copies(&mut self, roster_idx: usize) {
        let updated = &self.roster[roster_idx];
        for team in self.teams.iter_mut().filter(|t| t.contains(updated.id)) {
            for member in team.players.iter_mut().filter(|p| p.id == updated.id) {
                *member = updated.clone();
            }
            team.refresh();
        }
    }

    /// Every roster player with their team placement
    pub fn player_statuses(&self) -> Vec<PlayerStatusEntry> {
        self.roster
            .iter()
            .map(|player| {
                let originally_selected = self.selected.contains(&player.id);
                let status = match self.teams.iter().find(|t| t.contains(player.id)) {
                    Some(team) => PlayerStatus::InTeam(team.id.clone()),
                    None if originally_selected => PlayerStatus::Unassigned,
                    None => PlayerStatus::Absent,
                };
                PlayerStatusEntry {
                    player: player.clone(),
                    status,
                    originally_selected,
                }
            })
            .collect()
    }

    pub fn get_state_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
