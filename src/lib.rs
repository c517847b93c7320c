mod balancer;
mod error;
mod session;
mod types;

pub use balancer::{
    draw_teams, draw_teams_with_rng, is_team_valid, plan_team_sizes, spread, team_average,
    TeamBalancer,
};
pub use error::{DrawError, Result as DrawResult};
pub use session::{format_countdown, DrawSession};
pub use types::*;

use rand::rngs::StdRng;
use rand::SeedableRng;
use wasm_bindgen::prelude::*;

/// Forwards `log` records to the browser console
struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&line),
            log::Level::Warn => web_sys::console::warn_1(&line),
            log::Level::Info => web_sys::console::info_1(&line),
            _ => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Initialize panic hook and console logging
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    let level = if cfg!(feature = "debug") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // A second init keeps the logger already installed
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn to_js(err: DrawError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// JS timestamps arrive as float milliseconds
fn to_millis(timestamp: f64) -> u64 {
    timestamp.max(0.0) as u64
}

/// WASM-exposed draw session wrapper
#[wasm_bindgen]
pub struct DrawEngine {
    session: DrawSession,
    rng: StdRng,
}

#[wasm_bindgen]
impl DrawEngine {
    /// Create an engine over the default roster and config
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> Result<DrawEngine, JsValue> {
        let session = DrawSession::with_default_roster(DrawConfig::default()).map_err(to_js)?;
        Ok(DrawEngine {
            session,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Create with custom config
    pub fn new_with_config(seed: u64, config_json: &str) -> Result<DrawEngine, JsValue> {
        let config: DrawConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Config parse error: {}", e)))?;
        let session = DrawSession::with_default_roster(config).map_err(to_js)?;
        Ok(DrawEngine {
            session,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Create with custom config and roster
    pub fn new_with_roster(
        seed: u64,
        config_json: &str,
        roster_json: &str,
    ) -> Result<DrawEngine, JsValue> {
        let config: DrawConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Config parse error: {}", e)))?;
        let roster: Vec<Player> = serde_json::from_str(roster_json)
            .map_err(|e| JsValue::from_str(&format!("Roster parse error: {}", e)))?;
        let session = DrawSession::new(config, roster).map_err(to_js)?;
        Ok(DrawEngine {
            session,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Get roster as JSON
    pub fn get_roster(&self) -> String {
        serde_json::to_string(self.session.roster()).unwrap_or_default()
    }

    /// Toggle a player's selection, returns whether they are now selected
    pub fn toggle_selection(&mut self, player_id: u32) -> Result<bool, JsValue> {
        self.session.toggle_selection(player_id).map_err(to_js)
    }

    pub fn is_selected(&self, player_id: u32) -> bool {
        self.session.is_selected(player_id)
    }

    pub fn selected_count(&self) -> usize {
        self.session.selected_count()
    }

    /// Get selected players as JSON
    pub fn get_selected(&self) -> String {
        serde_json::to_string(&self.session.selected_players()).unwrap_or_default()
    }

    pub fn can_draw(&self, now_ms: f64) -> bool {
        self.session.can_draw(to_millis(now_ms))
    }

    /// Draw teams, returns them as JSON
    pub fn draw(&mut self, now_ms: f64) -> Result<String, JsValue> {
        let teams = self
            .session
            .draw(to_millis(now_ms), &mut self.rng)
            .map_err(to_js)?;
        serde_json::to_string(teams)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Draw using the browser clock
    #[cfg(target_arch = "wasm32")]
    pub fn draw_now(&mut self) -> Result<String, JsValue> {
        self.draw(js_sys::Date::now())
    }

    /// Get current teams as JSON
    pub fn get_teams(&self) -> String {
        serde_json::to_string(self.session.teams()).unwrap_or_default()
    }

    pub fn last_draw_used_fallback(&self) -> bool {
        self.session.last_draw_used_fallback()
    }

    /// Seconds until a non-admin may draw again
    pub fn cooldown_remaining(&self, now_ms: f64) -> u64 {
        self.session.cooldown_remaining_secs(to_millis(now_ms))
    }

    /// Cooldown as `MM:SS`
    pub fn format_countdown(&self, now_ms: f64) -> String {
        format_countdown(self.cooldown_remaining(now_ms))
    }

    /// Seconds until a non-admin may draw again, using the browser clock
    #[cfg(target_arch = "wasm32")]
    pub fn cooldown_remaining_now(&self) -> u64 {
        self.cooldown_remaining(js_sys::Date::now())
    }

    /// Reload a persisted draw timestamp
    pub fn restore_last_draw(&mut self, timestamp_ms: f64) {
        self.session.restore_last_draw(to_millis(timestamp_ms));
    }

    /// Timestamp to persist after a draw
    pub fn last_draw_timestamp(&self) -> Option<f64> {
        self.session.last_draw_ms().map(|ms| ms as f64)
    }

    pub fn unlock_admin(&mut self, code: &str) -> Result<(), JsValue> {
        self.session.unlock_admin(code).map_err(to_js)
    }

    pub fn lock_admin(&mut self) {
        self.session.lock_admin();
    }

    pub fn is_admin(&self) -> bool {
        self.session.is_admin()
    }

    /// Back to player selection
    pub fn clear_teams(&mut self) {
        self.session.clear_teams();
    }

    pub fn assign_player(&mut self, player_id: u32, team_id: &str) -> Result<(), JsValue> {
        self.session.assign_player(player_id, team_id).map_err(to_js)
    }

    pub fn unassign_player(&mut self, player_id: u32) -> Result<(), JsValue> {
        self.session.unassign_player(player_id).map_err(to_js)
    }

    pub fn rename_player(&mut self, player_id: u32, name: &str) -> Result<(), JsValue> {
        self.session.rename_player(player_id, name).map_err(to_js)
    }

    pub fn rescore_player(&mut self, player_id: u32, score: u8) -> Result<(), JsValue> {
        self.session.rescore_player(player_id, score).map_err(to_js)
    }

    /// Get every roster player's team placement as JSON
    pub fn get_player_statuses(&self) -> String {
        serde_json::to_string(&self.session.player_statuses()).unwrap_or_default()
    }

    /// Get full session state as JSON
    pub fn get_state(&self) -> String {
        self.session.get_state_json()
    }

    /// Get the session's config as JSON
    pub fn get_config(&self) -> String {
        serde_json::to_string(self.session.config()).unwrap_or_default()
    }

    /// Get default config as JSON
    pub fn get_default_config() -> String {
        serde_json::to_string(&DrawConfig::default()).unwrap_or_default()
    }
}

/// One-shot draw over a JSON player list, returns teams as JSON
#[wasm_bindgen]
pub fn draw_teams_json(players_json: &str, seed: u64) -> Result<String, JsValue> {
    let players: Vec<Player> = serde_json::from_str(players_json)
        .map_err(|e| JsValue::from_str(&format!("Players parse error: {}", e)))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let teams = draw_teams_with_rng(&players, &mut rng);

    serde_json::to_string(&teams)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Planned team sizes for a player count as JSON
#[wasm_bindgen]
pub fn plan_team_sizes_json(player_count: usize) -> String {
    serde_json::to_string(&plan_team_sizes(player_count)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_draw_flow() {
        let mut engine = DrawEngine::new(11).unwrap();
        let roster: Vec<Player> = serde_json::from_str(&engine.get_roster()).unwrap();

        // Regulars below the top score, so any ten of them can be balanced
        for player in roster.iter().filter(|p| p.score < 5 && p.score > 1).take(12) {
            assert!(engine.toggle_selection(player.id).unwrap());
        }
        assert_eq!(engine.selected_count(), 12);
        assert!(engine.can_draw(0.0));

        let teams: Vec<Team> = serde_json::from_str(&engine.draw(1000.0).unwrap()).unwrap();
        assert_eq!(teams.len(), 3);
        assert_eq!(engine.get_teams(), serde_json::to_string(&teams).unwrap());
        assert_eq!(engine.last_draw_timestamp(), Some(1000.0));
        assert_eq!(engine.format_countdown(61_000.0), "29:00");
        assert!(!engine.can_draw(61_000.0));
    }

    #[test]
    fn test_draw_teams_json() {
        let players: Vec<Player> = [5, 5, 4, 4, 3, 3, 2, 2, 1, 1]
            .iter()
            .enumerate()
            .map(|(i, &score)| Player::new(i as u32, &format!("P{}", i), score))
            .collect();
        let json = serde_json::to_string(&players).unwrap();

        let teams: Vec<Team> = serde_json::from_str(&draw_teams_json(&json, 8).unwrap()).unwrap();
        assert_eq!(teams.len(), 2);
        assert!(teams.iter().all(|t| is_team_valid(&t.players)));

        // Same seed, same draw
        assert_eq!(draw_teams_json(&json, 8).unwrap(), draw_teams_json(&json, 8).unwrap());
    }

    #[test]
    fn test_plan_team_sizes_json() {
        assert_eq!(plan_team_sizes_json(19), "[5,5,5,4]");
        assert_eq!(plan_team_sizes_json(9), "[]");
    }

    #[test]
    fn test_default_config_json_round_trips() {
        let config: DrawConfig = serde_json::from_str(&DrawEngine::get_default_config()).unwrap();
        assert_eq!(config, DrawConfig::default());
    }

    #[test]
    fn test_engine_reports_custom_config() {
        let engine = DrawEngine::new_with_config(2, r#"{"cooldown_secs": 90}"#).unwrap();
        let config: DrawConfig = serde_json::from_str(&engine.get_config()).unwrap();
        assert_eq!(config.cooldown_secs, 90);
        assert_eq!(config.max_attempts, 800);
    }
}
