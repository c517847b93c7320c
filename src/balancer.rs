use crate::error::Result;
use crate::types::*;
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;

/// Mean score of a team rounded to two decimals, 0 for an empty team
pub fn team_average(team: &[Player]) -> f64 {
    if team.is_empty() {
        return 0.0;
    }
    let total: u32 = team.iter().map(|p| p.score as u32).sum();
    round2(total as f64 / team.len() as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// At most one player on each extreme of the default 1..=5 scale
pub fn is_team_valid(team: &[Player]) -> bool {
    extremes_within_limit(team, MIN_SCORE, MAX_SCORE)
}

fn extremes_within_limit(team: &[Player], min_score: u8, max_score: u8) -> bool {
    let lowest = team.iter().filter(|p| p.score == min_score).count();
    let highest = team.iter().filter(|p| p.score == max_score).count();
    lowest <= 1 && highest <= 1
}

/// Highest minus lowest average over the non-empty teams
pub fn spread(teams: &[Vec<Player>]) -> f64 {
    let averages: Vec<f64> = teams.iter().map(|t| team_average(t)).collect();
    spread_of(teams, &averages)
}

fn spread_of(teams: &[Vec<Player>], averages: &[f64]) -> f64 {
    let filled: Vec<f64> = averages
        .iter()
        .zip(teams)
        .filter(|(_, team)| !team.is_empty())
        .map(|(&avg, _)| avg)
        .collect();
    if filled.len() < 2 {
        return 0.0;
    }
    let max = filled.iter().cloned().fold(f64::MIN, f64::max);
    let min = filled.iter().cloned().fold(f64::MAX, f64::min);
    max - min
}

/// Team sizes for a draw of `player_count` players with the default config
pub fn plan_team_sizes(player_count: usize) -> Vec<usize> {
    TeamBalancer::default().plan_team_sizes(player_count)
}

/// Draw balanced teams using the thread-local generator
pub fn draw_teams(players: &[Player]) -> Vec<Team> {
    draw_teams_with_rng(players, &mut rand::thread_rng())
}

pub fn draw_teams_with_rng(players: &[Player], rng: &mut impl Rng) -> Vec<Team> {
    TeamBalancer::default().draw(players, rng).teams
}

/// The team-balancing engine
#[derive(Clone, Debug, Default)]
pub struct TeamBalancer {
    config: DrawConfig,
}

impl TeamBalancer {
    pub fn new(config: DrawConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Target size of each team, empty when the count is out of bounds.
    /// Fills teams of the ideal size and puts the remainder in a last team,
    /// unless that would reach the team cap, in which case players are
    /// spread evenly across the cap.
    pub fn plan_team_sizes(&self, player_count: usize) -> Vec<usize> {
        if !self.config.accepts_player_count(player_count) {
            return Vec::new();
        }

        let ideal = self.config.ideal_team_size;
        let max_teams = self.config.max_teams;
        let full_teams = player_count / ideal;
        let remainder = player_count % ideal;

        let mut sizes = Vec::with_capacity(max_teams);
        if full_teams >= max_teams {
            let base = player_count / max_teams;
            let extra = player_count % max_teams;
            sizes.extend((0..max_teams).map(|i| base + usize::from(i < extra)));
        } else {
            sizes.extend(std::iter::repeat(ideal).take(full_teams));
            if remainder > 0 {
                sizes.push(remainder);
            }
        }

        if sizes.is_empty() && player_count > 0 {
            sizes.push(player_count);
        }
        sizes
    }

    pub fn team_is_valid(&self, team: &[Player]) -> bool {
        extremes_within_limit(team, self.config.min_score, self.config.max_score)
    }

    /// Run a full draw: randomized restarts with swap refinement, falling
    /// back to a blind shuffle if no restart produced valid teams
    pub fn draw(&self, players: &[Player], rng: &mut impl Rng) -> DrawOutcome {
        let player_count = players.len();
        let sizes = self.plan_team_sizes(player_count);
        if sizes.is_empty() {
            warn!(
                "Rejecting draw of {} players (allowed {}..={})",
                player_count, self.config.min_players, self.config.max_players
            );
            return DrawOutcome::empty();
        }

        let target_spread = self.config.target_spread(player_count);
        let mut best: Option<(Vec<Vec<Player>>, f64)> = None;
        let mut attempts = 0;

        while attempts < self.config.max_attempts {
            attempts += 1;

            let mut teams = slice_into(shuffled(players, rng), &sizes);
            if !matches_sizes(&teams, &sizes) {
                continue;
            }

            self.improve(&mut teams);

            if !teams.iter().all(|t| self.team_is_valid(t)) {
                continue;
            }

            let filled = teams.iter().filter(|t| !t.is_empty()).count();
            if filled <= 1 {
                best = Some((teams, 0.0));
                break;
            }

            let current = spread(&teams);
            if best.as_ref().map_or(true, |(_, best_spread)| current < *best_spread) {
                best = Some((teams, current));
            }

            if best.as_ref().is_some_and(|(_, best_spread)| *best_spread < target_spread) {
                break;
            }
        }

        let (partition, best_spread, used_fallback) = match best {
            Some((teams, best_spread)) => (teams, best_spread, false),
            None => {
                warn!(
                    "No valid partition of {} players after {} attempts, using fallback",
                    player_count, attempts
                );
                let teams = slice_into(shuffled(players, rng), &sizes);
                let fallback_spread = spread(&teams);
                (teams, fallback_spread, true)
            }
        };

        debug!(
            "Drew {} teams from {} players in {} attempts (spread {:.2})",
            sizes.len(),
            player_count,
            attempts,
            best_spread
        );

        DrawOutcome {
            teams: assemble(partition),
            attempts,
            spread: best_spread,
            used_fallback,
        }
    }

    /// Greedy pairwise exchange between the strongest and weakest teams.
    /// Applies the first swap that keeps both teams valid and shrinks the
    /// global spread by more than the tolerance, then re-evaluates.
    pub fn improve(&self, teams: &mut [Vec<Player>]) {
        for _ in 0..self.config.max_improvement_iterations {
            let averages: Vec<f64> = teams.iter().map(|t| team_average(t)).collect();
            let Some((rich, poor)) = extreme_teams(teams, &averages) else {
                break;
            };
            let current_spread = averages[rich] - averages[poor];

            let mut swapped = false;
            'search: for i in 0..teams[rich].len() {
                for j in 0..teams[poor].len() {
                    swap_members(teams, rich, i, poor, j);

                    if self.team_is_valid(&teams[rich]) && self.team_is_valid(&teams[poor]) {
                        let mut after = averages.clone();
                        after[rich] = team_average(&teams[rich]);
                        after[poor] = team_average(&teams[poor]);

                        if spread_of(teams, &after) < current_spread - self.config.swap_tolerance {
                            swapped = true;
                            break 'search;
                        }
                    }

                    // Not an improvement, put them back
                    swap_members(teams, rich, i, poor, j);
                }
            }

            if !swapped {
                break;
            }
        }
    }
}

fn shuffled(players: &[Player], rng: &mut impl Rng) -> Vec<Player> {
    let mut pool = players.to_vec();
    pool.shuffle(rng);
    pool
}

/// Contiguous chunks of the planned sizes; trailing chunks come up short if
/// the pool runs out
fn slice_into(pool: Vec<Player>, sizes: &[usize]) -> Vec<Vec<Player>> {
    let mut pool = pool.into_iter();
    sizes
        .iter()
        .map(|&size| pool.by_ref().take(size).collect())
        .collect()
}

fn matches_sizes(teams: &[Vec<Player>], sizes: &[usize]) -> bool {
    teams.len() == sizes.len() && teams.iter().zip(sizes).all(|(t, &s)| t.len() == s)
}

/// Indices of the first highest-average and first lowest-average non-empty
/// teams, or None when they coincide
fn extreme_teams(teams: &[Vec<Player>], averages: &[f64]) -> Option<(usize, usize)> {
    let mut rich: Option<usize> = None;
    let mut poor: Option<usize> = None;

    for (idx, team) in teams.iter().enumerate() {
        if team.is_empty() {
            continue;
        }
        if rich.map_or(true, |r| averages[idx] > averages[r]) {
            rich = Some(idx);
        }
        if poor.map_or(true, |p| averages[idx] < averages[p]) {
            poor = Some(idx);
        }
    }

    match (rich, poor) {
        (Some(r), Some(p)) if r != p => Some((r, p)),
        _ => None,
    }
}

fn swap_members(teams: &mut [Vec<Player>], a: usize, i: usize, b: usize, j: usize) {
    let (lo, lo_member, hi, hi_member) = if a < b { (a, i, b, j) } else { (b, j, a, i) };
    let (left, right) = teams.split_at_mut(hi);
    std::mem::swap(&mut left[lo][lo_member], &mut right[0][hi_member]);
}

/// Non-empty slices become teams, named by their position in the palette
fn assemble(partition: Vec<Vec<Player>>) -> Vec<Team> {
    partition
        .into_iter()
        .filter(|t| !t.is_empty())
        .enumerate()
        .map(|(index, players)| Team::new(TeamIdentity::for_index(index), players))
        .collect()
}
