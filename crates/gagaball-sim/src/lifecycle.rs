use serde::{Deserialize, Serialize};

use gagaball_core::player::PlayerId;
use gagaball_core::progression::ProgressionStore;
use gagaball_core::time::Millis;

use crate::config::MatchConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Won,
    Lost,
}

/// Why a match stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// Only the local human is left.
    LastPlayerStanding,
    /// Round timer ran out with the local human alive.
    TimeUp,
    LocalEliminated,
    /// The host sent `MatchOver`.
    HostDeclared,
    /// The connection to the host dropped.
    HostLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Setup,
    Running,
    /// End condition met; effects play out until `since + ending_delay`.
    Ending {
        since: Millis,
        outcome: MatchOutcome,
        reason: EndReason,
    },
    Ended,
}

/// What the local process decided when an end condition fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndDecision {
    pub outcome: MatchOutcome,
    pub reason: EndReason,
    pub winner_id: Option<PlayerId>,
}

/// Check the RUNNING -> ENDING conditions from the local human's point of view.
///
/// `living` is the ids of players still in play, in insertion order.
pub fn evaluate_end(
    local_id: PlayerId,
    living: &[PlayerId],
    elapsed_ms: Millis,
    round_duration_ms: Millis,
) -> Option<EndDecision> {
    let local_alive = living.contains(&local_id);
    if !local_alive {
        return Some(EndDecision {
            outcome: MatchOutcome::Lost,
            reason: EndReason::LocalEliminated,
            winner_id: None,
        });
    }
    if living.len() == 1 {
        return Some(EndDecision {
            outcome: MatchOutcome::Won,
            reason: EndReason::LastPlayerStanding,
            winner_id: Some(local_id),
        });
    }
    if elapsed_ms >= round_duration_ms {
        return Some(EndDecision {
            outcome: MatchOutcome::Won,
            reason: EndReason::TimeUp,
            winner_id: None,
        });
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardKind {
    Victory,
    Eliminations(u32),
    Survival,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub kind: RewardKind,
    pub coins: u32,
}

impl Reward {
    pub fn label(&self) -> String {
        match self.kind {
            RewardKind::Victory => "Victory Bonus".to_string(),
            RewardKind::Eliminations(n) => format!("Eliminations x{n}"),
            RewardKind::Survival => "Survival Bonus".to_string(),
        }
    }
}

/// Coin rewards for the local human. Only eliminations witnessed while the
/// local human was still alive pay out.
pub fn compute_rewards(
    outcome: MatchOutcome,
    witnessed_eliminations: u32,
    survived: bool,
    config: &MatchConfig,
) -> Vec<Reward> {
    let mut rewards = Vec::new();
    if outcome == MatchOutcome::Won {
        rewards.push(Reward {
            kind: RewardKind::Victory,
            coins: config.coins_per_win,
        });
    }
    if witnessed_eliminations > 0 {
        rewards.push(Reward {
            kind: RewardKind::Eliminations(witnessed_eliminations),
            coins: witnessed_eliminations.saturating_mul(config.coins_per_elimination),
        });
    }
    if survived {
        rewards.push(Reward {
            kind: RewardKind::Survival,
            coins: config.coins_per_survival,
        });
    }
    rewards
}

/// Final statistics, produced once on ENDED.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub outcome: MatchOutcome,
    pub reason: EndReason,
    pub winner_id: Option<PlayerId>,
    pub elimination_count: u32,
    pub duration_secs: f32,
    pub survived: bool,
    pub rewards: Vec<Reward>,
}

impl MatchReport {
    pub fn total_coins(&self) -> u32 {
        self.rewards.iter().map(|r| r.coins).fold(0, u32::saturating_add)
    }
}

/// SETUP -> RUNNING -> ENDING -> ENDED, plus the one-shot progression handoff.
#[derive(Debug, Clone)]
pub struct MatchLifecycle {
    phase: MatchPhase,
    report: Option<MatchReport>,
    settled: bool,
}

impl Default for MatchLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchLifecycle {
    pub fn new() -> Self {
        Self {
            phase: MatchPhase::Setup,
            report: None,
            settled: false,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == MatchPhase::Running
    }

    /// Past RUNNING; the simulation no longer advances.
    pub fn is_over(&self) -> bool {
        matches!(self.phase, MatchPhase::Ending { .. } | MatchPhase::Ended)
    }

    pub fn start(&mut self) -> bool {
        if self.phase != MatchPhase::Setup {
            return false;
        }
        self.phase = MatchPhase::Running;
        true
    }

    /// Enter ENDING. Only the first call while RUNNING has any effect.
    pub fn begin_ending(&mut self, now: Millis, outcome: MatchOutcome, reason: EndReason) -> bool {
        if self.phase != MatchPhase::Running {
            return false;
        }
        self.phase = MatchPhase::Ending {
            since: now,
            outcome,
            reason,
        };
        true
    }

    /// Apply an externally decided result. Unlike [`Self::begin_ending`] this
    /// overrides a locally computed outcome that is still playing out, but
    /// never touches an ENDED match.
    pub fn declare(&mut self, now: Millis, outcome: MatchOutcome, reason: EndReason) -> bool {
        match self.phase {
            MatchPhase::Setup | MatchPhase::Running => {
                self.phase = MatchPhase::Ending {
                    since: now,
                    outcome,
                    reason,
                };
                true
            },
            MatchPhase::Ending { since, .. } => {
                self.phase = MatchPhase::Ending {
                    since,
                    outcome,
                    reason,
                };
                true
            },
            MatchPhase::Ended => false,
        }
    }

    /// The ending delay has elapsed.
    pub fn ending_due(&self, now: Millis, delay_ms: Millis) -> bool {
        matches!(self.phase, MatchPhase::Ending { since, .. } if now >= since + delay_ms)
    }

    /// ENDING -> ENDED with the final report.
    pub fn finish(&mut self, report: MatchReport) -> bool {
        if !matches!(self.phase, MatchPhase::Ending { .. }) {
            return false;
        }
        self.phase = MatchPhase::Ended;
        self.report = Some(report);
        true
    }

    pub fn report(&self) -> Option<&MatchReport> {
        self.report.as_ref()
    }

    /// Hand the result to the progression store. Happens at most once per
    /// match and only after ENDED; returns whether this call did it.
    pub fn settle(&mut self, store: &mut impl ProgressionStore) -> bool {
        if self.settled {
            return false;
        }
        let Some(report) = &self.report else {
            return false;
        };
        let coins = report.total_coins();
        if coins > 0 {
            store.add_coins(coins);
        }
        match report.outcome {
            MatchOutcome::Won => store.record_win(report.elimination_count, report.duration_secs),
            MatchOutcome::Lost => store.record_loss(),
        }
        self.settled = true;
        tracing::info!(
            outcome = ?report.outcome,
            coins,
            eliminations = report.elimination_count,
            "Match result handed to progression"
        );
        true
    }
}
