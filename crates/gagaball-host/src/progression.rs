use serde::Serialize;

use gagaball_core::player::PlayerColor;
use gagaball_core::progression::ProgressionStore;

/// Process-lifetime progression for the headless host. Nothing is persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryProgression {
    pub coins: u32,
    pub wins: u32,
    pub losses: u32,
    pub total_eliminations: u32,
    /// Shortest winning match, in seconds.
    pub fastest_win_secs: Option<f32>,
    #[serde(skip)]
    pub skin: PlayerColor,
}

impl ProgressionStore for MemoryProgression {
    fn add_coins(&mut self, amount: u32) {
        self.coins = self.coins.saturating_add(amount);
        tracing::debug!(amount, total = self.coins, "Coins added");
    }

    fn record_win(&mut self, eliminations: u32, duration_secs: f32) {
        self.wins += 1;
        self.total_eliminations = self.total_eliminations.saturating_add(eliminations);
        self.fastest_win_secs = Some(match self.fastest_win_secs {
            Some(best) => best.min(duration_secs),
            None => duration_secs,
        });
        tracing::info!(wins = self.wins, eliminations, duration_secs, "Win recorded");
    }

    fn record_loss(&mut self) {
        self.losses += 1;
        tracing::info!(losses = self.losses, "Loss recorded");
    }

    fn current_skin_color(&self) -> PlayerColor {
        self.skin
    }
}
