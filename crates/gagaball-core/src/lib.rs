pub mod net;
pub mod player;
pub mod powerup;
pub mod progression;
pub mod room;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::{PlayerColor, PlayerId, RosterPlayer};
    use crate::progression::ProgressionStore;

    /// Create `n` roster entries with sequential IDs starting at 1. The first
    /// entry is the host.
    pub fn make_roster(n: usize) -> Vec<RosterPlayer> {
        (0..n)
            .map(|i| RosterPlayer {
                id: i as PlayerId + 1,
                display_name: format!("Player{}", i + 1),
                color: PlayerColor::palette(i),
                is_host: i == 0,
                ready: false,
            })
            .collect()
    }

    /// One call made against a [`RecordingProgression`].
    #[derive(Debug, Clone, PartialEq)]
    pub enum ProgressionCall {
        AddCoins(u32),
        RecordWin {
            eliminations: u32,
            duration_secs: f32,
        },
        RecordLoss,
    }

    /// Progression store that remembers every call, for asserting on the
    /// end-of-match handoff.
    #[derive(Debug, Default)]
    pub struct RecordingProgression {
        pub calls: Vec<ProgressionCall>,
        pub coins: u32,
    }

    impl RecordingProgression {
        pub fn wins(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, ProgressionCall::RecordWin { .. }))
                .count()
        }

        pub fn losses(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, ProgressionCall::RecordLoss))
                .count()
        }
    }

    impl ProgressionStore for RecordingProgression {
        fn add_coins(&mut self, amount: u32) {
            self.coins += amount;
            self.calls.push(ProgressionCall::AddCoins(amount));
        }

        fn record_win(&mut self, eliminations: u32, duration_secs: f32) {
            self.calls.push(ProgressionCall::RecordWin {
                eliminations,
                duration_secs,
            });
        }

        fn record_loss(&mut self) {
            self.calls.push(ProgressionCall::RecordLoss);
        }

        fn current_skin_color(&self) -> PlayerColor {
            PlayerColor::CLASSIC_BLUE
        }
    }
}
