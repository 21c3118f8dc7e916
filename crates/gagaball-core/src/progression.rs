use crate::player::PlayerColor;

/// Persistent player progression, owned outside the match.
///
/// The match lifecycle calls into this once when a match ends; nothing in the
/// simulation reads it back except the local skin color at setup.
pub trait ProgressionStore {
    fn add_coins(&mut self, amount: u32);
    fn record_win(&mut self, eliminations: u32, duration_secs: f32);
    fn record_loss(&mut self);
    fn current_skin_color(&self) -> PlayerColor;
}
