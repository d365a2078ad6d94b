use super::*;

/// Broadcast to every interested listener when the upstream connection receives an
/// unsolicited notification, or drops.
#[derive(Debug, Clone)]
pub enum Event {
    Notify(Notify),
    SetDifficulty(Difficulty),
    Disconnected,
}
