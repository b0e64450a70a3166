//! Per-channel trajectory accumulation.
//!
//! Each tracked channel gets an append-only history of positions, one
//! entry per processed frame in arrival order, plus the most recent
//! position. Entries are never reordered or edited; the sentinel is
//! recorded like any other value.

use crate::{Channel, Position};

/// Ordered per-channel position histories for one tracking session.
#[derive(Debug, Default)]
pub struct Trajectories {
    histories: [Vec<Position>; 3],
    latest: [Option<Position>; 3],
}

impl Trajectories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `position` to `channel`'s history and update its latest
    /// position. The session calls this exactly once per tracked channel
    /// per processed frame.
    pub fn record(&mut self, channel: Channel, position: Position) {
        self.histories[channel.index()].push(position);
        self.latest[channel.index()] = Some(position);
    }

    /// Full history for a channel, in frame-arrival order.
    pub fn history(&self, channel: Channel) -> &[Position] {
        &self.histories[channel.index()]
    }

    /// Most recent position for a channel, if any frame was recorded.
    pub fn latest(&self, channel: Channel) -> Option<Position> {
        self.latest[channel.index()]
    }

    /// Number of frames recorded for a channel.
    pub fn len(&self, channel: Channel) -> usize {
        self.histories[channel.index()].len()
    }

    pub fn is_empty(&self, channel: Channel) -> bool {
        self.histories[channel.index()].is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_appends_in_order() {
        let mut trajectories = Trajectories::new();
        trajectories.record(Channel::Red, Position::new(1, 2));
        trajectories.record(Channel::Red, Position::NOT_FOUND);
        trajectories.record(Channel::Red, Position::new(3, 4));

        assert_eq!(
            trajectories.history(Channel::Red),
            &[
                Position::new(1, 2),
                Position::NOT_FOUND,
                Position::new(3, 4)
            ]
        );
        assert_eq!(trajectories.latest(Channel::Red), Some(Position::new(3, 4)));
        assert_eq!(trajectories.len(Channel::Red), 3);
    }

    #[test]
    fn channels_are_independent() {
        let mut trajectories = Trajectories::new();
        trajectories.record(Channel::Green, Position::new(5, 6));

        assert!(trajectories.is_empty(Channel::Red));
        assert!(trajectories.is_empty(Channel::Blue));
        assert_eq!(trajectories.latest(Channel::Red), None);
        assert_eq!(
            trajectories.latest(Channel::Green),
            Some(Position::new(5, 6))
        );
    }

    #[test]
    fn sentinel_updates_latest() {
        let mut trajectories = Trajectories::new();
        trajectories.record(Channel::Blue, Position::new(9, 9));
        trajectories.record(Channel::Blue, Position::NOT_FOUND);
        assert_eq!(trajectories.latest(Channel::Blue), Some(Position::NOT_FOUND));
    }
}
