use std::collections::HashMap;
use std::time::Duration;

use crate::protocol::Standing;
use crate::types::Participant;

pub const MAX_POINTS: u32 = 1000;
pub const MIN_POINTS: u32 = 100;
/// Points lost per whole second of thinking time
pub const DECAY_PER_SECOND: u32 = 100;

/// Points for a correct answer given after `elapsed`
pub fn points_for(elapsed: Duration) -> u32 {
    let secs = u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX);
    MAX_POINTS
        .saturating_sub(secs.saturating_mul(DECAY_PER_SECOND))
        .max(MIN_POINTS)
}

/// Rank participants by score descending, ties broken by name ascending
pub fn standings(participants: &HashMap<String, Participant>) -> Vec<Standing> {
    let mut rows: Vec<Standing> = participants.values().map(Standing::from).collect();
    rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
    rows
}
