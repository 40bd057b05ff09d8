//! Play sequence construction

use std::collections::VecDeque;

use rand::Rng;

use crate::action::Action;
use crate::models::Ordering;

/// Build one cycle's play sequence. Every action appears exactly once.
///
/// Random order draws a uniformly random remaining action until one is left,
/// which is appended as is. One generator serves the whole draw.
pub fn build_sequence<R: Rng + ?Sized>(
    actions: &[Action],
    order: Ordering,
    rng: &mut R,
) -> VecDeque<Action> {
    match order {
        Ordering::Sequential => actions.iter().cloned().collect(),
        Ordering::Random => {
            let mut remaining = actions.to_vec();
            let mut sequence = VecDeque::with_capacity(remaining.len());

            while remaining.len() > 1 {
                let pick = rng.gen_range(0..remaining.len());
                sequence.push_back(remaining.remove(pick));
            }
            if let Some(last) = remaining.pop() {
                sequence.push_back(last);
            }

            sequence
        }
    }
}
