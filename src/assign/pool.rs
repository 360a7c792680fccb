//! Rotation pool: a team's members in a fixed cyclic order.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::model::{TeamId, UserId};

/// Equal-weight round-robin over a team's members.
///
/// Members keep the order they were added in. Each [`next`](Self::next)
/// hands out the member under the cursor and advances it, wrapping after
/// the last member. The cursor is atomic so draws through a shared
/// snapshot never hand out the same turn twice.
#[derive(Debug)]
pub struct RotationPool {
    team_id: TeamId,
    members: Vec<UserId>,
    cursor: AtomicUsize,
}

impl RotationPool {
    pub fn new(team_id: TeamId) -> Self {
        Self {
            team_id,
            members: Vec::new(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Add a member `weight` times. All members are added with weight 1
    /// by the registry; a weight of 0 adds nothing.
    pub fn add(&mut self, user_id: UserId, weight: usize) {
        self.members.extend(std::iter::repeat_n(user_id, weight));
    }

    /// Draw the next member, advancing the rotation.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Result<UserId> {
        let len = self.members.len();
        if len == 0 {
            return Err(Error::EmptyPool(self.team_id));
        }
        // fetch_update only fails when the closure returns None.
        let idx = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
            .unwrap_or_else(|i| i);
        Ok(self.members[idx % len])
    }

    pub fn members(&self) -> &[UserId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
