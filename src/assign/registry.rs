//! Pool registry: one rotation pool and capacity cap per round-robin team.
//!
//! A registry is a snapshot. It is built wholesale from team data and never
//! patched; reloading means building a new one and swapping it in.

use std::collections::HashMap;

use tracing::debug;

use super::pool::RotationPool;
use crate::error::{Error, Result};
use crate::model::{Team, TeamId, UserId};
use crate::store::TeamStore;

/// A team's rotation together with its per-member cap.
#[derive(Debug)]
pub struct TeamPool {
    pub pool: RotationPool,
    pub max_auto_assigned_conversations: u32,
}

#[derive(Debug, Default)]
pub struct Registry {
    teams: HashMap<TeamId, TeamPool>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from teams and their ordered member lists.
    ///
    /// Only round-robin teams get an entry. A round-robin team without
    /// members still gets one, so lookups can tell "not auto-assigned"
    /// apart from "nobody to assign to". Every pool starts at its first
    /// member.
    pub fn rebuild<I>(teams: I) -> Self
    where
        I: IntoIterator<Item = (Team, Vec<UserId>)>,
    {
        let teams = teams
            .into_iter()
            .filter(|(team, _)| team.assignment_type.is_round_robin())
            .map(|(team, members)| {
                let mut pool = RotationPool::new(team.id);
                for user_id in members {
                    pool.add(user_id, 1);
                }
                (
                    team.id,
                    TeamPool {
                        pool,
                        max_auto_assigned_conversations: team.max_auto_assigned_conversations,
                    },
                )
            })
            .collect();
        Self { teams }
    }

    /// Fetch current team data and build a registry from it.
    ///
    /// Members are only fetched for round-robin teams. Any store failure
    /// fails the whole load.
    pub async fn load(store: &dyn TeamStore) -> Result<Self> {
        let teams = store.all_teams().await?;
        let mut input = Vec::with_capacity(teams.len());
        for team in teams {
            if !team.assignment_type.is_round_robin() {
                continue;
            }
            let members = store.team_members(team.id).await?;
            debug!(team_id = %team.id, members = members.len(), "loaded team rotation");
            input.push((team, members));
        }
        Ok(Self::rebuild(input))
    }

    /// Look up a team's pool.
    pub fn get(&self, team_id: TeamId) -> Result<&TeamPool> {
        self.teams
            .get(&team_id)
            .ok_or(Error::TeamNotFound(team_id))
    }

    /// Draw the next candidate for a team along with the team's cap.
    pub fn next_candidate(&self, team_id: TeamId) -> Result<(UserId, u32)> {
        let entry = self.get(team_id)?;
        let user_id = entry.pool.next()?;
        Ok((user_id, entry.max_auto_assigned_conversations))
    }

    /// Team IDs in ascending order.
    pub fn team_ids(&self) -> Vec<TeamId> {
        let mut ids: Vec<_> = self.teams.keys().copied().collect();
        ids.sort();
        ids
    }

    /// `(team, member count, cap)` for every team, ascending by team.
    pub fn summary(&self) -> Vec<(TeamId, usize, u32)> {
        self.team_ids()
            .into_iter()
            .filter_map(|id| {
                self.teams
                    .get(&id)
                    .map(|e| (id, e.pool.len(), e.max_auto_assigned_conversations))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn users(ids: &[i32]) -> Vec<UserId> {
        ids.iter().map(|id| UserId(*id)).collect()
    }

    fn input() -> Vec<(Team, Vec<UserId>)> {
        vec![
            (Team::round_robin(1, "support", 3), users(&[11, 12])),
            (Team::manual(2, "billing"), users(&[21])),
            (Team::round_robin(3, "empty", 2), vec![]),
        ]
    }

    #[test]
    fn only_round_robin_teams_are_registered() {
        let registry = Registry::rebuild(input());
        assert_eq!(registry.team_ids(), vec![TeamId(1), TeamId(3)]);
        assert!(matches!(
            registry.get(TeamId(2)),
            Err(Error::TeamNotFound(TeamId(2)))
        ));
    }

    #[test]
    fn empty_round_robin_team_has_entry_but_no_candidate() {
        let registry = Registry::rebuild(input());
        assert!(registry.get(TeamId(3)).is_ok());
        assert!(matches!(
            registry.next_candidate(TeamId(3)),
            Err(Error::EmptyPool(TeamId(3)))
        ));
    }

    #[test]
    fn next_candidate_carries_cap() {
        let registry = Registry::rebuild(input());
        assert_eq!(registry.next_candidate(TeamId(1)).unwrap(), (UserId(11), 3));
        assert_eq!(registry.next_candidate(TeamId(1)).unwrap(), (UserId(12), 3));
    }

    #[test]
    fn rebuild_resets_rotation() {
        let first = Registry::rebuild(input());
        first.next_candidate(TeamId(1)).unwrap();

        let second = Registry::rebuild(input());
        assert_eq!(first.summary(), second.summary());
        assert_eq!(
            second.get(TeamId(1)).unwrap().pool.members(),
            first.get(TeamId(1)).unwrap().pool.members()
        );
        assert_eq!(second.next_candidate(TeamId(1)).unwrap().0, UserId(11));
    }

    #[tokio::test]
    async fn load_reads_members_of_round_robin_teams_only() {
        let store = MemoryStore::new();
        store.put_team(Team::round_robin(1, "support", 2), users(&[3, 1, 2]));
        store.put_team(Team::manual(2, "billing"), users(&[9]));

        let registry = Registry::load(&store).await.unwrap();
        assert_eq!(registry.summary(), vec![(TeamId(1), 3, 2)]);
        assert_eq!(
            registry.get(TeamId(1)).unwrap().pool.members(),
            &[UserId(3), UserId(1), UserId(2)]
        );
    }
}
