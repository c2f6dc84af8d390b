//! Per-unit metadata and merge-lock bookkeeping.

use std::{collections::BTreeMap, time::Duration};

use merge_grid_core::{Board, CellCoord, InstanceId, Level, UnitType};

/// Metadata attached to an instance that represents a mergeable unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unit {
    unit_type: UnitType,
    level: Level,
    home: Option<(Board, CellCoord)>,
    merge_locked: bool,
    lock_expires_at: Option<Duration>,
}

impl Unit {
    /// Creates an unlocked unit whose home is the provided cell.
    #[must_use]
    pub fn new(unit_type: UnitType, level: Level, board: Board, cell: CellCoord) -> Self {
        Self {
            unit_type,
            level,
            home: Some((board, cell)),
            merge_locked: false,
            lock_expires_at: None,
        }
    }

    /// Family of the unit.
    #[must_use]
    pub fn unit_type(&self) -> &UnitType {
        &self.unit_type
    }

    /// Level of the unit.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Cell the unit belongs to, kept while the unit is lifted off the board.
    #[must_use]
    pub fn home(&self) -> Option<(Board, CellCoord)> {
        self.home
    }

    /// Whether the unit is cooling down after a merge.
    #[must_use]
    pub fn is_merge_locked(&self) -> bool {
        self.merge_locked
    }

    /// Simulation time at which the current lock lapses.
    #[must_use]
    pub fn lock_expires_at(&self) -> Option<Duration> {
        self.lock_expires_at
    }
}

/// Unit records keyed by instance.
#[derive(Clone, Debug, Default)]
pub struct UnitRoster {
    units: BTreeMap<InstanceId, Unit>,
}

impl UnitRoster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a record to an instance, returning the record it replaces.
    pub fn insert(&mut self, instance: InstanceId, unit: Unit) -> Option<Unit> {
        self.units.insert(instance, unit)
    }

    /// Detaches and returns the record of an instance.
    pub fn remove(&mut self, instance: InstanceId) -> Option<Unit> {
        self.units.remove(&instance)
    }

    /// Borrows the record of an instance.
    #[must_use]
    pub fn get(&self, instance: InstanceId) -> Option<&Unit> {
        self.units.get(&instance)
    }

    /// Number of recorded units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Reports whether no units are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Records in instance order.
    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &Unit)> {
        self.units.iter().map(|(id, unit)| (*id, unit))
    }

    /// Updates the home cell of a unit. Returns `false` for unknown instances.
    pub fn set_home(&mut self, instance: InstanceId, home: Option<(Board, CellCoord)>) -> bool {
        match self.units.get_mut(&instance) {
            Some(unit) => {
                unit.home = home;
                true
            }
            None => false,
        }
    }

    /// Whether the instance is a unit under merge lock.
    #[must_use]
    pub fn is_locked(&self, instance: InstanceId) -> bool {
        self.units
            .get(&instance)
            .is_some_and(Unit::is_merge_locked)
    }

    /// Locks a unit until `now + cooldown`.
    ///
    /// Locking an already locked unit restarts its cooldown rather than
    /// stacking a second one. Returns `false` for unknown instances.
    pub fn lock(&mut self, instance: InstanceId, now: Duration, cooldown: Duration) -> bool {
        match self.units.get_mut(&instance) {
            Some(unit) => {
                unit.merge_locked = true;
                unit.lock_expires_at = Some(now.saturating_add(cooldown));
                true
            }
            None => false,
        }
    }

    /// Clears every lock that lapsed at or before `now`.
    ///
    /// Returns the unlocked instances in instance order.
    pub fn expire(&mut self, now: Duration) -> Vec<InstanceId> {
        let mut unlocked = Vec::new();
        for (instance, unit) in &mut self.units {
            let lapsed = unit.lock_expires_at.is_some_and(|deadline| deadline <= now);
            if unit.merge_locked && lapsed {
                unit.merge_locked = false;
                unit.lock_expires_at = None;
                unlocked.push(*instance);
            }
        }
        unlocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knife(level: u32) -> Unit {
        Unit::new(
            UnitType::new("Knife"),
            Level::new(level).expect("positive level"),
            Board::B,
            CellCoord::new(0, 0),
        )
    }

    #[test]
    fn lock_lapses_after_cooldown() {
        let mut roster = UnitRoster::new();
        let id = InstanceId::new(1);
        let _ = roster.insert(id, knife(2));

        assert!(roster.lock(id, Duration::from_millis(100), Duration::from_millis(250)));
        assert!(roster.is_locked(id));
        assert!(roster.expire(Duration::from_millis(349)).is_empty());
        assert_eq!(roster.expire(Duration::from_millis(350)), vec![id]);
        assert!(!roster.is_locked(id));
    }

    #[test]
    fn relocking_restarts_the_cooldown() {
        let mut roster = UnitRoster::new();
        let id = InstanceId::new(1);
        let _ = roster.insert(id, knife(1));

        assert!(roster.lock(id, Duration::ZERO, Duration::from_millis(250)));
        assert!(roster.lock(id, Duration::from_millis(200), Duration::from_millis(250)));
        assert!(roster.expire(Duration::from_millis(300)).is_empty());
        assert_eq!(
            roster.get(id).and_then(Unit::lock_expires_at),
            Some(Duration::from_millis(450))
        );
        assert_eq!(roster.expire(Duration::from_millis(450)), vec![id]);
    }

    #[test]
    fn unknown_instances_cannot_be_locked() {
        let mut roster = UnitRoster::new();
        assert!(!roster.lock(InstanceId::new(3), Duration::ZERO, Duration::ZERO));
        assert!(!roster.set_home(InstanceId::new(3), None));
        assert!(roster.is_empty());
    }
}
