//! Per-template recycling container.

use std::collections::{BTreeSet, HashMap, VecDeque};

use merge_grid_core::{Capacity, InstanceId, TemplateId};

use crate::Instance;

/// Inactive queue plus active set for a single template.
///
/// Every instance stored in `instances` is a member of exactly one of
/// `inactive` or `active`.
#[derive(Debug)]
pub(crate) struct Pool<P> {
    template: TemplateId,
    capacity: Capacity,
    auto_expand: bool,
    inactive: VecDeque<InstanceId>,
    active: BTreeSet<InstanceId>,
    instances: HashMap<InstanceId, Instance<P>>,
}

impl<P> Pool<P> {
    pub(crate) fn new(template: TemplateId, capacity: Capacity, auto_expand: bool) -> Self {
        Self {
            template,
            capacity,
            auto_expand,
            inactive: VecDeque::new(),
            active: BTreeSet::new(),
            instances: HashMap::new(),
        }
    }

    pub(crate) fn template(&self) -> &TemplateId {
        &self.template
    }

    pub(crate) fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub(crate) fn auto_expand(&self) -> bool {
        self.auto_expand
    }

    pub(crate) fn set_policy(&mut self, capacity: Capacity, auto_expand: bool) {
        self.capacity = capacity;
        self.auto_expand = auto_expand;
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn inactive_count(&self) -> usize {
        self.inactive.len()
    }

    pub(crate) fn total(&self) -> usize {
        self.active.len() + self.inactive.len()
    }

    /// Whether a prewarm may add another instance without breaching capacity.
    pub(crate) fn has_room(&self) -> bool {
        self.capacity.has_room(self.total())
    }

    /// Whether a spawn facing an empty inactive queue may create an instance.
    pub(crate) fn may_grow(&self) -> bool {
        self.auto_expand || self.has_room()
    }

    pub(crate) fn insert_inactive(&mut self, instance: Instance<P>) {
        let id = instance.id();
        self.inactive.push_back(id);
        let _ = self.instances.insert(id, instance);
    }

    /// Moves the oldest inactive instance into the active set.
    pub(crate) fn checkout(&mut self) -> Option<InstanceId> {
        let id = self.inactive.pop_front()?;
        let _ = self.active.insert(id);
        Some(id)
    }

    /// Removes an instance from the active set, reporting whether it was active.
    pub(crate) fn deactivate(&mut self, id: InstanceId) -> bool {
        self.active.remove(&id)
    }

    /// Queues a deactivated instance, or hands it back for destruction when
    /// the pool already holds as many instances as its capacity allows.
    pub(crate) fn park(&mut self, id: InstanceId) -> Option<Instance<P>> {
        if self.capacity.has_room(self.total()) {
            self.inactive.push_back(id);
            None
        } else {
            self.instances.remove(&id)
        }
    }

    pub(crate) fn is_active(&self, id: InstanceId) -> bool {
        self.active.contains(&id)
    }

    /// Snapshot of the active set in identifier order.
    pub(crate) fn active_ids(&self) -> Vec<InstanceId> {
        self.active.iter().copied().collect()
    }

    pub(crate) fn instance(&self, id: InstanceId) -> Option<&Instance<P>> {
        self.instances.get(&id)
    }

    pub(crate) fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance<P>> {
        self.instances.get_mut(&id)
    }
}
