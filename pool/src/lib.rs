#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Template-keyed instance recycling.
//!
//! A [`PoolRegistry`] owns one pool per template. Spawning hands out an
//! inactive instance (creating one when the pool policy allows it), releasing
//! parks it again for reuse. Instances never migrate between pools and each
//! one is, at any time, either active or inactive in exactly the pool that
//! created it.
//!
//! The registry is a plain single-owner value. Hosts that share it across
//! threads must serialise access themselves, for example by wrapping it in a
//! `Mutex`; no operation relies on being interleaved with another.

mod pool;

use std::collections::{BTreeMap, HashMap};

use glam::{Quat, Vec3};
use log::{debug, error, warn};
use merge_grid_core::{config::PoolDefaults, Capacity, InstanceId, ParentId, PoolError, TemplateId};

use crate::pool::Pool;

/// Lifecycle hooks invoked by the pool on the payload of an instance.
pub trait Poolable {
    /// Called once each time the instance is handed out by `spawn`.
    fn on_spawned(&mut self) {}

    /// Called once each time the instance is returned by `release`.
    fn on_despawned(&mut self) {}
}

/// Source of payloads for the templates a registry may pool.
pub trait Blueprints {
    /// Payload carried by every pooled instance.
    type Payload: Poolable;

    /// Reports whether the template names a known blueprint.
    fn contains(&self, template: &TemplateId) -> bool;

    /// Builds a fresh payload for a known template.
    fn instantiate(&mut self, template: &TemplateId) -> Self::Payload;
}

/// Spatial context of an instance while it is spawned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// World-space position.
    pub position: Vec3,
    /// World-space orientation.
    pub orientation: Quat,
    /// Scene node the instance hangs under, if any.
    pub parent: Option<ParentId>,
}

impl Placement {
    /// Context of an instance parked in its pool.
    pub const DETACHED: Placement = Placement {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
        parent: None,
    };

    /// Unrotated, unparented placement at the provided position.
    #[must_use]
    pub const fn at(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
            parent: None,
        }
    }

    /// Overrides the parent node.
    #[must_use]
    pub fn with_parent(mut self, parent: ParentId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Overrides the orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }
}

/// A pooled object together with its bookkeeping.
#[derive(Clone, Debug)]
pub struct Instance<P> {
    id: InstanceId,
    template: TemplateId,
    placement: Placement,
    payload: P,
}

impl<P> Instance<P> {
    pub(crate) fn new(id: InstanceId, template: TemplateId, placement: Placement, payload: P) -> Self {
        Self {
            id,
            template,
            placement,
            payload,
        }
    }

    /// Identifier minted when the instance was created.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Template of the pool owning the instance.
    #[must_use]
    pub fn template(&self) -> &TemplateId {
        &self.template
    }

    /// Current spatial context.
    #[must_use]
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Borrows the payload.
    #[must_use]
    pub fn payload(&self) -> &P {
        &self.payload
    }
}

/// Sizing and growth policy of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolPolicy {
    /// Minimum number of inactive instances kept after creation.
    pub initial_size: usize,
    /// Upper bound on active plus inactive instances.
    pub capacity: Capacity,
    /// Whether an empty pool may grow past its capacity on spawn.
    pub auto_expand: bool,
}

impl PoolPolicy {
    /// Creates a policy from explicit values.
    #[must_use]
    pub const fn new(initial_size: usize, capacity: Capacity, auto_expand: bool) -> Self {
        Self {
            initial_size,
            capacity,
            auto_expand,
        }
    }
}

impl Default for PoolPolicy {
    fn default() -> Self {
        PoolDefaults::default().into()
    }
}

impl From<PoolDefaults> for PoolPolicy {
    fn from(defaults: PoolDefaults) -> Self {
        Self {
            initial_size: defaults.initial_size,
            capacity: defaults.capacity(),
            auto_expand: defaults.auto_expand,
        }
    }
}

/// Active and inactive instance counts of a pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances currently handed out.
    pub active: usize,
    /// Instances parked for reuse.
    pub inactive: usize,
}

/// Result of returning an instance to the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The instance was parked for reuse.
    Recycled,
    /// The pool was full, so the instance was destroyed instead of parked.
    Trimmed,
    /// No pool tracks the instance; nothing was recycled.
    Orphaned,
    /// The instance was already parked; nothing changed.
    AlreadyInactive,
}

/// Owner of every pool, keyed by template.
pub struct PoolRegistry<B: Blueprints> {
    blueprints: B,
    defaults: PoolPolicy,
    pools: BTreeMap<TemplateId, Pool<B::Payload>>,
    owners: HashMap<InstanceId, TemplateId>,
    next_instance: u64,
}

impl<B: Blueprints> std::fmt::Debug for PoolRegistry<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("defaults", &self.defaults)
            .field("pools", &self.pools.len())
            .field("instances", &self.owners.len())
            .finish_non_exhaustive()
    }
}

impl<B: Blueprints> PoolRegistry<B> {
    /// Creates an empty registry. `defaults` applies to pools created on demand.
    #[must_use]
    pub fn new(blueprints: B, defaults: PoolPolicy) -> Self {
        Self {
            blueprints,
            defaults,
            pools: BTreeMap::new(),
            owners: HashMap::new(),
            next_instance: 0,
        }
    }

    /// Creates the pool for `template`, or updates the policy of the existing one.
    ///
    /// In both cases the pool is topped up to at least `initial_size` inactive
    /// instances, within its capacity. Existing instances are never discarded.
    pub fn create_pool(&mut self, template: &TemplateId, policy: PoolPolicy) -> Result<(), PoolError> {
        self.check_template(template)?;

        match self.pools.get_mut(template) {
            Some(pool) => pool.set_policy(policy.capacity, policy.auto_expand),
            None => {
                let pool = Pool::new(template.clone(), policy.capacity, policy.auto_expand);
                let _ = self.pools.insert(template.clone(), pool);
            }
        }

        let inactive = self.stats(template).inactive;
        let _ = self.fill(template, policy.initial_size.saturating_sub(inactive));
        Ok(())
    }

    /// Hands out an instance of `template` placed at `placement`.
    ///
    /// Reuses the oldest inactive instance when one exists. Otherwise a new
    /// instance is created if the pool has room or may auto-expand; a full,
    /// non-expanding pool yields [`PoolError::Exhausted`] and nothing changes.
    pub fn spawn(&mut self, template: &TemplateId, placement: Placement) -> Result<InstanceId, PoolError> {
        self.check_template(template)?;
        self.ensure_pool(template);

        let Some(pool) = self.pools.get(template) else {
            return Err(PoolError::InvalidTemplate {
                template: template.clone(),
            });
        };
        if pool.inactive_count() == 0 {
            if !pool.may_grow() {
                let capacity = pool.capacity();
                warn!("pool for `{template}` is at max size {capacity}; spawn refused");
                return Err(PoolError::Exhausted {
                    template: template.clone(),
                    capacity,
                });
            }
            let instance = self.mint(template);
            if let Some(pool) = self.pools.get_mut(template) {
                pool.insert_inactive(instance);
            }
        }

        let Some(pool) = self.pools.get_mut(template) else {
            return Err(PoolError::InvalidTemplate {
                template: template.clone(),
            });
        };
        let Some(id) = pool.checkout() else {
            return Err(PoolError::Exhausted {
                template: template.clone(),
                capacity: pool.capacity(),
            });
        };
        if let Some(instance) = pool.instance_mut(id) {
            instance.placement = placement;
            instance.payload.on_spawned();
        }
        debug!("spawned {} from `{template}`", id.get());
        Ok(id)
    }

    /// Returns an active instance to its pool.
    ///
    /// The payload's despawn hook fires and the instance is detached from its
    /// parent. A pool already holding its full capacity destroys the instance
    /// instead of parking it. Unknown instances are reported as orphans and no
    /// pool's accounting changes.
    pub fn release(&mut self, id: InstanceId) -> ReleaseOutcome {
        let Some(template) = self.owners.get(&id) else {
            warn!("release of untracked instance {}; not recycled", id.get());
            return ReleaseOutcome::Orphaned;
        };
        let Some(pool) = self.pools.get_mut(template) else {
            warn!("instance {} names a missing pool `{template}`", id.get());
            return ReleaseOutcome::Orphaned;
        };

        if !pool.deactivate(id) {
            debug!("instance {} is already parked in `{template}`", id.get());
            return ReleaseOutcome::AlreadyInactive;
        }

        if let Some(instance) = pool.instance_mut(id) {
            instance.payload.on_despawned();
            instance.placement = Placement::DETACHED;
        }

        match pool.park(id) {
            None => {
                debug!("released {} into `{}`", id.get(), pool.template());
                ReleaseOutcome::Recycled
            }
            Some(trimmed) => {
                warn!(
                    "pool `{}` is full at {}; destroying instance {}",
                    pool.template(),
                    pool.capacity(),
                    trimmed.id().get()
                );
                let _ = self.owners.remove(&id);
                ReleaseOutcome::Trimmed
            }
        }
    }

    /// Creates up to `count` additional inactive instances, bounded by capacity.
    ///
    /// Returns the number of instances actually created.
    pub fn prewarm(&mut self, template: &TemplateId, count: usize) -> Result<usize, PoolError> {
        self.check_template(template)?;
        self.ensure_pool(template);
        Ok(self.fill(template, count))
    }

    /// Returns every active instance of `template` to the pool in one batch.
    ///
    /// Returns the number of instances released.
    pub fn despawn_all(&mut self, template: &TemplateId) -> usize {
        let Some(pool) = self.pools.get(template) else {
            return 0;
        };
        let snapshot = pool.active_ids();
        let released = snapshot.len();
        for id in snapshot {
            let _ = self.release(id);
        }
        released
    }

    /// Active and inactive counts of the pool for `template`.
    ///
    /// A template without a pool reports zero for both.
    #[must_use]
    pub fn stats(&self, template: &TemplateId) -> PoolStats {
        self.pools
            .get(template)
            .map_or_else(PoolStats::default, |pool| PoolStats {
                active: pool.active_count(),
                inactive: pool.inactive_count(),
            })
    }

    /// Current capacity and growth flag of the pool for `template`.
    #[must_use]
    pub fn policy(&self, template: &TemplateId) -> Option<(Capacity, bool)> {
        self.pools
            .get(template)
            .map(|pool| (pool.capacity(), pool.auto_expand()))
    }

    /// Reports whether a pool exists for `template`.
    #[must_use]
    pub fn has_pool(&self, template: &TemplateId) -> bool {
        self.pools.contains_key(template)
    }

    /// Template of the pool that created the instance.
    #[must_use]
    pub fn owner(&self, id: InstanceId) -> Option<&TemplateId> {
        self.owners.get(&id)
    }

    /// Reports whether the instance is currently handed out.
    #[must_use]
    pub fn is_active(&self, id: InstanceId) -> bool {
        self.owners
            .get(&id)
            .and_then(|template| self.pools.get(template))
            .is_some_and(|pool| pool.is_active(id))
    }

    /// Borrows a tracked instance.
    #[must_use]
    pub fn instance(&self, id: InstanceId) -> Option<&Instance<B::Payload>> {
        let template = self.owners.get(&id)?;
        self.pools.get(template)?.instance(id)
    }

    /// Borrows the payload of a tracked instance.
    #[must_use]
    pub fn payload(&self, id: InstanceId) -> Option<&B::Payload> {
        self.instance(id).map(Instance::payload)
    }

    /// Mutably borrows the payload of a tracked instance.
    pub fn payload_mut(&mut self, id: InstanceId) -> Option<&mut B::Payload> {
        self.instance_mut(id).map(|instance| &mut instance.payload)
    }

    /// Current placement of a tracked instance.
    #[must_use]
    pub fn placement(&self, id: InstanceId) -> Option<Placement> {
        self.instance(id).map(Instance::placement)
    }

    /// Moves an active instance. Returns `false` for parked or unknown instances.
    pub fn set_placement(&mut self, id: InstanceId, placement: Placement) -> bool {
        if !self.is_active(id) {
            return false;
        }
        match self.instance_mut(id) {
            Some(instance) => {
                instance.placement = placement;
                true
            }
            None => false,
        }
    }

    /// Moves an active instance without touching its orientation or parent.
    pub fn set_position(&mut self, id: InstanceId, position: Vec3) -> bool {
        match self.placement(id) {
            Some(placement) => self.set_placement(id, Placement { position, ..placement }),
            None => false,
        }
    }

    fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance<B::Payload>> {
        let template = self.owners.get(&id)?;
        self.pools.get_mut(template)?.instance_mut(id)
    }

    fn check_template(&self, template: &TemplateId) -> Result<(), PoolError> {
        if template.is_blank() || !self.blueprints.contains(template) {
            error!("template `{template}` is not a known blueprint");
            return Err(PoolError::InvalidTemplate {
                template: template.clone(),
            });
        }
        Ok(())
    }

    fn ensure_pool(&mut self, template: &TemplateId) {
        if self.pools.contains_key(template) {
            return;
        }
        let defaults = self.defaults;
        let pool = Pool::new(template.clone(), defaults.capacity, defaults.auto_expand);
        let _ = self.pools.insert(template.clone(), pool);
        let _ = self.fill(template, defaults.initial_size);
    }

    fn fill(&mut self, template: &TemplateId, count: usize) -> usize {
        let mut created = 0;
        while created < count {
            let has_room = self.pools.get(template).is_some_and(|pool| pool.has_room());
            if !has_room {
                break;
            }
            let instance = self.mint(template);
            if let Some(pool) = self.pools.get_mut(template) {
                pool.insert_inactive(instance);
            }
            created += 1;
        }
        created
    }

    fn mint(&mut self, template: &TemplateId) -> Instance<B::Payload> {
        let id = InstanceId::new(self.next_instance);
        self.next_instance += 1;
        let _ = self.owners.insert(id, template.clone());
        let payload = self.blueprints.instantiate(template);
        Instance::new(id, template.clone(), Placement::DETACHED, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        spawned: u32,
        despawned: u32,
    }

    impl Poolable for Counter {
        fn on_spawned(&mut self) {
            self.spawned += 1;
        }

        fn on_despawned(&mut self) {
            self.despawned += 1;
        }
    }

    struct Known;

    impl Blueprints for Known {
        type Payload = Counter;

        fn contains(&self, template: &TemplateId) -> bool {
            template.as_str() != "ghost"
        }

        fn instantiate(&mut self, _template: &TemplateId) -> Counter {
            Counter::default()
        }
    }

    fn registry() -> PoolRegistry<Known> {
        PoolRegistry::new(Known, PoolPolicy::new(0, Capacity::Unlimited, true))
    }

    #[test]
    fn hooks_fire_once_per_transition() {
        let mut pools = registry();
        let tile = TemplateId::new("tile");
        let id = pools.spawn(&tile, Placement::at(Vec3::X)).expect("spawn");
        assert_eq!(pools.payload(id).map(|c| c.spawned), Some(1));

        assert_eq!(pools.release(id), ReleaseOutcome::Recycled);
        assert_eq!(pools.release(id), ReleaseOutcome::AlreadyInactive);
        let counter = pools.payload(id).expect("tracked");
        assert_eq!((counter.spawned, counter.despawned), (1, 1));
    }

    #[test]
    fn release_detaches_instance() {
        let mut pools = registry();
        let tile = TemplateId::new("tile");
        let placement = Placement::at(Vec3::new(1.0, 0.0, 2.0)).with_parent(ParentId::new(9));
        let id = pools.spawn(&tile, placement).expect("spawn");
        assert_eq!(pools.placement(id), Some(placement));

        let _ = pools.release(id);
        assert_eq!(pools.placement(id), Some(Placement::DETACHED));
        assert!(!pools.set_position(id, Vec3::ONE), "parked instances stay put");
    }

    #[test]
    fn unknown_template_is_refused() {
        let mut pools = registry();
        let ghost = TemplateId::new("ghost");
        assert_eq!(
            pools.spawn(&ghost, Placement::DETACHED),
            Err(PoolError::InvalidTemplate {
                template: ghost.clone()
            })
        );
        assert!(!pools.has_pool(&ghost));
        assert!(pools.create_pool(&TemplateId::new(""), PoolPolicy::default()).is_err());
    }

    #[test]
    fn trimmed_instances_become_orphans() {
        let mut pools = registry();
        let tile = TemplateId::new("tile");
        pools
            .create_pool(&tile, PoolPolicy::new(0, Capacity::Bounded(1), true))
            .expect("pool");
        let first = pools.spawn(&tile, Placement::DETACHED).expect("first");
        let second = pools.spawn(&tile, Placement::DETACHED).expect("auto-expanded");

        assert_eq!(pools.release(first), ReleaseOutcome::Trimmed);
        assert_eq!(pools.release(second), ReleaseOutcome::Recycled);
        assert_eq!(pools.release(first), ReleaseOutcome::Orphaned);
        assert_eq!(pools.stats(&tile), PoolStats { active: 0, inactive: 1 });
    }
}
