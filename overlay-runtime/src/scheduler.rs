//! Slot scheduling: which activation occupies which named screen slot

use crate::activation::{ActivationCache, Stage};
use crate::{NodeId, ViewTree};
use overlay_core::{ActivationId, Distribution, Position, TimeWindow};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Precedence between instances claiming the same slot at the same
/// position. The start-based policies also pick which of an instance's own
/// overlapping windows speaks for it. Ties on start fall back to declared
/// order: the first window within an instance, the last instance across
/// instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// The instance declared last in the distribution wins
    #[default]
    LastDeclared,
    /// The instance declared first in the distribution wins
    FirstDeclared,
    /// The instance whose active window in the slot started most recently
    /// wins
    LatestStart,
    /// The instance whose active window in the slot started earliest wins
    EarliestStart,
}

impl OverlapPolicy {
    /// Checks if `candidate`, declared after `incumbent`, takes the slot
    fn prefers(self, candidate: &TimeWindow, incumbent: &TimeWindow) -> bool {
        match self {
            OverlapPolicy::LastDeclared => true,
            OverlapPolicy::FirstDeclared => false,
            OverlapPolicy::LatestStart => candidate.start() >= incumbent.start(),
            OverlapPolicy::EarliestStart => candidate.start() <= incumbent.start(),
        }
    }

    /// Checks if `candidate`, declared after `current` in the same instance,
    /// speaks for that instance instead
    fn prefers_within(self, candidate: &TimeWindow, current: &TimeWindow) -> bool {
        match self {
            OverlapPolicy::LatestStart => candidate.start() > current.start(),
            OverlapPolicy::EarliestStart => candidate.start() < current.start(),
            OverlapPolicy::LastDeclared | OverlapPolicy::FirstDeclared => false,
        }
    }
}

#[derive(Debug)]
struct Slot {
    name: String,
    container: NodeId,
    occupant: Option<ActivationId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChange {
    pub slot: String,
    pub activation: ActivationId,
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The tick was skipped because a detail view is open
    pub suspended: bool,
    pub deactivated: Vec<SlotChange>,
    pub activated: Vec<SlotChange>,
}

impl TickReport {
    fn suspended() -> Self {
        Self {
            suspended: true,
            ..Self::default()
        }
    }

    /// Checks if the tick changed nothing
    pub fn is_noop(&self) -> bool {
        self.deactivated.is_empty() && self.activated.is_empty()
    }
}

/// Owns the slot → activation mapping
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    slots: Vec<Slot>,
    policy: OverlapPolicy,
}

impl Scheduler {
    pub(crate) fn new(policy: OverlapPolicy) -> Self {
        Self {
            slots: Vec::new(),
            policy,
        }
    }

    /// Creates a container for every name not declared yet and returns the
    /// containers for all requested names
    pub(crate) fn declare<I, S>(&mut self, names: I, views: &mut ViewTree) -> Vec<(String, NodeId)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut declared = Vec::new();
        for name in names {
            let name = name.into();
            let container = match self.container(&name) {
                Some(existing) => existing,
                None => {
                    let container = views.add_container(format!("slot:{}", name));
                    self.slots.push(Slot {
                        name: name.clone(),
                        container,
                        occupant: None,
                    });
                    container
                }
            };
            declared.push((name, container));
        }
        declared
    }

    pub(crate) fn container(&self, slot: &str) -> Option<NodeId> {
        self.slots.iter().find(|s| s.name == slot).map(|s| s.container)
    }

    pub(crate) fn occupant(&self, slot: &str) -> Option<ActivationId> {
        self.slots.iter().find(|s| s.name == slot).and_then(|s| s.occupant)
    }

    pub(crate) fn slot_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots.iter().map(|s| s.name.as_str())
    }

    /// Resolves which activation each declared slot should hold at `position`
    pub(crate) fn resolve(&self, distribution: &Distribution, position: Position) -> HashMap<String, ActivationId> {
        let mut claims: HashMap<&str, (ActivationId, &TimeWindow)> = HashMap::new();

        for instance in distribution.instances() {
            let mut own: Vec<(&str, &TimeWindow)> = Vec::new();
            for window in instance.active_windows(position) {
                let slot = window.slot();
                if self.container(slot).is_none() {
                    debug!(
                        "Activation {} targets undeclared slot {}, skipping",
                        instance.external_id, slot
                    );
                    continue;
                }
                match own.iter_mut().find(|(s, _)| *s == slot) {
                    Some(entry) => {
                        if self.policy.prefers_within(window, entry.1) {
                            entry.1 = window;
                        }
                    }
                    None => own.push((slot, window)),
                }
            }

            for (slot, window) in own {
                match claims.get(slot) {
                    Some((_, incumbent)) if !self.policy.prefers(window, incumbent) => {}
                    _ => {
                        claims.insert(slot, (instance.external_id, window));
                    }
                }
            }
        }

        claims
            .into_iter()
            .map(|(slot, (id, _))| (slot.to_string(), id))
            .collect()
    }

    /// Brings slot occupancy in line with `position`. A no-op while any
    /// activation is in detail mode, and when nothing changed since the
    /// previous tick.
    pub(crate) fn tick(
        &mut self,
        position: Position,
        distribution: Option<&Distribution>,
        activations: &mut ActivationCache,
        stage: &mut Stage,
    ) -> TickReport {
        if activations.in_detail().is_some() {
            return TickReport::suspended();
        }

        let desired = distribution
            .map(|d| self.resolve(d, position))
            .unwrap_or_default();
        let mut report = TickReport::default();

        // Every slot is vacated before any slot is filled, so an activation
        // moving between slots is never recorded in two of them.
        for slot in &mut self.slots {
            let Some(current) = slot.occupant else {
                continue;
            };
            if desired.get(&slot.name) == Some(&current) {
                continue;
            }
            debug!(
                "Deactivating {} from position {} at {} ms",
                current, slot.name, position
            );
            if let Some(activation) = activations.get_mut(current) {
                activation.hide(stage);
            }
            slot.occupant = None;
            report.deactivated.push(SlotChange {
                slot: slot.name.clone(),
                activation: current,
            });
        }

        let mut placed: HashSet<ActivationId> = self.slots.iter().filter_map(|s| s.occupant).collect();

        for slot in &mut self.slots {
            let Some(&wanted) = desired.get(&slot.name) else {
                continue;
            };
            if slot.occupant == Some(wanted) {
                continue;
            }
            if placed.contains(&wanted) {
                debug!(
                    "Activation {} already occupies another slot, leaving {} empty",
                    wanted, slot.name
                );
                continue;
            }
            let Some(activation) = activations.get_mut(wanted) else {
                debug!("Activation {} not loaded, leaving {} empty", wanted, slot.name);
                continue;
            };

            let root = activation.root();
            stage.views.detach(root);
            stage.views.clear(slot.container);
            stage.views.attach(root, slot.container);
            debug!(
                "Activating {} in position {} at {} ms",
                wanted, slot.name, position
            );
            activation.show(stage);

            slot.occupant = Some(wanted);
            placed.insert(wanted);
            report.activated.push(SlotChange {
                slot: slot.name.clone(),
                activation: wanted,
            });
        }

        report
    }

    /// Hides `id` and clears every slot it occupies
    pub(crate) fn evict(&mut self, id: ActivationId, activations: &mut ActivationCache, stage: &mut Stage) {
        for slot in self.slots.iter_mut().filter(|s| s.occupant == Some(id)) {
            slot.occupant = None;
        }
        if let Some(activation) = activations.get_mut(id) {
            activation.hide(stage);
        }
    }

    /// Hides every activation and clears all occupancy
    pub(crate) fn clear_all(&mut self, activations: &mut ActivationCache, stage: &mut Stage) {
        for activation in activations.iter_mut() {
            activation.hide(stage);
        }
        for slot in &mut self.slots {
            slot.occupant = None;
        }
    }
}
