//! Vehicle registry and active-vehicle selection.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use glam::DMat4;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::game_loop::Updatable;
use crate::host::Environment;
use crate::input::InputState;
use crate::vehicle::{Vehicle, VehicleId, VehicleKind, VehicleState};

/// Manager tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// How often model readiness is polled (s).
    pub poll_interval: f64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self { poll_interval: 0.1 }
    }
}

/// Snapshot of the active vehicle, published once per tick.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveVehicle {
    pub id: VehicleId,
    pub kind: VehicleKind,
    pub state: VehicleState,
    pub rover_mode: bool,
    pub collision_enabled: bool,
    pub crashed: bool,
}

impl ActiveVehicle {
    fn of(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id().clone(),
            kind: vehicle.kind(),
            state: *vehicle.state(),
            rover_mode: vehicle.rover_mode(),
            collision_enabled: vehicle.collision_enabled(),
            crashed: vehicle.is_crashed(),
        }
    }
}

/// Read handle on the active vehicle. Only [`VehicleManager`] writes it.
#[derive(Clone, Debug, Default)]
pub struct ActiveVehicleView(Arc<RwLock<Option<ActiveVehicle>>>);

impl ActiveVehicleView {
    pub fn get(&self) -> Option<ActiveVehicle> {
        match self.0.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn set(&self, active: Option<ActiveVehicle>) {
        match self.0.write() {
            Ok(mut guard) => *guard = active,
            Err(poisoned) => *poisoned.into_inner() = active,
        }
    }
}

/// Owns every vehicle and fans ticks out to them.
pub struct VehicleManager {
    env: Environment,
    config: ManagerConfig,
    vehicles: HashMap<VehicleId, Vehicle>,
    active: Option<VehicleId>,
    pending_activation: Option<VehicleId>,
    poll_timer: f64,
    input: InputState,
    view: ActiveVehicleView,
}

impl VehicleManager {
    pub fn new(env: Environment, config: ManagerConfig) -> Self {
        Self {
            env,
            config,
            vehicles: HashMap::new(),
            active: None,
            pending_activation: None,
            poll_timer: 0.0,
            input: InputState::default(),
            view: ActiveVehicleView::default(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Shared view of the active vehicle for the camera and bridge.
    pub fn view(&self) -> ActiveVehicleView {
        self.view.clone()
    }

    /// Input for the next tick. Only the active vehicle receives it.
    pub fn set_input(&mut self, input: InputState) {
        self.input = input;
    }

    /// Register a vehicle and start loading its model.
    ///
    /// A vehicle with the same id is destroyed first. With `activate`, or
    /// when nothing is active or queued yet, the vehicle becomes active once
    /// polling observes it ready.
    pub fn add_vehicle(&mut self, mut vehicle: Vehicle, activate: bool) {
        let id = vehicle.id().clone();
        if self.vehicles.contains_key(&id) {
            self.remove_vehicle(&id);
        }

        vehicle.initialize(&self.env);
        tracing::info!(vehicle = %id, kind = %vehicle.kind(), "vehicle added");
        self.vehicles.insert(id.clone(), vehicle);
        if activate || (self.active.is_none() && self.pending_activation.is_none()) {
            self.pending_activation = Some(id);
        }
        // Poll on the next tick.
        self.poll_timer = self.config.poll_interval;
    }

    /// Destroy and drop a vehicle. If it was active, another ready vehicle
    /// takes over, or failing that a loading one once it is ready.
    pub fn remove_vehicle(&mut self, id: &VehicleId) -> bool {
        let Some(mut vehicle) = self.vehicles.remove(id) else {
            return false;
        };
        vehicle.destroy(&self.env);
        tracing::info!(vehicle = %id, "vehicle removed");

        if self.pending_activation.as_ref() == Some(id) {
            self.pending_activation = None;
        }
        if self.active.as_ref() == Some(id) {
            self.active = self.ready_ids().into_iter().next();
            match &self.active {
                Some(next) => tracing::info!(vehicle = %next, "active vehicle changed"),
                None if self.pending_activation.is_none() => {
                    self.pending_activation = self.loading_ids().into_iter().next();
                }
                None => {}
            }
        }
        self.publish();
        true
    }

    /// Make a ready vehicle active.
    pub fn set_active_vehicle(&mut self, id: &VehicleId) -> Result<()> {
        let vehicle = self
            .vehicles
            .get(id)
            .ok_or_else(|| Error::UnknownVehicle(id.clone()))?;
        if !vehicle.is_ready() {
            return Err(Error::VehicleNotReady(id.clone()));
        }
        if self.active.as_ref() != Some(id) {
            tracing::info!(vehicle = %id, "active vehicle changed");
        }
        self.active = Some(id.clone());
        self.publish();
        Ok(())
    }

    pub fn active_id(&self) -> Option<&VehicleId> {
        self.active.as_ref()
    }

    pub fn active_vehicle(&self) -> Option<&Vehicle> {
        self.active.as_ref().and_then(|id| self.vehicles.get(id))
    }

    pub fn active_vehicle_mut(&mut self) -> Option<&mut Vehicle> {
        let id = self.active.as_ref()?;
        self.vehicles.get_mut(id)
    }

    pub fn vehicle(&self, id: &VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    pub fn vehicle_mut(&mut self, id: &VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Activate the next ready vehicle in id order, wrapping around.
    pub fn switch_to_next_vehicle(&mut self) -> Option<VehicleId> {
        self.cycle(true)
    }

    /// Activate the previous ready vehicle in id order, wrapping around.
    pub fn switch_to_previous_vehicle(&mut self) -> Option<VehicleId> {
        self.cycle(false)
    }

    /// Destroy every vehicle.
    pub fn destroy_all(&mut self) {
        for (_, mut vehicle) in self.vehicles.drain() {
            vehicle.destroy(&self.env);
        }
        self.active = None;
        self.pending_activation = None;
        self.publish();
    }

    /// Model transforms of every ready vehicle.
    pub fn model_matrices(&self) -> Vec<(VehicleId, VehicleKind, DMat4)> {
        let mut out: Vec<_> = self
            .vehicles
            .values()
            .filter(|vehicle| vehicle.is_ready())
            .map(|vehicle| (vehicle.id().clone(), vehicle.kind(), vehicle.model_matrix()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Re-publish the active vehicle snapshot after an out-of-tick change.
    pub fn publish(&self) {
        let active = self.active_vehicle().map(ActiveVehicle::of);
        self.view.set(active);
    }

    fn ready_ids(&self) -> Vec<VehicleId> {
        let mut ids: Vec<VehicleId> = self
            .vehicles
            .values()
            .filter(|vehicle| vehicle.is_ready())
            .map(|vehicle| vehicle.id().clone())
            .collect();
        ids.sort();
        ids
    }

    fn loading_ids(&self) -> Vec<VehicleId> {
        let mut ids: Vec<VehicleId> = self
            .vehicles
            .values()
            .filter(|vehicle| !vehicle.is_ready() && vehicle.body().load_error().is_none())
            .map(|vehicle| vehicle.id().clone())
            .collect();
        ids.sort();
        ids
    }

    fn cycle(&mut self, forward: bool) -> Option<VehicleId> {
        let ids = self.ready_ids();
        if ids.is_empty() {
            return None;
        }
        let len = ids.len();
        let current = self
            .active
            .as_ref()
            .and_then(|id| ids.iter().position(|i| i == id));
        let next = match current {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None => 0,
        };
        let id = ids[next].clone();
        self.set_active_vehicle(&id).ok()?;
        Some(id)
    }

    fn poll(&mut self) {
        for vehicle in self.vehicles.values_mut() {
            vehicle.poll_ready();
        }

        let Some(id) = self.pending_activation.clone() else {
            return;
        };
        match self.vehicles.get(&id) {
            Some(vehicle) if vehicle.is_ready() => {
                self.pending_activation = None;
                if let Err(e) = self.set_active_vehicle(&id) {
                    tracing::warn!(vehicle = %id, "activation failed: {e}");
                }
            }
            Some(vehicle) if vehicle.body().load_error().is_some() => {
                tracing::warn!(vehicle = %id, "vehicle will not become active");
                self.pending_activation = None;
            }
            Some(_) => {}
            None => self.pending_activation = None,
        }
    }
}

impl Updatable for VehicleManager {
    fn update(&mut self, dt: f64) {
        self.poll_timer += dt;
        if self.poll_timer >= self.config.poll_interval {
            self.poll_timer = 0.0;
            self.poll();
        }

        let neutral = InputState::default();
        for (id, vehicle) in &mut self.vehicles {
            let input = if self.active.as_ref() == Some(id) {
                &self.input
            } else {
                &neutral
            };
            if let Err(e) = vehicle.update(dt, input, &self.env) {
                tracing::warn!(vehicle = %id, "tick rejected: {e}");
            }
        }

        self.publish();
    }
}
