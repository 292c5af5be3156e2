//! Per-consumer device lists and their time-driven power draw.
//!
//! The simulator never touches the network itself: every mutation returns
//! the resulting [`LoadChange`] and the caller pushes it through the
//! hierarchy.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::noise::{device_key, power_at};
use crate::config::SimulationConfig;
use crate::domain::{DeviceType, IoTDevice, NodeId};
use crate::error::GridError;

/// Change of a consumer's aggregate device power.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadChange {
    pub consumer: NodeId,
    pub delta: f64,
}

/// Deltas smaller than this are float residue, not a change.
const LOAD_EPSILON: f64 = 1e-12;

#[derive(Debug)]
pub struct DeviceSimulator {
    devices: BTreeMap<NodeId, Vec<IoTDevice>>,
    block_seconds: u64,
    next_device_seq: u64,
}

impl DeviceSimulator {
    pub fn new(block_seconds: u64) -> Self {
        Self {
            devices: BTreeMap::new(),
            block_seconds: block_seconds.max(1),
            next_device_seq: 0,
        }
    }

    fn next_device_id(&mut self, consumer: &str) -> String {
        self.next_device_seq += 1;
        format!("{consumer}-D{}", self.next_device_seq)
    }

    /// Gives each consumer a random set of catalog devices.
    ///
    /// Returns the total average power per consumer, from which the caller
    /// derives the consumer's service tier.
    pub fn seed_consumers(
        &mut self,
        consumers: &[NodeId],
        cfg: &SimulationConfig,
    ) -> Vec<(NodeId, f64)> {
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let catalog = DeviceType::catalog();
        let min = cfg.min_devices.min(cfg.max_devices);
        let max = cfg.max_devices.max(min);

        let mut totals = Vec::with_capacity(consumers.len());
        for consumer in consumers {
            let count = rng.gen_range(min..=max);
            let mut list = Vec::with_capacity(count);
            for _ in 0..count {
                let device_type = catalog[rng.gen_range(0..catalog.len())];
                let id = self.next_device_id(consumer);
                list.push(IoTDevice::from_catalog(id, device_type));
            }
            let total: f64 = list.iter().map(|d| d.avg_power).sum();
            debug!(consumer = %consumer, devices = list.len(), avg_power = total, "seeded devices");
            self.devices.insert(consumer.clone(), list);
            totals.push((consumer.clone(), total));
        }
        totals
    }

    /// Registers a consumer with an empty device list.
    pub fn ensure_consumer(&mut self, consumer: &str) {
        self.devices.entry(consumer.to_string()).or_default();
    }

    /// Forgets a consumer and its devices.
    pub fn remove_consumer(&mut self, consumer: &str) -> Option<Vec<IoTDevice>> {
        self.devices.remove(consumer)
    }

    pub fn has_consumer(&self, consumer: &str) -> bool {
        self.devices.contains_key(consumer)
    }

    pub fn devices_of(&self, consumer: &str) -> &[IoTDevice] {
        self.devices.get(consumer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every consumer's device list, ordered by consumer id.
    pub fn all(&self) -> &BTreeMap<NodeId, Vec<IoTDevice>> {
        &self.devices
    }

    pub fn current_power_of(&self, consumer: &str) -> f64 {
        self.devices_of(consumer).iter().map(|d| d.current_power).sum()
    }

    pub fn average_power_of(&self, consumer: &str) -> f64 {
        self.devices_of(consumer).iter().map(|d| d.avg_power).sum()
    }

    /// Recomputes every device's draw at `t_seconds`.
    pub fn tick(&mut self, t_seconds: f64) -> Vec<LoadChange> {
        let mut changes = Vec::new();
        for (consumer, devices) in self.devices.iter_mut() {
            let mut delta = 0.0;
            for device in devices.iter_mut() {
                let power = power_at(
                    device.avg_power,
                    device.profile(),
                    device_key(&device.id),
                    t_seconds,
                    self.block_seconds,
                );
                delta += power - device.current_power;
                device.current_power = power;
            }
            if delta.abs() > LOAD_EPSILON {
                changes.push(LoadChange {
                    consumer: consumer.clone(),
                    delta,
                });
            }
        }
        changes
    }

    fn devices_mut(&mut self, consumer: &str) -> Result<&mut Vec<IoTDevice>, GridError> {
        self.devices
            .get_mut(consumer)
            .ok_or_else(|| GridError::NotAConsumer(consumer.to_string()))
    }

    /// Adds a catalog device drawing its average power immediately.
    pub fn add_device(
        &mut self,
        consumer: &str,
        device_type: DeviceType,
        name: Option<String>,
        avg_power: Option<f64>,
    ) -> Result<(IoTDevice, LoadChange), GridError> {
        if let Some(avg) = avg_power {
            validate_power(avg)?;
        }
        if !self.has_consumer(consumer) {
            return Err(GridError::NotAConsumer(consumer.to_string()));
        }
        let id = self.next_device_id(consumer);
        let mut device = IoTDevice::from_catalog(id, device_type);
        if let Some(name) = name {
            device.name = name;
        }
        if let Some(avg) = avg_power {
            device.avg_power = avg;
            device.current_power = avg;
        }
        let change = LoadChange {
            consumer: consumer.to_string(),
            delta: device.current_power,
        };
        self.devices_mut(consumer)?.push(device.clone());
        Ok((device, change))
    }

    pub fn remove_device(&mut self, consumer: &str, device_id: &str) -> Result<(IoTDevice, LoadChange), GridError> {
        let devices = self.devices_mut(consumer)?;
        let position = devices
            .iter()
            .position(|d| d.id == device_id)
            .ok_or_else(|| GridError::DeviceNotFound {
                consumer: consumer.to_string(),
                device: device_id.to_string(),
            })?;
        let device = devices.remove(position);
        let change = LoadChange {
            consumer: consumer.to_string(),
            delta: -device.current_power,
        };
        Ok((device, change))
    }

    /// Updates a device's rated average, optionally snapping its current draw
    /// to the new value.
    pub fn set_device_average_load(
        &mut self,
        consumer: &str,
        device_id: &str,
        avg_power: f64,
        snap_to_average: bool,
    ) -> Result<LoadChange, GridError> {
        validate_power(avg_power)?;
        let device = self
            .devices_mut(consumer)?
            .iter_mut()
            .find(|d| d.id == device_id)
            .ok_or_else(|| GridError::DeviceNotFound {
                consumer: consumer.to_string(),
                device: device_id.to_string(),
            })?;
        device.avg_power = avg_power;
        let mut delta = 0.0;
        if snap_to_average {
            delta = avg_power - device.current_power;
            device.current_power = avg_power;
        }
        Ok(LoadChange {
            consumer: consumer.to_string(),
            delta,
        })
    }
}

fn validate_power(value: f64) -> Result<(), GridError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(GridError::InvalidRequest(format!(
            "device power must be a finite, non-negative number (got {value})"
        )))
    }
}
