use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// How a device's instantaneous draw behaves over time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LoadProfile {
    /// Always on, fluctuating narrowly around the average.
    Flat,
    /// Compressor-style on/off cycling.
    Cyclic,
    /// Mostly off; on during a window with the given probability.
    Intermittent { duty: f64 },
}

impl LoadProfile {
    /// Discriminant mixed into the noise seed.
    pub(crate) fn seed_tag(&self) -> u64 {
        match self {
            LoadProfile::Flat => 0x0F1A7,
            LoadProfile::Cyclic => 0xC7C1E,
            LoadProfile::Intermittent { .. } => 0x1D7E4,
        }
    }
}

/// Catalog of household appliances the simulator knows about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum DeviceType {
    Tv,
    Fridge,
    Shower,
    Microwave,
    WashingMachine,
    AirConditioner,
    Computer,
    LightBulb,
    Oven,
    Iron,
    EvCharger,
    Generic,
}

/// Catalog entry describing a device type's defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceTemplate {
    pub default_name: &'static str,
    /// Average power in kW.
    pub avg_power: f64,
    pub profile: LoadProfile,
}

impl DeviceType {
    pub fn template(self) -> DeviceTemplate {
        use DeviceType::*;
        use LoadProfile::*;
        let (default_name, avg_power, profile) = match self {
            Tv => ("TV", 0.095, Flat),
            Fridge => ("Fridge", 0.100, Flat),
            Shower => ("Electric Shower", 6.500, Intermittent { duty: 0.04 }),
            Microwave => ("Microwave", 1.200, Intermittent { duty: 0.10 }),
            WashingMachine => ("Washing Machine", 0.500, Intermittent { duty: 0.15 }),
            AirConditioner => ("Air Conditioner", 1.400, Cyclic),
            Computer => ("Computer", 0.150, Flat),
            LightBulb => ("Light Bulb", 0.060, Flat),
            Oven => ("Electric Oven", 2.000, Intermittent { duty: 0.10 }),
            Iron => ("Clothes Iron", 1.000, Intermittent { duty: 0.05 }),
            EvCharger => ("EV Charger", 7.400, Intermittent { duty: 0.04 }),
            Generic => ("Generic Device", 0.100, Flat),
        };
        DeviceTemplate {
            default_name,
            avg_power,
            profile,
        }
    }

    pub fn catalog() -> Vec<DeviceType> {
        DeviceType::iter().collect()
    }
}

/// A simulated appliance attached to a consumer point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoTDevice {
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
    pub avg_power: f64,
    pub current_power: f64,
}

impl IoTDevice {
    /// Builds a device from the catalog, drawing its average power.
    pub fn from_catalog(id: impl Into<String>, device_type: DeviceType) -> Self {
        let template = device_type.template();
        Self {
            id: id.into(),
            name: template.default_name.to_string(),
            device_type,
            avg_power: template.avg_power,
            current_power: template.avg_power,
        }
    }

    pub fn profile(&self) -> LoadProfile {
        self.device_type.template().profile
    }
}
