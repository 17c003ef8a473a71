//! # Upload Conditions
//!
//! Gate consulted before every upload. The device signals come from
//! platform ports; when a port has nothing to say, the gate does not block.
//!
//! | Blocker | Condition |
//! |---------|-----------|
//! | `NetworkUnreachable` | reachability is confirmed `No` |
//! | `ConstrainedNetwork` | tier `Unconstrained` and the link is confirmed constrained |
//! | `ExpensiveNetwork` | tier `Unconstrained` and the link is confirmed expensive |
//! | `LowBattery` | level below the minimum while confirmed `Unplugged` |
//! | `LowPowerMode` | low-power mode on |

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryState {
    Unknown,
    Unplugged,
    Charging,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    /// Charge between 0.0 and 1.0.
    pub level: f32,
    pub state: BatteryState,
    pub low_power_mode: bool,
}

/// Port for battery readings.
pub trait BatteryStatusProvider: Send + Sync {
    fn current(&self) -> Option<BatteryStatus>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Yes,
    Maybe,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub reachability: Reachability,
    /// Low Data Mode or similar; `None` if the platform cannot tell.
    pub is_constrained: Option<bool>,
    /// Cellular or hotspot; `None` if the platform cannot tell.
    pub is_expensive: Option<bool>,
}

/// Port for network readings.
pub trait NetworkInfoProvider: Send + Sync {
    fn current(&self) -> Option<NetworkInfo>;
}

/// Weakest link uploads may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityTier {
    /// Any reachable network.
    #[default]
    Any,
    /// Neither constrained nor expensive.
    Unconstrained,
}

/// Reason an upload was skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UploadBlocker {
    NetworkUnreachable,
    ConstrainedNetwork,
    ExpensiveNetwork,
    LowBattery { level: f32 },
    LowPowerMode,
}

impl fmt::Display for UploadBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadBlocker::NetworkUnreachable => f.write_str("network unreachable"),
            UploadBlocker::ConstrainedNetwork => f.write_str("constrained network"),
            UploadBlocker::ExpensiveNetwork => f.write_str("expensive network"),
            UploadBlocker::LowBattery { level } => write!(f, "battery at {:.0}%", level * 100.0),
            UploadBlocker::LowPowerMode => f.write_str("low power mode"),
        }
    }
}

#[derive(Clone, Default)]
pub struct UploadConditions {
    battery: Option<Arc<dyn BatteryStatusProvider>>,
    network: Option<Arc<dyn NetworkInfoProvider>>,
    min_battery_level: f32,
    min_connectivity: ConnectivityTier,
}

impl UploadConditions {
    pub fn new(min_battery_level: f32, min_connectivity: ConnectivityTier) -> Self {
        Self {
            battery: None,
            network: None,
            min_battery_level,
            min_connectivity,
        }
    }

    pub fn with_battery_provider(mut self, provider: Arc<dyn BatteryStatusProvider>) -> Self {
        self.battery = Some(provider);
        self
    }

    pub fn with_network_provider(mut self, provider: Arc<dyn NetworkInfoProvider>) -> Self {
        self.network = Some(provider);
        self
    }

    /// Every condition currently preventing an upload.
    pub fn blockers(&self) -> Vec<UploadBlocker> {
        let mut blockers = Vec::new();

        if let Some(network) = self.network.as_ref().and_then(|p| p.current()) {
            if network.reachability == Reachability::No {
                blockers.push(UploadBlocker::NetworkUnreachable);
            }
            if self.min_connectivity == ConnectivityTier::Unconstrained {
                if network.is_constrained == Some(true) {
                    blockers.push(UploadBlocker::ConstrainedNetwork);
                }
                if network.is_expensive == Some(true) {
                    blockers.push(UploadBlocker::ExpensiveNetwork);
                }
            }
        }

        if let Some(battery) = self.battery.as_ref().and_then(|p| p.current()) {
            if battery.state == BatteryState::Unplugged && battery.level < self.min_battery_level {
                blockers.push(UploadBlocker::LowBattery {
                    level: battery.level,
                });
            }
            if battery.low_power_mode {
                blockers.push(UploadBlocker::LowPowerMode);
            }
        }

        blockers
    }

    pub fn can_perform_upload(&self) -> bool {
        self.blockers().is_empty()
    }
}

impl fmt::Debug for UploadConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConditions")
            .field("battery_provider", &self.battery.is_some())
            .field("network_provider", &self.network.is_some())
            .field("min_battery_level", &self.min_battery_level)
            .field("min_connectivity", &self.min_connectivity)
            .finish()
    }
}
