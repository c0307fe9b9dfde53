// Remote device description

use serde::{Deserialize, Serialize};

/// Radio technology reported for a device, with the platform's numeric codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum DeviceType {
    Unknown,
    Classic,
    LowEnergy,
    Dual,
}

impl DeviceType {
    /// Only classic and dual-mode devices can carry an RFCOMM stream
    pub fn supports_transfer(self) -> bool {
        matches!(self, DeviceType::Classic | DeviceType::Dual)
    }
}

impl From<DeviceType> for i32 {
    fn from(value: DeviceType) -> Self {
        match value {
            DeviceType::Unknown => 0,
            DeviceType::Classic => 1,
            DeviceType::LowEnergy => 2,
            DeviceType::Dual => 3,
        }
    }
}

impl From<i32> for DeviceType {
    fn from(code: i32) -> Self {
        match code {
            1 => DeviceType::Classic,
            2 => DeviceType::LowEnergy,
            3 => DeviceType::Dual,
            _ => DeviceType::Unknown,
        }
    }
}

/// Pairing state of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum BondState {
    None,
    Bonding,
    Bonded,
}

impl From<BondState> for i32 {
    fn from(value: BondState) -> Self {
        match value {
            BondState::None => 10,
            BondState::Bonding => 11,
            BondState::Bonded => 12,
        }
    }
}

impl From<i32> for BondState {
    fn from(code: i32) -> Self {
        match code {
            11 => BondState::Bonding,
            12 => BondState::Bonded,
            _ => BondState::None,
        }
    }
}

/// A peer seen by discovery or listed among bonded devices. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerDevice {
    /// Stable hardware address
    pub address: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub bond_state: BondState,
    pub is_connected: bool,
}

impl PeerDevice {
    pub fn new(address: impl Into<String>, name: Option<String>, device_type: DeviceType) -> Self {
        Self {
            address: address.into(),
            name,
            device_type,
            bond_state: BondState::None,
            is_connected: false,
        }
    }

    pub fn bonded(mut self) -> Self {
        self.bond_state = BondState::Bonded;
        self
    }

    pub fn connected(mut self, connected: bool) -> Self {
        self.is_connected = connected;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let device = PeerDevice::new("00:11:22:33:44:55", Some("TV".into()), DeviceType::Dual)
            .bonded()
            .connected(true);
        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(value["address"], "00:11:22:33:44:55");
        assert_eq!(value["name"], "TV");
        assert_eq!(value["type"], 3);
        assert_eq!(value["bondState"], 12);
        assert_eq!(value["isConnected"], true);

        let back: PeerDevice = serde_json::from_value(value).unwrap();
        assert_eq!(back, device);
    }

    #[test]
    fn test_transfer_support() {
        assert!(DeviceType::Classic.supports_transfer());
        assert!(DeviceType::Dual.supports_transfer());
        assert!(!DeviceType::LowEnergy.supports_transfer());
        assert!(!DeviceType::from(42).supports_transfer());
    }
}
