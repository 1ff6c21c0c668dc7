//! Capture-facing types shared with the UI layer.

use serde::{Deserialize, Serialize};

/// Logical role of a camera feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// User-facing camera
    Front,
    /// Environment-facing camera
    Back,
}

impl FacingMode {
    /// The other role. This is a pure flip; callers that want the new
    /// camera must release the old stream and acquire a fresh one.
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::Front => FacingMode::Back,
            FacingMode::Back => FacingMode::Front,
        }
    }
}

/// Information about a camera device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Role guessed from the device name, if it advertises one
    pub facing_hint: Option<FacingMode>,
}

/// Information about an audio input device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Whether this is the default input device
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggled_is_an_involution() {
        for facing in [FacingMode::Front, FacingMode::Back] {
            assert_eq!(facing.toggled().toggled(), facing);
            assert_ne!(facing.toggled(), facing);
        }
    }
}
