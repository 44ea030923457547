use serde::{Deserialize, Serialize};

/// Whether a supply stays within the supplier's state.
///
/// Intra-state supplies split tax into CGST + SGST; inter-state supplies carry
/// IGST. The engine never infers this: callers decide it from the supplier's
/// registered state and the place of supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyType {
    IntraState,
    InterState,
}

impl SupplyType {
    /// Classify a supply by comparing the supplier's state with the place of supply.
    pub fn between<S: PartialEq>(supplier_state: S, place_of_supply: S) -> Self {
        if supplier_state == place_of_supply {
            SupplyType::IntraState
        } else {
            SupplyType::InterState
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SupplyType::IntraState => "intra_state",
            SupplyType::InterState => "inter_state",
        }
    }
}

impl core::fmt::Display for SupplyType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for SupplyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "intra_state" | "intra" => Ok(SupplyType::IntraState),
            "inter_state" | "inter" => Ok(SupplyType::InterState),
            other => Err(format!("unknown supply type '{other}'")),
        }
    }
}
