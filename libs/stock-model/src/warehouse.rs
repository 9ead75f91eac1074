//! Warehouse codes
//!
//! The closed set of storage and consignment locations used in stock
//! sheets and product records. `999` holds set-aside stock and never counts
//! as available.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WarehouseCode {
    Ca,
    Ca1,
    Ca2,
    Ca3,
    Ca4,
    Reserved,
    Cocz,
    Copz,
    Int,
    Mee,
    Pu,
    Si,
    Xca,
    Xpu,
}

impl WarehouseCode {
    pub const ALL: [WarehouseCode; 14] = [
        WarehouseCode::Ca,
        WarehouseCode::Ca1,
        WarehouseCode::Ca2,
        WarehouseCode::Ca3,
        WarehouseCode::Ca4,
        WarehouseCode::Reserved,
        WarehouseCode::Cocz,
        WarehouseCode::Copz,
        WarehouseCode::Int,
        WarehouseCode::Mee,
        WarehouseCode::Pu,
        WarehouseCode::Si,
        WarehouseCode::Xca,
        WarehouseCode::Xpu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ca => "CA",
            Self::Ca1 => "CA1",
            Self::Ca2 => "CA2",
            Self::Ca3 => "CA3",
            Self::Ca4 => "CA4",
            Self::Reserved => "999",
            Self::Cocz => "COCZ",
            Self::Copz => "COPZ",
            Self::Int => "INT",
            Self::Mee => "MEE",
            Self::Pu => "PU",
            Self::Si => "SI",
            Self::Xca => "XCA",
            Self::Xpu => "XPU",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Ca => "Cancún",
            Self::Ca1 => "Cancún Exhibición",
            Self::Ca2 => "Cancún Equipos a Prueba",
            Self::Ca3 => "Cancún Laboratorio",
            Self::Ca4 => "Cancún Área de Ajuste",
            Self::Reserved => "Mercancía Apartada",
            Self::Cocz => "Consignación Cancún Zicor",
            Self::Copz => "Consignación Puebla Zicor",
            Self::Int => "Internacional",
            Self::Mee => "México Proyectos Especiales",
            Self::Pu => "Puebla",
            Self::Si => "Silao",
            Self::Xca => "Refrigeración X Cancún",
            Self::Xpu => "Refrigeración X Puebla",
        }
    }

    /// Stock held here is set aside and excluded from available sums
    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved)
    }
}

impl fmt::Display for WarehouseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarehouseCode {
    type Err = ModelError;

    /// Accepts any case and the spreadsheet's apostrophe-prefixed `'999`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().trim_start_matches('\'').trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(code))
            .ok_or_else(|| ModelError::UnknownWarehouse(s.to_string()))
    }
}

impl Serialize for WarehouseCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WarehouseCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for code in WarehouseCode::ALL {
            assert_eq!(code.as_str().parse::<WarehouseCode>().unwrap(), code);
        }
    }

    #[test]
    fn test_parse_sheet_forms() {
        assert_eq!(
            "'999".parse::<WarehouseCode>().unwrap(),
            WarehouseCode::Reserved
        );
        assert_eq!(" ca1 ".parse::<WarehouseCode>().unwrap(), WarehouseCode::Ca1);
        assert!(matches!(
            "CA9".parse::<WarehouseCode>(),
            Err(ModelError::UnknownWarehouse(_))
        ));
    }

    #[test]
    fn test_only_999_is_reserved() {
        let reserved: Vec<_> = WarehouseCode::ALL
            .iter()
            .filter(|c| c.is_reserved())
            .collect();
        assert_eq!(reserved, vec![&WarehouseCode::Reserved]);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&WarehouseCode::Reserved).unwrap();
        assert_eq!(json, "\"999\"");
        let code: WarehouseCode = serde_json::from_str("\"XPU\"").unwrap();
        assert_eq!(code, WarehouseCode::Xpu);
    }
}
