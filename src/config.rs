//! Run configuration
//!
//! Every field has a default matching the factory exports the tool was
//! written for, so a config file only needs the values it changes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Field separator of the CSV exports
    pub delimiter: char,
    pub resolver: ResolverConfig,
    pub outliers: OutlierConfig,
    pub costs: DatasetParams,
    pub productions: DatasetParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delimiter: ';',
            resolver: ResolverConfig::default(),
            outliers: OutlierConfig::default(),
            costs: DatasetParams::costs(),
            productions: DatasetParams::productions(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.delimiter_byte()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(ConfigError::Delimiter(self.delimiter))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Components whose id starts with this prefix are semi-finished
    pub semi_finished_prefix: String,
    /// Depth guard for pathological inputs; cycles are caught before this
    pub max_depth: usize,
    /// Decimal places kept when costs leave the resolver
    pub output_scale: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            semi_finished_prefix: "SEM".to_string(),
            max_depth: 256,
            output_scale: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub z_score: f64,
    /// Replacement stops once this many outliers or fewer remain
    pub min_outliers: usize,
    pub max_iterations: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            z_score: 3.0,
            min_outliers: 5,
            max_iterations: 20,
        }
    }
}

/// Column handling for one CSV export
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DatasetParams {
    pub cols_to_keep: Vec<String>,
    pub rename_map: BTreeMap<String, String>,
    pub numeric_columns: Vec<String>,
    pub validation_map: BTreeMap<String, String>,
    pub drop_na_subset: Vec<String>,
    /// Duplicate rows on this column are dropped keeping the last one
    pub drop_duplicates_on: Option<String>,
}

impl DatasetParams {
    /// Purchase costs: one price per component lot
    pub fn costs() -> Self {
        Self {
            cols_to_keep: strings(&["Cód. artículo", "PRCMONEDA", "LOTEINTERNO"]),
            rename_map: pairs(&[
                ("Cód. artículo", "component"),
                ("PRCMONEDA", "unit_cost"),
                ("LOTEINTERNO", "component_lot"),
            ]),
            numeric_columns: strings(&["unit_cost"]),
            validation_map: pairs(&[
                ("component", ITEM_CODE_PATTERN),
                ("component_lot", r"^[0-9]{4}-[0-9]{3}$"),
            ]),
            drop_na_subset: strings(&["unit_cost"]),
            drop_duplicates_on: Some("component_lot".to_string()),
        }
    }

    /// Production lines: one consumed component per row
    pub fn productions() -> Self {
        Self {
            cols_to_keep: strings(&[
                "Nº Orden",
                "Fecha Recepción",
                "Producto",
                "Lote Producto",
                "Unidades Fabricadas",
                "Componente",
                "Lote Componente",
                "Consumo Unitario",
            ]),
            rename_map: pairs(&[
                ("Nº Orden", "order_id"),
                ("Fecha Recepción", "produced_date"),
                ("Producto", "item"),
                ("Lote Producto", "item_lot"),
                ("Unidades Fabricadas", "units_produced"),
                ("Componente", "component"),
                ("Lote Componente", "component_lot"),
                ("Consumo Unitario", "quantity"),
            ]),
            numeric_columns: strings(&["units_produced", "quantity"]),
            validation_map: pairs(&[("item", ITEM_CODE_PATTERN), ("component", ITEM_CODE_PATTERN)]),
            drop_na_subset: strings(&["item_lot", "component_lot", "quantity"]),
            drop_duplicates_on: None,
        }
    }
}

/// Letters followed by two or three digits, e.g. `MAT07` or `SEM120`
const ITEM_CODE_PATTERN: &str = r"^[A-Za-zÀ-ÖØ-öø-ÿ]+[0-9]{2,3}$";

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn pairs(values: &[(&str, &str)]) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
