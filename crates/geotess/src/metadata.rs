//! Model-level description: attributes, layers, data kind and provenance.

use crate::data::DataType;
use crate::error::{GeoTessError, Result};
use crate::geometry::EarthShape;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Everything about a model that is not grid or profile content.
///
/// Fields start unset; [`MetaData::check_complete`] reports every field that
/// still needs a value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaData {
    description: Option<String>,
    attribute_names: Vec<String>,
    attribute_units: Vec<String>,
    layer_names: Option<Vec<String>>,
    layer_tess_ids: Option<Vec<usize>>,
    data_type: Option<DataType>,
    /// Type name of a custom data kind.
    custom_type_name: Option<String>,
    model_software_version: Option<String>,
    model_generation_date: Option<String>,
    earth_shape: EarthShape,
}

impl MetaData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that every required field is set. The error lists all missing
    /// fields at once.
    pub fn check_complete(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.description.is_none() {
            missing.push("description has not been specified".to_string());
        }
        match (&self.layer_names, &self.layer_tess_ids) {
            (None, _) => missing.push("layer names have not been specified".to_string()),
            (Some(_), None) => {
                missing.push("layer tessellation ids have not been specified".to_string())
            }
            (Some(names), Some(ids)) if names.len() != ids.len() => missing.push(format!(
                "{} layer tessellation ids for {} layers",
                ids.len(),
                names.len()
            )),
            _ => {}
        }
        if self.attribute_names.is_empty() {
            missing.push("attributes have not been specified".to_string());
        }
        if self.data_type.is_none() {
            missing.push("data type has not been specified".to_string());
        }
        if self.model_software_version.is_none() {
            missing.push("model software version has not been specified".to_string());
        }
        if self.model_generation_date.is_none() {
            missing.push("model generation date has not been specified".to_string());
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(GeoTessError::malformed_model(format!(
                "metadata is not complete: {}",
                missing.join("; ")
            )))
        }
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Set attribute names and units. Both lists must have the same
    /// non-zero length and no empty name.
    pub fn set_attributes<S: AsRef<str>>(&mut self, names: &[S], units: &[S]) -> Result<()> {
        if names.len() != units.len() {
            return Err(GeoTessError::attribute_mismatch(format!(
                "{} attribute names but {} units",
                names.len(),
                units.len()
            )));
        }
        if names.is_empty() || names.iter().any(|n| n.as_ref().trim().is_empty()) {
            return Err(GeoTessError::attribute_mismatch(
                "attribute names must be non-empty",
            ));
        }
        self.attribute_names = names.iter().map(|s| s.as_ref().trim().to_string()).collect();
        self.attribute_units = units.iter().map(|s| s.as_ref().trim().to_string()).collect();
        Ok(())
    }

    /// Set attributes from `;`-separated names and units.
    pub fn set_attributes_str(&mut self, names: &str, units: &str) -> Result<()> {
        let names: Vec<&str> = names.split(';').collect();
        let units: Vec<&str> = units.split(';').collect();
        self.set_attributes(&names, &units)
    }

    pub fn attribute_count(&self) -> usize {
        self.attribute_names.len()
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    pub fn attribute_units(&self) -> &[String] {
        &self.attribute_units
    }

    pub fn attribute_name(&self, i: usize) -> Option<&str> {
        self.attribute_names.get(i).map(String::as_str)
    }

    pub fn attribute_unit(&self, i: usize) -> Option<&str> {
        self.attribute_units.get(i).map(String::as_str)
    }

    /// Index of an attribute by name (case-insensitive).
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attribute_names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn attribute_names_string(&self) -> String {
        self.attribute_names.join(";")
    }

    pub fn attribute_units_string(&self) -> String {
        self.attribute_units.join(";")
    }

    // ------------------------------------------------------------------
    // Layers
    // ------------------------------------------------------------------

    pub fn set_layer_names<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        if names.is_empty() {
            return Err(GeoTessError::invalid_argument("a model needs at least one layer"));
        }
        self.layer_names = Some(names.iter().map(|s| s.as_ref().trim().to_string()).collect());
        Ok(())
    }

    /// Assign a tessellation to every layer. Ids must be non-decreasing from
    /// the bottom layer up.
    pub fn set_layer_tess_ids(&mut self, ids: Vec<usize>) -> Result<()> {
        if let Some(i) = (1..ids.len()).find(|&i| ids[i] < ids[i - 1]) {
            return Err(GeoTessError::invalid_argument(format!(
                "layer tessellation ids must be non-decreasing, layer {} has {} after {}",
                i,
                ids[i],
                ids[i - 1]
            )));
        }
        self.layer_tess_ids = Some(ids);
        Ok(())
    }

    pub fn layer_count(&self) -> usize {
        self.layer_names.as_ref().map(Vec::len).unwrap_or(0)
    }

    pub fn layer_names(&self) -> &[String] {
        self.layer_names.as_deref().unwrap_or(&[])
    }

    pub fn layer_name(&self, layer: usize) -> Option<&str> {
        self.layer_names().get(layer).map(String::as_str)
    }

    /// Index of a layer by name (case-insensitive).
    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layer_names()
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn layer_names_string(&self) -> String {
        self.layer_names().join(";")
    }

    pub fn layer_tess_ids(&self) -> &[usize] {
        self.layer_tess_ids.as_deref().unwrap_or(&[])
    }

    /// Tessellation supporting `layer`.
    pub fn tessellation(&self, layer: usize) -> usize {
        self.layer_tess_ids()[layer]
    }

    /// Layers supported by tessellation `tess`.
    pub fn layers_of(&self, tess: usize) -> Vec<usize> {
        self.layer_tess_ids()
            .iter()
            .enumerate()
            .filter(|(_, &t)| t == tess)
            .map(|(l, _)| l)
            .collect()
    }

    pub fn first_layer(&self, tess: usize) -> Option<usize> {
        self.layer_tess_ids().iter().position(|&t| t == tess)
    }

    pub fn last_layer(&self, tess: usize) -> Option<usize> {
        self.layer_tess_ids().iter().rposition(|&t| t == tess)
    }

    // ------------------------------------------------------------------
    // Data kind and provenance
    // ------------------------------------------------------------------

    pub fn data_type(&self) -> DataType {
        self.data_type.unwrap_or(DataType::Double)
    }

    pub fn set_data_type(&mut self, data_type: DataType) {
        self.data_type = Some(data_type);
        if data_type != DataType::Custom {
            self.custom_type_name = None;
        }
    }

    /// Use a caller-registered data kind.
    pub fn set_custom_data_type(&mut self, type_name: impl Into<String>) {
        self.data_type = Some(DataType::Custom);
        self.custom_type_name = Some(type_name.into());
    }

    /// Name written to model files: the built-in name or the custom type name.
    pub fn data_type_name(&self) -> &str {
        match (self.data_type(), &self.custom_type_name) {
            (DataType::Custom, Some(name)) => name,
            (dt, _) => dt.as_str(),
        }
    }

    pub fn custom_type_name(&self) -> Option<&str> {
        self.custom_type_name.as_deref()
    }

    pub fn model_software_version(&self) -> &str {
        self.model_software_version.as_deref().unwrap_or("")
    }

    pub fn set_model_software_version(&mut self, version: impl Into<String>) {
        self.model_software_version = Some(version.into());
    }

    pub fn model_generation_date(&self) -> &str {
        self.model_generation_date.as_deref().unwrap_or("")
    }

    pub fn set_model_generation_date(&mut self, date: impl Into<String>) {
        self.model_generation_date = Some(date.into());
    }

    /// Stamp this library's version and the current UTC time.
    pub fn stamp_provenance(&mut self) {
        self.model_software_version = Some(format!("geotess-rs {}", env!("CARGO_PKG_VERSION")));
        self.model_generation_date = Some(Utc::now().to_rfc2822());
    }

    pub fn earth_shape(&self) -> EarthShape {
        self.earth_shape
    }

    pub fn set_earth_shape(&mut self, shape: EarthShape) {
        self.earth_shape = shape;
    }
}

impl PartialEq for MetaData {
    /// Generation date is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.description == other.description
            && self.attribute_names == other.attribute_names
            && self.attribute_units == other.attribute_units
            && self.layer_names == other.layer_names
            && self.layer_tess_ids == other.layer_tess_ids
            && self.data_type() == other.data_type()
            && self.custom_type_name == other.custom_type_name
            && self.model_software_version == other.model_software_version
            && self.earth_shape == other.earth_shape
    }
}

impl std::fmt::Display for MetaData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Description: {}", self.description())?;
        writeln!(f, "Data type: {}", self.data_type_name())?;
        writeln!(f, "Earth shape: {}", self.earth_shape)?;
        writeln!(f, "Attributes:")?;
        for (name, unit) in self.attribute_names.iter().zip(&self.attribute_units) {
            writeln!(f, "  {} ({})", name, unit)?;
        }
        writeln!(f, "Layers (tessellation):")?;
        for (i, name) in self.layer_names().iter().enumerate() {
            let tess = self.layer_tess_ids().get(i).copied();
            match tess {
                Some(t) => writeln!(f, "  {:2} {} ({})", i, name, t)?,
                None => writeln!(f, "  {:2} {}", i, name)?,
            }
        }
        writeln!(f, "Software version: {}", self.model_software_version())?;
        write!(f, "Generation date: {}", self.model_generation_date())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> MetaData {
        let mut md = MetaData::new();
        md.set_description("test model");
        md.set_attributes(&["vp", "vs"], &["km/sec", "km/sec"]).unwrap();
        md.set_layer_names(&["mantle", "crust"]).unwrap();
        md.set_layer_tess_ids(vec![0, 0]).unwrap();
        md.set_data_type(DataType::Float);
        md.stamp_provenance();
        md
    }

    #[test]
    fn test_check_complete_lists_everything() {
        let err = MetaData::new().check_complete().unwrap_err().to_string();
        assert!(err.contains("description"));
        assert!(err.contains("layer names"));
        assert!(err.contains("attributes"));
        assert!(err.contains("data type"));
        assert!(err.contains("software version"));
        assert!(err.contains("generation date"));

        assert!(complete().check_complete().is_ok());
    }

    #[test]
    fn test_attribute_mismatch() {
        let mut md = MetaData::new();
        assert!(matches!(
            md.set_attributes(&["a", "b"], &["x"]),
            Err(GeoTessError::AttributeMismatch(_))
        ));
        assert!(matches!(
            md.set_attributes_str("a;", "x;y"),
            Err(GeoTessError::AttributeMismatch(_))
        ));
        md.set_attributes_str("vp; vs", "km/s;km/s").unwrap();
        assert_eq!(md.attribute_index("VS"), Some(1));
    }

    #[test]
    fn test_layer_tess_ids_must_not_decrease() {
        let mut md = MetaData::new();
        assert!(md.set_layer_tess_ids(vec![0, 1, 0]).is_err());
        md.set_layer_tess_ids(vec![0, 0, 1]).unwrap();
        assert_eq!(md.layers_of(0), vec![0, 1]);
        assert_eq!(md.first_layer(1), Some(2));
        assert_eq!(md.last_layer(0), Some(1));
    }

    #[test]
    fn test_layer_count_mismatch_reported() {
        let mut md = complete();
        md.set_layer_tess_ids(vec![0]).unwrap();
        assert!(md.check_complete().is_err());
    }

    #[test]
    fn test_equality_ignores_generation_date() {
        let a = complete();
        let mut b = a.clone();
        b.set_model_generation_date("yesterday");
        assert_eq!(a, b);
        b.set_description("other");
        assert_ne!(a, b);
    }

    #[test]
    fn test_custom_type_name() {
        let mut md = complete();
        md.set_custom_data_type("GridNodeData");
        assert_eq!(md.data_type(), DataType::Custom);
        assert_eq!(md.data_type_name(), "GridNodeData");
    }
}
