//! Source feature model for parsed chart data
//!
//! The engine never reads chart files itself; it receives already-parsed
//! feature records from a collaborating feature source. A [`SourceFeature`]
//! is immutable input owned by the caller and is never mutated here.

use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use std::collections::HashMap;

/// Minimum depth of a depth area, in meters (S-57 `DRVAL1`)
pub const ATTR_DEPTH_MIN: &str = "DRVAL1";
/// Maximum depth of a depth area, in meters (S-57 `DRVAL2`)
pub const ATTR_DEPTH_MAX: &str = "DRVAL2";
/// Value of a depth contour, in meters (S-57 `VALDCO`)
pub const ATTR_CONTOUR_VALUE: &str = "VALDCO";
/// Category of shoreline construction (S-57 `CATSLC`)
pub const ATTR_CONSTRUCTION_CATEGORY: &str = "CATSLC";
/// Category of coastline (S-57 `CATCOA`)
pub const ATTR_COASTLINE_CATEGORY: &str = "CATCOA";
/// Object name (S-57 `OBJNAM`)
pub const ATTR_OBJECT_NAME: &str = "OBJNAM";
/// Sounding value, in meters (S-57 `VALSOU`)
pub const ATTR_SOUNDING_VALUE: &str = "VALSOU";
/// Water level effect (S-57 `WATLEV`)
pub const ATTR_WATER_LEVEL: &str = "WATLEV";

/// A single attribute value from a chart feature's attribute bag
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttrValue {
    Float(f64),
    Int(i64),
    Text(String),
}

impl AttrValue {
    /// Numeric view of the value, converting integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Float(v) => Some(*v as i64),
            AttrValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

/// Typed key→value attribute bag
///
/// Attribute sets vary by feature class, so this is an open map with accessor
/// helpers for the documented keys rather than a closed schema. Unknown keys
/// are carried untouched.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attributes(HashMap<String, AttrValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(AttrValue::as_f64)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(AttrValue::as_i64)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttrValue::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Minimum/maximum depth of a depth area (`DRVAL1`/`DRVAL2`)
    pub fn depth_range(&self) -> Option<(f64, f64)> {
        let min = self.float(ATTR_DEPTH_MIN)?;
        let max = self.float(ATTR_DEPTH_MAX).unwrap_or(min);
        Some((min, max))
    }

    /// Depth contour value (`VALDCO`)
    pub fn contour_value(&self) -> Option<f64> {
        self.float(ATTR_CONTOUR_VALUE)
    }

    /// Shoreline construction category code (`CATSLC`)
    pub fn construction_category(&self) -> Option<i64> {
        self.int(ATTR_CONSTRUCTION_CATEGORY)
    }

    /// Coastline category code (`CATCOA`)
    pub fn coastline_category(&self) -> Option<i64> {
        self.int(ATTR_COASTLINE_CATEGORY)
    }

    /// Object name (`OBJNAM`)
    pub fn object_name(&self) -> Option<&str> {
        self.text(ATTR_OBJECT_NAME)
    }
}

impl FromIterator<(String, AttrValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Geometry of a parsed chart feature, in WGS84 degrees (x = lon, y = lat)
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeatureGeometry {
    Point(Point<f64>),
    Line(LineString<f64>),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl FeatureGeometry {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FeatureGeometry::Point(_) => "Point",
            FeatureGeometry::Line(_) => "LineString",
            FeatureGeometry::Polygon(_) => "Polygon",
            FeatureGeometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    pub fn as_line(&self) -> Option<&LineString<f64>> {
        match self {
            FeatureGeometry::Line(line) => Some(line),
            _ => None,
        }
    }

    /// View the geometry as polygons, if it has any
    pub fn polygons(&self) -> &[Polygon<f64>] {
        match self {
            FeatureGeometry::Polygon(poly) => std::slice::from_ref(poly),
            FeatureGeometry::MultiPolygon(mp) => &mp.0,
            _ => &[],
        }
    }

    /// Walk every coordinate of the geometry
    pub fn coords(&self) -> Vec<Coord<f64>> {
        match self {
            FeatureGeometry::Point(p) => vec![p.0],
            FeatureGeometry::Line(line) => line.0.clone(),
            FeatureGeometry::Polygon(poly) => polygon_coords(poly),
            FeatureGeometry::MultiPolygon(mp) => mp.0.iter().flat_map(polygon_coords).collect(),
        }
    }
}

fn polygon_coords(poly: &Polygon<f64>) -> Vec<Coord<f64>> {
    poly.exterior()
        .0
        .iter()
        .chain(poly.interiors().iter().flat_map(|r| r.0.iter()))
        .copied()
        .collect()
}

/// A single parsed chart feature
///
/// Immutable input owned by the caller; the engine never mutates it.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceFeature {
    /// Feature identifier, e.g. `"US5CA52M_COALNE_001"`
    pub id: String,
    /// S-57 object acronym, e.g. `"COALNE"` or `"DEPARE"`
    pub type_code: String,
    pub geometry: FeatureGeometry,
    pub attributes: Attributes,
}

impl SourceFeature {
    pub fn new(
        id: impl Into<String>,
        type_code: impl Into<String>,
        geometry: FeatureGeometry,
    ) -> Self {
        Self {
            id: id.into(),
            type_code: type_code.into(),
            geometry,
            attributes: Attributes::new(),
        }
    }

    /// Builder-style attribute attachment
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key, value);
        self
    }
}
