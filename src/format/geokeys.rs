//! GeoTIFF key directory decoding.
//!
//! The `GeoKeyDirectory` tag is an array of SHORTs: a four value header
//! (version, revision, minor revision, key count) followed by one four value
//! record per key:
//!
//! ```text
//! key id | location | count | value or offset
//! ```
//!
//! A location of 0 means the last field is the value itself. Any other
//! location is the id of the tag holding the value, usually `GeoDoubleParams`
//! or `GeoAsciiParams`, and the last field is an index into that tag.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::tiff::TagValue;

/// Well-known GeoTIFF keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum GeoKey {
    GtModelType = 1024,
    GtRasterType = 1025,
    GtCitation = 1026,
    GeographicType = 2048,
    GeogCitation = 2049,
    GeogGeodeticDatum = 2050,
    GeogPrimeMeridian = 2051,
    GeogLinearUnits = 2052,
    GeogLinearUnitSize = 2053,
    GeogAngularUnits = 2054,
    GeogAngularUnitSize = 2055,
    GeogEllipsoid = 2056,
    GeogSemiMajorAxis = 2057,
    GeogSemiMinorAxis = 2058,
    GeogInvFlattening = 2059,
    GeogAzimuthUnits = 2060,
    GeogPrimeMeridianLong = 2061,
    ProjectedCsType = 3072,
    PcsCitation = 3073,
    Projection = 3074,
    ProjCoordTrans = 3075,
    ProjLinearUnits = 3076,
    ProjLinearUnitSize = 3077,
    ProjStdParallel1 = 3078,
    ProjStdParallel2 = 3079,
    ProjNatOriginLong = 3080,
    ProjNatOriginLat = 3081,
    ProjFalseEasting = 3082,
    ProjFalseNorthing = 3083,
    ProjScaleAtNatOrigin = 3092,
    VerticalCsType = 4096,
    VerticalCitation = 4097,
    VerticalDatum = 4098,
    VerticalUnits = 4099,
}

impl GeoKey {
    pub fn from_u16(value: u16) -> Option<Self> {
        use GeoKey::*;
        Some(match value {
            1024 => GtModelType,
            1025 => GtRasterType,
            1026 => GtCitation,
            2048 => GeographicType,
            2049 => GeogCitation,
            2050 => GeogGeodeticDatum,
            2051 => GeogPrimeMeridian,
            2052 => GeogLinearUnits,
            2053 => GeogLinearUnitSize,
            2054 => GeogAngularUnits,
            2055 => GeogAngularUnitSize,
            2056 => GeogEllipsoid,
            2057 => GeogSemiMajorAxis,
            2058 => GeogSemiMinorAxis,
            2059 => GeogInvFlattening,
            2060 => GeogAzimuthUnits,
            2061 => GeogPrimeMeridianLong,
            3072 => ProjectedCsType,
            3073 => PcsCitation,
            3074 => Projection,
            3075 => ProjCoordTrans,
            3076 => ProjLinearUnits,
            3077 => ProjLinearUnitSize,
            3078 => ProjStdParallel1,
            3079 => ProjStdParallel2,
            3080 => ProjNatOriginLong,
            3081 => ProjNatOriginLat,
            3082 => ProjFalseEasting,
            3083 => ProjFalseNorthing,
            3092 => ProjScaleAtNatOrigin,
            4096 => VerticalCsType,
            4097 => VerticalCitation,
            4098 => VerticalDatum,
            4099 => VerticalUnits,
            _ => return None,
        })
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    pub const fn name(self) -> &'static str {
        use GeoKey::*;
        match self {
            GtModelType => "GTModelType",
            GtRasterType => "GTRasterType",
            GtCitation => "GTCitation",
            GeographicType => "GeographicType",
            GeogCitation => "GeogCitation",
            GeogGeodeticDatum => "GeogGeodeticDatum",
            GeogPrimeMeridian => "GeogPrimeMeridian",
            GeogLinearUnits => "GeogLinearUnits",
            GeogLinearUnitSize => "GeogLinearUnitSize",
            GeogAngularUnits => "GeogAngularUnits",
            GeogAngularUnitSize => "GeogAngularUnitSize",
            GeogEllipsoid => "GeogEllipsoid",
            GeogSemiMajorAxis => "GeogSemiMajorAxis",
            GeogSemiMinorAxis => "GeogSemiMinorAxis",
            GeogInvFlattening => "GeogInvFlattening",
            GeogAzimuthUnits => "GeogAzimuthUnits",
            GeogPrimeMeridianLong => "GeogPrimeMeridianLong",
            ProjectedCsType => "ProjectedCSType",
            PcsCitation => "PCSCitation",
            Projection => "Projection",
            ProjCoordTrans => "ProjCoordTrans",
            ProjLinearUnits => "ProjLinearUnits",
            ProjLinearUnitSize => "ProjLinearUnitSize",
            ProjStdParallel1 => "ProjStdParallel1",
            ProjStdParallel2 => "ProjStdParallel2",
            ProjNatOriginLong => "ProjNatOriginLong",
            ProjNatOriginLat => "ProjNatOriginLat",
            ProjFalseEasting => "ProjFalseEasting",
            ProjFalseNorthing => "ProjFalseNorthing",
            ProjScaleAtNatOrigin => "ProjScaleAtNatOrigin",
            VerticalCsType => "VerticalCSType",
            VerticalCitation => "VerticalCitation",
            VerticalDatum => "VerticalDatum",
            VerticalUnits => "VerticalUnits",
        }
    }
}

/// Display name of a key id, `Unknown(n)` for ids without a name.
pub fn geo_key_name(id: u16) -> String {
    match GeoKey::from_u16(id) {
        Some(key) => key.name().to_string(),
        None => format!("Unknown({id})"),
    }
}

/// Value of a single GeoKey.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeoValue {
    Number(f64),
    Text(String),
}

impl GeoValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GeoValue::Number(n) => Some(*n),
            GeoValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GeoValue::Text(s) => Some(s),
            GeoValue::Number(_) => None,
        }
    }
}

impl fmt::Display for GeoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoValue::Number(n) => write!(f, "{n}"),
            GeoValue::Text(s) => f.write_str(s),
        }
    }
}

/// Decode a key directory.
///
/// `lookup` returns the already loaded value of the tag a record points at.
/// Records pointing at a tag that is missing or not loaded are skipped, as
/// are records that fall outside the directory or the referenced array.
///
/// Numeric records take the element at `offset + count - 1`, which is the
/// value itself for the usual single valued keys. ASCII records take the
/// `count - 1` characters at `offset`, dropping GeoTIFF's `|` terminator.
pub fn decode_geo_keys<'a, F>(directory: &TagValue, lookup: F) -> BTreeMap<u16, GeoValue>
where
    F: Fn(u16) -> Option<&'a TagValue>,
{
    let mut keys = BTreeMap::new();
    let Some(key_count) = directory.get_u64(3) else {
        return keys;
    };

    for i in 1..=key_count as usize {
        let base = i * 4;
        let record = (
            directory.get_u64(base),
            directory.get_u64(base + 1),
            directory.get_u64(base + 2),
            directory.get_u64(base + 3),
        );
        let (Some(key), Some(location), Some(count), Some(value)) = record else {
            break;
        };
        let key = key as u16;

        if location == 0 {
            keys.insert(key, GeoValue::Number(value as f64));
            continue;
        }

        let Some(params) = lookup(location as u16) else {
            continue;
        };
        if let Some(geo_value) = external_value(params, value, count) {
            keys.insert(key, geo_value);
        }
    }

    keys
}

fn external_value(params: &TagValue, offset: u64, count: u64) -> Option<GeoValue> {
    let last = usize::try_from((offset + count).checked_sub(1)?).ok()?;
    match params {
        TagValue::Ascii(text) => {
            let start = usize::try_from(offset).ok()?.min(text.len());
            let end = last.clamp(start, text.len());
            Some(GeoValue::Text(text.get(start..end)?.trim().to_string()))
        }
        TagValue::Undefined(_) | TagValue::Unknown { .. } => None,
        _ => params.get_f64(last).map(GeoValue::Number),
    }
}
