//! Readers for HEC-RAS geometry and plan HDF files.
mod geom;
mod plan;

#[cfg(test)]
pub(crate) mod fixtures;

pub use geom::{BcLine, RasGeomHdf};
pub use plan::RasPlanHdf;

use crate::attrs::{attrs_to_properties, HdfValue, Properties};
use crate::error::Error;
use anyhow::{Context, Result};
use geo::{Coord, LineString, Polygon};
use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Attribute, File, Group, Location};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

/// Upper bound for fixed-length string attributes; projection WKT is the longest seen.
const MAX_FIXED_STRING: usize = 8192;

const FLOW_AREAS_GROUP: &str = "Geometry/2D Flow Areas";

pub const GEOM_HDF_PATTERN: &str = r".*\.g[0-9]{2}\.hdf$";
pub const PLAN_HDF_PATTERN: &str = r".*\.p[0-9]{2}\.hdf$";

pub struct RasHdf {
    file: File,
}

impl RasHdf {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Unable to open HDF file {path:?}"))?;
        Ok(Self { file })
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }

    /// Root attributes, with `projection` renamed to `proj:wkt2`.
    pub fn root_attrs(&self) -> Result<Properties> {
        let mut attrs = attrs_to_properties(read_attrs(&self.file)?, None);
        if let Some(projection) = attrs.remove("projection") {
            attrs.insert("proj:wkt2".to_string(), projection);
        }
        Ok(attrs)
    }

    /// Attributes of the group at `path`, or `None` when the group does not exist.
    pub(crate) fn group_attrs(&self, path: &str, prefix: &str) -> Result<Option<Properties>> {
        if !self.file.link_exists(path) {
            debug!(path, "group not found");
            return Ok(None);
        }
        let group = self.file.group(path)?;
        Ok(Some(attrs_to_properties(read_attrs(&group)?, Some(prefix))))
    }

    pub fn projection(&self) -> Result<Option<String>> {
        if !self.file.attr_names()?.iter().any(|name| name == "Projection") {
            warn!("Projection attribute not found in HDF file");
            return Ok(None);
        }
        let attr = self.file.attr("Projection")?;
        match read_attr(&attr)? {
            Some(HdfValue::Str(mut values)) if !values.is_empty() => Ok(Some(values.remove(0))),
            _ => Ok(None),
        }
    }

    pub(crate) fn flow_areas(&self) -> Result<Option<Vec<Group>>> {
        if !self.file.link_exists(FLOW_AREAS_GROUP) {
            return Ok(None);
        }
        let areas = self.file.group(FLOW_AREAS_GROUP)?.groups()?;
        Ok(Some(areas))
    }

    /// The perimeter of every 2D flow area, in the model coordinate system.
    pub fn mesh_area_perimeters(&self) -> Result<Vec<Polygon<f64>>> {
        let Some(areas) = self.flow_areas()? else {
            warn!("Unable to get 2D Flow Area perimeters; {FLOW_AREAS_GROUP} group not found");
            return Ok(vec![]);
        };

        let mut perimeters = vec![];
        for area in areas {
            if !area.link_exists("Perimeter") {
                debug!(area = %area.name(), "flow area has no perimeter");
                continue;
            }
            let dataset = area.dataset("Perimeter")?;
            let shape = dataset.shape();
            if shape.len() != 2 || shape[1] < 2 {
                warn!(area = %area.name(), ?shape, "unexpected perimeter shape");
                continue;
            }
            let values = dataset.read_raw::<f64>()?;
            let coords: Vec<Coord<f64>> = values
                .chunks_exact(shape[1])
                .map(|row| Coord { x: row[0], y: row[1] })
                .collect();
            if coords.len() < 3 {
                warn!(area = %area.name(), "perimeter has fewer than three points");
                continue;
            }
            perimeters.push(Polygon::new(LineString::from(coords), vec![]));
        }
        Ok(perimeters)
    }
}

fn read_attrs(location: &Location) -> Result<Vec<(String, HdfValue)>> {
    let mut attrs = vec![];
    for name in location.attr_names()? {
        let attr = location.attr(&name)?;
        match read_attr(&attr) {
            Ok(Some(value)) => attrs.push((name, value)),
            Ok(None) => debug!(%name, "skipping attribute with unsupported type"),
            Err(e) => warn!(%name, "unable to read attribute: {e}"),
        }
    }
    Ok(attrs)
}

fn read_attr(attr: &Attribute) -> Result<Option<HdfValue>> {
    let value = match attr.dtype()?.to_descriptor()? {
        TypeDescriptor::Integer(_) => HdfValue::Int(attr.read_raw::<i64>()?),
        TypeDescriptor::Unsigned(_) => HdfValue::UInt(attr.read_raw::<u64>()?),
        TypeDescriptor::Float(_) => HdfValue::Float(attr.read_raw::<f64>()?),
        TypeDescriptor::Boolean => HdfValue::Bool(attr.read_raw::<bool>()?),
        TypeDescriptor::FixedAscii(_) => HdfValue::Str(
            attr.read_raw::<FixedAscii<MAX_FIXED_STRING>>()?
                .iter()
                .map(|s| s.as_str().trim_end_matches('\0').to_string())
                .collect(),
        ),
        TypeDescriptor::FixedUnicode(_) => HdfValue::Str(
            attr.read_raw::<FixedUnicode<MAX_FIXED_STRING>>()?
                .iter()
                .map(|s| s.as_str().trim_end_matches('\0').to_string())
                .collect(),
        ),
        TypeDescriptor::VarLenAscii => HdfValue::Str(
            attr.read_raw::<VarLenAscii>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        TypeDescriptor::VarLenUnicode => HdfValue::Str(
            attr.read_raw::<VarLenUnicode>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Model name from a RAS HDF path: `s3://bucket/prefix/Muncie.g05.hdf` -> `Muncie`.
pub fn model_name(path: &str) -> String {
    let file_name = hdf_stem(path);
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

/// File name without `.hdf`: `s3://bucket/prefix/Muncie.p04.hdf` -> `Muncie.p04`.
pub fn hdf_stem(path: &str) -> &str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name.strip_suffix(".hdf").unwrap_or(file_name)
}

pub fn check_geom_path(path: &str) -> Result<(), Error> {
    check_path(path, "geom", &GEOM_HDF_RE)
}

pub fn check_plan_path(path: &str) -> Result<(), Error> {
    check_path(path, "plan", &PLAN_HDF_RE)
}

lazy_static! {
    static ref GEOM_HDF_RE: Regex =
        Regex::new(GEOM_HDF_PATTERN).expect("Regex pattern should always compile");
    static ref PLAN_HDF_RE: Regex =
        Regex::new(PLAN_HDF_PATTERN).expect("Regex pattern should always compile");
}

fn check_path(path: &str, kind: &'static str, re: &Regex) -> Result<(), Error> {
    if re.is_match(path) {
        Ok(())
    } else {
        Err(Error::RasFileName {
            kind,
            pattern: re.as_str().to_string(),
            path: path.to_string(),
        })
    }
}
