use super::RasHdf;
use crate::attrs::{attrs_to_properties, Properties};
use anyhow::{Context, Result};
use hdf5::types::FixedAscii;
use hdf5::H5Type;
use std::path::Path;
use tracing::{debug, warn};

pub(crate) const BC_LINES_DATASET: &str = "Geometry/Boundary Condition Lines/Attributes";

/// One row of the boundary condition line attribute table.
#[derive(H5Type, Clone, Copy, Debug)]
#[repr(C)]
pub(crate) struct BcLineRecord {
    #[hdf5(rename = "Name")]
    pub name: FixedAscii<64>,
    #[hdf5(rename = "SA-2D")]
    pub mesh_name: FixedAscii<64>,
    #[hdf5(rename = "Type")]
    pub kind: FixedAscii<64>,
}

/// A boundary condition line and the 2D area it feeds.
#[derive(Debug, Clone, PartialEq)]
pub struct BcLine {
    pub name: String,
    pub mesh_name: String,
    pub kind: String,
}

fn fixed_str(value: &FixedAscii<64>) -> String {
    value.as_str().trim_end_matches('\0').trim().to_string()
}

impl From<&BcLineRecord> for BcLine {
    fn from(record: &BcLineRecord) -> Self {
        Self {
            name: fixed_str(&record.name),
            mesh_name: fixed_str(&record.mesh_name),
            kind: fixed_str(&record.kind),
        }
    }
}

pub struct RasGeomHdf {
    hdf: RasHdf,
}

impl RasGeomHdf {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            hdf: RasHdf::open(path)?,
        })
    }

    pub fn hdf(&self) -> &RasHdf {
        &self.hdf
    }

    /// Root, `Geometry`, `Geometry/Structures` and first 2D flow area attributes.
    pub fn geom_attrs(&self) -> Result<Properties> {
        let mut attrs = self.hdf.root_attrs()?;

        if let Some(geometry) = self.hdf.group_attrs("Geometry", "Geometry")? {
            attrs.extend(geometry);
        }
        if let Some(structures) = self.hdf.group_attrs("Geometry/Structures", "Structures")? {
            attrs.extend(structures);
        }

        let Some(areas) = self.hdf.flow_areas()? else {
            warn!("Unable to get 2D Flow Area; Geometry/2D Flow Areas group not found in HDF file");
            return Ok(attrs);
        };
        if let Some(first) = areas.first() {
            let area_attrs = super::read_attrs(first)?;
            attrs.extend(attrs_to_properties(area_attrs, Some("2D Flow Areas")));
        }
        Ok(attrs)
    }

    /// Boundary condition lines, empty when the geometry has none.
    pub fn bc_lines(&self) -> Result<Vec<BcLine>> {
        let file = self.hdf.file();
        if !file.link_exists(BC_LINES_DATASET) {
            debug!("no boundary condition lines in HDF file");
            return Ok(vec![]);
        }
        let records = file
            .dataset(BC_LINES_DATASET)?
            .read_raw::<BcLineRecord>()
            .context("Unable to read boundary condition lines")?;
        Ok(records.iter().map(BcLine::from).collect())
    }
}
