//! Projection and raster properties of a depth grid, read with GDAL.
use crate::attrs::Properties;
use crate::footprint::{raster_footprint, Footprint};
use anyhow::{Context, Result};
use gdal::Dataset;
use serde_json::json;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct DepthGrid {
    pub footprint: Footprint,
    pub properties: Properties,
}

impl DepthGrid {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let dataset =
            Dataset::open(path).with_context(|| format!("Unable to open raster {path:?}"))?;
        Ok(Self {
            footprint: raster_footprint(&dataset)?,
            properties: raster_properties(&dataset)?,
        })
    }
}

fn epsg_code(dataset: &Dataset) -> Option<i32> {
    let srs = dataset.spatial_ref().ok()?;
    match (srs.auth_name(), srs.auth_code()) {
        (Ok(name), Ok(code)) if name.eq_ignore_ascii_case("EPSG") => Some(code),
        _ => {
            debug!("raster CRS has no EPSG authority code");
            None
        }
    }
}

/// `proj:*` and `raster:*` properties for the first band of a raster.
pub fn raster_properties(dataset: &Dataset) -> Result<Properties> {
    let mut props = Properties::new();

    let wkt = dataset.projection();
    if let Some(code) = epsg_code(dataset) {
        props.insert("proj:epsg".to_string(), json!(code));
    }
    if wkt.is_empty() {
        warn!("Raster has no projection");
    } else {
        props.insert("proj:wkt2".to_string(), json!(wkt));
    }

    let (width, height) = dataset.raster_size();
    props.insert("proj:shape".to_string(), json!([height, width]));

    let gt = dataset.geo_transform().context("GeoTransform missing")?;
    // Affine order: a, b, c, d, e, f
    props.insert(
        "proj:transform".to_string(),
        json!([gt[1], gt[2], gt[0], gt[4], gt[5], gt[3]]),
    );

    let band = dataset.rasterband(1).context("Raster has no bands")?;
    props.insert("raster:nodata".to_string(), json!(band.no_data_value()));
    props.insert(
        "raster:data_type".to_string(),
        json!(band.band_type().name().to_lowercase()),
    );
    Ok(props)
}
