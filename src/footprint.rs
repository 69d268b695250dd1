//! Item geometry: union, simplification and reprojection of model perimeters.
use anyhow::{anyhow, Context, Result};
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::Dataset;
use geo::{BooleanOps, BoundingRect, Coord, LineString, MultiPolygon, Polygon, Simplify};
use serde_json::{json, Value};
use tracing::warn;

/// A GeoJSON geometry with its bounding box, ready to be placed on an Item.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub geometry: Value,
    pub bbox: [f64; 4],
}

impl Footprint {
    pub fn from_polygons(polygons: &MultiPolygon<f64>) -> Result<Self> {
        let rect = polygons
            .bounding_rect()
            .ok_or(anyhow!("Cannot compute bounds of an empty geometry"))?;
        let bbox = [rect.min().x, rect.min().y, rect.max().x, rect.max().y];

        let geometry = match polygons.0.as_slice() {
            [single] => json!({"type": "Polygon", "coordinates": polygon_coords(single)}),
            many => json!({
                "type": "MultiPolygon",
                "coordinates": many.iter().map(polygon_coords).collect::<Vec<_>>(),
            }),
        };
        Ok(Self { geometry, bbox })
    }
}

fn ring_coords(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

fn polygon_coords(polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_coords)
        .collect()
}

pub fn union_all(polygons: &[Polygon<f64>]) -> MultiPolygon<f64> {
    polygons
        .iter()
        .fold(MultiPolygon::new(vec![]), |acc, p| {
            acc.union(&MultiPolygon::from(p.clone()))
        })
}

fn wgs84_transform(mut source: SpatialRef) -> Result<CoordTransform> {
    source.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

    let mut target = SpatialRef::from_epsg(4326)?;
    target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

    CoordTransform::new(&source, &target).context("Failed to create coordinate transform pipeline")
}

fn reproject_ring(ring: &LineString<f64>, transform: &CoordTransform) -> Result<LineString<f64>> {
    let mut xs: Vec<f64> = ring.coords().map(|c| c.x).collect();
    let mut ys: Vec<f64> = ring.coords().map(|c| c.y).collect();
    let mut zs = vec![0.0; xs.len()];

    transform
        .transform_coords(&mut xs, &mut ys, &mut zs)
        .context("GDAL Reprojection failed")?;

    if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
        return Err(anyhow!("Reprojection resulted in non-finite coordinates"));
    }
    Ok(xs
        .into_iter()
        .zip(ys)
        .map(|(x, y)| Coord { x, y })
        .collect())
}

/// Reprojects to EPSG:4326 with x as longitude.
pub fn to_wgs84(polygons: &MultiPolygon<f64>, source: SpatialRef) -> Result<MultiPolygon<f64>> {
    let transform = wgs84_transform(source)?;
    let reprojected = polygons
        .iter()
        .map(|polygon| {
            let exterior = reproject_ring(polygon.exterior(), &transform)?;
            let interiors = polygon
                .interiors()
                .iter()
                .map(|ring| reproject_ring(ring, &transform))
                .collect::<Result<Vec<_>>>()?;
            Ok(Polygon::new(exterior, interiors))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(MultiPolygon::new(reprojected))
}

/// Footprint of a model from its 2D flow area perimeters.
///
/// `simplify` is a tolerance in model units applied before reprojection. Without a
/// projection the perimeter stays in model coordinates.
pub fn perimeter_footprint(
    perimeters: &[Polygon<f64>],
    projection: Option<&str>,
    simplify: Option<f64>,
) -> Result<Footprint> {
    let mut polygons = union_all(perimeters);
    if let Some(tolerance) = simplify {
        polygons = polygons.simplify(&tolerance);
    }

    let polygons = match projection {
        Some(wkt) => {
            let source = SpatialRef::from_wkt(wkt).context("Invalid projection WKT")?;
            to_wgs84(&polygons, source)?
        }
        None => {
            warn!("Unable to convert perimeter to WGS 84 (EPSG:4326); projection not specified");
            polygons
        }
    };
    Footprint::from_polygons(&polygons)
}

/// Footprint of a raster from its geotransform corners.
pub fn raster_footprint(dataset: &Dataset) -> Result<Footprint> {
    let gt = dataset.geo_transform().context("GeoTransform missing")?;
    let (width, height) = dataset.raster_size();
    let (w, h) = (width as f64, height as f64);

    let corners: Vec<Coord<f64>> = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]
        .iter()
        .map(|&(px, py)| Coord {
            x: gt[0] + px * gt[1] + py * gt[2],
            y: gt[3] + px * gt[4] + py * gt[5],
        })
        .collect();
    let polygons = MultiPolygon::new(vec![Polygon::new(LineString::from(corners), vec![])]);

    let wkt = dataset.projection();
    if wkt.is_empty() {
        warn!("Raster has no projection; footprint left in raster coordinates");
        return Footprint::from_polygons(&polygons);
    }
    let source = SpatialRef::from_wkt(&wkt).context("Invalid WKT in raster header")?;
    Footprint::from_polygons(&to_wgs84(&polygons, source)?)
}
