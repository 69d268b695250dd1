//! Builders for the geometry, plan and depth-grid STAC Items.
//!
//! The builders here only shape documents; reading sources and writing results is done by
//! the commands.
use crate::asset_info::{AssetInfo, JSON};
use crate::attrs::{parse_ras_datetime, Properties};
use crate::depth_grid::DepthGrid;
use crate::error::Error;
use crate::footprint::{perimeter_footprint, Footprint};
use crate::ras_hdf::{BcLine, RasGeomHdf, RasHdf, RasPlanHdf};
use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use stac::{Asset, Item, Link};
use tracing::{debug, info, warn};

pub const STAC_VERSION: &str = "1.0.0";

const PROJECTION_EXTENSION: &str = "https://stac-extensions.github.io/projection/v1.1.0/schema.json";
const RASTER_EXTENSION: &str = "https://stac-extensions.github.io/raster/v1.1.0/schema.json";

/// Geometry properties left off items unless the caller supplies its own removal list.
pub const GEOM_HDF_IGNORE_PROPERTIES: &[&str] = &[
    "geometry:complete_geometry",
    "2d_flow_areas:cell_volume_tolerance",
    "2d_flow_areas:data_date",
    "2d_flow_areas:extents",
    "2d_flow_areas:cell_maximum_index",
    "2d_flow_areas:face_area_conveyance_ratio",
    "2d_flow_areas:face_area_elevation_tolerance",
    "2d_flow_areas:face_profile_tolerance",
    "2d_flow_areas:infiltration_date_last_modified",
    "2d_flow_areas:infiltration_file_date",
    "2d_flow_areas:infiltration_filename",
    "2d_flow_areas:infiltration_layername",
    "2d_flow_areas:land_cover_date_last_modified",
    "2d_flow_areas:land_cover_file_date",
    "2d_flow_areas:land_cover_filename",
    "2d_flow_areas:land_cover_layername",
    "2d_flow_areas:mannings_n",
    "2d_flow_areas:property_tables_last_computed",
    "2d_flow_areas:terrain_file_date",
    "2d_flow_areas:terrain_filename",
    "2d_flow_areas:version",
    "2d_flow_areas:infiltration_override_table_hash",
    "2d_flow_areas:property_tables_lc_hash",
];

/// Plan properties always left off items: paths on the modeller's machine.
pub const PLAN_HDF_IGNORE_PROPERTIES: &[&str] = &[
    "plan_information:flow_filename",
    "plan_information:geometry_filename",
    "plan_information:plan_filename",
];

/// Stored as cell areas; published as the side length of an equivalent square cell.
const CELL_SIZE_PROPERTIES: &[&str] = &[
    "2d_flow_areas:cell_average_size",
    "2d_flow_areas:cell_maximum_size",
    "2d_flow_areas:cell_minimum_size",
];

#[derive(Debug, Clone, Default)]
pub struct ItemOptions {
    /// Douglas-Peucker tolerance for the footprint, in model units.
    pub simplify: Option<f64>,
    pub props_to_remove: Vec<String>,
    pub props: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultLink {
    pub href: String,
    pub rel: String,
    pub title: String,
    #[serde(rename = "type")]
    pub r#type: String,
}

/// The records printed when an item has been written.
pub fn result_links(public_url: &str, s3_path: &str) -> Vec<ResultLink> {
    vec![
        ResultLink {
            href: public_url.to_string(),
            rel: "self".to_string(),
            title: "public_url".to_string(),
            r#type: JSON.to_string(),
        },
        ResultLink {
            href: s3_path.to_string(),
            rel: "self".to_string(),
            title: "s3_key".to_string(),
            r#type: JSON.to_string(),
        },
    ]
}

pub fn remove_properties<I, S>(props: &mut Properties, keys: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for key in keys {
        let key = key.as_ref();
        if props.remove(key).is_none() {
            warn!("Failed removing {key}, property not found");
        }
    }
}

pub fn cell_sizes_to_lengths(props: &mut Properties) {
    for key in CELL_SIZE_PROPERTIES {
        let Some(value) = props.get(*key) else {
            warn!("property {key} not found");
            continue;
        };
        let Some(area) = value.as_f64() else {
            warn!("property {key} is not numeric ({value}); left as is");
            continue;
        };
        props.insert(key.to_string(), json!(area.sqrt() as i64));
    }
}

/// One `BC_Lines:<name>` property per boundary condition line.
pub fn bc_line_properties(lines: &[BcLine]) -> Properties {
    lines
        .iter()
        .map(|line| {
            (
                format!("BC_Lines:{}", line.name.replace(' ', "_")),
                json!([
                    format!("Mesh_name: {}", line.mesh_name),
                    format!("Type: {}", line.kind),
                ]),
            )
        })
        .collect()
}

/// RFC 3339 UTC form of an ISO datetime property.
fn stac_datetime(iso: &str) -> Result<String, Error> {
    let datetime = NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| parse_ras_datetime(iso))
        .map_err(|_| Error::Datetime(iso.to_string()))?;
    Ok(datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

fn new_item(
    id: &str,
    footprint: Option<&Footprint>,
    properties: Properties,
    extensions: &[&str],
) -> Result<Item> {
    let (geometry, bbox) = match footprint {
        Some(f) => (f.geometry.clone(), json!(f.bbox)),
        None => (Value::Null, Value::Null),
    };
    let mut doc = json!({
        "type": "Feature",
        "stac_version": STAC_VERSION,
        "stac_extensions": extensions,
        "id": id,
        "geometry": geometry,
        "properties": properties,
        "links": [],
        "assets": {},
    });
    if !bbox.is_null() {
        doc["bbox"] = bbox;
    }
    Ok(serde_json::from_value(doc)?)
}

fn model_footprint(hdf: &RasHdf, item_id: &str, simplify: Option<f64>) -> Result<Option<Footprint>> {
    let perimeters = hdf.mesh_area_perimeters()?;
    if perimeters.is_empty() {
        debug!(item_id, "no mesh perimeters");
        return Ok(None);
    }
    let projection = hdf.projection()?;
    Ok(Some(perimeter_footprint(&perimeters, projection.as_deref(), simplify)?))
}

/// The model item for a geometry HDF. Assets are added by the caller.
pub fn geom_item(hdf: &RasGeomHdf, item_id: &str, options: &ItemOptions) -> Result<Item> {
    info!("Creating STAC item for model {item_id}");
    let footprint = model_footprint(hdf.hdf(), item_id, options.simplify)?
        .ok_or_else(|| Error::MissingGeometry(item_id.to_string()))?;

    let mut props = hdf.geom_attrs()?;
    let geometry_time = props
        .get("geometry:geometry_time")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MissingDatetime(item_id.to_string()))?;
    let datetime = stac_datetime(geometry_time)?;

    if options.props_to_remove.is_empty() {
        remove_properties(&mut props, GEOM_HDF_IGNORE_PROPERTIES);
    } else {
        remove_properties(&mut props, &options.props_to_remove);
    }
    props.extend(bc_line_properties(&hdf.bc_lines()?));
    props.extend(options.props.clone());
    cell_sizes_to_lengths(&mut props);
    props.insert("datetime".to_string(), json!(datetime));

    new_item(item_id, Some(&footprint), props, &[PROJECTION_EXTENSION])
}

/// `(start, end)` of a plan run: the results run-time window, else the simulation window.
fn plan_window(props: &Properties) -> Option<(String, String)> {
    if let Some([start, end]) = props
        .get("results_summary:run_time_window")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
    {
        if let (Some(start), Some(end)) = (start.as_str(), end.as_str()) {
            return Some((start.to_string(), end.to_string()));
        }
    }
    let start = props.get("plan_information:simulation_start_time")?.as_str()?;
    let end = props.get("plan_information:simulation_end_time")?.as_str()?;
    debug!("no run time window in results; using simulation window");
    Some((start.to_string(), end.to_string()))
}

/// The simulation item for a plan HDF.
///
/// When the plan carries no 2D perimeters, `fallback` (usually the model item's footprint)
/// is used instead.
pub fn plan_item(
    hdf: &RasPlanHdf,
    item_id: &str,
    options: &ItemOptions,
    fallback: Option<&Footprint>,
) -> Result<Item> {
    info!("Creating STAC item for simulation {item_id}");
    let plan_attrs = hdf.plan_attrs()?;
    let results_attrs = hdf.plan_results_attrs()?;
    if plan_attrs.is_empty() && results_attrs.is_empty() {
        return Err(Error::MissingProperties(item_id.to_string()).into());
    }

    let mut props = Properties::new();
    props.insert("ras:simulation".to_string(), json!(item_id));
    props.extend(plan_attrs);
    props.extend(results_attrs);

    let (start, end) =
        plan_window(&props).ok_or_else(|| Error::MissingDatetime(item_id.to_string()))?;
    let (start, end) = (stac_datetime(&start)?, stac_datetime(&end)?);

    remove_properties(&mut props, PLAN_HDF_IGNORE_PROPERTIES);
    remove_properties(&mut props, &options.props_to_remove);
    props.extend(options.props.clone());
    props.insert("datetime".to_string(), json!(start));
    props.insert("start_datetime".to_string(), json!(start));
    props.insert("end_datetime".to_string(), json!(end));

    let footprint = match model_footprint(hdf.hdf(), item_id, options.simplify)? {
        Some(footprint) => footprint,
        None => fallback
            .cloned()
            .ok_or_else(|| Error::MissingGeometry(item_id.to_string()))?,
    };
    new_item(item_id, Some(&footprint), props, &[PROJECTION_EXTENSION])
}

/// The depth-grid item, derived from a plan item and sharing its time range.
pub fn dg_item(
    grid: &DepthGrid,
    dg_id: &str,
    plan_item: &Item,
    plan_item_href: &str,
    extra_props: &Properties,
) -> Result<Item> {
    info!("Creating STAC item for depth grid {dg_id}");
    let plan = serde_json::to_value(plan_item)?;
    let plan_props = plan["properties"]
        .as_object()
        .ok_or(anyhow!("Plan item {} has no properties", plan_item.id))?;

    let mut props = Properties::new();
    for key in ["datetime", "start_datetime", "end_datetime"] {
        if let Some(value) = plan_props.get(key).filter(|v| !v.is_null()) {
            props.insert(key.to_string(), value.clone());
        }
    }
    if !props.contains_key("datetime") {
        return Err(Error::MissingDatetime(dg_id.to_string()).into());
    }
    if let Some(simulation) = plan_props.get("ras:simulation") {
        props.insert("ras:simulation".to_string(), simulation.clone());
    }
    props.extend(grid.properties.clone());
    props.extend(extra_props.clone());

    let mut item = new_item(
        dg_id,
        Some(&grid.footprint),
        props,
        &[PROJECTION_EXTENSION, RASTER_EXTENSION],
    )?;

    let mut link = Link::new(plan_item_href, "derived_from");
    link.r#type = Some(JSON.to_string());
    link.title = Some(plan_item.id.clone());
    item.links.push(link);
    Ok(item)
}

pub fn new_asset(href: &str, info: &AssetInfo, metadata: Map<String, Value>) -> Asset {
    let mut asset = Asset::new(href);
    asset.title = Some(info.title.clone());
    asset.description = info.description.clone();
    asset.r#type = info.media_type.clone();
    asset.roles = info.roles.clone();
    asset.additional_fields.extend(metadata);
    asset
}

/// Replaces any existing `self` link.
pub fn set_self_href(item: &mut Item, href: &str) {
    item.links.retain(|link| link.rel != "self");
    let mut link = Link::new(href, "self");
    link.r#type = Some(JSON.to_string());
    item.links.push(link);
}

/// The geometry and bbox of an existing item, if it has both.
pub fn item_footprint(item: &Item) -> Result<Option<Footprint>> {
    let doc = serde_json::to_value(item)?;
    let geometry = doc["geometry"].clone();
    let bbox: Option<Vec<f64>> = doc
        .get("bbox")
        .filter(|b| !b.is_null())
        .map(|b| serde_json::from_value(b.clone()))
        .transpose()?;
    match (geometry.is_null(), bbox.as_deref()) {
        (false, Some(&[min_x, min_y, max_x, max_y])) => Ok(Some(Footprint {
            geometry,
            bbox: [min_x, min_y, max_x, max_y],
        })),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_info::{geom_asset_info, GeomAssetKind};
    use crate::ras_hdf::fixtures;

    fn geom_fixture() -> (tempfile::TempDir, RasGeomHdf) {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_geom_hdf(dir.path()).unwrap();
        let hdf = RasGeomHdf::open(&path).unwrap();
        (dir, hdf)
    }

    fn props_of(item: &Item) -> Value {
        serde_json::to_value(item).unwrap()["properties"].clone()
    }

    #[test]
    fn test_result_links() {
        let links = result_links("https://b.s3.amazonaws.com/stac/i.json", "s3://b/stac/i.json");
        assert_eq!(
            serde_json::to_value(&links).unwrap(),
            json!([
                {"href": "https://b.s3.amazonaws.com/stac/i.json", "rel": "self", "title": "public_url", "type": "application/json"},
                {"href": "s3://b/stac/i.json", "rel": "self", "title": "s3_key", "type": "application/json"},
            ])
        );
    }

    #[test]
    fn test_remove_and_cell_sizes() {
        let mut props = Properties::new();
        props.insert("a".to_string(), json!(1));
        props.insert("2d_flow_areas:cell_average_size".to_string(), json!(10000.0));
        props.insert("2d_flow_areas:cell_minimum_size".to_string(), json!(2.0));

        remove_properties(&mut props, ["a", "missing"]);
        cell_sizes_to_lengths(&mut props);

        assert!(!props.contains_key("a"));
        assert_eq!(props["2d_flow_areas:cell_average_size"], json!(100));
        assert_eq!(props["2d_flow_areas:cell_minimum_size"], json!(1));
        assert!(!props.contains_key("2d_flow_areas:cell_maximum_size"));
    }

    #[test]
    fn test_non_numeric_cell_size_is_kept() {
        let mut props = Properties::new();
        props.insert("2d_flow_areas:cell_average_size".to_string(), json!("n/a"));

        cell_sizes_to_lengths(&mut props);
        assert_eq!(props["2d_flow_areas:cell_average_size"], json!("n/a"));
    }

    #[test]
    fn test_stac_datetime() {
        assert_eq!(stac_datetime("2023-10-17T16:12:11").unwrap(), "2023-10-17T16:12:11Z");
        assert_eq!(stac_datetime("17Oct2023 16:12:11").unwrap(), "2023-10-17T16:12:11Z");
        assert!(stac_datetime("yesterday").is_err());
    }

    #[test]
    fn test_geom_item() {
        let (_dir, hdf) = geom_fixture();
        let mut options = ItemOptions::default();
        options.props.insert("owner".to_string(), json!("FEMA"));

        let item = geom_item(&hdf, "Muncie", &options).unwrap();
        assert_eq!(item.id, "Muncie");

        let props = props_of(&item);
        assert_eq!(props["datetime"], json!("2023-10-17T16:12:11Z"));
        assert_eq!(props["geometry:geometry_time"], json!("2023-10-17T16:12:11"));
        assert_eq!(props["owner"], json!("FEMA"));
        assert_eq!(props["2d_flow_areas:cell_average_size"], json!(100));
        assert_eq!(props["2d_flow_areas:cell_maximum_size"], json!(200));
        assert_eq!(props["2d_flow_areas:cell_minimum_size"], json!(50));
        assert!(props.get("2d_flow_areas:mannings_n").is_none());
        assert!(props.get("geometry:complete_geometry").is_none());
        assert!(props.get("2d_flow_areas:terrain_filename").is_none());
        assert_eq!(
            props["BC_Lines:Upstream_Inflow"],
            json!(["Mesh_name: 2D Interior Area", "Type: External"])
        );
        assert_eq!(
            props["BC_Lines:DS_Normal_Depth"],
            json!(["Mesh_name: 2D Interior Area", "Type: External"])
        );

        let footprint = item_footprint(&item).unwrap().unwrap();
        assert_eq!(footprint.geometry["type"], "Polygon");
        assert!((-86.0..-85.0).contains(&footprint.bbox[0]));
    }

    #[test]
    fn test_geom_item_custom_removals() {
        let (_dir, hdf) = geom_fixture();
        let options = ItemOptions {
            props_to_remove: vec!["units_system".to_string()],
            ..Default::default()
        };

        let props = props_of(&geom_item(&hdf, "Muncie", &options).unwrap());
        assert!(props.get("units_system").is_none());
        // the default list is replaced, not extended
        assert_eq!(props["geometry:complete_geometry"], json!(true));
    }

    #[test]
    fn test_geom_item_without_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_empty_hdf(dir.path(), "Empty.g01.hdf").unwrap();
        let hdf = RasGeomHdf::open(&path).unwrap();

        let err = geom_item(&hdf, "Empty", &ItemOptions::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::MissingGeometry(_))));
    }

    #[test]
    fn test_plan_item() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_plan_hdf(dir.path()).unwrap();
        let hdf = RasPlanHdf::open(&path).unwrap();
        let options = ItemOptions {
            props_to_remove: vec!["plan_parameters:1d_cores".to_string()],
            ..Default::default()
        };

        let item = plan_item(&hdf, "Muncie-p04", &options, None).unwrap();
        let props = props_of(&item);

        assert_eq!(props["ras:simulation"], json!("Muncie-p04"));
        assert_eq!(props["datetime"], json!("2024-03-18T10:10:10Z"));
        assert_eq!(props["start_datetime"], json!("2024-03-18T10:10:10Z"));
        assert_eq!(props["end_datetime"], json!("2024-03-18T10:12:00Z"));
        assert_eq!(props["results_summary:computation_time_total_minutes"], json!(1.5));
        assert!(props.get("plan_information:geometry_filename").is_none());
        assert!(props.get("plan_parameters:1d_cores").is_none());
        assert!(item_footprint(&item).unwrap().is_some());
    }

    #[test]
    fn test_plan_item_falls_back_to_model_footprint() {
        let dir = tempfile::tempdir().unwrap();
        let (_geom_dir, geom) = geom_fixture();
        let model = geom_item(&geom, "Muncie", &ItemOptions::default()).unwrap();
        let footprint = item_footprint(&model).unwrap().unwrap();

        let path = fixtures::write_bare_plan_hdf(dir.path()).unwrap();
        let hdf = RasPlanHdf::open(&path).unwrap();
        let item = plan_item(&hdf, "Muncie.p05", &ItemOptions::default(), Some(&footprint)).unwrap();

        let doc = serde_json::to_value(&item).unwrap();
        let model_doc = serde_json::to_value(&model).unwrap();
        assert_eq!(doc["geometry"], model_doc["geometry"]);
        assert_eq!(doc["bbox"], model_doc["bbox"]);

        // no results group, so the simulation window is used
        let props = &doc["properties"];
        assert_eq!(props["datetime"], json!("1900-01-02T00:00:00Z"));
        assert_eq!(props["start_datetime"], json!("1900-01-02T00:00:00Z"));
        assert_eq!(props["end_datetime"], json!("1900-01-03T00:00:00Z"));
    }

    #[test]
    fn test_plan_item_without_any_footprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_bare_plan_hdf(dir.path()).unwrap();
        let hdf = RasPlanHdf::open(&path).unwrap();

        let err = plan_item(&hdf, "Muncie.p05", &ItemOptions::default(), None).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::MissingGeometry(_))));
    }

    #[test]
    fn test_bc_line_properties() {
        let lines = vec![BcLine {
            name: "North Inflow".to_string(),
            mesh_name: "Mesh A".to_string(),
            kind: "External".to_string(),
        }];
        let props = bc_line_properties(&lines);
        assert_eq!(
            Value::Object(props),
            json!({"BC_Lines:North_Inflow": ["Mesh_name: Mesh A", "Type: External"]})
        );
        assert!(bc_line_properties(&[]).is_empty());
    }

    #[test]
    fn test_plan_item_without_properties() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Blank.p01.hdf");
        hdf5::File::create(&path).unwrap();
        let hdf = RasPlanHdf::open(&path).unwrap();

        let err = plan_item(&hdf, "Blank", &ItemOptions::default(), None).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::MissingProperties(_))));
    }

    #[test]
    fn test_dg_item() {
        let dir = tempfile::tempdir().unwrap();
        let plan_path = fixtures::write_plan_hdf(dir.path()).unwrap();
        let plan = plan_item(
            &RasPlanHdf::open(&plan_path).unwrap(),
            "Muncie-p04",
            &ItemOptions::default(),
            None,
        )
        .unwrap();
        let grid_path = crate::depth_grid::tests::write_depth_grid(dir.path()).unwrap();
        let grid = DepthGrid::open(&grid_path).unwrap();

        let mut extra = Properties::new();
        extra.insert("event".to_string(), json!("100yr"));
        let item = dg_item(&grid, "Muncie-p04-depth", &plan, "https://b/plan.json", &extra).unwrap();

        let props = props_of(&item);
        assert_eq!(props["start_datetime"], json!("2024-03-18T10:10:10Z"));
        assert_eq!(props["ras:simulation"], json!("Muncie-p04"));
        assert_eq!(props["proj:epsg"], json!(26916));
        assert_eq!(props["event"], json!("100yr"));

        let derived = item.links.iter().find(|l| l.rel == "derived_from").unwrap();
        assert_eq!(derived.href, "https://b/plan.json");
    }

    #[test]
    fn test_assets_and_self_link() {
        let (_dir, hdf) = geom_fixture();
        let mut item = geom_item(&hdf, "Muncie", &ItemOptions::default()).unwrap();

        let info = geom_asset_info("s3://b/m/Terrain.hdf", GeomAssetKind::Topo);
        let mut metadata = Map::new();
        metadata.insert("file:size".to_string(), json!(42));
        item.assets.insert(
            info.title.clone(),
            new_asset("https://b.s3.amazonaws.com/m/Terrain.hdf", &info, metadata),
        );
        set_self_href(&mut item, "https://b.s3.amazonaws.com/stac/old.json");
        set_self_href(&mut item, "https://b.s3.amazonaws.com/stac/Muncie.json");

        let doc = serde_json::to_value(&item).unwrap();
        let asset = &doc["assets"]["Terrain.hdf"];
        assert_eq!(asset["roles"], json!(["application/x-hdf", "ras-topo"]));
        assert_eq!(asset["type"], json!("application/x-hdf"));
        assert_eq!(asset["file:size"], json!(42));

        let selfs: Vec<_> = item.links.iter().filter(|l| l.rel == "self").collect();
        assert_eq!(selfs.len(), 1);
        assert_eq!(selfs[0].href, "https://b.s3.amazonaws.com/stac/Muncie.json");
    }
}
