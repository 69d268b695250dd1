//! Small RAS-shaped HDF files written at test time.
use anyhow::Result;
use super::geom::{BcLineRecord, BC_LINES_DATASET};
use hdf5::types::{FixedAscii, VarLenUnicode};
use hdf5::{File, Group, Location};
use std::path::{Path, PathBuf};

pub const PROJECTION_WKT: &str = "PROJCS[\"NAD_1983_UTM_Zone_16N\",GEOGCS[\"GCS_North_American_1983\",\
DATUM[\"D_North_American_1983\",SPHEROID[\"GRS_1980\",6378137.0,298.257222101]],\
PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]],\
PROJECTION[\"Transverse_Mercator\"],PARAMETER[\"False_Easting\",500000.0],\
PARAMETER[\"False_Northing\",0.0],PARAMETER[\"Central_Meridian\",-87.0],\
PARAMETER[\"Scale_Factor\",0.9996],PARAMETER[\"Latitude_Of_Origin\",0.0],UNIT[\"Meter\",1.0]]";

/// Two adjacent squares near Muncie, Indiana, in UTM zone 16N metres.
const INTERIOR_AREA: [[f64; 2]; 4] = [
    [636000.0, 4450000.0],
    [638000.0, 4450000.0],
    [638000.0, 4452000.0],
    [636000.0, 4452000.0],
];
const SECOND_AREA: [[f64; 2]; 4] = [
    [638000.0, 4450000.0],
    [639000.0, 4450000.0],
    [639000.0, 4451000.0],
    [638000.0, 4451000.0],
];

pub fn write_str(location: &Location, name: &str, value: &str) -> Result<()> {
    let value: VarLenUnicode = value.parse()?;
    location
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

/// Fixed-length strings are what RAS itself writes.
pub fn write_fixed(location: &Location, name: &str, value: &str) -> Result<()> {
    let value = FixedAscii::<1024>::from_ascii(value.as_bytes())?;
    location
        .new_attr::<FixedAscii<1024>>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

pub fn write_f32(location: &Location, name: &str, value: f32) -> Result<()> {
    location.new_attr::<f32>().create(name)?.write_scalar(&value)?;
    Ok(())
}

pub fn write_i32(location: &Location, name: &str, value: i32) -> Result<()> {
    location.new_attr::<i32>().create(name)?.write_scalar(&value)?;
    Ok(())
}

pub fn write_f64_array(location: &Location, name: &str, values: &[f64]) -> Result<()> {
    location
        .new_attr::<f64>()
        .shape(values.len())
        .create(name)?
        .write_raw(values)?;
    Ok(())
}

fn write_perimeter(area: &Group, coords: &[[f64; 2]]) -> Result<()> {
    let flat: Vec<f64> = coords.iter().flatten().copied().collect();
    area.new_dataset::<f64>()
        .shape((coords.len(), 2))
        .create("Perimeter")?
        .write_raw(&flat[..])?;
    Ok(())
}

fn write_geometry_groups(file: &File) -> Result<()> {
    let geometry = file.create_group("Geometry")?;
    write_fixed(&geometry, "Geometry Time", "17Oct2023 16:12:11")?;
    write_str(&geometry, "Title", "Muncie Test")?;
    write_str(&geometry, "Complete Geometry", "True")?;
    write_f64_array(&geometry, "Extents", &[636000.0, 639000.0, 4450000.0, 4452000.0])?;

    let structures = geometry.create_group("Structures")?;
    write_i32(&structures, "Bridge/Culvert Count", 0)?;
    write_i32(&structures, "Inline Structure Count", 1)?;

    let areas = geometry.create_group("2D Flow Areas")?;

    let interior = areas.create_group("2D Interior Area")?;
    write_f32(&interior, "Cell Average Size", 10000.0)?;
    write_f32(&interior, "Cell Maximum Size", 40000.0)?;
    write_f32(&interior, "Cell Minimum Size", 2500.0)?;
    write_f32(&interior, "Cell Volume Tolerance", 0.01)?;
    write_f32(&interior, "Mannings n", 0.06)?;
    write_str(&interior, "Terrain Filename", "Terrain\\Terrain.hdf")?;
    write_perimeter(&interior, &INTERIOR_AREA)?;

    let second = areas.create_group("Second Area")?;
    write_perimeter(&second, &SECOND_AREA)?;
    Ok(())
}

fn bc_line(name: &str, mesh_name: &str, kind: &str) -> Result<BcLineRecord> {
    Ok(BcLineRecord {
        name: FixedAscii::from_ascii(name.as_bytes())?,
        mesh_name: FixedAscii::from_ascii(mesh_name.as_bytes())?,
        kind: FixedAscii::from_ascii(kind.as_bytes())?,
    })
}

fn write_bc_lines(file: &File) -> Result<()> {
    let records = [
        bc_line("Upstream Inflow", "2D Interior Area", "External")?,
        bc_line("DS Normal Depth", "2D Interior Area", "External")?,
    ];
    file.create_group("Geometry/Boundary Condition Lines")?;
    file.new_dataset::<BcLineRecord>()
        .shape(records.len())
        .create(BC_LINES_DATASET)?
        .write_raw(&records[..])?;
    Ok(())
}

pub fn write_geom_hdf(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("Muncie.g05.hdf");
    let file = File::create(&path)?;
    write_str(&file, "File Type", "HEC-RAS Geometry")?;
    write_fixed(&file, "File Version", "HEC-RAS 6.3.1 September 2022")?;
    write_fixed(&file, "Projection", PROJECTION_WKT)?;
    write_str(&file, "Units System", "US Customary")?;
    write_geometry_groups(&file)?;
    write_bc_lines(&file)?;
    Ok(path)
}

pub fn write_plan_hdf(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("Muncie.p04.hdf");
    let file = File::create(&path)?;
    write_str(&file, "File Type", "HEC-RAS Results")?;
    write_fixed(&file, "Projection", PROJECTION_WKT)?;
    write_geometry_groups(&file)?;

    let plan_data = file.create_group("Plan Data")?;
    let info = plan_data.create_group("Plan Information")?;
    write_str(&info, "Plan Name", "Unsteady Multi 9-SA run")?;
    write_str(&info, "Plan ShortID", "9-SAs")?;
    write_fixed(&info, "Simulation Start Time", "02Jan1900 00:00:00")?;
    write_fixed(&info, "Simulation End Time", "02Jan1900 24:00:00")?;
    write_str(&info, "Simulation Time Window", "02Jan1900 0000 to 03Jan1900 0000")?;
    write_str(&info, "Geometry Filename", "C:\\Models\\Muncie\\Muncie.g05")?;

    let params = plan_data.create_group("Plan Parameters")?;
    write_i32(&params, "1D Cores", 0)?;
    write_str(&params, "2D Equation Set", "Diffusion Wave")?;

    let event = file.create_group("Event Conditions")?;
    let meteorology = event.create_group("Meteorology")?;
    let precipitation = meteorology.create_group("Precipitation")?;
    write_str(&precipitation, "Enabled", "False")?;
    write_fixed(&precipitation, "Projection", PROJECTION_WKT)?;

    let results = file.create_group("Results")?;
    let unsteady = results.create_group("Unsteady")?;
    write_str(&unsteady, "Short ID", "9-SAs")?;
    let summary = unsteady.create_group("Summary")?;
    write_str(&summary, "Computation Time Total", "00:01:30")?;
    write_fixed(
        &summary,
        "Run Time Window",
        "18MAR2024 10:10:10 to 18MAR2024 10:12:00",
    )?;
    write_str(&summary, "Solution", "Unsteady Finished Successfully")?;
    write_f32(&summary, "Maximum WSEL Error", 0.25)?;
    let volume = summary.create_group("Volume Accounting")?;
    write_str(&volume, "Vol Accounting in", "Acre Feet")?;
    write_f32(&volume, "Error", 0.5)?;
    Ok(path)
}

/// A plan with no mesh perimeters and no results, as left by an unfinished run.
pub fn write_bare_plan_hdf(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("Muncie.p05.hdf");
    let file = File::create(&path)?;
    write_str(&file, "File Type", "HEC-RAS Results")?;

    let info = file.create_group("Plan Data/Plan Information")?;
    write_str(&info, "Plan Name", "Unsteady no results")?;
    write_fixed(&info, "Simulation Start Time", "02Jan1900 00:00:00")?;
    write_fixed(&info, "Simulation End Time", "02Jan1900 24:00:00")?;
    Ok(path)
}

pub fn write_empty_hdf(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    let file = File::create(&path)?;
    write_str(&file, "File Type", "HEC-RAS Geometry")?;
    Ok(path)
}
