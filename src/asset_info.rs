//! Roles, descriptions and media types for the files attached to RAS items.
use crate::error::Error;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

pub const HDF: &str = "application/x-hdf";
pub const HDF5: &str = "application/x-hdf5";
pub const GEOTIFF: &str = "image/tiff; application=geotiff";
pub const TEXT: &str = "text/plain";
pub const JSON: &str = "application/json";
pub const XML: &str = "application/xml";
pub const PNG: &str = "image/png";
pub const GEOPACKAGE: &str = "application/geopackage+sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub title: String,
    pub description: Option<String>,
    pub roles: Vec<String>,
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeomAssetKind {
    Topo,
    Lulc,
    Mannings,
    Other,
}

impl GeomAssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Topo => "topo",
            Self::Lulc => "lulc",
            Self::Mannings => "mannings",
            Self::Other => "other",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::Topo => "Topo data used in HEC-RAS model geometry",
            Self::Lulc => "Land Use / Land Cover data used in HEC-RAS model geometry",
            Self::Mannings => "Friction surface used in HEC-RAS model geometry",
            Self::Other => "Other data used in HEC-RAS model geometry",
        }
    }
}

impl FromStr for GeomAssetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topo" => Ok(Self::Topo),
            "lulc" => Ok(Self::Lulc),
            "mannings" => Ok(Self::Mannings),
            "other" => Ok(Self::Other),
            _ => Err(Error::AssetKind(s.to_string())),
        }
    }
}

impl fmt::Display for GeomAssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Extension after the last dot of the file name, including the dot; empty when none.
fn suffix(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => "",
        Some(i) => &name[i..],
    }
}

pub fn geom_asset_info(path: &str, kind: GeomAssetKind) -> AssetInfo {
    let title = file_name(path);
    let (media_type, mut roles) = match suffix(title) {
        ".hdf" => (Some(HDF), vec![HDF.to_string()]),
        ".tif" => (Some(GEOTIFF), vec![GEOTIFF.to_string()]),
        _ => (None, vec![]),
    };
    roles.push(format!("ras-{kind}"));

    AssetInfo {
        title: title.to_string(),
        description: Some(kind.description().to_string()),
        roles,
        media_type: media_type.map(str::to_string),
    }
}

/// The depth grid raster itself.
pub fn depth_grid_asset_info(path: &str) -> AssetInfo {
    AssetInfo {
        title: file_name(path).to_string(),
        description: Some("Maximum depth grid produced by the HEC-RAS simulation".to_string()),
        roles: vec!["data".to_string(), "ras-depth-grid".to_string()],
        media_type: Some(GEOTIFF.to_string()),
    }
}

struct RasExtension {
    pattern: &'static str,
    role: &'static str,
    description: &'static str,
    media_type: Option<&'static str>,
    /// Geometry and plan files are only described when they are the text flavour.
    text_only_description: bool,
}

const fn ext(
    pattern: &'static str,
    role: &'static str,
    description: &'static str,
    media_type: Option<&'static str>,
) -> RasExtension {
    RasExtension {
        pattern,
        role,
        description,
        media_type,
        text_only_description: false,
    }
}

const RAS_EXTENSIONS: &[RasExtension] = &[
    RasExtension {
        pattern: r"^g[0-9]{2}$",
        role: "ras-geometry",
        description:
            "The geometry file contains the 2D flow area perimeter and other geometry information.",
        media_type: Some(TEXT),
        text_only_description: true,
    },
    RasExtension {
        pattern: r"^p[0-9]{2}$",
        role: "ras-plan",
        description: "The plan file contains the simulation plan and other simulation information.",
        media_type: Some(TEXT),
        text_only_description: true,
    },
    ext(
        r"^u[0-9]{2}$",
        "ras-unsteady",
        "The unsteady file contains the unsteady flow results and other simulation information.",
        Some(TEXT),
    ),
    ext(
        r"^s[0-9]{2}$",
        "ras-steady",
        "The steady file contains the steady flow results and other simulation information.",
        Some(TEXT),
    ),
    ext(
        r"^f[0-9]{2}$",
        "ras-steady-flow",
        "Steady flow file which contains profile and flow boundary information.",
        Some(TEXT),
    ),
    ext(
        r"^q[0-9]{2}$",
        "ras-quasi-unsteady-flow",
        "Quasi-Unsteady flow file.",
        Some(TEXT),
    ),
    ext(
        r"^r[0-9]{2}$",
        "ras-run",
        "Run file for steady flow analysis which contains all the necessary input data required for the RAS computational engine.",
        Some(TEXT),
    ),
    ext(
        r"^x[0-9]{2}$",
        "ras-unsteady-run",
        "Run file for unsteady flow analysis which contains all the necessary input data required for the RAS computational engine.",
        Some(TEXT),
    ),
    ext(
        r"^c[0-9]{2}$",
        "ras-geometric-preprocessor",
        "Geometric Pre-Processor output file containing the hydraulic properties tables, rating curves, and family of rating curves for each cross-section, bridge, culvert, storage area, inline and lateral structure.",
        None,
    ),
    ext(
        r"^b[0-9]{2}$",
        "ras-boundary-condition",
        "Boundary Condition file.",
        Some(TEXT),
    ),
    ext(
        r"^hyd[0-9]{2}$",
        "ras-computational-level-output",
        "Detailed Computational Level output file.",
        Some(TEXT),
    ),
    ext(
        r"^prj$",
        "ras-project",
        "The project file contains the project information and other simulation information.",
        Some(TEXT),
    ),
    ext(
        r"^dss$",
        "ras-dss",
        "The dss file contains the dss results and other simulation information.",
        None,
    ),
    ext(
        r"^log$",
        "ras-log",
        "The log file contains the log information and other simulation information.",
        Some(TEXT),
    ),
    ext(r"^blf$", "ras-binary-log", "Binary Log file.", None),
    ext(r"^png$", "thumbnail", "Thumbnail image of the model.", Some(PNG)),
    ext(
        r"^gpkg$",
        "ras-geopackage",
        "GeoPackage file containing model geometry.",
        Some(GEOPACKAGE),
    ),
    ext(r"^rst$", "ras-restart", "Restart file for resuming the simulation.", None),
    ext(
        r"^rasmap$",
        "ras-mapper",
        "RAS Mapper file containing map layers and results settings.",
        Some(XML),
    ),
    ext(r"^txt$", "ras-text", "Text file.", Some(TEXT)),
    ext(r"^xml$", "ras-xml", "XML file.", Some(XML)),
];

lazy_static! {
    static ref EXTENSION_MATCHERS: Vec<(Regex, &'static RasExtension)> = RAS_EXTENSIONS
        .iter()
        .map(|entry| {
            let re = Regex::new(entry.pattern).expect("Regex pattern should always compile");
            (re, entry)
        })
        .collect();
}

/// Roles and description for any file of a RAS model, keyed on its RAS extension.
///
/// For `Muncie.p04.hdf` the RAS extension is `p04` and the roles start with the HDF5 media type.
pub fn ras_asset_info(path: &str) -> AssetInfo {
    let title = file_name(path);
    let is_hdf = suffix(title) == ".hdf";

    let ras_extension = if is_hdf {
        suffix(&title[..title.len() - ".hdf".len()])
    } else {
        suffix(title)
    };
    let ras_extension = ras_extension.trim_start_matches('.').to_lowercase();

    let mut roles = vec![];
    if is_hdf {
        roles.push(HDF5.to_string());
    }

    let matched = EXTENSION_MATCHERS
        .iter()
        .find(|(re, _)| re.is_match(&ras_extension))
        .map(|(_, entry)| *entry);

    let (description, media_type) = match matched {
        Some(entry) => {
            roles.push(entry.role.to_string());
            if entry.text_only_description {
                if is_hdf {
                    (None, Some(HDF5))
                } else {
                    roles.push(TEXT.to_string());
                    (Some(entry.description), entry.media_type)
                }
            } else {
                if entry.media_type == Some(TEXT) {
                    roles.push(TEXT.to_string());
                }
                let media_type = if is_hdf { Some(HDF5) } else { entry.media_type };
                (Some(entry.description), media_type)
            }
        }
        None => {
            roles.push("ras-file".to_string());
            (None, is_hdf.then_some(HDF5))
        }
    };

    AssetInfo {
        title: title.to_string(),
        description: description.map(str::to_string),
        roles,
        media_type: media_type.map(str::to_string),
    }
}
