//! Parameter records for each command, as read from `--params` files.
use crate::attrs::Properties;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub trait Params: Serialize + DeserializeOwned {
    fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Unable to read parameters from {path:?}"))?;
        Self::from_json(&content)
    }

    fn from_json(content: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(content).context("Invalid parameters")?;
        Ok(params)
    }

    fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct GeomItemParams {
    pub geom_hdf: String,
    pub new_item_s3_path: String,
    #[serde(default)]
    pub topo_assets: Vec<String>,
    #[serde(default)]
    pub lulc_assets: Vec<String>,
    #[serde(default)]
    pub mannings_assets: Vec<String>,
    #[serde(default)]
    pub other_assets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_props_to_remove: Vec<String>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub item_props: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simplify: Option<f64>,
    /// Zip archive holding the model; `geom_hdf` is then the member name inside it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_zip: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct PlanItemParams {
    pub plan_hdf: String,
    pub plan_item_s3_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default)]
    pub asset_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub item_props: Properties,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_props_to_remove: Vec<String>,
    /// Model item to take the footprint from when the plan has no 2D areas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geom_item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simplify: Option<f64>,
    /// Zip archive holding the model; `plan_hdf` is then the member name inside it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_zip: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct DepthGridItemParams {
    pub plan_dg: String,
    pub new_dg_item_s3_path: String,
    pub plan_item_s3_path: String,
    pub dg_id: String,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub item_props: Properties,
    #[serde(default)]
    pub assets: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct NewCatalogParams {
    pub catalog_s3_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct UpdateCatalogParams {
    pub catalog_s3_path: String,
    pub item: String,
}

impl Params for GeomItemParams {}
impl Params for PlanItemParams {}
impl Params for DepthGridItemParams {}
impl Params for NewCatalogParams {}
impl Params for UpdateCatalogParams {}
