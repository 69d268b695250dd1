//! Builds command parameters from bucket-relative keys.
use crate::attrs::Properties;
use crate::params::{DepthGridItemParams, GeomItemParams, PlanItemParams};
use crate::ras_hdf::{check_geom_path, check_plan_path, hdf_stem};
use crate::s3::S3ObjOps;
use crate::s3_operations::list_model_files;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StacInputs {
    /// Bucket holding the model files.
    pub source_bucket: String,
    /// Bucket the items are written to.
    pub stac_bucket: String,
}

#[derive(Debug, Clone, Default)]
pub struct GeomAssetKeys {
    pub topo: Vec<String>,
    pub lulc: Vec<String>,
    pub mannings: Vec<String>,
    pub other: Vec<String>,
}

impl StacInputs {
    pub fn new(source_bucket: &str, stac_bucket: &str) -> Self {
        Self {
            source_bucket: source_bucket.to_string(),
            stac_bucket: stac_bucket.to_string(),
        }
    }

    fn source(&self, key: &str) -> String {
        format!("s3://{}/{}", self.source_bucket, key.trim_start_matches('/'))
    }

    fn stac(&self, key: &str) -> String {
        format!("s3://{}/{}", self.stac_bucket, key.trim_start_matches('/'))
    }

    fn sources(&self, keys: &[String]) -> Vec<String> {
        keys.iter().map(|k| self.source(k)).collect()
    }

    pub fn geometry_item(&self, geom_hdf: &str, new_item_key: &str, assets: &GeomAssetKeys) -> GeomItemParams {
        GeomItemParams {
            geom_hdf: self.source(geom_hdf),
            new_item_s3_path: self.stac(new_item_key),
            topo_assets: self.sources(&assets.topo),
            lulc_assets: self.sources(&assets.lulc),
            mannings_assets: self.sources(&assets.mannings),
            other_assets: self.sources(&assets.other),
            ..Default::default()
        }
    }

    pub fn plan_item(
        &self,
        plan_hdf: &str,
        new_plan_item_key: &str,
        geom_item_key: &str,
        sim_id: &str,
        item_props: Properties,
        ras_assets: &[String],
    ) -> PlanItemParams {
        PlanItemParams {
            plan_hdf: self.source(plan_hdf),
            plan_item_s3_path: self.stac(new_plan_item_key),
            item_id: Some(sim_id.to_string()),
            asset_list: self.sources(ras_assets),
            item_props,
            geom_item: Some(self.stac(geom_item_key)),
            ..Default::default()
        }
    }

    pub fn dg_item(
        &self,
        plan_dg: &str,
        new_dg_item_key: &str,
        plan_item_key: &str,
        dg_id: &str,
        item_props: Properties,
    ) -> DepthGridItemParams {
        DepthGridItemParams {
            plan_dg: self.source(plan_dg),
            new_dg_item_s3_path: self.stac(new_dg_item_key),
            plan_item_s3_path: self.stac(plan_item_key),
            dg_id: dg_id.to_string(),
            item_props,
            assets: vec![],
        }
    }
}

/// Parameters for every geometry and plan HDF found directly under a model prefix.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ModelInputs {
    pub geom_items: Vec<GeomItemParams>,
    pub plan_items: Vec<PlanItemParams>,
}

impl StacInputs {
    /// Lists the files under `model_prefix` and pairs each HDF with the rest of the model.
    ///
    /// Items are keyed `{stac_prefix}/{file stem}.json`, e.g. `stac/Muncie.g05.json`. Plans
    /// take their fallback footprint from the first geometry item.
    pub async fn discover(
        &self,
        provider: &impl S3ObjOps,
        model_prefix: &str,
        stac_prefix: &str,
    ) -> Result<ModelInputs> {
        let files = list_model_files(provider, &self.source_bucket, model_prefix).await?;
        info!(count = files.len(), "model files found under {model_prefix}");

        let (geoms, rest): (Vec<_>, Vec<_>) =
            files.into_iter().partition(|f| check_geom_path(f).is_ok());
        let (plans, others): (Vec<_>, Vec<_>) =
            rest.into_iter().partition(|f| check_plan_path(f).is_ok());

        let stac_prefix = stac_prefix.trim_end_matches('/');
        let item_path = |file: &str| self.stac(&format!("{stac_prefix}/{}.json", hdf_stem(file)));

        let geom_items: Vec<GeomItemParams> = geoms
            .iter()
            .map(|geom| GeomItemParams {
                geom_hdf: geom.clone(),
                new_item_s3_path: item_path(geom.as_str()),
                other_assets: others.clone(),
                ..Default::default()
            })
            .collect();
        let geom_item = geom_items.first().map(|g| g.new_item_s3_path.clone());

        let plan_items = plans
            .iter()
            .map(|plan| PlanItemParams {
                plan_hdf: plan.clone(),
                plan_item_s3_path: item_path(plan.as_str()),
                item_id: Some(hdf_stem(plan).to_string()),
                asset_list: others.clone(),
                geom_item: geom_item.clone(),
                ..Default::default()
            })
            .collect();

        Ok(ModelInputs {
            geom_items,
            plan_items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use crate::s3::memory::MemoryStore;
    use serde_json::json;

    fn inputs() -> StacInputs {
        StacInputs::new("models", "catalog")
    }

    #[test]
    fn test_geometry_item() {
        let assets = GeomAssetKeys {
            topo: vec!["muncie/Terrain/Terrain.hdf".to_string()],
            other: vec!["/muncie/Muncie.prj".to_string()],
            ..Default::default()
        };
        let params = inputs().geometry_item("muncie/Muncie.g05.hdf", "stac/Muncie.json", &assets);

        assert_eq!(params.geom_hdf, "s3://models/muncie/Muncie.g05.hdf");
        assert_eq!(params.new_item_s3_path, "s3://catalog/stac/Muncie.json");
        assert_eq!(params.topo_assets, vec!["s3://models/muncie/Terrain/Terrain.hdf"]);
        assert_eq!(params.other_assets, vec!["s3://models/muncie/Muncie.prj"]);
        assert!(params.lulc_assets.is_empty());
    }

    #[test]
    fn test_plan_and_dg_items() {
        let mut props = Properties::new();
        props.insert("event".to_string(), json!("100yr"));

        let plan = inputs().plan_item(
            "muncie/Muncie.p04.hdf",
            "stac/Muncie-p04.json",
            "stac/Muncie.json",
            "Muncie-p04",
            props.clone(),
            &["muncie/Muncie.u01".to_string()],
        );
        assert_eq!(plan.item_id.as_deref(), Some("Muncie-p04"));
        assert_eq!(plan.geom_item.as_deref(), Some("s3://catalog/stac/Muncie.json"));
        assert_eq!(plan.asset_list, vec!["s3://models/muncie/Muncie.u01"]);

        let dg = inputs().dg_item(
            "muncie/depth_max.tif",
            "stac/Muncie-p04-depth.json",
            "stac/Muncie-p04.json",
            "Muncie-p04-depth",
            props,
        );
        assert_eq!(dg.plan_dg, "s3://models/muncie/depth_max.tif");
        assert_eq!(dg.plan_item_s3_path, "s3://catalog/stac/Muncie-p04.json");
    }

    #[tokio::test]
    async fn test_discover() {
        let store = MemoryStore::default();
        for key in [
            "muncie/Muncie.g05.hdf",
            "muncie/Muncie.p04.hdf",
            "muncie/Muncie.p05.hdf",
            "muncie/Muncie.prj",
            "muncie/Muncie.u01",
            "muncie/Terrain/Terrain.hdf",
        ] {
            store.insert("models", key, b"data");
        }

        let found = inputs().discover(&store, "muncie", "stac/").await.unwrap();
        assert_eq!(found.geom_items.len(), 1);
        assert_eq!(found.plan_items.len(), 2);

        let geom = &found.geom_items[0];
        assert_eq!(geom.geom_hdf, "s3://models/muncie/Muncie.g05.hdf");
        assert_eq!(geom.new_item_s3_path, "s3://catalog/stac/Muncie.g05.json");
        assert_eq!(
            geom.other_assets,
            vec!["s3://models/muncie/Muncie.prj", "s3://models/muncie/Muncie.u01"]
        );

        let plan = &found.plan_items[1];
        assert_eq!(plan.plan_item_s3_path, "s3://catalog/stac/Muncie.p05.json");
        assert_eq!(plan.item_id.as_deref(), Some("Muncie.p05"));
        assert_eq!(geom.item_id, None);
        assert_eq!(plan.geom_item.as_deref(), Some("s3://catalog/stac/Muncie.g05.json"));
    }

    #[test]
    fn test_generated_params_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geom.json");

        let params = inputs().geometry_item("m/Muncie.g05.hdf", "stac/Muncie.json", &GeomAssetKeys::default());
        params.write(&path).unwrap();
        assert_eq!(GeomItemParams::read(&path).unwrap(), params);
    }
}
