//! One function per CLI command: resolve sources, build the document, write it out.
use crate::asset_info::{depth_grid_asset_info, geom_asset_info, ras_asset_info, AssetInfo, GeomAssetKind};
use crate::catalog;
use crate::depth_grid::DepthGrid;
use crate::footprint::Footprint;
use crate::location::{self, Location};
use crate::params::{
    DepthGridItemParams, GeomItemParams, NewCatalogParams, PlanItemParams, UpdateCatalogParams,
};
use crate::ras_hdf::{check_geom_path, check_plan_path, hdf_stem, model_name, RasGeomHdf, RasPlanHdf};
use crate::s3::S3ObjOps;
use crate::settings::Settings;
use crate::stac_items::{self, result_links, ItemOptions, ResultLink};
use anyhow::Result;
use futures_util::future::join_all;
use serde_json::{Map, Value};
use stac::Item;
use tracing::{error, info};

const DEPTH_GRID_ASSET_KEY: &str = "depth-grid";

struct PendingAsset {
    key: String,
    location: Location,
    info: AssetInfo,
}

impl PendingAsset {
    fn new(path: &str, info: AssetInfo) -> Result<Self> {
        Ok(Self {
            key: info.title.clone(),
            location: Location::parse(path)?,
            info,
        })
    }
}

async fn asset_fields(
    provider: &impl S3ObjOps,
    settings: &Settings,
    location: &Location,
) -> Map<String, Value> {
    let fields = location::metadata(provider, location, settings)
        .await
        .and_then(|meta| meta.to_fields());
    match fields {
        Ok(fields) => fields,
        Err(e) => {
            error!("unable to fetch metadata for {location}: {e:#}");
            Map::new()
        }
    }
}

/// Adds assets to the item, fetching their object metadata concurrently.
async fn attach_assets(
    provider: &impl S3ObjOps,
    settings: &Settings,
    item: &mut Item,
    assets: Vec<PendingAsset>,
) -> Result<()> {
    let fields = join_all(
        assets
            .iter()
            .map(|asset| asset_fields(provider, settings, &asset.location)),
    )
    .await;

    for (asset, metadata) in assets.into_iter().zip(fields) {
        info!("Adding asset {} to item", asset.location);
        let href = asset.location.href(settings)?;
        item.assets.insert(
            asset.key,
            stac_items::new_asset(&href, &asset.info, metadata),
        );
    }
    Ok(())
}

/// A local copy of the HDF, taken from inside `source_zip` when one is given.
async fn fetch_hdf(
    provider: &impl S3ObjOps,
    hdf: &str,
    source_zip: Option<&str>,
) -> Result<location::LocalFile> {
    match source_zip {
        Some(zip) => location::fetch_from_zip(provider, &Location::parse(zip)?, hdf).await,
        None => location::fetch(provider, &Location::parse(hdf)?).await,
    }
}

/// Sets the self link, writes the item and reports where it went.
async fn write_item(
    provider: &impl S3ObjOps,
    settings: &Settings,
    item: &mut Item,
    destination: &Location,
) -> Result<Vec<ResultLink>> {
    let href = destination.href(settings)?;
    stac_items::set_self_href(item, &href);
    info!("Writing item to {destination}");
    location::write_json(provider, destination, item).await?;
    Ok(result_links(&href, &destination.to_string()))
}

pub async fn geom_item(
    provider: &impl S3ObjOps,
    settings: &Settings,
    params: GeomItemParams,
) -> Result<Vec<ResultLink>> {
    let destination = Location::parse(&params.new_item_s3_path)?;
    destination.verify_writable(settings)?;
    check_geom_path(&params.geom_hdf)?;
    info!("Creating geom item: {destination}");

    let item_id = params
        .item_id
        .clone()
        .unwrap_or_else(|| model_name(&params.geom_hdf));
    let options = ItemOptions {
        simplify: params.simplify,
        props_to_remove: params.item_props_to_remove.clone(),
        props: params.item_props.clone(),
    };

    let source = fetch_hdf(provider, &params.geom_hdf, params.source_zip.as_deref()).await?;
    let path = source.path().to_path_buf();
    let mut item = tokio::task::spawn_blocking(move || {
        let hdf = RasGeomHdf::open(&path)?;
        stac_items::geom_item(&hdf, &item_id, &options)
    })
    .await??;
    drop(source);

    let mut other_assets = params.other_assets.clone();
    other_assets.push(params.source_zip.clone().unwrap_or_else(|| params.geom_hdf.clone()));
    let kinds = [
        (GeomAssetKind::Topo, &params.topo_assets),
        (GeomAssetKind::Lulc, &params.lulc_assets),
        (GeomAssetKind::Mannings, &params.mannings_assets),
        (GeomAssetKind::Other, &other_assets),
    ];
    let mut assets = vec![];
    for (kind, paths) in kinds {
        for path in paths {
            assets.push(PendingAsset::new(path, geom_asset_info(path, kind))?);
        }
    }
    attach_assets(provider, settings, &mut item, assets).await?;

    let links = write_item(provider, settings, &mut item, &destination).await?;
    info!("Program completed successfully");
    Ok(links)
}

async fn geom_item_footprint(provider: &impl S3ObjOps, geom_item: &str) -> Result<Option<Footprint>> {
    let item: Item = location::read_json(provider, &Location::parse(geom_item)?).await?;
    stac_items::item_footprint(&item)
}

pub async fn plan_item(
    provider: &impl S3ObjOps,
    settings: &Settings,
    params: PlanItemParams,
) -> Result<Vec<ResultLink>> {
    let destination = Location::parse(&params.plan_item_s3_path)?;
    destination.verify_writable(settings)?;
    check_plan_path(&params.plan_hdf)?;
    info!("Creating plan item: {destination}");

    let item_id = params
        .item_id
        .clone()
        .unwrap_or_else(|| hdf_stem(&params.plan_hdf).to_string());
    let options = ItemOptions {
        simplify: params.simplify,
        props_to_remove: params.item_props_to_remove.clone(),
        props: params.item_props.clone(),
    };
    let fallback = match &params.geom_item {
        Some(geom_item) => geom_item_footprint(provider, geom_item).await?,
        None => None,
    };

    let source = fetch_hdf(provider, &params.plan_hdf, params.source_zip.as_deref()).await?;
    let path = source.path().to_path_buf();
    let mut item = tokio::task::spawn_blocking(move || {
        let hdf = RasPlanHdf::open(&path)?;
        stac_items::plan_item(&hdf, &item_id, &options, fallback.as_ref())
    })
    .await??;
    drop(source);

    let mut asset_list = params.asset_list.clone();
    asset_list.push(params.source_zip.clone().unwrap_or_else(|| params.plan_hdf.clone()));
    let assets = asset_list
        .iter()
        .map(|path| PendingAsset::new(path, ras_asset_info(path)))
        .collect::<Result<Vec<_>>>()?;
    attach_assets(provider, settings, &mut item, assets).await?;

    let links = write_item(provider, settings, &mut item, &destination).await?;
    info!("Program completed successfully");
    Ok(links)
}

pub async fn dg_item(
    provider: &impl S3ObjOps,
    settings: &Settings,
    params: DepthGridItemParams,
) -> Result<Vec<ResultLink>> {
    let destination = Location::parse(&params.new_dg_item_s3_path)?;
    destination.verify_writable(settings)?;
    info!("Creating depth grid item: {destination}");

    info!("pulling plan item");
    let plan_location = Location::parse(&params.plan_item_s3_path)?;
    let plan_item: Item = location::read_json(provider, &plan_location).await?;
    let plan_href = plan_location.href(settings)?;

    info!("fetching dg metadata");
    let raster = Location::parse(&params.plan_dg)?;
    let source = location::fetch(provider, &raster).await?;
    let path = source.path().to_path_buf();
    let grid = tokio::task::spawn_blocking(move || DepthGrid::open(&path)).await??;
    drop(source);

    let mut item = stac_items::dg_item(&grid, &params.dg_id, &plan_item, &plan_href, &params.item_props)?;

    let mut assets = vec![PendingAsset {
        key: DEPTH_GRID_ASSET_KEY.to_string(),
        info: depth_grid_asset_info(&params.plan_dg),
        location: raster,
    }];
    for path in &params.assets {
        assets.push(PendingAsset::new(path, ras_asset_info(path))?);
    }
    attach_assets(provider, settings, &mut item, assets).await?;

    let links = write_item(provider, settings, &mut item, &destination).await?;
    info!("Program completed successfully");
    Ok(links)
}

pub async fn new_catalog(
    provider: &impl S3ObjOps,
    settings: &Settings,
    params: NewCatalogParams,
) -> Result<Vec<ResultLink>> {
    let destination = Location::parse(&params.catalog_s3_path)?;
    let item = params.item.as_deref().map(Location::parse).transpose()?;
    let new = catalog::new_catalog(
        params.id.as_deref(),
        params.title.as_deref(),
        params.description.as_deref(),
    );

    catalog::create_catalog(provider, settings, &destination, new, item.as_ref()).await?;
    let href = destination.href(settings)?;
    Ok(result_links(&href, &destination.to_string()))
}

pub async fn update_catalog(
    provider: &impl S3ObjOps,
    settings: &Settings,
    params: UpdateCatalogParams,
) -> Result<Vec<ResultLink>> {
    let destination = Location::parse(&params.catalog_s3_path)?;
    let item = Location::parse(&params.item)?;

    let updated = catalog::update_catalog(provider, settings, &destination, &item).await?;
    info!(items = catalog::item_ids(&updated).len(), "catalog updated");
    let href = destination.href(settings)?;
    Ok(result_links(&href, &destination.to_string()))
}
