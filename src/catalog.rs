//! Creating a catalog and merging items into it.
use crate::asset_info::JSON;
use crate::location::{self, Location};
use crate::s3::S3ObjOps;
use crate::settings::Settings;
use anyhow::Result;
use serde_json::Value;
use stac::{Catalog, Item, Link};
use tracing::{info, warn};

pub const DEFAULT_CATALOG_ID: &str = "dev-catalog";
pub const DEFAULT_CATALOG_DESCRIPTION: &str =
    "Sandbox catalog for local development with stac-browser";

pub fn new_catalog(id: Option<&str>, title: Option<&str>, description: Option<&str>) -> Catalog {
    let mut catalog = Catalog::new(
        id.unwrap_or(DEFAULT_CATALOG_ID),
        description.unwrap_or(DEFAULT_CATALOG_DESCRIPTION),
    );
    catalog.title = title.map(str::to_string);
    catalog
}

fn json_link(href: &str, rel: &str) -> Link {
    let mut link = Link::new(href, rel);
    link.r#type = Some(JSON.to_string());
    link
}

fn set_link(links: &mut Vec<Link>, href: &str, rel: &str) {
    links.retain(|link| link.rel != rel);
    links.push(json_link(href, rel));
}

/// Points the catalog's own `root` and `self` links at `catalog_href`.
pub fn set_catalog_href(catalog: &mut Catalog, catalog_href: &str) {
    set_link(&mut catalog.links, catalog_href, "root");
    set_link(&mut catalog.links, catalog_href, "self");
}

/// Adds `item` to `catalog` unless an item link with the same href is already listed.
///
/// Items are identified by href, so a geometry and a plan sharing an id both get a link.
///
/// The item's `root` and `parent` links are pointed at the catalog and its `self` link at
/// `item_href` either way. Returns whether a new link was added.
pub fn add_item(catalog: &mut Catalog, catalog_href: &str, item: &mut Item, item_href: &str) -> bool {
    set_link(&mut item.links, catalog_href, "root");
    set_link(&mut item.links, catalog_href, "parent");
    set_link(&mut item.links, item_href, "self");

    let duplicate = catalog
        .links
        .iter()
        .any(|link| link.rel == "item" && link.href == item_href);
    if duplicate {
        warn!(item = %item.id, "item already in catalog {}, not adding again", catalog.id);
        return false;
    }

    let mut link = json_link(item_href, "item");
    link.title = Some(item.id.clone());
    catalog.links.push(link);
    info!(item = %item.id, catalog = %catalog.id, "added item to catalog");
    true
}

pub fn item_ids(catalog: &Catalog) -> Vec<String> {
    catalog
        .links
        .iter()
        .filter(|link| link.rel == "item")
        .filter_map(|link| link.title.clone())
        .collect()
}

/// Creates a catalog at `catalog_location`, optionally with a first item.
pub async fn create_catalog(
    provider: &impl S3ObjOps,
    settings: &Settings,
    catalog_location: &Location,
    mut catalog: Catalog,
    item_location: Option<&Location>,
) -> Result<Catalog> {
    catalog_location.verify_writable(settings)?;
    let catalog_href = catalog_location.href(settings)?;
    set_catalog_href(&mut catalog, &catalog_href);

    if let Some(item_location) = item_location {
        merge_item(provider, settings, &mut catalog, &catalog_href, item_location).await?;
    }
    location::write_json(provider, catalog_location, &catalog).await?;
    Ok(catalog)
}

/// Reads the catalog (creating it if missing), adds the item, then writes both back.
pub async fn update_catalog(
    provider: &impl S3ObjOps,
    settings: &Settings,
    catalog_location: &Location,
    item_location: &Location,
) -> Result<Catalog> {
    catalog_location.verify_writable(settings)?;

    if !location::exists(provider, catalog_location).await? {
        info!(%catalog_location, "catalog not found, creating it");
        let catalog = new_catalog(None, None, None);
        return create_catalog(provider, settings, catalog_location, catalog, Some(item_location))
            .await;
    }

    let catalog_href = catalog_location.href(settings)?;
    let mut catalog: Catalog = location::read_json(provider, catalog_location).await?;
    set_catalog_href(&mut catalog, &catalog_href);

    merge_item(provider, settings, &mut catalog, &catalog_href, item_location).await?;
    location::write_json(provider, catalog_location, &catalog).await?;
    Ok(catalog)
}

async fn merge_item(
    provider: &impl S3ObjOps,
    settings: &Settings,
    catalog: &mut Catalog,
    catalog_href: &str,
    item_location: &Location,
) -> Result<()> {
    let mut item: Item = location::read_json(provider, item_location).await?;
    let item_href = item_location.href(settings)?;

    add_item(catalog, catalog_href, &mut item, &item_href);

    match item_location {
        Location::Http(_) => warn!(%item_location, "item is read-only over http; links not updated"),
        _ => location::write_json(provider, item_location, &item).await?,
    }
    Ok(())
}

/// Catalog document as JSON, for printing.
pub fn to_value(catalog: &Catalog) -> Result<Value> {
    Ok(serde_json::to_value(catalog)?)
}
