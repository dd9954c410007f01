//! Resource lookup
//!
//! Resolves a [`ResourceLocator`] to managed object references, datacenter
//! first. Each stage fails on its own with the object type that was missing.

use std::net::IpAddr;

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::resource::{ResourceKind, ResourceLocator};
use crate::vsphere::{ManagedObjectReference, Session, VimResult};

const DATACENTER: &str = "Datacenter";

/// References resolved for one scrape
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub datacenter: ManagedObjectReference,
    pub resource: ManagedObjectReference,
}

pub async fn locate(
    session: &Session,
    kind: ResourceKind,
    locator: &ResourceLocator,
) -> AppResult<Located> {
    let datacenter = expect_type(
        session.find_by_inventory_path(&locator.datacenter).await,
        DATACENTER,
        &locator.datacenter,
    )?;

    let found = match kind {
        ResourceKind::Datastore => {
            session
                .find_by_inventory_path(&format!(
                    "{}/datastore/{}",
                    locator.datacenter, locator.name
                ))
                .await
        }
        ResourceKind::VirtualMachine => {
            session
                .find_by_inventory_path(&format!("{}/vm/{}", locator.datacenter, locator.name))
                .await
        }
        ResourceKind::Esx => find_host(session, &datacenter, locator).await,
    };
    let resource = expect_type(found, kind.managed_type(), &locator.name)?;

    debug!(datacenter = %datacenter, resource = %resource, "Located resource");
    Ok(Located {
        datacenter,
        resource,
    })
}

/// Host lookup: inventory path when the name has a `/`, else DNS name, else IP
async fn find_host(
    session: &Session,
    datacenter: &ManagedObjectReference,
    locator: &ResourceLocator,
) -> VimResult<Option<ManagedObjectReference>> {
    if locator.name.contains('/') {
        let path = format!("{}/host/{}", locator.datacenter, locator.name);
        return session.find_by_inventory_path(&path).await;
    }

    if let Some(host) = session
        .find_host_by_dns_name(datacenter, &locator.name)
        .await?
    {
        return Ok(Some(host));
    }

    if locator.name.parse::<IpAddr>().is_ok() {
        return session.find_host_by_ip(datacenter, &locator.name).await;
    }

    Ok(None)
}

fn expect_type(
    found: VimResult<Option<ManagedObjectReference>>,
    object: &'static str,
    name: &str,
) -> AppResult<ManagedObjectReference> {
    let not_found = |source| AppError::NotFound {
        object,
        name: name.to_string(),
        source,
    };

    match found {
        Ok(Some(moref)) if moref.kind == object => Ok(moref),
        Ok(Some(moref)) => {
            debug!(expected = object, found = %moref, "Lookup returned a different object type");
            Err(not_found(None))
        }
        Ok(None) => Err(not_found(None)),
        Err(e) => Err(not_found(Some(e))),
    }
}
