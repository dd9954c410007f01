//! vSphere vim25 API 클라이언트 모듈
//!
//! vCenter Server(또는 ESX 호스트)의 `/sdk` 엔드포인트와 SOAP으로 통신합니다.
//!
//! # Example
//!
//! ```ignore
//! use vsphere_exporter::vsphere::VimClient;
//!
//! let client = VimClient::new(&connection)?;
//! let (content, cookie) = client.retrieve_service_content().await?;
//! let session = client
//!     .login(content, cookie, "administrator@vsphere.local", "secret")
//!     .await?;
//! let dc = session.find_by_inventory_path("dc1").await?;
//! ```

mod client;
pub mod soap;
mod types;

pub use client::{Session, VimClient, VimResult, SESSION_COOKIE};
pub use soap::XmlNode;
pub use types::{
    AboutInfo, ManagedObjectReference, PerfCounterInfo, PerfSeries, PropertySet, ServiceContent,
};
