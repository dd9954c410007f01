//! Scrape integration tests
//!
//! End-to-end tests through the axum router against a fake vim25 endpoint:
//! - Version and index endpoints
//! - Datastore, virtual machine and host scrapes
//! - Error mapping (lookup miss, property failure, unavailable catalog)

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use tower::ServiceExt;
use vsphere_exporter::resource::ResourceKind;
use wiremock::{MockServer, ResponseTemplate};

async fn get(app: &Router, uri: &str) -> (StatusCode, String, Option<String>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap(), content_type)
}

/// Mount handshake, probe and datacenter lookup shared by most scrapes
async fn mount_base(server: &MockServer) {
    mount_handshake(server).await;
    mount_valid_session(server).await;
    mount_inventory(server, "dc1", Some(("Datacenter", "datacenter-2"))).await;
}

#[tokio::test]
async fn test_version_endpoint() {
    let server = MockServer::start().await;
    let (app, _) = app(&server, ResourceKind::Datastore).await;

    let (status, body, _) = get(&app, "/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        format!(
            r#"{{"VersionInt":1,"VersionStr":"{}"}}"#,
            env!("CARGO_PKG_VERSION")
        )
    );
}

#[tokio::test]
async fn test_root_lists_active_route() {
    let server = MockServer::start().await;
    let (app, _) = app(&server, ResourceKind::VirtualMachine).await;

    let (status, body, _) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("/version"));
    assert!(body.contains("/datacenter/{datacenter}/vm/{vm}/metrics"));
}

/// Only the route of the configured kind is served
#[tokio::test]
async fn test_other_kind_route_not_served() {
    let server = MockServer::start().await;
    let (app, _) = app(&server, ResourceKind::Datastore).await;

    let (status, _, _) = get(&app, "/datacenter/dc1/vm/web01/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Datastore scrape with every field present
#[tokio::test]
async fn test_datastore_scrape() {
    let server = MockServer::start().await;
    mount_base(&server).await;
    mount_inventory(&server, "dc1/datastore/ds1", Some(("Datastore", "datastore-11"))).await;
    soap_call("<pathSet>summary</pathSet>")
        .respond_with(ok(datastore_summary(&[
            ("capacity", 1000),
            ("freeSpace", 400),
            ("uncommitted", 50),
        ])))
        .mount(&server)
        .await;

    let (app, _) = app(&server, ResourceKind::Datastore).await;
    let (status, body, content_type) = get(&app, "/datacenter/dc1/datastore/ds1/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        content_type.as_deref(),
        Some("text/plain; version=0.0.4; charset=utf-8")
    );
    let labels = r#"{datacenter="dc1",datastore="ds1"}"#;
    assert!(body.contains(&format!("vsphere_datastore_1024_freespace_size{labels} 400")));
    assert!(body.contains(&format!("vsphere_datastore_1025_uncommitted_size{labels} 50")));
    assert!(body.contains(&format!("vsphere_datastore_1026_usedspace_size{labels} 600")));
    assert!(body.contains(&format!("vsphere_datastore_1027_capacity_size{labels} 1000")));
    assert!(body.contains(&format!("vsphere_datastore_1028_provisioned_size{labels} 650")));
    assert!(body.contains("# TYPE vsphere_datastore_1027_capacity_size gauge"));
    assert!(body.contains("vsphere_exporter_metrics_observed 5"));
    assert!(body.contains("vsphere_exporter_metrics_skipped 0"));
    assert!(body.contains("vsphere_exporter_info{version="));
}

/// A missing summary field skips only the counters that need it
#[tokio::test]
async fn test_datastore_partial_success() {
    let server = MockServer::start().await;
    mount_base(&server).await;
    mount_inventory(&server, "dc1/datastore/ds1", Some(("Datastore", "datastore-11"))).await;
    soap_call("<pathSet>summary</pathSet>")
        .respond_with(ok(datastore_summary(&[("capacity", 1000), ("freeSpace", 400)])))
        .mount(&server)
        .await;

    let (app, _) = app(&server, ResourceKind::Datastore).await;
    let (status, body, _) = get(&app, "/datacenter/dc1/datastore/ds1/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("vsphere_datastore_1024_freespace_size"));
    assert!(body.contains("vsphere_datastore_1026_usedspace_size"));
    assert!(body.contains("vsphere_datastore_1027_capacity_size"));
    assert!(!body.contains("vsphere_datastore_1025_uncommitted_size"));
    assert!(!body.contains("vsphere_datastore_1028_provisioned_size"));
    assert!(body.contains("vsphere_exporter_metrics_skipped 2"));
}

/// An unknown datacenter is 410 and leaves earlier values untouched
#[tokio::test]
async fn test_unknown_datacenter() {
    let server = MockServer::start().await;
    mount_base(&server).await;
    mount_inventory(&server, "dc1/vm/web01", Some(("VirtualMachine", "vm-42"))).await;
    mount_inventory(&server, "nowhere", None).await;
    soap_call("<pathSet>summary</pathSet>")
        .respond_with(ok(vm_summary(100, 512)))
        .expect(1)
        .mount(&server)
        .await;

    let (app, state) = app(&server, ResourceKind::VirtualMachine).await;
    let (status, _, _) = get(&app, "/datacenter/dc1/vm/web01/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let before = state.collector.registry().render();
    assert!(before.contains(r#"{datacenter="dc1",vm="web01"} 100"#));

    let (status, body, _) = get(&app, "/datacenter/nowhere/vm/web01/metrics").await;

    assert_eq!(status, StatusCode::GONE);
    assert!(body.contains("Datacenter"));
    assert_eq!(state.collector.registry().render(), before);
}

/// An unknown resource inside a known datacenter is 410
#[tokio::test]
async fn test_unknown_virtual_machine() {
    let server = MockServer::start().await;
    mount_base(&server).await;
    mount_inventory(&server, "dc1/vm/ghost", None).await;

    let (app, _) = app(&server, ResourceKind::VirtualMachine).await;
    let (status, body, _) = get(&app, "/datacenter/dc1/vm/ghost/metrics").await;

    assert_eq!(status, StatusCode::GONE);
    assert!(body.contains("VirtualMachine"));
}

/// Repeated scrapes of the same VM keep one series with the latest value
#[tokio::test]
async fn test_vm_scrape_overwrites() {
    let server = MockServer::start().await;
    mount_base(&server).await;
    mount_inventory(&server, "dc1/vm/web01", Some(("VirtualMachine", "vm-42"))).await;
    soap_call("<pathSet>summary</pathSet>")
        .respond_with(ok(vm_summary(100, 512)))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    soap_call("<pathSet>summary</pathSet>")
        .respond_with(ok(vm_summary(250, 1024)))
        .mount(&server)
        .await;

    let (app, state) = app(&server, ResourceKind::VirtualMachine).await;

    let (status, first, _) = get(&app, "/datacenter/dc1/vm/web01/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(first.contains(r#"vsphere_vm_1010_overall_cpu_usage{datacenter="dc1",vm="web01"} 100"#));

    let (status, second, _) = get(&app, "/datacenter/dc1/vm/web01/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(second.contains(r#"vsphere_vm_1010_overall_cpu_usage{datacenter="dc1",vm="web01"} 250"#));
    assert!(second.contains(r#"vsphere_vm_1007_guest_memory_usage{datacenter="dc1",vm="web01"} 1024"#));
    assert_eq!(second.matches("vsphere_vm_1010_overall_cpu_usage{").count(), 1);

    let handle = state
        .collector
        .registry()
        .lookup(ResourceKind::VirtualMachine, 1010)
        .unwrap();
    assert_eq!(handle.series_count(), 1);
}

/// Series of different resources accumulate in the registry
#[tokio::test]
async fn test_vm_scrapes_accumulate() {
    let server = MockServer::start().await;
    mount_base(&server).await;
    mount_inventory(&server, "dc1/vm/web01", Some(("VirtualMachine", "vm-42"))).await;
    mount_inventory(&server, "dc1/vm/web02", Some(("VirtualMachine", "vm-43"))).await;
    soap_call("<pathSet>summary</pathSet>")
        .respond_with(ok(vm_summary(100, 512)))
        .mount(&server)
        .await;

    let (app, _) = app(&server, ResourceKind::VirtualMachine).await;
    get(&app, "/datacenter/dc1/vm/web01/metrics").await;
    let (_, body, _) = get(&app, "/datacenter/dc1/vm/web02/metrics").await;

    assert!(body.contains(r#"vsphere_vm_1010_overall_cpu_usage{datacenter="dc1",vm="web01"} 100"#));
    assert!(body.contains(r#"vsphere_vm_1010_overall_cpu_usage{datacenter="dc1",vm="web02"} 100"#));
}

/// A failing property retrieval is 400
#[tokio::test]
async fn test_property_fetch_failure() {
    let server = MockServer::start().await;
    mount_base(&server).await;
    mount_inventory(&server, "dc1/vm/web01", Some(("VirtualMachine", "vm-42"))).await;
    soap_call("<pathSet>summary</pathSet>")
        .respond_with(soap_fault(
            "ManagedObjectNotFound",
            "The object 'vim.VirtualMachine:vm-42' has already been deleted or has not been completely created",
        ))
        .mount(&server)
        .await;

    let (app, state) = app(&server, ResourceKind::VirtualMachine).await;
    let (status, _, _) = get(&app, "/datacenter/dc1/vm/web01/metrics").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(state.collector.registry().render().is_empty());
}

/// An unreachable endpoint is 410
#[tokio::test]
async fn test_connection_failure() {
    let server = MockServer::start().await;
    soap_call("<RetrieveServiceContent")
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (app, _) = app(&server, ResourceKind::Datastore).await;
    let (status, _, _) = get(&app, "/datacenter/dc1/datastore/ds1/metrics").await;
    assert_eq!(status, StatusCode::GONE);
}

/// Host counters are discovered at startup and filled from performance samples
#[tokio::test]
async fn test_host_scrape() {
    let server = MockServer::start().await;
    mount_base(&server).await;
    soap_call("<pathSet>perfCounter</pathSet>")
        .respond_with(ok(perf_counters(&[
            (2, "cpu", "usage", "average"),
            (24, "mem", "usage", "average"),
            (125, "disk", "numberReadAveraged", "average"),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    soap_call("<FindByDnsName")
        .respond_with(ok(found("FindByDnsName", Some(("HostSystem", "host-10")))))
        .mount(&server)
        .await;
    soap_call("<pathSet>summary</pathSet>")
        .respond_with(ok(host_summary()))
        .mount(&server)
        .await;
    soap_call("<QueryPerf")
        .respond_with(ok(query_perf(
            "host-10",
            &[
                (2, "", &[1500, 1620]),
                (2, "0", &[9999]),
                (24, "", &[-1]),
                (125, "vmhba0", &[7]),
            ],
        )))
        .mount(&server)
        .await;

    let (app, state) = app(&server, ResourceKind::Esx).await;
    assert_eq!(state.collector.registry().len(), 3);

    let (status, body, _) = get(&app, "/datacenter/dc1/host/esx01.lab.local/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let labels = r#"{datacenter="dc1",host="esx01.lab.local"}"#;
    assert!(body.contains(&format!("vsphere_esx_2_cpu_usage_average{labels} 1620")));
    assert!(body.contains(&format!(
        "vsphere_esx_125_disk_number_read_averaged_average{labels} 7"
    )));
    assert!(body.contains("# HELP vsphere_esx_2_cpu_usage_average cpu usage"));
    // -1 means no data
    assert!(!body.contains("vsphere_esx_24_mem_usage_average{"));
    assert!(body.contains("vsphere_exporter_metrics_skipped 1"));
}

/// A host name with a slash is looked up by inventory path below the datacenter
#[tokio::test]
async fn test_host_inventory_path_lookup() {
    let server = MockServer::start().await;
    mount_base(&server).await;
    soap_call("<pathSet>perfCounter</pathSet>")
        .respond_with(ok(perf_counters(&[(2, "cpu", "usage", "average")])))
        .mount(&server)
        .await;
    mount_inventory(&server, "dc1/host/cluster1/esx01", Some(("HostSystem", "host-10"))).await;
    soap_call("<FindByDnsName")
        .respond_with(ok(found("FindByDnsName", None)))
        .expect(0)
        .mount(&server)
        .await;
    soap_call("<pathSet>summary</pathSet>")
        .respond_with(ok(host_summary()))
        .mount(&server)
        .await;
    soap_call("<QueryPerf")
        .respond_with(ok(query_perf("host-10", &[(2, "", &[42])])))
        .mount(&server)
        .await;

    let (app, _) = app(&server, ResourceKind::Esx).await;
    let (status, body, _) = get(&app, "/datacenter/dc1/host/cluster1%2Fesx01/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"vsphere_esx_2_cpu_usage_average{datacenter="dc1",host="cluster1/esx01"} 42"#));
}

/// A failing performance query is 400 even when the summary succeeded
#[tokio::test]
async fn test_host_perf_failure() {
    let server = MockServer::start().await;
    mount_base(&server).await;
    soap_call("<pathSet>perfCounter</pathSet>")
        .respond_with(ok(perf_counters(&[(2, "cpu", "usage", "average")])))
        .mount(&server)
        .await;
    soap_call("<FindByDnsName")
        .respond_with(ok(found("FindByDnsName", Some(("HostSystem", "host-10")))))
        .mount(&server)
        .await;
    soap_call("<pathSet>summary</pathSet>")
        .respond_with(ok(host_summary()))
        .mount(&server)
        .await;
    soap_call("<QueryPerf")
        .respond_with(soap_fault(
            "InvalidArgument",
            "A specified parameter was not correct: querySpec.interval",
        ))
        .mount(&server)
        .await;

    let (app, _) = app(&server, ResourceKind::Esx).await;
    let (status, _, _) = get(&app, "/datacenter/dc1/host/esx01.lab.local/metrics").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Without a counter catalog the host route is 503 and never reaches upstream
#[tokio::test]
async fn test_catalog_unavailable() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    mount_valid_session(&server).await;
    soap_call("<pathSet>perfCounter</pathSet>")
        .respond_with(soap_fault(
            "NoPermission",
            "Permission to perform this operation was denied.",
        ))
        .mount(&server)
        .await;
    soap_call("<FindByInventoryPath")
        .respond_with(ok(found("FindByInventoryPath", None)))
        .expect(0)
        .mount(&server)
        .await;
    soap_call("<QueryPerf")
        .respond_with(ok(query_perf("host-10", &[])))
        .expect(0)
        .mount(&server)
        .await;

    let (app, state) = app(&server, ResourceKind::Esx).await;
    assert!(state.collector.catalog().is_err());
    assert!(state.collector.registry().is_empty());

    let (status, _, _) = get(&app, "/datacenter/dc1/host/esx01.lab.local/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _, _) = get(&app, "/version").await;
    assert_eq!(status, StatusCode::OK);
}
