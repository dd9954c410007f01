//! Shared fixtures for integration tests
//!
//! A fake vim25 endpoint on top of wiremock. Every SOAP call is a POST to
//! `/sdk`, so mocks are told apart by a fragment of the request body.

#![allow(dead_code)]

use url::Url;
use vsphere_exporter::config::{Config, ConnectionConfig};
use vsphere_exporter::resource::ResourceKind;
use vsphere_exporter::server::{router, AppState};
use vsphere_exporter::session::SessionManager;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

pub const SESSION_COOKIE_HEADER: &str = r#"vmware_soap_session="abc"; Path=/; HttpOnly"#;

/// Wrap a body element in a SOAP envelope
pub fn envelope(body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            "<soapenv:Body>{}</soapenv:Body></soapenv:Envelope>"
        ),
        body
    )
}

pub fn service_content() -> String {
    envelope(
        r#"<RetrieveServiceContentResponse xmlns="urn:vim25"><returnval>
<rootFolder type="Folder">group-d1</rootFolder>
<propertyCollector type="PropertyCollector">propertyCollector</propertyCollector>
<about><name>VMware vCenter Server</name><fullName>VMware vCenter Server 7.0.3 build-20150588</fullName><apiVersion>7.0.3.0</apiVersion></about>
<searchIndex type="SearchIndex">SearchIndex</searchIndex>
<sessionManager type="SessionManager">SessionManager</sessionManager>
<perfManager type="PerformanceManager">PerfMgr</perfManager>
</returnval></RetrieveServiceContentResponse>"#,
    )
}

pub fn login() -> String {
    envelope(
        r#"<LoginResponse xmlns="urn:vim25"><returnval><key>52a3</key><userName>VSPHERE.LOCAL\admin</userName></returnval></LoginResponse>"#,
    )
}

pub fn logout() -> String {
    envelope(r#"<LogoutResponse xmlns="urn:vim25"></LogoutResponse>"#)
}

/// `RetrievePropertiesEx` answer carrying one property value
pub fn property(obj_type: &str, obj_value: &str, name: &str, val: &str) -> String {
    envelope(&format!(
        r#"<RetrievePropertiesExResponse xmlns="urn:vim25"><returnval><objects><obj type="{obj_type}">{obj_value}</obj><propSet><name>{name}</name>{val}</propSet></objects></returnval></RetrievePropertiesExResponse>"#
    ))
}

pub fn current_session() -> String {
    property(
        "SessionManager",
        "SessionManager",
        "currentSession",
        r#"<val xsi:type="UserSession"><key>52a3</key><userName>VSPHERE.LOCAL\admin</userName></val>"#,
    )
}

/// `FindBy*` answer; `None` is a lookup miss
pub fn found(operation: &str, moref: Option<(&str, &str)>) -> String {
    let returnval = moref
        .map(|(kind, value)| format!(r#"<returnval type="{kind}">{value}</returnval>"#))
        .unwrap_or_default();
    envelope(&format!(
        r#"<{operation}Response xmlns="urn:vim25">{returnval}</{operation}Response>"#
    ))
}

pub fn datastore_summary(fields: &[(&str, i64)]) -> String {
    let body: String = fields
        .iter()
        .map(|(name, value)| format!("<{name}>{value}</{name}>"))
        .collect();
    property(
        "Datastore",
        "datastore-11",
        "summary",
        &format!(
            r#"<val xsi:type="DatastoreSummary"><datastore type="Datastore">datastore-11</datastore><name>ds1</name>{body}<accessible>true</accessible><type>VMFS</type></val>"#
        ),
    )
}

pub fn vm_summary(overall_cpu_usage: i64, guest_memory_usage: i64) -> String {
    property(
        "VirtualMachine",
        "vm-42",
        "summary",
        &format!(
            r#"<val xsi:type="VirtualMachineSummary"><vm type="VirtualMachine">vm-42</vm><config><name>web01</name></config><quickStats><overallCpuUsage>{overall_cpu_usage}</overallCpuUsage><guestMemoryUsage>{guest_memory_usage}</guestMemoryUsage><uptimeSeconds>3600</uptimeSeconds></quickStats></val>"#
        ),
    )
}

pub fn host_summary() -> String {
    property(
        "HostSystem",
        "host-10",
        "summary",
        r#"<val xsi:type="HostListSummary"><host type="HostSystem">host-10</host><quickStats><overallCpuUsage>2300</overallCpuUsage></quickStats></val>"#,
    )
}

/// `perfCounter` answer from `(key, group, name, rollup)` tuples
pub fn perf_counters(counters: &[(u32, &str, &str, &str)]) -> String {
    let infos: String = counters
        .iter()
        .map(|(key, group, name, rollup)| {
            format!(
                r#"<PerfCounterInfo><key>{key}</key><nameInfo><label>{name}</label><summary>{group} {name}</summary><key>{name}</key></nameInfo><groupInfo><label>{group}</label><summary>{group}</summary><key>{group}</key></groupInfo><unitInfo><key>percent</key></unitInfo><rollupType>{rollup}</rollupType><statsType>rate</statsType><level>1</level></PerfCounterInfo>"#
            )
        })
        .collect();
    property(
        "PerformanceManager",
        "PerfMgr",
        "perfCounter",
        &format!(r#"<val xsi:type="ArrayOfPerfCounterInfo">{infos}</val>"#),
    )
}

/// `QueryPerf` answer from `(counter id, instance, values)` tuples
pub fn query_perf(entity: &str, series: &[(u32, &str, &[i64])]) -> String {
    let values: String = series
        .iter()
        .map(|(id, instance, samples)| {
            let samples: String = samples
                .iter()
                .map(|v| format!("<value>{v}</value>"))
                .collect();
            format!(
                r#"<value xsi:type="PerfMetricIntSeries"><id><counterId>{id}</counterId><instance>{instance}</instance></id>{samples}</value>"#
            )
        })
        .collect();
    envelope(&format!(
        r#"<QueryPerfResponse xmlns="urn:vim25"><returnval xsi:type="PerfEntityMetric"><entity type="HostSystem">{entity}</entity><sampleInfo><timestamp>2024-01-01T00:00:00Z</timestamp><interval>20</interval></sampleInfo>{values}</returnval></QueryPerfResponse>"#
    ))
}

/// SOAP fault with a typed detail element
pub fn fault(kind: &str, message: &str) -> String {
    envelope(&format!(
        r#"<soapenv:Fault><faultcode>ServerFaultCode</faultcode><faultstring>{message}</faultstring><detail><{kind}Fault xmlns="urn:vim25" xsi:type="{kind}"></{kind}Fault></detail></soapenv:Fault>"#
    ))
}

/// POST /sdk whose body contains `fragment`
pub fn soap_call(fragment: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path("/sdk"))
        .and(body_string_contains(fragment))
}

pub fn ok(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(body)
}

pub fn soap_fault(kind: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(500).set_body_string(fault(kind, message))
}

/// Mount the handshake: service content, login and logout
pub async fn mount_handshake(server: &MockServer) {
    soap_call("<RetrieveServiceContent")
        .respond_with(ok(service_content()))
        .mount(server)
        .await;
    soap_call("<Login")
        .respond_with(ok(login()).insert_header("set-cookie", SESSION_COOKIE_HEADER))
        .mount(server)
        .await;
    soap_call("<Logout")
        .respond_with(ok(logout()))
        .mount(server)
        .await;
}

/// Mount a session probe that always succeeds
pub async fn mount_valid_session(server: &MockServer) {
    soap_call("<pathSet>currentSession</pathSet>")
        .respond_with(ok(current_session()))
        .mount(server)
        .await;
}

/// Mount an inventory path lookup
pub async fn mount_inventory(
    server: &MockServer,
    inventory_path: &str,
    moref: Option<(&str, &str)>,
) {
    soap_call(&format!("<inventoryPath>{inventory_path}</inventoryPath>"))
        .respond_with(ok(found("FindByInventoryPath", moref)))
        .mount(server)
        .await;
}

pub fn connection(server: &MockServer) -> ConnectionConfig {
    let endpoint = Url::parse(&format!("{}/sdk", server.uri())).unwrap();
    ConnectionConfig::new(endpoint, "admin", "secret")
}

pub fn session_manager(server: &MockServer) -> SessionManager {
    SessionManager::new(connection(server))
}

pub fn config(kind: ResourceKind) -> Config {
    let mut config = Config::default();
    config.vsphere.hostname = "vcenter.lab.local".to_string();
    config.vsphere.resource_kind = Some(kind);
    config
}

/// Resolve the catalog against `server` and build the router
pub async fn app(server: &MockServer, kind: ResourceKind) -> (axum::Router, AppState) {
    let state = AppState::with_sessions(config(kind), session_manager(server))
        .await
        .expect("Failed to build application state");
    (router(state.clone()), state)
}
