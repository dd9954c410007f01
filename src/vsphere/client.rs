//! vim25 SOAP HTTP 클라이언트
//!
//! 요청마다 타임아웃이 적용되는 비동기 클라이언트와, 로그인 쿠키를 보관하는
//! 인증된 세션을 제공합니다.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::{Client, ClientBuilder, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use super::soap::{self, text_element, XmlNode, VIM25_NS};
use super::types::{ManagedObjectReference, PerfSeries, ServiceContent};
use crate::config::ConnectionConfig;
use crate::error::VsphereError;

/// vSphere 세션 쿠키 이름
pub const SESSION_COOKIE: &str = "vmware_soap_session";

/// 서비스 콘텐츠를 받기 전에 사용하는 API 버전
const DEFAULT_API_VERSION: &str = "6.5";

/// vim25 클라이언트 결과 타입
pub type VimResult<T> = Result<T, VsphereError>;

/// vim25 SOAP 클라이언트 (인증 전)
#[derive(Clone)]
pub struct VimClient {
    client: Client,
    endpoint: Url,
    timeout_ms: u64,
    api_version: String,
}

impl VimClient {
    /// 새 클라이언트 생성
    ///
    /// # Arguments
    /// * `connection` - 엔드포인트, TLS 검증 여부, 타임아웃
    pub fn new(connection: &ConnectionConfig) -> VimResult<Self> {
        let client = ClientBuilder::new()
            .timeout(connection.timeout)
            .danger_accept_invalid_certs(connection.insecure)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(VsphereError::HttpClientInit)?;

        Ok(Self {
            client,
            endpoint: connection.endpoint.clone(),
            timeout_ms: connection.timeout.as_millis() as u64,
            api_version: DEFAULT_API_VERSION.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// SOAP 호출 한 번
    ///
    /// 응답의 `<operation>Response` 요소와 로그인 쿠키(있으면)를 반환합니다.
    async fn call(
        &self,
        cookie: Option<&str>,
        operation: &str,
        this: &ManagedObjectReference,
        params: &str,
    ) -> VimResult<(XmlNode, Option<String>)> {
        let body = soap::envelope(&format!(
            r#"<{operation} xmlns="{VIM25_NS}">{}{params}</{operation}>"#,
            this.to_xml("_this"),
        ));

        debug!(operation, "Sending vim25 request");

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("urn:vim25/{}", self.api_version))
            .body(body);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let session_cookie = extract_session_cookie(response.headers());

        // Faults arrive as 500 with a SOAP body
        if !status.is_success() && status != StatusCode::INTERNAL_SERVER_ERROR {
            return Err(VsphereError::HttpStatus(status.as_u16()));
        }

        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        let root = match soap::parse(&text) {
            Ok(root) => root,
            Err(_) if !status.is_success() => {
                return Err(VsphereError::HttpStatus(status.as_u16()))
            }
            Err(e) => return Err(e),
        };

        Ok((soap::response_body(root, operation)?, session_cookie))
    }

    fn transport_error(&self, err: reqwest::Error) -> VsphereError {
        if err.is_timeout() {
            VsphereError::Timeout(Some(self.timeout_ms))
        } else {
            err.into()
        }
    }

    /// ServiceInstance에서 서비스 콘텐츠 조회
    ///
    /// 서버가 이 시점에 발급한 세션 쿠키(있으면)를 함께 반환합니다. 로그인 요청에
    /// 그대로 실어 보내야 서버에 인증되지 않은 세션이 남지 않습니다.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn retrieve_service_content(&self) -> VimResult<(ServiceContent, Option<String>)> {
        let this = ManagedObjectReference::new("ServiceInstance", "ServiceInstance");
        let (response, cookie) = self
            .call(None, "RetrieveServiceContent", &this, "")
            .await?;

        let returnval = response
            .child("returnval")
            .ok_or_else(|| VsphereError::MissingElement("returnval".to_string()))?;
        Ok((ServiceContent::from_node(returnval)?, cookie))
    }

    /// 로그인하여 인증된 세션 생성
    ///
    /// `cookie`는 서비스 콘텐츠 조회 때 받은 쿠키입니다. 로그인 응답이 새 쿠키를
    /// 주지 않으면 그 쿠키가 인증된 세션의 쿠키가 됩니다.
    #[instrument(skip(self, content, cookie, password), fields(endpoint = %self.endpoint))]
    pub async fn login(
        &self,
        content: ServiceContent,
        cookie: Option<String>,
        username: &str,
        password: &str,
    ) -> VimResult<Session> {
        let params = format!(
            "{}{}",
            text_element("userName", username),
            text_element("password", password)
        );
        let (_, issued) = self
            .call(cookie.as_deref(), "Login", &content.session_manager, &params)
            .await?;

        let cookie = issued.or(cookie).ok_or_else(|| {
            VsphereError::MissingElement(format!("{} cookie", SESSION_COOKIE))
        })?;

        let mut client = self.clone();
        if !content.about.api_version.is_empty() {
            client.api_version = content.about.api_version.clone();
        }

        Ok(Session {
            client,
            cookie,
            content,
        })
    }
}

/// `Set-Cookie` 헤더에서 세션 쿠키(`name=value`) 추출
fn extract_session_cookie(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .find(|pair| {
            pair.split_once('=')
                .is_some_and(|(name, _)| name.trim() == SESSION_COOKIE)
        })
        .map(str::to_string)
}

/// 인증된 vim25 세션
///
/// 로그인 쿠키와 서비스 콘텐츠를 함께 보관하며, 이후 모든 호출에 쿠키를 실어 보냅니다.
pub struct Session {
    client: VimClient,
    cookie: String,
    content: ServiceContent,
}

impl Session {
    pub fn content(&self) -> &ServiceContent {
        &self.content
    }

    pub fn endpoint(&self) -> &Url {
        self.client.endpoint()
    }

    async fn call(
        &self,
        operation: &str,
        this: &ManagedObjectReference,
        params: &str,
    ) -> VimResult<XmlNode> {
        let (response, _) = self
            .client
            .call(Some(&self.cookie), operation, this, params)
            .await?;
        Ok(response)
    }

    /// 로그아웃
    #[instrument(skip(self), fields(endpoint = %self.endpoint()))]
    pub async fn logout(&self) -> VimResult<()> {
        self.call("Logout", &self.content.session_manager, "")
            .await
            .map(|_| ())
    }

    /// 객체 하나의 속성 하나 조회
    ///
    /// 속성이 설정되어 있지 않으면 `None`을 반환합니다.
    #[instrument(skip(self, obj), fields(obj = %obj))]
    pub async fn retrieve_property(
        &self,
        obj: &ManagedObjectReference,
        path: &str,
    ) -> VimResult<Option<XmlNode>> {
        let params = format!(
            "<specSet><propSet>{}<all>false</all>{}</propSet><objectSet>{}<skip>false</skip></objectSet></specSet><options></options>",
            text_element("type", &obj.kind),
            text_element("pathSet", path),
            obj.to_xml("obj"),
        );
        let response = self
            .call(
                "RetrievePropertiesEx",
                &self.content.property_collector,
                &params,
            )
            .await?;

        let value = response
            .path(&["returnval", "objects"])
            .and_then(|objects| {
                objects
                    .children_named("propSet")
                    .find(|prop| prop.child_text(&["name"]) == Some(path))
            })
            .and_then(|prop| prop.child("val"))
            .cloned();
        Ok(value)
    }

    /// 인벤토리 경로로 객체 검색
    #[instrument(skip(self))]
    pub async fn find_by_inventory_path(
        &self,
        inventory_path: &str,
    ) -> VimResult<Option<ManagedObjectReference>> {
        let params = text_element("inventoryPath", inventory_path);
        let response = self
            .call("FindByInventoryPath", &self.content.search_index, &params)
            .await?;
        Ok(returned_reference(&response))
    }

    /// 데이터센터 안에서 DNS 이름으로 호스트 검색
    #[instrument(skip(self, datacenter), fields(datacenter = %datacenter))]
    pub async fn find_host_by_dns_name(
        &self,
        datacenter: &ManagedObjectReference,
        dns_name: &str,
    ) -> VimResult<Option<ManagedObjectReference>> {
        let params = format!(
            "{}{}<vmSearch>false</vmSearch>",
            datacenter.to_xml("datacenter"),
            text_element("dnsName", dns_name)
        );
        let response = self
            .call("FindByDnsName", &self.content.search_index, &params)
            .await?;
        Ok(returned_reference(&response))
    }

    /// 데이터센터 안에서 IP 주소로 호스트 검색
    #[instrument(skip(self, datacenter), fields(datacenter = %datacenter))]
    pub async fn find_host_by_ip(
        &self,
        datacenter: &ManagedObjectReference,
        ip: &str,
    ) -> VimResult<Option<ManagedObjectReference>> {
        let params = format!(
            "{}{}<vmSearch>false</vmSearch>",
            datacenter.to_xml("datacenter"),
            text_element("ip", ip)
        );
        let response = self
            .call("FindByIp", &self.content.search_index, &params)
            .await?;
        Ok(returned_reference(&response))
    }

    /// 성능 관리자에 최근 샘플 조회
    #[instrument(skip(self, entity), fields(entity = %entity))]
    pub async fn query_perf(
        &self,
        entity: &ManagedObjectReference,
        interval_id: u32,
        max_sample: u32,
    ) -> VimResult<Vec<PerfSeries>> {
        let perf_manager = self
            .content
            .perf_manager
            .as_ref()
            .ok_or_else(|| VsphereError::MissingElement("ServiceContent.perfManager".to_string()))?;

        let params = format!(
            "<querySpec>{}<maxSample>{}</maxSample><intervalId>{}</intervalId></querySpec>",
            entity.to_xml("entity"),
            max_sample,
            interval_id
        );
        let response = self.call("QueryPerf", perf_manager, &params).await?;
        Ok(PerfSeries::list_from_response(&response))
    }
}

fn returned_reference(response: &XmlNode) -> Option<ManagedObjectReference> {
    response
        .child("returnval")
        .and_then(ManagedObjectReference::from_node)
}
