//! vim25 객체의 타입 뷰
//!
//! 파싱된 [`XmlNode`] 트리에서 필요한 값만 골라 담는 구조체들입니다.

use std::collections::HashMap;
use std::fmt;

use quick_xml::escape::escape;

use super::soap::XmlNode;
use crate::error::VsphereError;

/// Managed object reference (`<obj type="HostSystem">host-10</obj>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManagedObjectReference {
    /// Managed object 타입 (예: `Datacenter`, `HostSystem`)
    pub kind: String,
    /// Managed object id (예: `host-10`)
    pub value: String,
}

impl ManagedObjectReference {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// `type` 속성과 텍스트에서 생성
    pub fn from_node(node: &XmlNode) -> Option<Self> {
        let kind = node.attr("type")?;
        let value = node.text.trim();
        if value.is_empty() {
            return None;
        }
        Some(Self::new(kind, value))
    }

    /// 요청 본문용 XML 요소
    pub fn to_xml(&self, tag: &str) -> String {
        format!(
            r#"<{tag} type="{}">{}</{tag}>"#,
            escape(self.kind.as_str()),
            escape(self.value.as_str())
        )
    }
}

impl fmt::Display for ManagedObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// 엔드포인트 제품 정보
#[derive(Debug, Clone, Default)]
pub struct AboutInfo {
    pub full_name: String,
    pub api_version: String,
}

/// `RetrieveServiceContent` 결과 중 사용하는 참조들
#[derive(Debug, Clone)]
pub struct ServiceContent {
    pub property_collector: ManagedObjectReference,
    pub session_manager: ManagedObjectReference,
    pub search_index: ManagedObjectReference,
    /// 성능 관리자 (ESX 호스트 카운터 조회에만 필요)
    pub perf_manager: Option<ManagedObjectReference>,
    pub about: AboutInfo,
}

impl ServiceContent {
    pub fn from_node(returnval: &XmlNode) -> Result<Self, VsphereError> {
        let required = |name: &str| {
            returnval
                .child(name)
                .and_then(ManagedObjectReference::from_node)
                .ok_or_else(|| VsphereError::MissingElement(format!("ServiceContent.{}", name)))
        };

        Ok(Self {
            property_collector: required("propertyCollector")?,
            session_manager: required("sessionManager")?,
            search_index: required("searchIndex")?,
            perf_manager: returnval
                .child("perfManager")
                .and_then(ManagedObjectReference::from_node),
            about: AboutInfo {
                full_name: returnval
                    .child_text(&["about", "fullName"])
                    .unwrap_or_default()
                    .to_string(),
                api_version: returnval
                    .child_text(&["about", "apiVersion"])
                    .unwrap_or_default()
                    .to_string(),
            },
        })
    }
}

/// 성능 카운터 정의 (`PerfCounterInfo`)
#[derive(Debug, Clone, PartialEq)]
pub struct PerfCounterInfo {
    pub key: u32,
    pub group: String,
    pub name: String,
    pub rollup: String,
    /// 카운터 설명 (nameInfo.summary)
    pub summary: Option<String>,
}

impl PerfCounterInfo {
    /// `ArrayOfPerfCounterInfo` 값에서 카운터 목록 추출
    ///
    /// key를 읽을 수 없는 항목은 건너뜁니다.
    pub fn list_from_node(val: &XmlNode) -> Vec<Self> {
        val.children_named("PerfCounterInfo")
            .filter_map(Self::from_node)
            .collect()
    }

    fn from_node(node: &XmlNode) -> Option<Self> {
        let key = node.child_text(&["key"])?.trim().parse().ok()?;
        let summary = node
            .child_text(&["nameInfo", "summary"])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Some(Self {
            key,
            group: node.child_text(&["groupInfo", "key"])?.to_string(),
            name: node.child_text(&["nameInfo", "key"])?.to_string(),
            rollup: node.child_text(&["rollupType"]).unwrap_or_default().to_string(),
            summary,
        })
    }

    /// `group.name.rollup` 형태의 점 구분 경로
    pub fn dotted_path(&self) -> String {
        [self.group.as_str(), self.name.as_str(), self.rollup.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// `QueryPerf` 결과의 시계열 하나 (`PerfMetricIntSeries`)
#[derive(Debug, Clone, PartialEq)]
pub struct PerfSeries {
    pub counter_id: u32,
    /// 인스턴스 이름, 집계 값은 빈 문자열
    pub instance: String,
    /// 오래된 순서의 샘플 값
    pub values: Vec<i64>,
}

impl PerfSeries {
    /// `QueryPerfResponse`의 모든 entity에서 시계열 추출
    pub fn list_from_response(response: &XmlNode) -> Vec<Self> {
        response
            .children_named("returnval")
            .flat_map(|entity| entity.children_named("value"))
            .filter_map(Self::from_node)
            .collect()
    }

    fn from_node(series: &XmlNode) -> Option<Self> {
        let counter_id = series.child_text(&["id", "counterId"])?.trim().parse().ok()?;
        let instance = series
            .child_text(&["id", "instance"])
            .unwrap_or_default()
            .to_string();
        let values = series
            .children_named("value")
            .filter_map(|v| v.text.trim().parse().ok())
            .collect();

        Some(Self {
            counter_id,
            instance,
            values,
        })
    }

    /// 가장 최근 샘플
    pub fn latest(&self) -> Option<i64> {
        self.values.last().copied()
    }
}

/// 속성 값의 숫자 필드를 점 구분 경로로 펼친 집합
///
/// `summary` 속성의 `<quickStats><overallCpuUsage>120</overallCpuUsage></quickStats>`는
/// `quickStats.overallCpuUsage = 120`이 됩니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySet {
    fields: HashMap<String, f64>,
}

impl PropertySet {
    pub fn from_node(val: &XmlNode) -> Self {
        let mut fields = HashMap::new();
        for child in &val.children {
            Self::flatten(child, String::new(), &mut fields);
        }
        Self { fields }
    }

    fn flatten(node: &XmlNode, prefix: String, fields: &mut HashMap<String, f64>) {
        let path = if prefix.is_empty() {
            node.name.clone()
        } else {
            format!("{}.{}", prefix, node.name)
        };

        if node.children.is_empty() {
            if let Ok(value) = node.text.trim().parse::<f64>() {
                fields.insert(path, value);
            }
            return;
        }

        for child in &node.children {
            Self::flatten(child, path.clone(), fields);
        }
    }

    /// 필드 값
    pub fn get(&self, path: &str) -> Option<f64> {
        self.fields.get(path).copied()
    }

    /// 가중합, 입력 중 하나라도 없으면 `None`
    pub fn linear(&self, terms: &[(&str, f64)]) -> Option<f64> {
        terms
            .iter()
            .try_fold(0.0, |acc, (path, weight)| Some(acc + self.get(path)? * weight))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, f64)> for PropertySet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
