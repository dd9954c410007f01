//! vim25 SOAP 메시지 처리
//!
//! 요청 envelope 생성과 응답 XML을 작은 트리 구조로 파싱하는 기능을 제공합니다.
//! vim25 응답은 `xsi:type`에 따라 모양이 달라지므로 serde 매핑 대신
//! 이벤트 리더로 트리를 만든 뒤 필요한 요소만 꺼내 씁니다.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::VsphereError;

/// vim25 네임스페이스
pub const VIM25_NS: &str = "urn:vim25";

/// 파싱된 XML 요소
///
/// 요소 이름은 네임스페이스 접두사를 뗀 로컬 이름이고,
/// 속성 이름은 접두사를 포함한 원래 이름(`xsi:type`, `type`)입니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, VsphereError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();
            attrs.push((key, value));
        }

        Ok(Self {
            name,
            attrs,
            text: String::new(),
            children: Vec::new(),
        })
    }

    /// 이름이 일치하는 첫 번째 자식 요소
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// 이름이 일치하는 모든 자식 요소
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// 자식 요소를 경로로 따라감
    pub fn path(&self, path: &[&str]) -> Option<&XmlNode> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    /// 경로 끝 요소의 텍스트
    pub fn child_text(&self, path: &[&str]) -> Option<&str> {
        self.path(path).map(|n| n.text.as_str())
    }

    /// 속성 값 조회
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn xml_error(err: impl std::fmt::Display) -> VsphereError {
    VsphereError::Xml(err.to_string())
}

/// XML 문서를 파싱하여 루트 요소 반환
pub fn parse(xml: &str) -> Result<XmlNode, VsphereError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // stack[0] is a synthetic document node collecting the root element
    let mut stack: Vec<XmlNode> = vec![XmlNode::default()];

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => stack.push(XmlNode::from_start(&start)?),
            Event::Empty(start) => {
                let node = XmlNode::from_start(&start)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(VsphereError::Xml("unbalanced end tag".to_string()));
                }
                if let Some(node) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(node);
                    }
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_error)?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(VsphereError::Xml("unexpected end of document".to_string()));
    }

    stack
        .pop()
        .and_then(|document| document.children.into_iter().next())
        .ok_or_else(|| VsphereError::Xml("empty document".to_string()))
}

/// 요청 본문을 SOAP envelope로 감쌈
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

/// 텍스트 요소 `<tag>value</tag>`
pub fn text_element(tag: &str, value: &str) -> String {
    format!("<{tag}>{}</{tag}>", escape(value))
}

/// 응답 envelope에서 `<op>Response` 요소 추출
///
/// Body에 Fault가 있으면 [`VsphereError::Fault`]를 반환합니다.
pub fn response_body(root: XmlNode, operation: &str) -> Result<XmlNode, VsphereError> {
    let body = root
        .children
        .into_iter()
        .find(|c| c.name == "Body")
        .ok_or_else(|| VsphereError::MissingElement("Body".to_string()))?;

    if let Some(fault) = body.child("Fault") {
        return Err(fault_from_node(fault));
    }

    let expected = format!("{}Response", operation);
    body.children
        .into_iter()
        .find(|c| c.name == expected)
        .ok_or(VsphereError::MissingElement(expected))
}

/// Fault 요소를 에러로 변환
///
/// Fault 코드는 detail 첫 요소의 `xsi:type`을 우선 사용하고,
/// 없으면 요소 이름에서 `Fault` 접미사를 뗀 값, 그것도 없으면 `faultcode`를 씁니다.
pub fn fault_from_node(fault: &XmlNode) -> VsphereError {
    let message = fault.child_text(&["faultstring"]).unwrap_or("").to_string();

    let code = fault
        .child("detail")
        .and_then(|detail| detail.children.first())
        .map(|first| {
            first
                .attr("xsi:type")
                .map(str::to_string)
                .unwrap_or_else(|| first.name.trim_end_matches("Fault").to_string())
        })
        .or_else(|| fault.child_text(&["faultcode"]).map(str::to_string))
        .unwrap_or_default();

    VsphereError::Fault { code, message }
}
