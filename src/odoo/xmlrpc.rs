//! Minimal XML-RPC codec covering the surface Odoo exposes.
//!
//! Requests are emitted directly; responses are parsed with roxmltree.
//! Values map to and from `serde_json::Value`: struct <-> object,
//! array <-> array, int/double <-> number, boolean <-> bool, nil <-> null,
//! string/dateTime/base64 <-> string.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlRpcError {
    /// The server answered with a `<fault>` element
    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i64, message: String },
    /// The payload was not a well-formed XML-RPC response
    #[error("malformed XML-RPC response: {0}")]
    Malformed(String),
}

/// Serialize a `methodCall` document.
pub fn marshal_call(method: &str, params: &[serde_json::Value]) -> String {
    let mut out = String::with_capacity(256);
    out.push_str("<?xml version=\"1.0\"?><methodCall><methodName>");
    push_escaped(&mut out, method);
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        push_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

/// Serialize one `<value>` element. Exposed to the test fixture so mocked
/// Odoo responses share the production encoding.
pub(crate) fn push_value(out: &mut String, value: &serde_json::Value) {
    out.push_str("<value>");
    match value {
        serde_json::Value::Null => out.push_str("<nil/>"),
        serde_json::Value::Bool(b) => {
            out.push_str("<boolean>");
            out.push(if *b { '1' } else { '0' });
            out.push_str("</boolean>");
        }
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push_str("<int>");
                out.push_str(&i.to_string());
                out.push_str("</int>");
            } else {
                out.push_str("<double>");
                out.push_str(&n.to_string());
                out.push_str("</double>");
            }
        }
        serde_json::Value::String(s) => {
            out.push_str("<string>");
            push_escaped(out, s);
            out.push_str("</string>");
        }
        serde_json::Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                push_value(out, item);
            }
            out.push_str("</data></array>");
        }
        serde_json::Value::Object(map) => {
            out.push_str("<struct>");
            for (name, member) in map {
                out.push_str("<member><name>");
                push_escaped(out, name);
                out.push_str("</name>");
                push_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Parse a `methodResponse` document into its single result value.
pub fn parse_response(xml: &str) -> Result<serde_json::Value, XmlRpcError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| XmlRpcError::Malformed(e.to_string()))?;
    let root = doc.root_element();
    if !root.has_tag_name("methodResponse") {
        return Err(XmlRpcError::Malformed(format!(
            "unexpected root element <{}>",
            root.tag_name().name()
        )));
    }

    if let Some(fault) = root.children().find(|n| n.has_tag_name("fault")) {
        let value = fault
            .children()
            .find(|n| n.has_tag_name("value"))
            .ok_or_else(|| XmlRpcError::Malformed("fault without value".to_string()))?;
        let parsed = parse_value(value)?;
        let code = parsed
            .get("faultCode")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let message = parsed
            .get("faultString")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown fault")
            .to_string();
        return Err(XmlRpcError::Fault { code, message });
    }

    let value = root
        .children()
        .find(|n| n.has_tag_name("params"))
        .and_then(|params| params.children().find(|n| n.has_tag_name("param")))
        .and_then(|param| param.children().find(|n| n.has_tag_name("value")))
        .ok_or_else(|| XmlRpcError::Malformed("response without params".to_string()))?;
    parse_value(value)
}

fn parse_value(node: roxmltree::Node) -> Result<serde_json::Value, XmlRpcError> {
    let Some(typed) = node.children().find(|n| n.is_element()) else {
        // Untyped content is a string per the XML-RPC spec
        return Ok(serde_json::Value::String(
            node.text().unwrap_or("").to_string(),
        ));
    };

    let text = || typed.text().unwrap_or("");
    match typed.tag_name().name() {
        "int" | "i4" | "i8" => text()
            .trim()
            .parse::<i64>()
            .map(serde_json::Value::from)
            .map_err(|e| XmlRpcError::Malformed(format!("bad int: {}", e))),
        "boolean" => match text().trim() {
            "1" => Ok(serde_json::Value::Bool(true)),
            "0" => Ok(serde_json::Value::Bool(false)),
            other => Err(XmlRpcError::Malformed(format!("bad boolean: {:?}", other))),
        },
        "double" => text()
            .trim()
            .parse::<f64>()
            .map(serde_json::Value::from)
            .map_err(|e| XmlRpcError::Malformed(format!("bad double: {}", e))),
        "string" | "dateTime.iso8601" | "base64" => {
            Ok(serde_json::Value::String(text().to_string()))
        }
        "nil" => Ok(serde_json::Value::Null),
        "array" => {
            let data = typed
                .children()
                .find(|n| n.has_tag_name("data"))
                .ok_or_else(|| XmlRpcError::Malformed("array without data".to_string()))?;
            let mut items = Vec::new();
            for value in data.children().filter(|n| n.has_tag_name("value")) {
                items.push(parse_value(value)?);
            }
            Ok(serde_json::Value::Array(items))
        }
        "struct" => {
            let mut map = serde_json::Map::new();
            for member in typed.children().filter(|n| n.has_tag_name("member")) {
                let name = member
                    .children()
                    .find(|n| n.has_tag_name("name"))
                    .and_then(|n| n.text())
                    .ok_or_else(|| XmlRpcError::Malformed("member without name".to_string()))?;
                let value = member
                    .children()
                    .find(|n| n.has_tag_name("value"))
                    .ok_or_else(|| XmlRpcError::Malformed("member without value".to_string()))?;
                map.insert(name.to_string(), parse_value(value)?);
            }
            Ok(serde_json::Value::Object(map))
        }
        other => Err(XmlRpcError::Malformed(format!(
            "unsupported value type <{}>",
            other
        ))),
    }
}

/// Wrap a value in a full response document, the way tests mock Odoo.
#[cfg(test)]
pub(crate) fn response_body(value: &serde_json::Value) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodResponse><params><param>");
    push_value(&mut out, value);
    out.push_str("</param></params></methodResponse>");
    out
}

/// Wrap a fault struct in a full response document.
#[cfg(test)]
pub(crate) fn fault_body(code: i64, message: &str) -> String {
    let fault = serde_json::json!({"faultCode": code, "faultString": message});
    let mut out = String::from("<?xml version=\"1.0\"?><methodResponse><fault>");
    push_value(&mut out, &fault);
    out.push_str("</fault></methodResponse>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_marshal_call_shape() {
        let body = marshal_call("authenticate", &[json!("db"), json!("user"), json!("key")]);
        assert!(body.starts_with("<?xml version=\"1.0\"?><methodCall>"));
        assert!(body.contains("<methodName>authenticate</methodName>"));
        assert!(body.contains("<value><string>db</string></value>"));
        assert_eq!(body.matches("<param>").count(), 3);
    }

    #[test]
    fn test_marshal_escapes_markup() {
        let body = marshal_call("execute_kw", &[json!("a<b>&c")]);
        assert!(body.contains("<string>a&lt;b&gt;&amp;c</string>"));
    }

    #[test]
    fn test_marshal_nested_structures() {
        let body = marshal_call(
            "execute_kw",
            &[json!([["work_email", "=ilike", "x@y.com"]]), json!({"limit": 2})],
        );
        assert!(body.contains(
            "<value><array><data><value><array><data><value><string>work_email</string></value>"
        ));
        assert!(body.contains(
            "<member><name>limit</name><value><int>2</int></value></member>"
        ));
    }

    #[test]
    fn test_parse_scalar_types() {
        assert_eq!(
            parse_response(&response_body(&json!(42))).unwrap(),
            json!(42)
        );
        assert_eq!(
            parse_response(&response_body(&json!(true))).unwrap(),
            json!(true)
        );
        assert_eq!(
            parse_response(&response_body(&json!("hello"))).unwrap(),
            json!("hello")
        );
        assert_eq!(
            parse_response(&response_body(&json!(null))).unwrap(),
            json!(null)
        );
        assert_eq!(
            parse_response(&response_body(&json!(1.5))).unwrap(),
            json!(1.5)
        );
    }

    #[test]
    fn test_parse_untyped_value_is_string() {
        let xml = "<?xml version=\"1.0\"?><methodResponse><params><param><value>plain</value></param></params></methodResponse>";
        assert_eq!(parse_response(xml).unwrap(), json!("plain"));
    }

    #[test]
    fn test_parse_i4_alias() {
        let xml = "<?xml version=\"1.0\"?><methodResponse><params><param><value><i4>7</i4></value></param></params></methodResponse>";
        assert_eq!(parse_response(xml).unwrap(), json!(7));
    }

    #[test]
    fn test_roundtrip_records() {
        let records = json!([
            {"id": 1, "name": "Alice", "department_id": [4, "Engineering"]},
            {"id": 2, "name": "Bob", "department_id": false},
        ]);
        let parsed = parse_response(&response_body(&records)).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn test_parse_fault() {
        let fault = json!({"faultCode": 3, "faultString": "AccessDenied"});
        let mut xml = String::from("<?xml version=\"1.0\"?><methodResponse><fault>");
        push_value(&mut xml, &fault);
        xml.push_str("</fault></methodResponse>");

        match parse_response(&xml) {
            Err(XmlRpcError::Fault { code, message }) => {
                assert_eq!(code, 3);
                assert_eq!(message, "AccessDenied");
            }
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_response("not xml at all"),
            Err(XmlRpcError::Malformed(_))
        ));
        assert!(matches!(
            parse_response("<html><body>proxy error</body></html>"),
            Err(XmlRpcError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_whitespace_between_elements() {
        let xml = "<?xml version=\"1.0\"?>\n<methodResponse>\n  <params>\n    <param>\n      <value><int>5</int></value>\n    </param>\n  </params>\n</methodResponse>";
        assert_eq!(parse_response(xml).unwrap(), json!(5));
    }
}
