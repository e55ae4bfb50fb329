//! Minimal XML-RPC codec for the SAMP standard profile.
//!
//! SAMP hubs speak a small XML-RPC subset (strings, ints, structs, arrays),
//! so the codec lives here instead of pulling in an XML dependency. The
//! parser is a plain cursor over the response text; it tolerates whitespace
//! between elements but is otherwise strict.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use thiserror::Error;

/// XML-RPC value as used by SAMP hubs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Int(i32),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Map lookup; `None` for non-map values and missing keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}

/// Outcome of a parsed `methodResponse`.
#[derive(Debug, PartialEq, Eq)]
pub enum Response {
    Success(Value),
    Fault { code: i32, message: String },
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ParseError(String);

/// Encode a `methodCall` document.
pub fn request(method: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(256);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    out.push_str("<methodCall><methodName>");
    push_escaped(&mut out, method);
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Str(s) => {
            out.push_str("<string>");
            push_escaped(out, s);
            out.push_str("</string>");
        }
        Value::Int(n) => {
            let _ = write!(out, "<int>{n}</int>");
        }
        Value::List(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Map(map) => {
            out.push_str("<struct>");
            for (name, member) in map {
                out.push_str("<member><name>");
                push_escaped(out, name);
                out.push_str("</name>");
                write_value(out, member);
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

/// Parse a `methodResponse` document into a value or a fault.
pub fn parse_response(xml: &str) -> Result<Response, ParseError> {
    let mut reader = Reader::new(xml);
    reader.skip_prolog();
    reader.expect_open("methodResponse")?;
    let response = if reader.peek_open("params") {
        reader.expect_open("params")?;
        reader.expect_open("param")?;
        let value = reader.parse_value()?;
        reader.expect_close("param")?;
        reader.expect_close("params")?;
        Response::Success(value)
    } else {
        reader.expect_open("fault")?;
        let detail = reader.parse_value()?;
        reader.expect_close("fault")?;
        let code = match detail.get("faultCode") {
            Some(Value::Int(n)) => *n,
            _ => 0,
        };
        let message = detail
            .get_str("faultString")
            .unwrap_or("unknown fault")
            .to_string();
        Response::Fault { code, message }
    };
    reader.expect_close("methodResponse")?;
    Ok(response)
}

struct Reader<'a> {
    rest: &'a str,
}

impl<'a> Reader<'a> {
    fn new(xml: &'a str) -> Self {
        Reader {
            rest: xml.trim_start_matches('\u{feff}'),
        }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn skip_prolog(&mut self) {
        self.skip_ws();
        if self.rest.starts_with("<?xml")
            && let Some(end) = self.rest.find("?>")
        {
            self.rest = &self.rest[end + 2..];
        }
    }

    fn peek_open(&mut self, name: &str) -> bool {
        self.skip_ws();
        self.rest
            .strip_prefix('<')
            .and_then(|r| r.strip_prefix(name))
            .is_some_and(|r| r.starts_with('>'))
    }

    fn expect_open(&mut self, name: &str) -> Result<(), ParseError> {
        self.skip_ws();
        let tag = format!("<{name}>");
        match self.rest.strip_prefix(tag.as_str()) {
            Some(rest) => {
                self.rest = rest;
                Ok(())
            }
            None => Err(self.unexpected(&tag)),
        }
    }

    fn expect_close(&mut self, name: &str) -> Result<(), ParseError> {
        self.skip_ws();
        let tag = format!("</{name}>");
        match self.rest.strip_prefix(tag.as_str()) {
            Some(rest) => {
                self.rest = rest;
                Ok(())
            }
            None => Err(self.unexpected(&tag)),
        }
    }

    fn skip_literal(&mut self, literal: &str) -> bool {
        match self.rest.strip_prefix(literal) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn unexpected(&self, wanted: &str) -> ParseError {
        let got: String = self.rest.chars().take(24).collect();
        ParseError(format!("expected {wanted} near '{got}'"))
    }

    /// Text content up to the next tag, entities resolved.
    fn text(&mut self) -> Result<String, ParseError> {
        let end = self
            .rest
            .find('<')
            .ok_or_else(|| ParseError("unterminated text content".into()))?;
        let raw = &self.rest[..end];
        self.rest = &self.rest[end..];
        unescape(raw)
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        self.expect_open("value")?;
        // Untyped content is a string; otherwise a typed child follows.
        let leading = self.text()?;
        if self.skip_literal("</value>") {
            return Ok(Value::Str(leading));
        }
        if !leading.trim().is_empty() {
            return Err(ParseError(format!(
                "stray text '{}' before typed value",
                leading.trim()
            )));
        }
        let value = if self.peek_open("string") {
            self.expect_open("string")?;
            let s = self.text()?;
            self.expect_close("string")?;
            Value::Str(s)
        } else if self.peek_open("int") || self.peek_open("i4") {
            let name = if self.peek_open("int") { "int" } else { "i4" };
            self.expect_open(name)?;
            let text = self.text()?;
            self.expect_close(name)?;
            let n = text
                .trim()
                .parse::<i32>()
                .map_err(|_| ParseError(format!("invalid integer '{}'", text.trim())))?;
            Value::Int(n)
        } else if self.peek_open("boolean") {
            self.expect_open("boolean")?;
            let text = self.text()?;
            self.expect_close("boolean")?;
            Value::Int(i32::from(text.trim() == "1"))
        } else if self.peek_open("struct") {
            self.expect_open("struct")?;
            let mut map = BTreeMap::new();
            loop {
                self.skip_ws();
                if self.skip_literal("</struct>") {
                    break;
                }
                self.expect_open("member")?;
                self.expect_open("name")?;
                let name = self.text()?;
                self.expect_close("name")?;
                let member = self.parse_value()?;
                self.expect_close("member")?;
                map.insert(name, member);
            }
            Value::Map(map)
        } else if self.peek_open("array") {
            self.expect_open("array")?;
            self.expect_open("data")?;
            let mut items = Vec::new();
            loop {
                self.skip_ws();
                if self.skip_literal("</data>") {
                    break;
                }
                items.push(self.parse_value()?);
            }
            self.expect_close("array")?;
            Value::List(items)
        } else {
            return Err(self.unexpected("a value element"));
        };
        self.expect_close("value")?;
        Ok(value)
    }
}

fn unescape(raw: &str) -> Result<String, ParseError> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let end = rest
            .find(';')
            .ok_or_else(|| ParseError("unterminated entity".into()))?;
        let entity = &rest[1..end];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                match code.and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => return Err(ParseError(format!("unknown entity '&{entity};'"))),
                }
            }
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_register_call() {
        let body = request("samp.hub.register", &[Value::str("secret-0123")]);
        assert_eq!(
            body,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <methodCall><methodName>samp.hub.register</methodName>\
             <params><param><value><string>secret-0123</string></value></param></params>\
             </methodCall>"
        );
    }

    #[test]
    fn encode_escapes_markup() {
        let body = request("m", &[Value::str("a<b & c")]);
        assert!(body.contains("<string>a&lt;b &amp; c</string>"));
    }

    #[test]
    fn encode_nested_map() {
        let mut params = BTreeMap::new();
        params.insert("cmd".to_string(), Value::str("scale log"));
        let mut msg = BTreeMap::new();
        msg.insert("samp.mtype".to_string(), Value::str("ds9.set"));
        msg.insert("samp.params".to_string(), Value::Map(params));
        let body = request("samp.hub.callAndWait", &[Value::Map(msg)]);
        assert!(body.contains(
            "<member><name>samp.mtype</name><value><string>ds9.set</string></value></member>"
        ));
        assert!(body.contains("<member><name>cmd</name><value><string>scale log</string></value></member>"));
    }

    #[test]
    fn parse_string_value() {
        let xml = "<?xml version=\"1.0\"?><methodResponse><params><param>\
                   <value><string>linear</string></value>\
                   </param></params></methodResponse>";
        assert_eq!(
            parse_response(xml).unwrap(),
            Response::Success(Value::str("linear"))
        );
    }

    #[test]
    fn parse_untyped_value_is_string() {
        let xml = "<methodResponse><params><param><value>c1</value></param></params></methodResponse>";
        assert_eq!(
            parse_response(xml).unwrap(),
            Response::Success(Value::str("c1"))
        );
    }

    #[test]
    fn parse_struct_with_whitespace() {
        let xml = "<?xml version=\"1.0\"?>\n<methodResponse>\n  <params>\n    <param>\n      <value>\n        <struct>\n          <member>\n            <name>samp.private-key</name>\n            <value><string>k:1</string></value>\n          </member>\n          <member>\n            <name>samp.self-id</name>\n            <value><string>c42</string></value>\n          </member>\n        </struct>\n      </value>\n    </param>\n  </params>\n</methodResponse>\n";
        let Response::Success(value) = parse_response(xml).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(value.get_str("samp.private-key"), Some("k:1"));
        assert_eq!(value.get_str("samp.self-id"), Some("c42"));
    }

    #[test]
    fn parse_array_of_strings() {
        let xml = "<methodResponse><params><param><value><array><data>\n\
                   <value><string>c1</string></value>\n\
                   <value><string>c56</string></value>\n\
                   </data></array></value></param></params></methodResponse>";
        let Response::Success(value) = parse_response(xml).unwrap() else {
            panic!("expected success");
        };
        let items = value.as_list().unwrap();
        assert_eq!(items, [Value::str("c1"), Value::str("c56")]);
    }

    #[test]
    fn parse_fault() {
        let xml = "<methodResponse><fault><value><struct>\
                   <member><name>faultCode</name><value><int>1</int></value></member>\
                   <member><name>faultString</name><value><string>timeout</string></value></member>\
                   </struct></value></fault></methodResponse>";
        assert_eq!(
            parse_response(xml).unwrap(),
            Response::Fault {
                code: 1,
                message: "timeout".to_string()
            }
        );
    }

    #[test]
    fn parse_resolves_entities() {
        let xml = "<methodResponse><params><param>\
                   <value><string>a &lt; b &amp; &#64;home</string></value>\
                   </param></params></methodResponse>";
        assert_eq!(
            parse_response(xml).unwrap(),
            Response::Success(Value::str("a < b & @home"))
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_response("<notxmlrpc/>").is_err());
        assert!(parse_response("<methodResponse><params></methodResponse>").is_err());
    }
}
