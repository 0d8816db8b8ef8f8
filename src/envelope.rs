//! Flat XML envelope extraction for callback bodies.
//!
//! The platform only ever emits single-level `<xml>` envelopes with a fixed
//! field set, each value either CDATA-wrapped or bare text. Pattern matching
//! over those two shapes is the whole contract; this is deliberately not a
//! general XML parser and performs no well-formedness checks.

/// Field names the platform is known to emit.
const FIELDS: &[&str] = &[
    "ToUserName",
    "FromUserName",
    "CreateTime",
    "MsgType",
    "Content",
    "MsgId",
    "AgentID",
    "Event",
    "EventKey",
    "Encrypt",
];

/// Parsed callback envelope. Absent fields are simply `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub to_user_name: Option<String>,
    pub from_user_name: Option<String>,
    pub create_time: Option<String>,
    pub msg_type: Option<String>,
    pub content: Option<String>,
    pub msg_id: Option<String>,
    pub agent_id: Option<String>,
    pub event: Option<String>,
    pub event_key: Option<String>,
    pub encrypt: Option<String>,
}

impl Envelope {
    /// Extract the known fields from an XML body.
    ///
    /// Returns `None` when the input carries neither `MsgType` nor `Encrypt`;
    /// callers treat that as "not a protocol envelope" and acknowledge the
    /// request instead of erroring back to the platform.
    pub fn parse(xml: &str) -> Option<Envelope> {
        let mut env = Envelope::default();
        for &field in FIELDS {
            let value = extract_field(xml, field);
            match field {
                "ToUserName" => env.to_user_name = value,
                "FromUserName" => env.from_user_name = value,
                "CreateTime" => env.create_time = value,
                "MsgType" => env.msg_type = value,
                "Content" => env.content = value,
                "MsgId" => env.msg_id = value,
                "AgentID" => env.agent_id = value,
                "Event" => env.event = value,
                "EventKey" => env.event_key = value,
                "Encrypt" => env.encrypt = value,
                _ => unreachable!(),
            }
        }
        if env.msg_type.is_none() && env.encrypt.is_none() {
            return None;
        }
        Some(env)
    }
}

/// Extract one field: CDATA form first, bare text second. First match wins.
fn extract_field(xml: &str, field: &str) -> Option<String> {
    let open = format!("<{field}>");
    let close = format!("</{field}>");

    let cdata_open = format!("<{field}><![CDATA[");
    let cdata_close = format!("]]></{field}>");
    if let (Some(s), Some(e)) = (xml.find(&cdata_open), xml.find(&cdata_close)) {
        let start = s + cdata_open.len();
        if e >= start {
            return Some(xml[start..e].to_string());
        }
    }

    if let (Some(s), Some(e)) = (xml.find(&open), xml.find(&close)) {
        let start = s + open.len();
        if e >= start {
            return Some(xml[start..e].to_string());
        }
    }
    None
}

/// Render the outbound envelope for an encrypted passive reply.
pub fn render_encrypted(encrypt: &str, signature: &str, timestamp: &str, nonce: &str) -> String {
    format!(
        "<xml><Encrypt><![CDATA[{encrypt}]]></Encrypt>\
         <MsgSignature><![CDATA[{signature}]]></MsgSignature>\
         <TimeStamp>{timestamp}</TimeStamp>\
         <Nonce><![CDATA[{nonce}]]></Nonce></xml>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdata_and_bare_forms_agree() {
        let cdata = Envelope::parse("<xml><MsgType>text</MsgType><Content><![CDATA[hi]]></Content></xml>")
            .expect("envelope");
        let bare = Envelope::parse("<xml><MsgType>text</MsgType><Content>hi</Content></xml>")
            .expect("envelope");
        assert_eq!(cdata.content.as_deref(), Some("hi"));
        assert_eq!(bare.content.as_deref(), Some("hi"));
    }

    #[test]
    fn full_message_envelope() {
        let xml = "<xml>\
            <ToUserName><![CDATA[ww1234567890]]></ToUserName>\
            <FromUserName><![CDATA[userA]]></FromUserName>\
            <CreateTime>1234567890</CreateTime>\
            <MsgType><![CDATA[text]]></MsgType>\
            <Content><![CDATA[你好]]></Content>\
            <MsgId>7000000000000000000</MsgId>\
            <AgentID>1000002</AgentID>\
            </xml>";
        let env = Envelope::parse(xml).expect("envelope");
        assert_eq!(env.to_user_name.as_deref(), Some("ww1234567890"));
        assert_eq!(env.from_user_name.as_deref(), Some("userA"));
        assert_eq!(env.create_time.as_deref(), Some("1234567890"));
        assert_eq!(env.msg_type.as_deref(), Some("text"));
        assert_eq!(env.content.as_deref(), Some("你好"));
        assert_eq!(env.msg_id.as_deref(), Some("7000000000000000000"));
        assert_eq!(env.agent_id.as_deref(), Some("1000002"));
        assert_eq!(env.event, None);
        assert_eq!(env.encrypt, None);
    }

    #[test]
    fn event_envelope() {
        let xml = "<xml><MsgType><![CDATA[event]]></MsgType>\
            <Event><![CDATA[subscribe]]></Event>\
            <EventKey><![CDATA[qrscene_x]]></EventKey></xml>";
        let env = Envelope::parse(xml).expect("envelope");
        assert_eq!(env.event.as_deref(), Some("subscribe"));
        assert_eq!(env.event_key.as_deref(), Some("qrscene_x"));
    }

    #[test]
    fn encrypt_only_envelope_is_valid() {
        let env = Envelope::parse("<xml><Encrypt><![CDATA[abc+def/123==]]></Encrypt></xml>")
            .expect("envelope");
        assert_eq!(env.encrypt.as_deref(), Some("abc+def/123=="));
        assert_eq!(env.msg_type, None);
    }

    #[test]
    fn in_body_signature_duplicates_are_ignored() {
        // MsgSignature/TimeStamp/Nonce may be duplicated in the body; only the
        // fixed field set is extracted.
        let xml = "<xml><Encrypt><![CDATA[payload]]></Encrypt>\
            <MsgSignature><![CDATA[sig]]></MsgSignature>\
            <TimeStamp>1</TimeStamp><Nonce><![CDATA[n]]></Nonce></xml>";
        let env = Envelope::parse(xml).expect("envelope");
        assert_eq!(env.encrypt.as_deref(), Some("payload"));
    }

    #[test]
    fn non_envelope_is_none() {
        assert_eq!(Envelope::parse(""), None);
        assert_eq!(Envelope::parse("not xml at all"), None);
        assert_eq!(Envelope::parse("{\"json\": true}"), None);
        // Known fields present but neither MsgType nor Encrypt.
        assert_eq!(
            Envelope::parse("<xml><ToUserName>ww1</ToUserName><CreateTime>1</CreateTime></xml>"),
            None
        );
    }

    #[test]
    fn empty_field_values_parse_as_empty_strings() {
        let env = Envelope::parse("<xml><MsgType></MsgType></xml>").expect("envelope");
        assert_eq!(env.msg_type.as_deref(), Some(""));
    }

    #[test]
    fn render_round_trips_through_parse() {
        let xml = render_encrypted("ZW5j", "0123abcd", "1234567890", "n0nce");
        let env = Envelope::parse(&xml).expect("envelope");
        assert_eq!(env.encrypt.as_deref(), Some("ZW5j"));
        assert!(xml.contains("<TimeStamp>1234567890</TimeStamp>"));
        assert!(xml.contains("<Nonce><![CDATA[n0nce]]></Nonce>"));
    }
}
