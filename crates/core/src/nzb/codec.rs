use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{NzbError, NzbMetadata};

const NZB_DOCTYPE: &str =
    r#"nzb PUBLIC "-//newzBin//DTD NZB 1.1//EN" "http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd""#;
const NZB_NAMESPACE: &str = "http://www.newzbin.com/DTD/2003/nzb";
const METADATA_TYPE: &str = "slskd";

fn xml_err(e: impl std::fmt::Display) -> NzbError {
    NzbError::Xml(e.to_string())
}

/// Build an NZB for `title` carrying `metadata`.
pub fn encode_nzb(title: &str, metadata: &NzbMetadata) -> Result<String, NzbError> {
    let json = serde_json::to_vec(metadata).map_err(|e| NzbError::InvalidMetadata(e.to_string()))?;
    let payload = STANDARD.encode(json);

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::DocType(BytesText::from_escaped(NZB_DOCTYPE)))
        .map_err(xml_err)?;

    let mut root = BytesStart::new("nzb");
    root.push_attribute(("xmlns", NZB_NAMESPACE));
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("head")))
        .map_err(xml_err)?;
    write_meta(&mut writer, "title", title)?;
    write_meta(&mut writer, METADATA_TYPE, &payload)?;
    writer
        .write_event(Event::End(BytesEnd::new("head")))
        .map_err(xml_err)?;

    let date = Utc::now().timestamp().to_string();
    let mut file = BytesStart::new("file");
    file.push_attribute(("poster", "soulbridge"));
    file.push_attribute(("date", date.as_str()));
    file.push_attribute(("subject", title));
    writer.write_event(Event::Start(file)).map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("groups")))
        .map_err(xml_err)?;
    write_text_element(&mut writer, BytesStart::new("group"), "alt.binaries.sounds")?;
    writer
        .write_event(Event::End(BytesEnd::new("groups")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("segments")))
        .map_err(xml_err)?;
    let total = metadata.total_size().to_string();
    let mut segment = BytesStart::new("segment");
    segment.push_attribute(("bytes", total.as_str()));
    segment.push_attribute(("number", "1"));
    write_text_element(&mut writer, segment, "soulbridge@localhost")?;
    writer
        .write_event(Event::End(BytesEnd::new("segments")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::End(BytesEnd::new("file")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("nzb")))
        .map_err(xml_err)?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(xml_err)
}

fn write_meta(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    kind: &str,
    value: &str,
) -> Result<(), NzbError> {
    let mut meta = BytesStart::new("meta");
    meta.push_attribute(("type", kind));
    write_text_element(writer, meta, value)
}

fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    start: BytesStart<'_>,
    text: &str,
) -> Result<(), NzbError> {
    let end = start.to_end().into_owned();
    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    writer.write_event(Event::End(end)).map_err(xml_err)?;
    Ok(())
}

/// Extract the slskd metadata from an NZB.
///
/// Only the `<meta type="slskd">` tag matters: without it decoding fails
/// with [`NzbError::MissingMetadata`] however valid the rest is.
pub fn decode_nzb(xml: &str) -> Result<NzbMetadata, NzbError> {
    let payload = find_metadata(xml).ok_or(NzbError::MissingMetadata)?;

    let json = STANDARD
        .decode(payload.trim())
        .map_err(|e| NzbError::InvalidMetadata(format!("base64: {}", e)))?;
    serde_json::from_slice(&json).map_err(|e| NzbError::InvalidMetadata(format!("json: {}", e)))
}

fn find_metadata(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_metadata = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"meta" => {
                in_metadata = e.attributes().flatten().any(|attr| {
                    attr.key.as_ref() == b"type" && attr.value.as_ref() == METADATA_TYPE.as_bytes()
                });
            }
            Ok(Event::Text(ref t)) if in_metadata => {
                return t.unescape().ok().map(|text| text.into_owned());
            }
            Ok(Event::End(_)) => in_metadata = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}
