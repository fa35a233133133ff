//! Device metadata (`deviceInfo`) XML handling.

use quick_xml::events::Event;
use quick_xml::Reader;

/// Extract the `<deviceName>` text from a deviceInfo XML payload.
///
/// Returns `None` when the element is missing or the XML is malformed;
/// callers substitute a fallback label. The rest of the payload (model,
/// serial, firmware) is irrelevant here and ignored.
pub fn device_name_from_xml(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_device_name = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"deviceName" {
                    in_device_name = true;
                }
            }
            Ok(Event::Text(e)) => {
                if in_device_name {
                    let text = e.unescape().ok()?.trim().to_string();
                    if text.is_empty() {
                        return None;
                    }
                    return Some(text);
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"deviceName" {
                    in_device_name = false;
                }
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_device_name() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<DeviceInfo version="2.0" xmlns="http://www.isapi.org/ver20/XMLSchema">
  <deviceName>Front Gate</deviceName>
  <deviceID>8f2c</deviceID>
  <model>DS-K1T341</model>
</DeviceInfo>"#;
        assert_eq!(device_name_from_xml(xml).as_deref(), Some("Front Gate"));
    }

    #[test]
    fn missing_name_yields_none() {
        let xml = "<DeviceInfo><model>DS-K1T341</model></DeviceInfo>";
        assert_eq!(device_name_from_xml(xml), None);
    }

    #[test]
    fn malformed_xml_yields_none() {
        assert_eq!(device_name_from_xml("<DeviceInfo><deviceName></x>"), None);
        assert_eq!(device_name_from_xml("not xml at all"), None);
        assert_eq!(device_name_from_xml(""), None);
    }

    #[test]
    fn escaped_entities_are_unescaped() {
        let xml = "<DeviceInfo><deviceName>East &amp; West Gate</deviceName></DeviceInfo>";
        assert_eq!(
            device_name_from_xml(xml).as_deref(),
            Some("East & West Gate")
        );
    }
}
