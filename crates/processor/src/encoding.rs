//! Ordered text encoding fallback

use dropwatch_core::error::{Error, Result};
use encoding_rs::Encoding;
use std::borrow::Cow;

/// Labels decoded as ISO-8859-1 proper rather than the WHATWG windows-1252 alias
const LATIN1_LABELS: &[&str] = &["latin-1", "latin1", "iso-8859-1", "iso8859-1", "l1"];

/// One decodable encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Byte `n` maps to code point `n`; never fails
    Latin1,
    /// Any encoding known to `encoding_rs`, decoded strictly
    Whatwg(&'static Encoding),
}

impl TextEncoding {
    /// Resolve an encoding label such as `utf-8`, `cp1251` or `latin-1`
    pub fn from_label(label: &str) -> Result<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        if LATIN1_LABELS.contains(&normalized.as_str()) {
            return Ok(Self::Latin1);
        }
        Encoding::for_label(normalized.as_bytes())
            .map(Self::Whatwg)
            .ok_or_else(|| Error::config(format!("Unknown encoding '{label}'")))
    }

    /// Decode all of `bytes`, or `None` if they are malformed for this encoding
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            Self::Latin1 => Some(encoding_rs::mem::decode_latin1(bytes)),
            Self::Whatwg(encoding) => encoding.decode_without_bom_handling_and_without_replacement(bytes),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Latin1 => "ISO-8859-1",
            Self::Whatwg(encoding) => encoding.name(),
        }
    }
}

/// Encodings tried in order; the first clean decode wins
#[derive(Debug, Clone)]
pub struct EncodingChain {
    entries: Vec<(String, TextEncoding)>,
}

impl EncodingChain {
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::config("At least one encoding is required"));
        }
        let entries = labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                TextEncoding::from_label(label).map(|encoding| (label.to_string(), encoding))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Decode with the first encoding that accepts `bytes`
    ///
    /// Returns the configured label that succeeded alongside the text.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<(&str, Cow<'a, str>)> {
        self.entries.iter().find_map(|(label, encoding)| {
            encoding
                .decode(bytes)
                .map(|text| (label.as_str(), text))
        })
    }

    /// Configured labels, in trial order
    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|(label, _)| label.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolves_default_labels() {
        assert_eq!(TextEncoding::from_label("utf-8").unwrap().name(), "UTF-8");
        assert_eq!(TextEncoding::from_label("cp1251").unwrap().name(), "windows-1251");
        assert_eq!(
            TextEncoding::from_label("Windows-1251").unwrap().name(),
            "windows-1251"
        );
        assert_eq!(TextEncoding::from_label("latin-1").unwrap(), TextEncoding::Latin1);
        assert_eq!(TextEncoding::from_label("ISO-8859-1").unwrap(), TextEncoding::Latin1);
    }

    #[test]
    fn test_unknown_label_rejected() {
        assert!(matches!(
            TextEncoding::from_label("klingon-8"),
            Err(Error::Config(_))
        ));
        assert!(EncodingChain::from_labels(&["utf-8", "nope"]).is_err());
        assert!(EncodingChain::from_labels::<&str>(&[]).is_err());
    }

    #[test]
    fn test_utf8_is_strict() {
        let utf8 = TextEncoding::from_label("utf-8").unwrap();
        assert!(utf8.decode(&[0xCF, 0xF0, 0xE8]).is_none());
        assert_eq!(utf8.decode("héllo".as_bytes()).unwrap(), "héllo");
    }

    #[test]
    fn test_latin1_maps_every_byte() {
        let bytes: Vec<u8> = (0..=255).collect();
        let text = TextEncoding::Latin1.decode(&bytes).unwrap();
        assert_eq!(text.chars().count(), 256);
        assert_eq!(text.chars().nth(0x80), Some('\u{80}'));
    }

    #[test]
    fn test_chain_falls_back_in_order() {
        let chain = EncodingChain::from_labels(&["utf-8", "cp1251", "latin-1"]).unwrap();
        let (encoded, _, _) = encoding_rs::WINDOWS_1251.encode("Привет");

        let (label, text) = chain.decode(&encoded).unwrap();
        assert_eq!(label, "cp1251");
        assert_eq!(text, "Привет");

        let (label, _) = chain.decode(b"plain ascii").unwrap();
        assert_eq!(label, "utf-8");
    }
}
