//! Charset negotiation between codecs and the repository record.
//!
//! A codec whose output is text gets its artifact stored as text in the
//! negotiated charset. Any other codec gets its artifact base64 armored.

use std::fmt;

use crate::codec::Codec;
use crate::error::{LicenseError, LicenseResult};

/// The charsets a codec may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Charset {
    UsAscii,
    Iso8859_1,
    Utf8,
    /// Detects the byte order from a BOM, defaulting to big endian, and
    /// encodes big endian with a BOM.
    Utf16,
    Utf16Be,
    Utf16Le,
}

impl Charset {
    /// Looks up a charset by its IANA name or a common alias, ignoring case.
    pub fn for_name(name: &str) -> LicenseResult<Self> {
        let charset = match name.trim().to_ascii_lowercase().as_str() {
            "us-ascii" | "ascii" | "us" | "iso646-us" => Self::UsAscii,
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" | "latin1" | "l1" => Self::Iso8859_1,
            "utf-8" | "utf8" => Self::Utf8,
            "utf-16" | "utf16" => Self::Utf16,
            "utf-16be" | "utf16be" => Self::Utf16Be,
            "utf-16le" | "utf16le" => Self::Utf16Le,
            _ => {
                return Err(LicenseError::Configuration(format!(
                    "unsupported charset: {name}"
                )));
            }
        };
        Ok(charset)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::UsAscii => "US-ASCII",
            Self::Iso8859_1 => "ISO-8859-1",
            Self::Utf8 => "UTF-8",
            Self::Utf16 => "UTF-16",
            Self::Utf16Be => "UTF-16BE",
            Self::Utf16Le => "UTF-16LE",
        }
    }

    /// Decodes bytes into text, failing on any malformed or unmappable input.
    pub fn decode(&self, bytes: &[u8]) -> LicenseResult<String> {
        match self {
            Self::UsAscii => {
                if let Some(b) = bytes.iter().find(|b| !b.is_ascii()) {
                    return Err(self.error(format!("byte {b:#04x} is not ASCII")));
                }
                Ok(bytes.iter().map(|&b| char::from(b)).collect())
            }
            Self::Iso8859_1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Self::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| self.error(e.to_string())),
            Self::Utf16 => match bytes {
                [0xfe, 0xff, rest @ ..] => self.decode_utf16(rest, u16::from_be_bytes),
                [0xff, 0xfe, rest @ ..] => self.decode_utf16(rest, u16::from_le_bytes),
                _ => self.decode_utf16(bytes, u16::from_be_bytes),
            },
            Self::Utf16Be => self.decode_utf16(bytes, u16::from_be_bytes),
            Self::Utf16Le => self.decode_utf16(bytes, u16::from_le_bytes),
        }
    }

    /// Encodes text, failing on characters the charset cannot represent.
    pub fn encode(&self, text: &str) -> LicenseResult<Vec<u8>> {
        match self {
            Self::UsAscii => self.encode_narrow(text, 0x7f),
            Self::Iso8859_1 => self.encode_narrow(text, 0xff),
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Utf16 => {
                let mut out = vec![0xfe, 0xff];
                out.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
                Ok(out)
            }
            Self::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Self::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        }
    }

    fn decode_utf16(&self, bytes: &[u8], unit: fn([u8; 2]) -> u16) -> LicenseResult<String> {
        if bytes.len() % 2 != 0 {
            return Err(self.error("odd number of bytes".into()));
        }
        let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
        char::decode_utf16(units)
            .collect::<Result<String, _>>()
            .map_err(|e| self.error(e.to_string()))
    }

    fn encode_narrow(&self, text: &str, max: u32) -> LicenseResult<Vec<u8>> {
        text.chars()
            .map(|c| {
                u8::try_from(u32::from(c))
                    .ok()
                    .filter(|b| u32::from(*b) <= max)
                    .ok_or_else(|| self.error(format!("cannot encode {c:?}")))
            })
            .collect()
    }

    fn error(&self, detail: String) -> LicenseError {
        LicenseError::Charset(format!("{}: {detail}", self.name()))
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the charset for storing the codec's output as text, or `None` if
/// the output is binary and needs base64 armor.
pub fn content_transfer_charset(codec: &dyn Codec) -> LicenseResult<Option<Charset>> {
    let encoding = codec.content_transfer_encoding().trim();
    if ["7bit", "quoted-printable", "base64"]
        .iter()
        .any(|e| encoding.eq_ignore_ascii_case(e))
    {
        return Ok(Some(Charset::UsAscii));
    }
    if encoding.eq_ignore_ascii_case("8bit") {
        return match charset_parameter(codec.content_type()) {
            Some(name) => Charset::for_name(name).map(Some),
            None => Ok(Some(Charset::Utf8)),
        };
    }
    Ok(None)
}

/// Extracts the `charset` parameter of a MIME content type.
fn charset_parameter(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim();
        Some(
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value),
        )
    })
}
