use base64::{Engine as _, engine::general_purpose};

use crate::errors::DecodeError;

/// Strategy turning a raw message payload into text.
///
/// The variant is chosen once at boot (see
/// [`WorkerConfig::decoder`](crate::worker::WorkerConfig::decoder)) and the
/// worker holds it unchanged for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyDecoder {
    /// The payload is already text.
    Identity,
    /// The payload is base64 encoded UTF-8.
    #[default]
    Base64,
}

impl BodyDecoder {
    /// Selects the decoder from the boolean `decode_base64` switch.
    pub fn from_flag(decode_base64: bool) -> Self {
        if decode_base64 {
            BodyDecoder::Base64
        } else {
            BodyDecoder::Identity
        }
    }

    /// Decodes `payload` into text.
    ///
    /// The identity variant never fails; invalid UTF-8 sequences are replaced
    /// with `U+FFFD`. The base64 variant ignores ASCII whitespace anywhere in
    /// the payload and fails if what remains is not base64 or does not decode
    /// to UTF-8.
    pub fn decode(&self, payload: &[u8]) -> Result<String, DecodeError> {
        match self {
            BodyDecoder::Identity => Ok(String::from_utf8_lossy(payload).into_owned()),
            BodyDecoder::Base64 => {
                let compact: Vec<u8> = payload
                    .iter()
                    .copied()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect();
                let bytes = general_purpose::STANDARD.decode(compact)?;
                Ok(String::from_utf8(bytes)?)
            }
        }
    }
}
