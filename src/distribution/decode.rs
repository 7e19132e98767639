//! `docZip` payloads: base64 over gzip.

use std::io::{Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::core::{Nsu, SefazError};

/// Upper bound on one decompressed document.
pub const MAX_DOCUMENT_BYTES: u64 = 16 * 1024 * 1024;

/// Reverse the transport encoding of one record. ASCII whitespace inside
/// the base64 text is ignored. Documents that inflate past
/// [`MAX_DOCUMENT_BYTES`] are rejected.
pub fn decode_document(nsu: Nsu, payload: &str) -> Result<Vec<u8>, SefazError> {
    decode_bounded(nsu, payload, MAX_DOCUMENT_BYTES)
}

fn decode_bounded(nsu: Nsu, payload: &str, limit: u64) -> Result<Vec<u8>, SefazError> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let compressed = STANDARD.decode(compact.as_bytes()).map_err(|e| SefazError::Decode {
        nsu,
        message: format!("invalid base64: {e}"),
    })?;
    let capacity = (compressed.len() as u64).saturating_mul(4).min(limit);
    let mut xml = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));
    GzDecoder::new(compressed.as_slice())
        .take(limit + 1)
        .read_to_end(&mut xml)
        .map_err(|e| SefazError::Decode {
            nsu,
            message: format!("invalid gzip stream: {e}"),
        })?;
    if xml.len() as u64 > limit {
        return Err(SefazError::Decode {
            nsu,
            message: format!("document inflates past {limit} bytes"),
        });
    }
    tracing::debug!(nsu = %nsu, compressed = compressed.len(), bytes = xml.len(), "decoded document");
    Ok(xml)
}

/// Produce a `docZip` payload from raw XML.
pub fn encode_document(xml: &[u8]) -> Result<String, SefazError> {
    Ok(STANDARD.encode(gzip_into(Vec::new(), xml)?))
}

fn gzip_into<W: Write>(sink: W, xml: &[u8]) -> Result<W, SefazError> {
    let mut encoder = GzEncoder::new(sink, Compression::default());
    encoder
        .write_all(xml)
        .map_err(|e| SefazError::Encode(format!("gzip failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SefazError::Encode(format!("gzip failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_in_base64_is_ignored() {
        let encoded = encode_document(b"<resNFe/>").unwrap();
        let wrapped: String = encoded
            .as_bytes()
            .chunks(10)
            .map(|c| format!("{}\n  ", std::str::from_utf8(c).unwrap()))
            .collect();
        assert_eq!(decode_document(Nsu(1), &wrapped).unwrap(), b"<resNFe/>");
    }

    #[test]
    fn bad_base64_reports_nsu() {
        match decode_document(Nsu(42), "!!!") {
            Err(SefazError::Decode { nsu, message }) => {
                assert_eq!(nsu, Nsu(42));
                assert!(message.contains("base64"));
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    struct FullSink;

    impl Write for FullSink {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::StorageFull, "sink full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn gzip_failure_is_an_encode_error() {
        match gzip_into(FullSink, b"<resNFe/>") {
            Err(SefazError::Encode(message)) => assert!(message.contains("sink full")),
            Err(other) => panic!("expected encode error, got {other:?}"),
            Ok(_) => panic!("expected encode error"),
        }
    }

    #[test]
    fn oversized_document_is_rejected() {
        let encoded = encode_document(&[b' '; 4096]).unwrap();
        assert_eq!(decode_bounded(Nsu(3), &encoded, 4096).unwrap().len(), 4096);
        match decode_bounded(Nsu(3), &encoded, 4095) {
            Err(SefazError::Decode { nsu, message }) => {
                assert_eq!(nsu, Nsu(3));
                assert!(message.contains("4095"));
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn bad_gzip_reports_nsu() {
        let not_gzip = STANDARD.encode(b"plain text");
        match decode_document(Nsu(7), &not_gzip) {
            Err(SefazError::Decode { nsu, message }) => {
                assert_eq!(nsu, Nsu(7));
                assert!(message.contains("gzip"));
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}
