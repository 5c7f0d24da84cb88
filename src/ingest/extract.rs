//! Archive and compressed-stream decoding.
//!
//! Flow log exports arrive as zip containers holding one or more CSV
//! members, as single gzip streams, or as plain CSV. The format is sniffed
//! from the object name suffix only. A decode failure on one member is
//! scoped to that member and never aborts its siblings.

use std::io::{Cursor, Read};

use flate2::read::GzDecoder;

use crate::error::ExtractError;

/// One delimited-text payload recovered from a blob.
#[derive(Debug, Clone)]
pub struct Payload {
    /// Member name inside an archive, or the blob name itself.
    pub member: String,
    pub text: String,
}

/// Decode a named blob into its delimited-text payloads.
///
/// - `.zip`: every `.csv` member is decompressed and yielded; other members
///   are skipped.
/// - `.gz`: the whole stream is decompressed and yielded as one payload
///   under the original name.
/// - anything else: passed through unchanged, assumed plain delimited text.
pub fn extract(name: &str, content: &[u8]) -> Vec<Result<Payload, ExtractError>> {
    let lower = name.to_lowercase();
    if lower.ends_with(".zip") {
        extract_zip(name, content)
    } else if lower.ends_with(".gz") {
        vec![extract_gz(name, content)]
    } else {
        vec![Ok(Payload {
            member: name.to_string(),
            text: String::from_utf8_lossy(content).into_owned(),
        })]
    }
}

fn extract_zip(name: &str, content: &[u8]) -> Vec<Result<Payload, ExtractError>> {
    let mut archive = match zip::ZipArchive::new(Cursor::new(content)) {
        Ok(archive) => archive,
        Err(err) => {
            return vec![Err(ExtractError::BadArchive {
                name: name.to_string(),
                reason: err.to_string(),
            })]
        }
    };

    let mut payloads = Vec::new();
    for i in 0..archive.len() {
        let mut member = match archive.by_index(i) {
            Ok(member) => member,
            Err(err) => {
                payloads.push(Err(ExtractError::BadMember {
                    name: name.to_string(),
                    member: format!("#{}", i),
                    reason: err.to_string(),
                }));
                continue;
            }
        };
        if !member.name().to_lowercase().ends_with(".csv") {
            continue;
        }
        let member_name = member.name().to_string();
        let mut buf = Vec::new();
        match member.read_to_end(&mut buf) {
            Ok(_) => payloads.push(Ok(Payload {
                member: member_name,
                text: String::from_utf8_lossy(&buf).into_owned(),
            })),
            Err(err) => payloads.push(Err(ExtractError::BadMember {
                name: name.to_string(),
                member: member_name,
                reason: err.to_string(),
            })),
        }
    }
    payloads
}

fn extract_gz(name: &str, content: &[u8]) -> Result<Payload, ExtractError> {
    let mut decoder = GzDecoder::new(content);
    let mut buf = Vec::new();
    decoder
        .read_to_end(&mut buf)
        .map_err(|err| ExtractError::BadStream {
            name: name.to_string(),
            reason: err.to_string(),
        })?;
    Ok(Payload {
        member: name.to_string(),
        text: String::from_utf8_lossy(&buf).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in members {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn gz_bytes(content: &str) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_zip_yields_csv_members_only() {
        let bytes = zip_bytes(&[
            ("flows.csv", "src_ip\n1.1.1.1\n"),
            ("notes.txt", "ignore me"),
            ("more.CSV", "dst_ip\n2.2.2.2\n"),
        ]);
        let payloads: Vec<_> = extract("logs.zip", &bytes)
            .into_iter()
            .map(|p| p.unwrap())
            .collect();

        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].member, "flows.csv");
        assert!(payloads[1].text.contains("2.2.2.2"));
    }

    #[test]
    fn test_gz_round_trip() {
        let bytes = gz_bytes("src_ip\n1.1.1.1\n");
        let payloads = extract("flows.csv.gz", &bytes);
        assert_eq!(payloads.len(), 1);
        let payload = payloads[0].as_ref().unwrap();
        assert_eq!(payload.member, "flows.csv.gz");
        assert_eq!(payload.text, "src_ip\n1.1.1.1\n");
    }

    #[test]
    fn test_plain_content_passes_through() {
        let payloads = extract("flows.csv", b"src_ip\n1.1.1.1\n");
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].as_ref().unwrap().text, "src_ip\n1.1.1.1\n");
    }

    #[test]
    fn test_corrupt_zip_is_one_error() {
        let payloads = extract("broken.zip", b"this is not a zip");
        assert_eq!(payloads.len(), 1);
        assert!(matches!(
            payloads[0],
            Err(ExtractError::BadArchive { .. })
        ));
    }

    #[test]
    fn test_corrupt_gz_is_one_error() {
        let payloads = extract("broken.gz", b"this is not gzip");
        assert_eq!(payloads.len(), 1);
        assert!(matches!(payloads[0], Err(ExtractError::BadStream { .. })));
    }
}
