use bacstack_core::apdu::Apdu;
use bacstack_core::services::{
    ConfirmedServiceAck, ConfirmedServiceRequest, UnconfirmedServiceRequest,
};
use bacstack_core::{decode_apdu, decode_npdu, encode_apdu, encode_npdu};
use std::fs;
use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .expect("workspace root should be resolvable")
}

fn parse_hex_fixture(path: &Path) -> Vec<u8> {
    let content = fs::read_to_string(path).expect("fixture must be readable");
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(str::split_whitespace)
        .map(|token| {
            u8::from_str_radix(token, 16)
                .unwrap_or_else(|_| panic!("invalid hex token '{token}' in {}", path.display()))
        })
        .collect()
}

fn fixtures() -> Vec<PathBuf> {
    let dir = workspace_root().join("fixtures/golden");
    let mut files = fs::read_dir(&dir)
        .expect("fixtures directory should exist")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "hex"))
        .collect::<Vec<_>>();
    files.sort();
    assert!(!files.is_empty(), "no fixtures in {}", dir.display());
    files
}

#[test]
fn every_fixture_decodes_and_reencodes_bit_exact() {
    for fixture in fixtures() {
        let bytes = parse_hex_fixture(&fixture);
        let npdu = decode_npdu(&bytes)
            .unwrap_or_else(|e| panic!("{}: npdu decode failed: {e}", fixture.display()));
        assert_eq!(
            encode_npdu(&npdu).unwrap(),
            bytes,
            "{}: npdu re-encode differs",
            fixture.display()
        );

        let apdu = decode_apdu(&npdu.payload)
            .unwrap_or_else(|e| panic!("{}: apdu decode failed: {e}", fixture.display()));
        assert_eq!(encode_apdu(&apdu).unwrap(), npdu.payload);

        let services = match &apdu {
            Apdu::ConfirmedRequest(req) => {
                ConfirmedServiceRequest::decode(req.service_choice, &req.service_data).map(drop)
            }
            Apdu::UnconfirmedRequest(req) => {
                UnconfirmedServiceRequest::decode(req.service_choice, &req.service_data).map(drop)
            }
            Apdu::ComplexAck(ack) => {
                ConfirmedServiceAck::decode_complex(ack.service_choice, &ack.service_data)
                    .map(drop)
            }
            _ => Ok(()),
        };
        services.unwrap_or_else(|e| panic!("{}: service decode failed: {e}", fixture.display()));
    }
}

#[test]
fn every_fixture_prefix_fails_cleanly() {
    for fixture in fixtures() {
        let bytes = parse_hex_fixture(&fixture);
        for cut in 0..bytes.len() {
            if let Ok(npdu) = decode_npdu(&bytes[..cut]) {
                let _ = decode_apdu(&npdu.payload);
            }
        }
    }
}
