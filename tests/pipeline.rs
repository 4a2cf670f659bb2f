use otapack_lib::{
    config::{security::SigningMode, Configuration},
    error::{Error, File},
    image::{compute_checksum, OtaHeader, HEADER_SIZE},
    inspect::inspect,
    metadata::VersionHeaderFile,
    packaging::{decode_detached, split_trailer},
    pipeline::{self, Outputs, Stage},
    signing::{verify, PemFileStore},
};
use std::{
    fs,
    num::NonZeroU32,
    path::{Path, PathBuf},
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn configured(mode: SigningMode) -> Configuration {
    let mut configuration = Configuration::default();
    configuration.security_configuration.signing_mode = Some(mode);
    configuration
}

fn signer_store() -> PemFileStore {
    PemFileStore::new(fixture("signer.key.pem"), fixture("signer.crt.pem"))
}

fn write_inputs(directory: &Path, firmware_len: usize) -> (PathBuf, PathBuf) {
    let firmware: Vec<u8> = (0..firmware_len).map(|i| (i * 13 % 256) as u8).collect();
    let firmware_path = directory.join("firmware.bin");
    fs::write(&firmware_path, &firmware).unwrap();

    let version_path = directory.join("aws_application_version.h");
    fs::write(
        &version_path,
        "#define APP_VERSION_MAJOR 1\n#define APP_VERSION_MINOR 2\n#define APP_VERSION_BUILD 3\n",
    )
    .unwrap();
    (firmware_path, version_path)
}

#[test]
fn embedded_package_end_to_end() {
    let directory = tempfile::tempdir().unwrap();
    let (firmware_path, version_path) = write_inputs(directory.path(), 100_000);
    let configuration = configured(SigningMode::FullPayload);

    let firmware = pipeline::load_firmware(&firmware_path).unwrap();
    let metadata = pipeline::load_metadata(&VersionHeaderFile::new(&version_path)).unwrap();
    let signer = pipeline::load_signer(&signer_store()).unwrap();
    let output = pipeline::package(&configuration, &firmware, &metadata, &signer).unwrap();

    let unsigned_path = directory.path().join("OTA_ALL.bin");
    let signed_path = directory.path().join("OTA_ALL_sig.bin");
    let mut outputs = Outputs::new();
    outputs.stage(File::Image, &unsigned_path, &output.unsigned_image).unwrap();
    outputs.stage(File::SignedImage, &signed_path, &output.signed_image).unwrap();
    outputs.commit().unwrap();

    let unsigned = fs::read(&unsigned_path).unwrap();
    let header = OtaHeader::from_bytes(&unsigned).unwrap();
    assert_eq!(header.version, 1_002_003);
    assert_eq!(header.header_len, 24);
    assert_eq!(header.image_len, 100_000);
    assert_eq!(header.checksum, compute_checksum(&firmware));
    assert_eq!(unsigned.len(), HEADER_SIZE + 100_000);

    // 100032 bytes pad to the next multiple of 1024.
    let signed = fs::read(&signed_path).unwrap();
    let (padded, signature) = split_trailer(&signed).unwrap();
    assert_eq!(padded.len(), 100_352);
    assert_eq!(&padded[..unsigned.len()], unsigned.as_slice());
    assert!(padded[unsigned.len()..].iter().all(|&b| b == 0));
    assert!(verify(signer.certificate(), &signature, &firmware));

    let block_size = NonZeroU32::new(1024).unwrap();
    let verification = Some((signer.certificate(), SigningMode::FullPayload));
    let report = inspect(&signed, block_size, verification).unwrap();
    assert!(report.is_signed());
    assert_eq!(report.verified, Some(true));
}

#[test]
fn detached_signature_end_to_end() {
    let directory = tempfile::tempdir().unwrap();
    let (firmware_path, _) = write_inputs(directory.path(), 5000);
    let configuration = configured(SigningMode::TrailingChecksum(4));

    let firmware = pipeline::load_firmware(&firmware_path).unwrap();
    let signer = pipeline::load_signer(&signer_store()).unwrap();
    let detached = pipeline::sign_detached(&configuration, &firmware, &signer).unwrap();

    let signature_path = directory.path().join("IDT-OTA-Signature");
    let mut outputs = Outputs::new();
    outputs.stage(File::Signature, &signature_path, detached.encoded.as_bytes()).unwrap();
    outputs.commit().unwrap();

    let text = fs::read_to_string(&signature_path).unwrap();
    assert!(!text.contains('\n'));
    let signature = decode_detached(&text).unwrap();
    assert!(verify(signer.certificate(), &signature, &firmware[4996..]));

    let certificate = signer.certificate();
    assert!(pipeline::verify_detached(&configuration, &firmware, &text, certificate).unwrap());
    let full = configured(SigningMode::FullPayload);
    assert!(!pipeline::verify_detached(&full, &firmware, &text, certificate).unwrap());
}

#[test]
fn signing_without_a_mode_writes_nothing() {
    let directory = tempfile::tempdir().unwrap();
    let (firmware_path, version_path) = write_inputs(directory.path(), 2000);

    let firmware = pipeline::load_firmware(&firmware_path).unwrap();
    let metadata = pipeline::load_metadata(&VersionHeaderFile::new(&version_path)).unwrap();
    let signer = pipeline::load_signer(&signer_store()).unwrap();
    let configuration = Configuration::default();

    let failure = pipeline::package(&configuration, &firmware, &metadata, &signer).unwrap_err();
    assert_eq!(failure.stage, Stage::Sign);
    assert_eq!(failure.error, Error::SigningModeUnset);
    let failure = pipeline::sign_detached(&configuration, &firmware, &signer).unwrap_err();
    assert_eq!(failure.error, Error::SigningModeUnset);

    // Unsigned builds do not depend on a signing mode.
    let image = pipeline::build_unsigned(&configuration, &firmware, &metadata).unwrap();
    assert_eq!(image.len(), HEADER_SIZE + 2000);
    assert_eq!(&image[HEADER_SIZE..], firmware.as_slice());
}

#[test]
fn self_verification_failure_leaves_no_output() {
    let directory = tempfile::tempdir().unwrap();
    let (firmware_path, version_path) = write_inputs(directory.path(), 2000);
    let store = PemFileStore::new(fixture("signer.key.pem"), fixture("other.crt.pem"));

    let firmware = pipeline::load_firmware(&firmware_path).unwrap();
    let metadata = pipeline::load_metadata(&VersionHeaderFile::new(&version_path)).unwrap();
    let signer = pipeline::load_signer(&store).unwrap();
    let configuration = configured(SigningMode::FullPayload);
    let failure = pipeline::package(&configuration, &firmware, &metadata, &signer).unwrap_err();

    assert_eq!(failure.stage, Stage::SelfVerify);
    assert_eq!(failure.error, Error::Verification);
    assert!(!directory.path().join("OTA_ALL_sig.bin").exists());
}

#[test]
fn missing_inputs_are_reported_at_load() {
    let store = PemFileStore::new(fixture("signer.key.pem"), fixture("absent.crt.pem"));
    let failure = pipeline::load_signer(&store).err().unwrap();
    assert_eq!(failure.stage, Stage::Load);
    assert_eq!(failure.error, Error::InputNotFound(File::Certificate));

    let store = PemFileStore::new(fixture("p384.key.pem"), fixture("signer.crt.pem"));
    let failure = pipeline::load_signer(&store).err().unwrap();
    assert_eq!(failure.error, Error::KeyFormat(File::Key));
    assert_eq!(failure.to_string(), "[load] Failed to parse the private key (expected EC P-256).");
}
