extern crate clap;
use clap::{clap_app, ArgMatches};

use anyhow::{anyhow, bail, Context, Result};
use log::LevelFilter;
use otapack_lib::{
    config::{
        padding::PaddingPolicy,
        security::{SigningMode, TRAILING_CHECKSUM_WIDTH},
        Configuration, RequiredConfigurationStep,
    },
    error::File,
    inspect::inspect,
    metadata::{BuildMetadata, VersionHeaderFile},
    pipeline::{self, AtStage, Outputs, Stage},
    signing::{load_certificate, PemFileStore},
};
use simple_logger::SimpleLogger;
use std::{fs, num::NonZeroU32, process};

const DEFAULT_IMAGE: &str = "OTA_ALL.bin";
const DEFAULT_SIGNED_IMAGE: &str = "OTA_ALL_sig.bin";
const DEFAULT_SIGNATURE: &str = "IDT-OTA-Signature";

fn is_u32(value: String) -> Result<(), String> {
    value
        .parse::<u32>()
        .map(|_| ())
        .map_err(|_| format!("expected an unsigned integer, found {}", value))
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches.value_of(name).ok_or_else(|| anyhow!("missing argument <{}>", name))
}

fn init_logging(verbosity: u64) -> Result<()> {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    SimpleLogger::new().with_level(level).init().context("failed to initialize logging")
}

fn load_configuration(matches: &ArgMatches) -> Result<Configuration> {
    match matches.value_of("config") {
        Some(path) => Configuration::load(path),
        None => Ok(Configuration::default()),
    }
}

/// Applies whichever of the packaging flags the subcommand accepts.
/// Runs that sign or verify need a signing mode; `needs_mode` tells
/// whether this one does.
fn apply_overrides(
    configuration: &mut Configuration,
    matches: &ArgMatches,
    needs_mode: bool,
) -> Result<()> {
    if let Some(block_size) = matches.value_of("block_size") {
        configuration.padding_configuration.block_size = block_size.parse()?;
    }
    if matches.is_present("align_only") {
        configuration.padding_configuration.policy = PaddingPolicy::AlignOnly;
    }

    let mode = &mut configuration.security_configuration.signing_mode;
    match matches.value_of("mode") {
        Some("full") => *mode = Some(SigningMode::FullPayload),
        Some("trailing") => {
            if !matches!(mode, Some(SigningMode::TrailingChecksum(_))) {
                *mode = Some(SigningMode::TrailingChecksum(TRAILING_CHECKSUM_WIDTH));
            }
        }
        Some(other) => bail!("unknown signing mode {}", other),
        None => {}
    }
    if let Some(width) = matches.value_of("trailing_width") {
        match mode {
            Some(SigningMode::TrailingChecksum(_)) => {
                *mode = Some(SigningMode::TrailingChecksum(width.parse()?))
            }
            _ => bail!("--trailing-width only applies to the trailing checksum signing mode"),
        }
    }

    let missing: Vec<String> = configuration
        .required_configuration_steps()
        .filter(|step| needs_mode || *step != RequiredConfigurationStep::SigningMode)
        .map(|step| step.to_string())
        .collect();
    if !missing.is_empty() {
        bail!("incomplete configuration:\n  {}", missing.join("\n  "));
    }
    Ok(())
}

fn load_metadata(matches: &ArgMatches) -> Result<BuildMetadata> {
    let metadata = match (matches.value_of("version_header"), matches.value_of("app_version")) {
        (Some(path), _) => pipeline::load_metadata(&VersionHeaderFile::new(path))?,
        (None, Some(version)) => {
            let literal = version.parse::<BuildMetadata>().at(Stage::Load)?;
            pipeline::load_metadata(&literal)?
        }
        (None, None) => bail!("either --version-header or --app-version is required"),
    };
    Ok(metadata)
}

fn build(configuration: &Configuration, matches: &ArgMatches) -> Result<()> {
    let firmware = pipeline::load_firmware(required(matches, "firmware")?)?;
    let metadata = load_metadata(matches)?;
    let image = pipeline::build_unsigned(configuration, &firmware, &metadata)?;

    let mut outputs = Outputs::new();
    outputs.stage(File::Image, matches.value_of("output").unwrap_or(DEFAULT_IMAGE), &image)?;
    for path in outputs.commit()? {
        println!("Wrote unsigned image to {}.", path.display());
    }
    Ok(())
}

fn package(configuration: &Configuration, matches: &ArgMatches) -> Result<()> {
    let firmware = pipeline::load_firmware(required(matches, "firmware")?)?;
    let metadata = load_metadata(matches)?;
    let store = PemFileStore::new(required(matches, "key")?, required(matches, "certificate")?);
    let signer = pipeline::load_signer(&store)?;

    let output = pipeline::package(configuration, &firmware, &metadata, &signer)?;

    let mut outputs = Outputs::new();
    if let Some(path) = matches.value_of("unsigned") {
        outputs.stage(File::Image, path, &output.unsigned_image)?;
    }
    let signed_path = matches.value_of("output").unwrap_or(DEFAULT_SIGNED_IMAGE);
    outputs.stage(File::SignedImage, signed_path, &output.signed_image)?;
    for path in outputs.commit()? {
        println!("Wrote {}.", path.display());
    }
    println!("Image signed ({} byte signature).", output.signature.len());
    Ok(())
}

fn sign(configuration: &Configuration, matches: &ArgMatches) -> Result<()> {
    let firmware = pipeline::load_firmware(required(matches, "firmware")?)?;
    let store = PemFileStore::new(required(matches, "key")?, required(matches, "certificate")?);
    let signer = pipeline::load_signer(&store)?;

    let detached = pipeline::sign_detached(configuration, &firmware, &signer)?;

    let mut outputs = Outputs::new();
    let path = matches.value_of("output").unwrap_or(DEFAULT_SIGNATURE);
    outputs.stage(File::Signature, path, detached.encoded.as_bytes())?;
    outputs.commit()?;
    println!("Wrote detached signature to {}.", path);
    Ok(())
}

fn verify_signature(configuration: &Configuration, matches: &ArgMatches) -> Result<()> {
    let firmware = pipeline::load_firmware(required(matches, "firmware")?)?;
    let path = matches.value_of("signature").unwrap_or(DEFAULT_SIGNATURE);
    let encoded =
        fs::read_to_string(path).with_context(|| format!("failed to read signature {}", path))?;
    let certificate = load_certificate(required(matches, "certificate")?)?;

    if !pipeline::verify_detached(configuration, &firmware, &encoded, &certificate)? {
        bail!("signature does not verify against the certificate");
    }
    println!("Signature verified.");
    Ok(())
}

fn inspect_image(configuration: &Configuration, matches: &ArgMatches) -> Result<()> {
    let path = required(matches, "image")?;
    let image = fs::read(path).with_context(|| format!("failed to read image {}", path))?;
    let certificate = matches.value_of("certificate").map(load_certificate).transpose()?;
    let block_size = NonZeroU32::new(configuration.padding_configuration.block_size)
        .ok_or_else(|| anyhow!("block size must be non-zero"))?;

    let verification = match (&certificate, configuration.security_configuration.signing_mode) {
        (Some(certificate), Some(mode)) => Some((certificate, mode)),
        (Some(_), None) => bail!("verifying a signature requires a signing mode"),
        (None, _) => None,
    };
    let report = inspect(&image, block_size, verification)?;

    let header = &report.header;
    println!("version:     {}", header.version);
    println!("header_num:  {}", header.header_num);
    println!("marker:      0x{:08x}", header.signature_marker);
    println!("checksum:    0x{:08x}", header.checksum);
    println!("image_len:   {}", header.image_len);
    println!("load_offset: 0x{:x}", header.load_offset);
    println!("reserved:    0x{:08x}", header.reserved);
    if report.is_signed() {
        println!("padding:     {}", report.padding_len);
    }
    match &report.signature {
        Some(signature) => println!("signature:   {}", hex::encode(signature.as_bytes())),
        None => println!("signature:   none"),
    }
    match report.verified {
        Some(true) => println!("Signature verified."),
        Some(false) => bail!("signature does not verify against the certificate"),
        None => {}
    }
    Ok(())
}

fn print_configuration(configuration: &Configuration) -> Result<()> {
    println!("{}", configuration.to_ron()?);
    Ok(())
}

/// Whether the subcommand signs or checks a signature, and so needs a signing mode.
fn needs_signing_mode(name: &str, matches: &ArgMatches) -> bool {
    match name {
        "package" | "sign" | "verify" => true,
        "inspect" => matches.is_present("certificate"),
        _ => false,
    }
}

fn run() -> Result<()> {
    let matches = clap_app!(app =>
        (name: env!("CARGO_PKG_NAME"))
        (version: env!("CARGO_PKG_VERSION"))
        (about: env!("CARGO_PKG_DESCRIPTION"))
        (@setting SubcommandRequiredElseHelp)
        (@arg config: -c --config +takes_value
            "RON configuration file. Defaults match the Ameba OTA agent.")
        (@arg verbose: -v --verbose +multiple
            "Log progress (-v) or every intermediate value (-vv).")
        (@subcommand build =>
            (about: "Writes the unsigned OTA image (header and payload).")
            (@arg firmware: +required "The firmware binary to package.")
            (@arg output: -o --output +takes_value "Output path [default: OTA_ALL.bin].")
            (@arg version_header: --("version-header") +takes_value
                "C header defining APP_VERSION_MAJOR/MINOR/BUILD.")
            (@arg app_version: --("app-version") +takes_value conflicts_with[version_header]
                "Version as MAJOR.MINOR.BUILD.")
        )
        (@subcommand package =>
            (about: "Builds the OTA image and embeds its signature.")
            (@arg firmware: +required "The firmware binary to package.")
            (@arg key: -k --key +takes_value +required "PEM encoded EC P-256 private key.")
            (@arg certificate: -C --certificate +takes_value +required
                "PEM encoded X.509 certificate of the key.")
            (@arg output: -o --output +takes_value
                "Signed image path [default: OTA_ALL_sig.bin].")
            (@arg unsigned: --unsigned +takes_value "Also write the unsigned image to this path.")
            (@arg version_header: --("version-header") +takes_value
                "C header defining APP_VERSION_MAJOR/MINOR/BUILD.")
            (@arg app_version: --("app-version") +takes_value conflicts_with[version_header]
                "Version as MAJOR.MINOR.BUILD.")
            (@arg mode: --mode +takes_value possible_value[full trailing]
                "Region of the firmware to sign.")
            (@arg trailing_width: --("trailing-width") +takes_value {is_u32}
                "Width of the trailing checksum field.")
            (@arg block_size: --("block-size") +takes_value {is_u32}
                "Block size the image is padded to.")
            (@arg align_only: --("align-only")
                "Do not pad images that are already block aligned.")
        )
        (@subcommand sign =>
            (about: "Writes a detached, base64 encoded signature of the firmware.")
            (@arg firmware: +required "The firmware binary to sign.")
            (@arg key: -k --key +takes_value +required "PEM encoded EC P-256 private key.")
            (@arg certificate: -C --certificate +takes_value +required
                "PEM encoded X.509 certificate of the key.")
            (@arg output: -o --output +takes_value
                "Signature path [default: IDT-OTA-Signature].")
            (@arg mode: --mode +takes_value possible_value[full trailing]
                "Region of the firmware to sign.")
            (@arg trailing_width: --("trailing-width") +takes_value {is_u32}
                "Width of the trailing checksum field.")
        )
        (@subcommand verify =>
            (about: "Checks a detached signature against the firmware it was made for.")
            (@arg firmware: +required "The firmware binary that was signed.")
            (@arg signature: -s --signature +takes_value
                "Signature path [default: IDT-OTA-Signature].")
            (@arg certificate: -C --certificate +takes_value +required
                "PEM encoded X.509 certificate of the signing key.")
            (@arg mode: --mode +takes_value possible_value[full trailing]
                "Region of the firmware that was signed.")
            (@arg trailing_width: --("trailing-width") +takes_value {is_u32}
                "Width of the trailing checksum field.")
        )
        (@subcommand inspect =>
            (about: "Checks an unsigned or signed OTA image.")
            (@arg image: +required "The OTA image to check.")
            (@arg certificate: -C --certificate +takes_value
                "Verify the embedded signature against this certificate.")
            (@arg mode: --mode +takes_value possible_value[full trailing]
                "Region of the firmware that was signed.")
            (@arg trailing_width: --("trailing-width") +takes_value {is_u32}
                "Width of the trailing checksum field.")
            (@arg block_size: --("block-size") +takes_value {is_u32}
                "Block size the image was padded to.")
        )
        (@subcommand config =>
            (about: "Prints the configuration in effect, as RON.")
        )
    )
    .get_matches();

    init_logging(matches.occurrences_of("verbose"))?;
    let mut configuration = load_configuration(&matches)?;

    match matches.subcommand() {
        (name, Some(subcommand)) => {
            let needs_mode = needs_signing_mode(name, subcommand);
            apply_overrides(&mut configuration, subcommand, needs_mode)?;
            match name {
                "build" => build(&configuration, subcommand),
                "package" => package(&configuration, subcommand),
                "sign" => sign(&configuration, subcommand),
                "verify" => verify_signature(&configuration, subcommand),
                "inspect" => inspect_image(&configuration, subcommand),
                "config" => print_configuration(&configuration),
                _ => bail!("unknown subcommand {}", name),
            }
        }
        _ => bail!("no subcommand given"),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
