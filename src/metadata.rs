//! Firmware build metadata.
//!
//! The OTA header carries the application version as a single decimal
//! encoded word (`major * 1_000_000 + minor * 1_000 + build`). The three
//! components normally come from the application's version header, which
//! [`VersionHeaderFile`] scans; any other source can implement
//! [`MetadataSource`].
use crate::error::{Error, File};
use log::{debug, error, warn};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

pub const MAJOR_KEY: &str = "APP_VERSION_MAJOR";
pub const MINOR_KEY: &str = "APP_VERSION_MINOR";
pub const BUILD_KEY: &str = "APP_VERSION_BUILD";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildMetadata {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
}

impl BuildMetadata {
    pub fn new(major: u32, minor: u32, build: u32) -> Self { Self { major, minor, build } }

    /// Version word as stored in the OTA header.
    pub fn version(&self) -> Result<u32, Error> {
        if self.minor >= 1_000 || self.build >= 1_000 {
            warn!(
                "Version {} has a component above 999; the encoded version is ambiguous",
                self
            );
        }
        let version = u64::from(self.major) * 1_000_000
            + u64::from(self.minor) * 1_000
            + u64::from(self.build);
        u32::try_from(version).map_err(|_| Error::Range("firmware version exceeds 32 bits"))
    }
}

impl std::fmt::Display for BuildMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Parses a `MAJOR.MINOR.BUILD` literal.
impl FromStr for BuildMetadata {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut components = s.trim().split('.');
        let mut next = |key: &'static str| {
            components.next().and_then(|c| c.parse::<u32>().ok()).ok_or(Error::MetadataMissing(key))
        };
        let metadata =
            Self { major: next(MAJOR_KEY)?, minor: next(MINOR_KEY)?, build: next(BUILD_KEY)? };
        match components.next() {
            None => Ok(metadata),
            Some(_) => Err(Error::MetadataMissing("a MAJOR.MINOR.BUILD version")),
        }
    }
}

/// Anything able to produce the three version components.
pub trait MetadataSource {
    fn load(&self) -> Result<BuildMetadata, Error>;
}

impl MetadataSource for BuildMetadata {
    fn load(&self) -> Result<BuildMetadata, Error> { Ok(*self) }
}

/// C header declaring the application version through `#define`s.
pub struct VersionHeaderFile {
    path: PathBuf,
}

impl VersionHeaderFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self { Self { path: path.as_ref().to_owned() } }
}

impl MetadataSource for VersionHeaderFile {
    fn load(&self) -> Result<BuildMetadata, Error> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            error!("Cannot read version header {}: {}", self.path.display(), e);
            Error::InputNotFound(File::VersionHeader)
        })?;
        let metadata = parse_version_header(&text)?;
        debug!("Read version {} from {}", metadata, self.path.display());
        Ok(metadata)
    }
}

/// Scans header text for the three version defines. The value is the
/// token following the key, e.g. `#define APP_VERSION_MAJOR 1`.
pub fn parse_version_header(text: &str) -> Result<BuildMetadata, Error> {
    let find = |key: &'static str| {
        text.lines()
            .filter_map(|line| {
                let mut tokens = line.split_whitespace();
                tokens.next()?;
                (tokens.next()? == key).then(|| tokens.next()).flatten()
            })
            .find_map(parse_define_value)
            .ok_or(Error::MetadataMissing(key))
    };

    Ok(BuildMetadata { major: find(MAJOR_KEY)?, minor: find(MINOR_KEY)?, build: find(BUILD_KEY)? })
}

fn parse_define_value(token: &str) -> Option<u32> {
    token
        .trim_matches(|c: char| c == '(' || c == ')')
        .trim_end_matches(|c: char| c == 'u' || c == 'U')
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSION_HEADER: &str = "\
#ifndef _AWS_APPLICATION_VERSION_H_
#define _AWS_APPLICATION_VERSION_H_

#include \"iot_appversion32.h\"
extern const AppVersion32_t xAppFirmwareVersion;

#define APP_VERSION_MAJOR    1
#define APP_VERSION_MINOR    2
#define APP_VERSION_BUILD    3

#endif
";

    #[test]
    fn version_is_decimal_encoded() {
        assert_eq!(BuildMetadata::new(1, 2, 3).version().unwrap(), 1_002_003);
        assert_eq!(BuildMetadata::new(0, 9, 12).version().unwrap(), 9_012);
        assert_eq!(BuildMetadata::new(4294, 967, 295).version().unwrap(), u32::MAX);
    }

    #[test]
    fn version_beyond_32_bits_is_a_range_error() {
        assert!(matches!(BuildMetadata::new(4295, 0, 0).version(), Err(Error::Range(_))));
        assert!(matches!(BuildMetadata::new(u32::MAX, 0, 0).version(), Err(Error::Range(_))));
    }

    #[test]
    fn version_header_defines_are_parsed() {
        assert_eq!(parse_version_header(VERSION_HEADER).unwrap(), BuildMetadata::new(1, 2, 3));
    }

    #[test]
    fn suffixed_and_parenthesized_values_are_accepted() {
        let text = "#define APP_VERSION_MAJOR (2)\n\
                    #define APP_VERSION_MINOR 10u\n\
                    #define APP_VERSION_BUILD 7U\n";
        assert_eq!(parse_version_header(text).unwrap(), BuildMetadata::new(2, 10, 7));
    }

    #[test]
    fn guards_mentioning_a_key_are_skipped() {
        let text = "#ifndef APP_VERSION_MAJOR\n#define APP_VERSION_MAJOR 5\n#endif\n\
                    #define APP_VERSION_MINOR 0\n#define APP_VERSION_BUILD 1\n";
        assert_eq!(parse_version_header(text).unwrap(), BuildMetadata::new(5, 0, 1));
    }

    #[test]
    fn missing_define_is_reported_by_name() {
        let text = "#define APP_VERSION_MAJOR 1\n#define APP_VERSION_BUILD 3\n";
        assert_eq!(parse_version_header(text), Err(Error::MetadataMissing(MINOR_KEY)));
    }

    #[test]
    fn literal_versions_are_parsed() {
        assert_eq!("1.2.3".parse::<BuildMetadata>().unwrap(), BuildMetadata::new(1, 2, 3));
        assert_eq!(" 10.0.42\n".parse::<BuildMetadata>().unwrap(), BuildMetadata::new(10, 0, 42));
        assert_eq!("1.2".parse::<BuildMetadata>(), Err(Error::MetadataMissing(BUILD_KEY)));
        assert_eq!("1.x.3".parse::<BuildMetadata>(), Err(Error::MetadataMissing(MINOR_KEY)));
        assert!("1.2.3.4".parse::<BuildMetadata>().is_err());
    }

    #[test]
    fn version_header_file_reports_missing_input() {
        let source = VersionHeaderFile::new("/nonexistent/aws_application_version.h");
        assert_eq!(source.load(), Err(Error::InputNotFound(File::VersionHeader)));
    }

    #[test]
    fn version_header_file_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, VERSION_HEADER.as_bytes()).unwrap();
        let metadata = VersionHeaderFile::new(file.path()).load().unwrap();
        assert_eq!(metadata, BuildMetadata::new(1, 2, 3));
    }
}
