//! # OTA Image Packager Library
//!
//! This crate contains the functionality of the `otapack` tool in
//! library form: OTA header construction, image assembly and padding,
//! ECDSA P-256 signing, and packaging of the signature either into the
//! image or as a detached base64 artifact.
//!
//! Each run starts from on-disk inputs and writes its outputs once;
//! nothing is shared between runs except read-only key material.

extern crate static_assertions;

pub mod error;
pub mod image;
pub mod inspect;
pub mod metadata;
pub mod packaging;
pub mod pipeline;
pub mod signing;

pub use otapack_config as config;
