//! chartkap-export: Chart product serializers (sans-IO)
//!
//! Turns calibration records and boundary polygons into the text files
//! that accompany a KAP chart: the KAP header fed to the encoder, the
//! BSB catalog and the GPX boundary track. GPX can also be read back.

pub mod bsb;
pub mod gpx;
pub mod kap;

pub use bsb::to_bsb;
pub use gpx::{GpxError, parse_gpx, to_gpx};
pub use kap::{HeaderMetadata, to_kap_header};
