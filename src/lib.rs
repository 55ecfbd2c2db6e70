//! # Skyframe
//!
//! Re-expresses per-object measurement catalogs produced in a detector's pixel
//! frame in the sky tangent frame.
//!
//! A transform run for one detector exposure goes as follows:
//!
//! 1. build the [`wcs::Wcs`] of the exposure, usually from its header;
//! 2. take the default coordinates out of the catalog
//!    ([`table::MeasurementTable::take_default_coord`]);
//! 3. cut the catalog into [`registry::Algorithm`]s, one per measurement algorithm;
//! 4. transform each algorithm through a shared [`engine::TransformContext`];
//! 5. check that nothing was left behind with
//!    [`table::MeasurementTable::ensure_consumed`].
//!
//! ```rust
//! use skyframe::{
//!     config::TransformConfig,
//!     engine::TransformContext,
//!     field::Field,
//!     registry::{Algorithm, AlgorithmKind},
//!     table::MeasurementTable,
//!     wcs::Wcs,
//! };
//!
//! let header = "\
//! CRPIX1  = 1000.0
//! CRPIX2  = 1000.0
//! CRVAL1  = 150.0
//! CRVAL2  = 2.0
//! CD1_1   = -4.66666666666667E-05
//! CD2_2   = 4.66666666666667E-05
//! CRPIX1A = 0.0
//! CRPIX2A = 0.0
//! CRVAL1A = 0.0
//! CRVAL2A = 0.0";
//! let wcs = Wcs::from_header(header).unwrap();
//!
//! let mut catalog = MeasurementTable::new(1);
//! catalog.insert(Field::scalar("base_GaussianCentroid_x", "pixel", vec![1000.0_f64])).unwrap();
//! catalog.insert(Field::scalar("base_GaussianCentroid_y", "pixel", vec![1000.0_f64])).unwrap();
//!
//! let mut context = TransformContext::new(wcs, TransformConfig::default());
//! let mut centroid = Algorithm::cutout(AlgorithmKind::GaussianCentroid, &mut catalog);
//! centroid.transform(&mut context).unwrap();
//! catalog.ensure_consumed().unwrap();
//!
//! let ra = centroid.table().get("base_GaussianCentroid_x").unwrap();
//! assert_eq!(ra.name, "gaussiancentroid_ra");
//! assert_eq!(ra.unit, "degree");
//! ```
pub mod config;
pub mod constants;
pub mod descriptors;
pub mod engine;
pub mod export;
pub mod field;
pub mod propagation;
pub mod registry;
pub mod rename;
pub mod skyframe_errors;
pub mod table;
pub mod wcs;
