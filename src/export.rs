//! # Export listing
//!
//! Once an algorithm is transformed, its fields are handed to the schema layer as
//! flat columns: compound fields are exploded into scalars, and every flux or
//! flux uncertainty is accompanied by a derived AB magnitude column.
//!
//! Magnitude names are taken from the flux descriptors when given, otherwise
//! derived from the exported flux name (`_flux` → `_mag`, `_fluxsigma` → `_magsigma`).
use std::collections::HashMap;

use regex::Regex;

use crate::{
    constants::AB_ZERO_POINT,
    descriptors::AlgorithmDescriptors,
    field::{Column, FieldData},
    rename::Renamer,
    skyframe_errors::SkyframeError,
    table::MeasurementTable,
};

/// Unit of stored fluxes.
pub const FLUX_UNIT: &str = "erg s^{-1} cm^{-2} Hz^{-1}";

/// AB magnitude of a flux density in erg s⁻¹ cm⁻² Hz⁻¹.
pub fn flux_to_ab_mag(flux: f64) -> f64 {
    -2.5 * flux.log10() + AB_ZERO_POINT
}

/// Magnitude uncertainty from a flux and its uncertainty.
pub fn fluxerr_to_ab_magerr(flux: f64, fluxerr: f64) -> f64 {
    2.5 / std::f64::consts::LN_10 * fluxerr / flux
}

fn export_pattern(pattern: &str) -> Result<Regex, SkyframeError> {
    Regex::new(pattern).map_err(SkyframeError::InvalidExportPattern)
}

/// Where the values of an exported column come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    /// Component `component` of the exploded field stored under `key`.
    Stored { key: String, component: usize },
    Magnitude { flux: String },
    MagnitudeError { flux: String, fluxerr: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportColumn {
    pub name: String,
    pub unit: String,
    pub doc: String,
    pub source: ColumnSource,
}

impl ExportColumn {
    /// Values of the column computed from the transformed `table`.
    pub fn values(&self, table: &MeasurementTable) -> Result<Column, SkyframeError> {
        match &self.source {
            ColumnSource::Stored { key, component } => {
                let member = table
                    .get(key)?
                    .explode()
                    .into_iter()
                    .nth(*component)
                    .ok_or_else(|| SkyframeError::MissingField(self.name.clone()))?;
                match member.data {
                    FieldData::Scalar(column) => Ok(column),
                    FieldData::Angle(values) => Ok(Column::Float64(values)),
                    other => Err(SkyframeError::FieldKindMismatch {
                        name: member.name,
                        expected: "Scalar",
                        found: other.kind_name(),
                    }),
                }
            }
            ColumnSource::Magnitude { flux } => Ok(Column::Float64(
                table
                    .float_values(flux)?
                    .into_iter()
                    .map(flux_to_ab_mag)
                    .collect(),
            )),
            ColumnSource::MagnitudeError { flux, fluxerr } => Ok(Column::Float64(
                table
                    .float_values(flux)?
                    .into_iter()
                    .zip(table.float_values(fluxerr)?)
                    .map(|(f, e)| fluxerr_to_ab_magerr(f, e))
                    .collect(),
            )),
        }
    }
}

/// List the exported columns of a transformed algorithm table.
///
/// Arguments
/// ---------
/// * `table`: the transformed fields.
/// * `descriptors`: the roles of the fields, used to find fluxes and name magnitudes.
/// * `prefix`: prepended to every column name, typically the filter, e.g. `"i_"`.
///
/// Return
/// ----------
/// * The columns in table order, each flux followed by its magnitude.
pub fn export_columns(
    table: &MeasurementTable,
    descriptors: &AlgorithmDescriptors,
    prefix: &str,
) -> Result<Vec<ExportColumn>, SkyframeError> {
    let renamer = Renamer::new(&descriptors.rename_rules)?;
    let mag_name = export_pattern(r"_flux($|_)")?;
    let magerr_name = export_pattern(r"_fluxsigma($|_)")?;

    let fluxes: HashMap<&str, _> = descriptors
        .fluxes
        .iter()
        .map(|d| (d.flux.as_str(), d))
        .collect();
    let flux_errs: HashMap<&str, _> = descriptors
        .flux_errs
        .iter()
        .map(|d| (d.fluxerr.as_str(), d))
        .collect();

    let mut columns = Vec::with_capacity(table.len());
    for (key, field) in table.iter() {
        let member = format!("{prefix}{}", field.name);

        if let Some(desc) = fluxes.get(key) {
            let mag = match &desc.mag {
                Some(mag) => format!("{prefix}{}", renamer.rename(mag)),
                None => mag_name.replace_all(&member, "_mag${1}").into_owned(),
            };
            columns.push(ExportColumn {
                name: member,
                unit: FLUX_UNIT.to_string(),
                doc: field.doc.clone(),
                source: ColumnSource::Stored {
                    key: key.to_string(),
                    component: 0,
                },
            });
            columns.push(ExportColumn {
                name: mag,
                unit: "mag".to_string(),
                doc: field.doc.clone(),
                source: ColumnSource::Magnitude {
                    flux: key.to_string(),
                },
            });
        } else if let Some(desc) = flux_errs.get(key) {
            let magerr = match &desc.magerr {
                Some(magerr) => format!("{prefix}{}", renamer.rename(magerr)),
                None => magerr_name.replace_all(&member, "_magsigma${1}").into_owned(),
            };
            columns.push(ExportColumn {
                name: member,
                unit: FLUX_UNIT.to_string(),
                doc: field.doc.clone(),
                source: ColumnSource::Stored {
                    key: key.to_string(),
                    component: 0,
                },
            });
            columns.push(ExportColumn {
                name: magerr,
                unit: "mag".to_string(),
                doc: field.doc.clone(),
                source: ColumnSource::MagnitudeError {
                    flux: desc.flux.clone(),
                    fluxerr: key.to_string(),
                },
            });
        } else {
            columns.extend(field.explode().into_iter().enumerate().map(|(i, f)| {
                ExportColumn {
                    name: format!("{prefix}{}", f.name),
                    unit: f.unit,
                    doc: f.doc,
                    source: ColumnSource::Stored {
                        key: key.to_string(),
                        component: i,
                    },
                }
            }));
        }
    }

    Ok(columns)
}
