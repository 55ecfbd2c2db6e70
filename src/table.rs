//! # Measurement tables
//!
//! A [`MeasurementTable`] is the ordered set of fields read from one
//! detector-exposure catalog, or a part of it cut out for one measurement
//! algorithm. Fields are keyed by their name in the source catalog; the key
//! never changes even when a transform renames the field itself.
//!
//! Cutting out a sub-table *moves* fields, so once every algorithm has taken
//! its share the parent table must be empty; [`MeasurementTable::ensure_consumed`]
//! turns leftovers into an error.
//!
//! ```rust
//! use skyframe::field::Field;
//! use skyframe::table::MeasurementTable;
//!
//! let mut catalog = MeasurementTable::new(2);
//! catalog.insert(Field::scalar("base_PsfFlux_flux", "", vec![1.0_f64, 2.0])).unwrap();
//! catalog.insert(Field::scalar("id", "", vec![7_i64, 8])).unwrap();
//!
//! let psf = catalog.cutout_subtable("base_PsfFlux_");
//! assert_eq!(psf.len(), 1);
//! catalog.ignore("id");
//! assert!(catalog.ensure_consumed().is_ok());
//! ```
use tracing::{debug, warn};

use crate::{
    constants::{Degree, RADEG},
    field::{Field, FieldData},
    skyframe_errors::SkyframeError,
};

/// Positions borrowed by descriptors that carry no position of their own.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DefaultCoord {
    pub ra: Vec<Degree>,
    pub dec: Vec<Degree>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeasurementTable {
    fields: Vec<(String, Field)>,
    n_objects: usize,
}

impl MeasurementTable {
    /// Empty table for `n_objects` objects.
    pub fn new(n_objects: usize) -> Self {
        MeasurementTable {
            fields: Vec::new(),
            n_objects,
        }
    }

    /// Table keyed by the names of `fields`.
    pub fn from_fields(
        n_objects: usize,
        fields: impl IntoIterator<Item = Field>,
    ) -> Result<Self, SkyframeError> {
        let mut table = MeasurementTable::new(n_objects);
        for field in fields {
            table.insert(field)?;
        }
        Ok(table)
    }

    pub fn n_objects(&self) -> usize {
        self.n_objects
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|(k, _)| k == key)
    }

    fn check_length(&self, field: &Field) -> Result<(), SkyframeError> {
        match field.data.mismatched_len(self.n_objects) {
            Some(found) => Err(SkyframeError::LengthMismatch {
                name: field.name.clone(),
                expected: self.n_objects,
                found,
            }),
            None => Ok(()),
        }
    }

    /// Append a field keyed by its own name.
    pub fn insert(&mut self, field: Field) -> Result<(), SkyframeError> {
        let key = field.name.clone();
        self.insert_as(&key, field)
    }

    /// Append a field under an explicit key.
    pub fn insert_as(&mut self, key: &str, field: Field) -> Result<(), SkyframeError> {
        if self.contains(key) {
            return Err(SkyframeError::DuplicateField(key.to_string()));
        }
        self.check_length(&field)?;
        self.fields.push((key.to_string(), field));
        Ok(())
    }

    /// Replace the field stored under `key`, keeping its position.
    pub fn replace(&mut self, key: &str, field: Field) -> Result<(), SkyframeError> {
        self.check_length(&field)?;
        let index = self
            .position(key)
            .ok_or_else(|| SkyframeError::MissingField(key.to_string()))?;
        self.fields[index].1 = field;
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Result<&Field, SkyframeError> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, f)| f)
            .ok_or_else(|| SkyframeError::MissingField(key.to_string()))
    }

    pub fn get_mut(&mut self, key: &str) -> Result<&mut Field, SkyframeError> {
        self.fields
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, f)| f)
            .ok_or_else(|| SkyframeError::MissingField(key.to_string()))
    }

    pub fn remove(&mut self, key: &str) -> Result<Field, SkyframeError> {
        let index = self
            .position(key)
            .ok_or_else(|| SkyframeError::MissingField(key.to_string()))?;
        Ok(self.fields.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Field)> {
        self.fields.iter_mut().map(|(k, f)| (k.as_str(), f))
    }

    /// Values of a scalar floating field widened to `f64`.
    ///
    /// Return
    /// ----------
    /// * `Err(SkyframeError::MissingField)`: no field under `key`.
    /// * `Err(SkyframeError::FieldKindMismatch)`: the field is compound, integer or boolean.
    pub fn float_values(&self, key: &str) -> Result<Vec<f64>, SkyframeError> {
        let field = self.get(key)?;
        let mismatch = |found: &'static str| SkyframeError::FieldKindMismatch {
            name: key.to_string(),
            expected: "floating Scalar",
            found,
        };

        match &field.data {
            FieldData::Scalar(column) => column.to_f64().ok_or_else(|| mismatch(column.type_name())),
            FieldData::Angle(values) => Ok(values.clone()),
            other => Err(mismatch(other.kind_name())),
        }
    }

    /// Move every field whose key starts with `prefix` into a new table.
    pub fn cutout_subtable(&mut self, prefix: &str) -> MeasurementTable {
        let (included, excluded) = std::mem::take(&mut self.fields)
            .into_iter()
            .partition(|(k, _)| k.starts_with(prefix));
        self.fields = excluded;

        MeasurementTable {
            fields: included,
            n_objects: self.n_objects,
        }
    }

    /// Move the named fields, in the given order, into a new table.
    pub fn pop_many(&mut self, keys: &[&str]) -> Result<MeasurementTable, SkyframeError> {
        let mut popped = MeasurementTable::new(self.n_objects);
        for key in keys {
            let field = self.remove(key)?;
            popped.fields.push((key.to_string(), field));
        }
        Ok(popped)
    }

    /// Drop the fields under `prefix` on purpose, returning how many were dropped.
    pub fn ignore(&mut self, prefix: &str) -> usize {
        let dropped = self.cutout_subtable(prefix).len();
        if dropped > 0 {
            debug!(prefix, dropped, "ignored catalog fields");
        }
        dropped
    }

    /// Pop `coord_ra` / `coord_dec` (radians) and return them in degrees.
    pub fn take_default_coord(&mut self) -> Result<DefaultCoord, SkyframeError> {
        let ra = self.float_values("coord_ra")?;
        let dec = self.float_values("coord_dec")?;
        self.remove("coord_ra")?;
        self.remove("coord_dec")?;

        Ok(DefaultCoord {
            ra: ra.into_iter().map(|r| r / RADEG).collect(),
            dec: dec.into_iter().map(|d| d / RADEG).collect(),
        })
    }

    /// Fail if any field is left, listing the leftovers.
    pub fn ensure_consumed(&self) -> Result<(), SkyframeError> {
        if self.fields.is_empty() {
            return Ok(());
        }
        let residual: Vec<String> = self.keys().map(str::to_string).collect();
        warn!(count = residual.len(), "catalog fields were not consumed");
        Err(SkyframeError::ResidualFields(residual))
    }
}
