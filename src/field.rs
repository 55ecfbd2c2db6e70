//! # Measurement fields
//!
//! A [`Field`] is a named per-object array with a unit and a documentation string.
//! Its values live in a [`FieldData`] tagged union whose variants mirror the
//! compound kinds produced by the catalog writer:
//!
//! | Variant | Components | Exploded suffixes |
//! |---------|-----------|-------------------|
//! | `Scalar` | 1 | - |
//! | `Angle` | 1, radians or degrees, always double precision | - |
//! | `Point` | 2 | `_x`, `_y` |
//! | `Coord` | 2 | `_ra`, `_dec` |
//! | `Moments` | 3 | `_11`, `_22`, `_12` |
//! | `PointCovariance` | 3 | `_11`, `_12`, `_22` |
//! | `MomentsCovariance` | 6 | `_11_11`, `_11_22`, `_22_22`, `_11_12`, `_22_12`, `_12_12` |
//! | `Array` | n | `0`, `1`, … |
//!
//! Each component is stored as a [`Column`], which also records the storage
//! precision of floating values.

/// One component of a field: a typed array with one value per object.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float64(Vec<f64>),
    Float32(Vec<f32>),
    Int(Vec<i64>),
    Flag(Vec<bool>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float64(v) => v.len(),
            Column::Float32(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Flag(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Float64(_) => "float64",
            Column::Float32(_) => "float32",
            Column::Int(_) => "int64",
            Column::Flag(_) => "bool",
        }
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Column::Float64(_))
    }

    /// Floating values widened to `f64`, `None` for integer and flag columns.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match self {
            Column::Float64(v) => Some(v.clone()),
            Column::Float32(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Column::Int(_) | Column::Flag(_) => None,
        }
    }

    /// Narrow a double precision column to single precision, other columns are unchanged.
    pub fn to_single_precision(self) -> Column {
        match self {
            Column::Float64(v) => Column::Float32(v.into_iter().map(|x| x as f32).collect()),
            other => other,
        }
    }
}

impl From<Vec<f64>> for Column {
    fn from(v: Vec<f64>) -> Self {
        Column::Float64(v)
    }
}

impl From<Vec<f32>> for Column {
    fn from(v: Vec<f32>) -> Self {
        Column::Float32(v)
    }
}

impl From<Vec<i64>> for Column {
    fn from(v: Vec<i64>) -> Self {
        Column::Int(v)
    }
}

impl From<Vec<bool>> for Column {
    fn from(v: Vec<bool>) -> Self {
        Column::Flag(v)
    }
}

/// Values of a field, tagged by their semantic kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    Scalar(Column),
    Angle(Vec<f64>),
    Point([Column; 2]),
    Coord([Column; 2]),
    Moments([Column; 3]),
    PointCovariance([Column; 3]),
    MomentsCovariance([Column; 6]),
    Array(Vec<Column>),
}

const POINT_MEMBERS: [&str; 2] = ["x", "y"];
const COORD_MEMBERS: [&str; 2] = ["ra", "dec"];
const MOMENTS_MEMBERS: [&str; 3] = ["11", "22", "12"];
const POINT_COVARIANCE_MEMBERS: [&str; 3] = ["11", "12", "22"];
const MOMENTS_COVARIANCE_MEMBERS: [&str; 6] = ["11_11", "11_22", "22_22", "11_12", "22_12", "12_12"];

impl FieldData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldData::Scalar(_) => "Scalar",
            FieldData::Angle(_) => "Angle",
            FieldData::Point(_) => "Point",
            FieldData::Coord(_) => "Coord",
            FieldData::Moments(_) => "Moments",
            FieldData::PointCovariance(_) => "Covariance(Point)",
            FieldData::MomentsCovariance(_) => "Covariance(Moments)",
            FieldData::Array(_) => "Array",
        }
    }

    /// Number of objects, `0` for an empty array field.
    pub fn len(&self) -> usize {
        match self {
            FieldData::Scalar(c) => c.len(),
            FieldData::Angle(v) => v.len(),
            FieldData::Point(c) | FieldData::Coord(c) => c[0].len(),
            FieldData::Moments(c) | FieldData::PointCovariance(c) => c[0].len(),
            FieldData::MomentsCovariance(c) => c[0].len(),
            FieldData::Array(c) => c.first().map_or(0, Column::len),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the first component that does not hold `n_objects` values.
    pub fn mismatched_len(&self, n_objects: usize) -> Option<usize> {
        match self {
            FieldData::Angle(v) => (v.len() != n_objects).then_some(v.len()),
            _ => self
                .columns()
                .into_iter()
                .map(Column::len)
                .find(|&len| len != n_objects),
        }
    }

    fn columns(&self) -> Vec<&Column> {
        match self {
            FieldData::Scalar(c) => vec![c],
            FieldData::Angle(_) => vec![],
            FieldData::Point(c) | FieldData::Coord(c) => c.iter().collect(),
            FieldData::Moments(c) | FieldData::PointCovariance(c) => c.iter().collect(),
            FieldData::MomentsCovariance(c) => c.iter().collect(),
            FieldData::Array(c) => c.iter().collect(),
        }
    }

    /// Whether any component is stored in double precision.
    pub fn has_double(&self) -> bool {
        self.columns().iter().any(|c| c.is_double())
    }

    /// Narrow every double precision component; angles are left untouched.
    pub fn to_single_precision(&mut self) {
        let columns: &mut [Column] = match self {
            FieldData::Angle(_) => return,
            FieldData::Scalar(c) => std::slice::from_mut(c),
            FieldData::Point(c) | FieldData::Coord(c) => &mut c[..],
            FieldData::Moments(c) | FieldData::PointCovariance(c) => &mut c[..],
            FieldData::MomentsCovariance(c) => &mut c[..],
            FieldData::Array(c) => &mut c[..],
        };
        for column in columns {
            let taken = std::mem::replace(column, Column::Flag(Vec::new()));
            *column = taken.to_single_precision();
        }
    }
}

/// A named per-object array of a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub unit: String,
    pub doc: String,
    pub data: FieldData,
}

impl Field {
    pub fn new(name: &str, unit: &str, doc: &str, data: FieldData) -> Self {
        Field {
            name: name.to_string(),
            unit: unit.to_string(),
            doc: doc.to_string(),
            data,
        }
    }

    /// Scalar field from a column.
    pub fn scalar(name: &str, unit: &str, column: impl Into<Column>) -> Self {
        Field::new(name, unit, "", FieldData::Scalar(column.into()))
    }

    /// Angle field in radians.
    pub fn angle(name: &str, values: Vec<f64>) -> Self {
        Field::new(name, "rad", "", FieldData::Angle(values))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_angle(&self) -> bool {
        matches!(self.data, FieldData::Angle(_))
    }

    /// The scalar column of the field, `None` for compound kinds.
    pub fn column(&self) -> Option<&Column> {
        match &self.data {
            FieldData::Scalar(c) => Some(c),
            _ => None,
        }
    }

    /// Split a compound field into scalar fields; scalars and angles return themselves.
    ///
    /// Return
    /// ----------
    /// * One [`Field`] per component, named `<name>_<member>` (or `<name><index>` for arrays),
    ///   sharing the unit and documentation of `self`.
    pub fn explode(&self) -> Vec<Field> {
        let member = |suffix: String, column: &Column| Field {
            name: suffix,
            unit: self.unit.clone(),
            doc: self.doc.clone(),
            data: FieldData::Scalar(column.clone()),
        };
        let named = |members: &[&str], columns: &[Column]| -> Vec<Field> {
            members
                .iter()
                .zip(columns)
                .map(|(m, c)| member(format!("{}_{m}", self.name), c))
                .collect()
        };

        match &self.data {
            FieldData::Scalar(_) | FieldData::Angle(_) => vec![self.clone()],
            FieldData::Point(c) => named(&POINT_MEMBERS, c),
            FieldData::Coord(c) => named(&COORD_MEMBERS, c),
            FieldData::Moments(c) => named(&MOMENTS_MEMBERS, c),
            FieldData::PointCovariance(c) => named(&POINT_COVARIANCE_MEMBERS, c),
            FieldData::MomentsCovariance(c) => named(&MOMENTS_COVARIANCE_MEMBERS, c),
            FieldData::Array(c) => c
                .iter()
                .enumerate()
                .map(|(i, c)| member(format!("{}{i}", self.name), c))
                .collect(),
        }
    }
}
