use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkyframeError {
    #[error("Descriptor references a field absent from the table: {0}")]
    MissingField(String),

    #[error("Validity must be (full|diagonal|none): {0}")]
    UnsupportedValidity(String),

    #[error("Fields remain unconsumed: {}", .0.join(", "))]
    ResidualFields(Vec<String>),

    #[error("Field {name} has kind {found}, expected {expected}")]
    FieldKindMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Field {name} has {found} objects, the table holds {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Field already present in the table: {0}")]
    DuplicateField(String),

    #[error("Projection header lacks mandatory key: {0}")]
    MissingHeaderKey(String),

    #[error("Error during the nom parsing of the projection header: {0}")]
    HeaderParse(String),

    #[error("Reference position {0} was not resolved by any position descriptor")]
    UnresolvedReference(String),

    #[error("Descriptor borrows the default position but none was supplied")]
    MissingDefaultCoord,

    #[error("Invalid rename rule: {0}")]
    InvalidRenameRule(#[from] regex::Error),

    #[error("Invalid magnitude naming pattern: {0}")]
    InvalidExportPattern(regex::Error),

    #[error("Unknown measurement algorithm: {0}")]
    UnknownAlgorithm(String),
}

impl PartialEq for SkyframeError {
    fn eq(&self, other: &Self) -> bool {
        use SkyframeError::*;
        match (self, other) {
            (MissingField(a), MissingField(b)) => a == b,
            (UnsupportedValidity(a), UnsupportedValidity(b)) => a == b,
            (ResidualFields(a), ResidualFields(b)) => a == b,
            (
                FieldKindMismatch {
                    name: a,
                    expected: ea,
                    found: fa,
                },
                FieldKindMismatch {
                    name: b,
                    expected: eb,
                    found: fb,
                },
            ) => a == b && ea == eb && fa == fb,
            (
                LengthMismatch {
                    name: a,
                    expected: ea,
                    found: fa,
                },
                LengthMismatch {
                    name: b,
                    expected: eb,
                    found: fb,
                },
            ) => a == b && ea == eb && fa == fb,
            (DuplicateField(a), DuplicateField(b)) => a == b,
            (MissingHeaderKey(a), MissingHeaderKey(b)) => a == b,
            (HeaderParse(a), HeaderParse(b)) => a == b,
            (UnresolvedReference(a), UnresolvedReference(b)) => a == b,
            (UnknownAlgorithm(a), UnknownAlgorithm(b)) => a == b,

            // regex errors only compare by variant
            (InvalidRenameRule(_), InvalidRenameRule(_)) => true,
            (InvalidExportPattern(_), InvalidExportPattern(_)) => true,

            (MissingDefaultCoord, MissingDefaultCoord) => true,

            _ => false,
        }
    }
}
