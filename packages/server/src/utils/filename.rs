use common::storage::UploadKind;

use crate::error::AppError;

/// Why an uploaded filename was refused.
#[derive(Debug, PartialEq, Eq)]
pub enum FilenameError {
    Empty,
    ContainsPathSeparator,
    PathTraversal,
    NullByte,
    /// Starts with a dot.
    Hidden,
    /// CR, LF, tab and friends; these would end up in `Content-Disposition`.
    ControlCharacter,
    TooLong,
    MissingExtension,
    ExtensionNotAllowed(String),
}

impl FilenameError {
    pub fn message(&self) -> String {
        match self {
            Self::Empty => "Filename cannot be empty".into(),
            Self::ContainsPathSeparator => {
                "Invalid filename: path separators are not allowed".into()
            }
            Self::PathTraversal => "Invalid filename: '..' is not allowed".into(),
            Self::NullByte => "Invalid filename: null bytes are not allowed".into(),
            Self::Hidden => "Invalid filename: hidden files are not allowed".into(),
            Self::ControlCharacter => {
                "Invalid filename: control characters are not allowed".into()
            }
            Self::TooLong => "Filename must be at most 255 characters".into(),
            Self::MissingExtension => "Filename must have an extension".into(),
            Self::ExtensionNotAllowed(ext) => format!("File type '.{ext}' is not allowed here"),
        }
    }
}

impl From<FilenameError> for AppError {
    fn from(err: FilenameError) -> Self {
        AppError::Validation(err.message())
    }
}

/// Check that `filename` is a single path component and return it trimmed.
pub fn validate_flat_filename(filename: &str) -> Result<&str, FilenameError> {
    let name = filename.trim();

    if name.is_empty() {
        return Err(FilenameError::Empty);
    }
    if name.chars().count() > 255 {
        return Err(FilenameError::TooLong);
    }
    if name.contains('\0') {
        return Err(FilenameError::NullByte);
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(FilenameError::ControlCharacter);
    }
    if name.contains(['/', '\\']) {
        return Err(FilenameError::ContainsPathSeparator);
    }
    if name == ".." {
        return Err(FilenameError::PathTraversal);
    }
    if name.starts_with('.') {
        return Err(FilenameError::Hidden);
    }

    Ok(name)
}

/// Lowercased extension after the last dot, if any.
pub fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// Validate a client-supplied upload name for `kind`.
///
/// Returns the cleaned name and its lowercased extension.
pub fn validate_upload_filename(
    kind: UploadKind,
    filename: &str,
) -> Result<(String, String), FilenameError> {
    let name = validate_flat_filename(filename)?;
    let ext = extension_of(name).ok_or(FilenameError::MissingExtension)?;
    if !kind.accepts_extension(&ext) {
        return Err(FilenameError::ExtensionNotAllowed(ext));
    }
    Ok((name.to_string(), ext))
}
