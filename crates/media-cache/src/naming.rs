//! Deterministic cache file naming.
//!
//! Every stored file follows one template:
//!
//! ```text
//! <base>-size-<width>-<height>[.<ext>]
//! ```
//!
//! where `<base>` and `<ext>` come from the sanitized [`SourceId`] and the
//! dimension pair comes from the [`SizeVariant`] (`0-0` for the original).
//! Lookups are directory scans with a prefix match against the computed
//! name, so no index file is ever needed and the extension does not have to
//! be known at lookup time. Matching is boundary-checked: the prefix for
//! `-size-200-100` must not match a file named `...-size-200-1000.jpg`.

use crate::model::{SizeVariant, SourceId};

const SIZE_TAG: &str = "-size-";

/// Full file name for a variant, including the extension when the source
/// carried one.
pub fn variant_file_name(source: &SourceId, variant: SizeVariant) -> String {
    let mut name = variant_prefix(source, variant);
    if let Some(ext) = source.ext() {
        name.push('.');
        name.push_str(ext);
    }
    name
}

/// Extension-less name of a variant, used as the lookup prefix.
pub fn variant_prefix(source: &SourceId, variant: SizeVariant) -> String {
    let (w, h) = variant.name_dimensions();
    format!("{}{}{}-{}", source.base(), SIZE_TAG, w, h)
}

/// Prefix shared by every variant of a source, used for bulk deletes.
///
/// Ends with the size tag so that `movie` never matches files belonging to
/// `movie2`.
pub fn source_prefix(source: &SourceId) -> String {
    format!("{}{}", source.base(), SIZE_TAG)
}

/// Boundary-checked prefix match for a variant lookup.
///
/// The remainder after the prefix must be empty or an extension separator.
pub fn matches_variant(file_name: &str, prefix: &str) -> bool {
    match file_name.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

/// Prefix match for bulk operations over every variant of a source.
pub fn matches_source(file_name: &str, source_prefix: &str) -> bool {
    file_name.starts_with(source_prefix)
}
