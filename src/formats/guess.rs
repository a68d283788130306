//! Extension-based format guessing

use std::path::Path;

use crate::error::{Error, Result};
use crate::files::{Compression, OpenMode, TextFile};
use crate::formats::registry;

/// Guess the format of the file at `path` from its extension.
///
/// An optional final compression suffix (`.gz`, `.bz2`, `.xz`) is peeled
/// off first, and the remaining extension is looked up in the format
/// registry. The result is `"<FormatName>"` or
/// `"<FormatName> / <Compression>"`, suitable as a format hint for
/// [`Trajectory`](crate::Trajectory).
pub fn guess_format(path: impl AsRef<Path>, mode: OpenMode) -> Result<String> {
    let path = path.as_ref();
    let name = path.to_string_lossy();

    let mut extension = String::new();
    let mut compression = "";

    if let Some(dot) = name.rfind('.') {
        extension = name[dot..].to_string();
        let stripped = match extension.as_str() {
            ".gz" => {
                compression = "GZ";
                true
            }
            ".bz2" => {
                compression = "BZ2";
                true
            }
            ".xz" => {
                compression = "XZ";
                true
            }
            _ => false,
        };

        if stripped {
            extension.clear();
            let remainder = &name[..dot];
            if let Some(dot) = remainder.rfind('.') {
                extension = remainder[dot..].to_string();
            }
        }
    }

    if extension.is_empty() {
        return Err(Error::File(format!(
            "file at '{}' does not have an extension, provide a format name to read it",
            path.display()
        )));
    }

    if extension == ".cif" && (mode == OpenMode::Read || mode == OpenMode::Append) {
        if let Some(sniffed) = distinguish_cif_variants(path, compression) {
            extension = sniffed;
        }
    }

    let format = registry::by_extension(&extension)?;
    let mut result = format.metadata.name.to_string();
    if !compression.is_empty() {
        result.push_str(" / ");
        result.push_str(compression);
    }

    Ok(result)
}

/// Approximate amount of text inspected when sniffing a `.cif` file
const CIF_SNIFF_SIZE: u64 = 1024;

/// CIF and mmCIF files share the `.cif` extension; tell them apart by
/// looking for dialect-specific tags near the top of the file.
fn distinguish_cif_variants(path: &Path, compression: &str) -> Option<String> {
    let compression = match compression {
        "GZ" => Compression::Gzip,
        "BZ2" => Compression::Bzip2,
        "XZ" => Compression::Lzma,
        _ => Compression::None,
    };

    let mut file = TextFile::open(path, OpenMode::Read, compression).ok()?;
    while !file.eof() && file.tell_pos() < CIF_SNIFF_SIZE {
        let line = file.read_line().ok()?;
        if line.contains("_audit_conform.dict_name")
            || line.contains("_cell.length_a")
            || line.contains("_atom_site.type_symbol")
        {
            return Some(".mmcif".into());
        }

        if line.contains("_symmetry_equiv_pos_as_xyz")
            || line.contains("_cell_length_a")
            || line.contains("_atom_site_type_symbol")
        {
            return Some(".cif".into());
        }
    }

    // none of the tags showed up, the file is likely invalid; keep the
    // plain extension and let the format itself report a proper error
    None
}
