//! Plain-text export of a SOAP note
//!
//! The four sections in fixed order, each under its header, for clipboard or
//! document export.

use crate::model::{SoapNote, SoapSection};

pub fn render_plain_text(note: &SoapNote) -> String {
    SoapSection::ALL
        .iter()
        .map(|&section| format!("{}:\n{}", section.header(), note.section(section)))
        .collect::<Vec<_>>()
        .join("\n\n")
}
