//! OPC relationship parts (`*.rels`) and part-name resolution.

use super::DeckError;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Relationship type of the main presentation part in `_rels/.rels`.
pub const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

/// One `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// Parse a `.rels` part. `part` is only used in error messages.
pub fn parse_relationships(xml: &[u8], part: &str) -> Result<Vec<Relationship>, DeckError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut rels = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if e.name().local_name().as_ref() == b"Relationship" =>
            {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                    external: false,
                };
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().map_err(|source| DeckError::xml(part, source))?;
                    match attr.key.local_name().as_ref() {
                        b"Id" => rel.id = value.into_owned(),
                        b"Type" => rel.rel_type = value.into_owned(),
                        b"Target" => rel.target = value.into_owned(),
                        b"TargetMode" => rel.external = value.eq_ignore_ascii_case("External"),
                        _ => {}
                    }
                }
                if !rel.id.is_empty() {
                    rels.push(rel);
                }
            }
            Ok(Event::Eof) => break,
            Err(source) => return Err(DeckError::xml(part, source)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

/// Find a relationship by id.
pub fn find<'a>(rels: &'a [Relationship], id: &str) -> Option<&'a Relationship> {
    rels.iter().find(|r| r.id == id)
}

/// `ppt/slides/slide1.xml` → `ppt/slides/_rels/slide1.xml.rels`.
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that owns the `.rels`.
///
/// Targets are relative to the source part's directory unless they start
/// with `/`. The result is a ZIP entry name (no leading slash), with `.` and
/// `..` segments removed.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let mut segments: Vec<&str> = if let Some(absolute) = target.strip_prefix('/') {
        return normalise(absolute.split('/'));
    } else {
        match source_part.rsplit_once('/') {
            Some((dir, _)) => dir.split('/').collect(),
            None => Vec::new(),
        }
    };
    segments.extend(target.split('/'));
    normalise(segments.into_iter())
}

fn normalise<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    out.join("/")
}
