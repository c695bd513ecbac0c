//! In-memory `.pptx` builder shared by the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// PNG signature followed by filler; enough for content sniffing.
pub const PNG_HEAD: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
/// JPEG SOI + APP0 marker.
pub const JPEG_HEAD: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0];
/// Placeable WMF header.
pub const WMF_HEAD: &[u8] = &[0xD7, 0xCD, 0xC6, 0x9A, 0, 0, 0, 0, 0, 0, 0, 0];

/// One picture on a slide.
pub struct Pic<'a> {
    pub name: &'a str,
    pub descr: Option<&'a str>,
    /// File name under `ppt/media/`.
    pub media: &'a str,
}

pub fn pic<'a>(name: &'a str, descr: Option<&'a str>, media: &'a str) -> Pic<'a> {
    Pic { name, descr, media }
}

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn slide_xml(pics: &[Pic<'_>]) -> String {
    let mut body = String::new();
    for (i, p) in pics.iter().enumerate() {
        let descr = p
            .descr
            .map(|d| format!(r#" descr="{d}""#))
            .unwrap_or_default();
        body.push_str(&format!(
            r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="{name}"{descr}/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId{rid}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="914400" cy="914400"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
            id = i + 2,
            name = p.name,
            rid = i + 10,
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="99" name="Title 1"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>Q3 &amp; Q4</a:t></a:r></a:p></p:txBody></p:sp>{body}</p:spTree></p:cSld></p:sld>"#
    )
}

fn slide_rels(pics: &[Pic<'_>]) -> String {
    let mut rels = String::new();
    for (i, p) in pics.iter().enumerate() {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{rid}" Type="{REL}/image" Target="../media/{media}"/>"#,
            rid = i + 10,
            media = p.media,
        ));
    }
    format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{RELS_NS}">{rels}</Relationships>"#)
}

/// Build a `.pptx` with one entry per slide plus the given media parts.
pub fn build_deck(slides: &[Vec<Pic<'_>>], media: &[(&str, &[u8])]) -> Vec<u8> {
    let mut ids = String::new();
    let mut pres_rels = String::new();
    for i in 0..slides.len() {
        let n = i + 1;
        ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{n}"/>"#, 255 + n));
        pres_rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="{REL}/slide" Target="slides/slide{n}.xml"/>"#
        ));
    }

    let mut entries: Vec<(String, Vec<u8>)> = vec![
        (
            "[Content_Types].xml".into(),
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="png" ContentType="image/png"/><Default Extension="jpeg" ContentType="image/jpeg"/><Default Extension="wmf" ContentType="image/x-wmf"/></Types>"#.to_vec(),
        ),
        (
            "_rels/.rels".into(),
            format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{RELS_NS}"><Relationship Id="rId1" Type="{REL}/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#).into_bytes(),
        ),
        (
            "ppt/presentation.xml".into(),
            format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {NS}><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/></p:presentation>"#).into_bytes(),
        ),
        (
            "ppt/_rels/presentation.xml.rels".into(),
            format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{RELS_NS}">{pres_rels}</Relationships>"#).into_bytes(),
        ),
    ];
    for (i, pics) in slides.iter().enumerate() {
        let n = i + 1;
        entries.push((format!("ppt/slides/slide{n}.xml"), slide_xml(pics).into_bytes()));
        entries.push((format!("ppt/slides/_rels/slide{n}.xml.rels"), slide_rels(pics).into_bytes()));
    }
    for (name, data) in media {
        entries.push((format!("ppt/media/{name}"), data.to_vec()));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in &entries {
        writer.start_file(name.as_str(), options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Write `bytes` as `name` in `dir` and return the path.
pub fn write_deck(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
