//! Slide XML: read the top-level pictures, write their `cNvPr` back.
//!
//! Only `p:pic` elements that are direct children of `p:spTree` are
//! considered; pictures nested in group shapes are left alone. Both the
//! reader and the writer count those pictures in document order, so the
//! n-th [`Shape`] of a [`Slide`] always maps to the n-th top-level `p:pic`.

use super::rels::{self, Relationship};
use super::{DeckError, PictureProperties, Shape, ShapeKind};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

/// Where the parser currently is relative to the picture being collected.
#[derive(Default)]
struct PicState {
    depth: usize,
    name: String,
    props: PictureProperties,
    embed: Option<String>,
    placeholder: bool,
    media: bool,
}

/// Parse a slide part into its top-level picture shapes.
///
/// `part` is the slide's ZIP entry name, `rels` its relationships; image
/// targets are resolved to ZIP entry names.
pub fn parse_shapes(xml: &[u8], part: &str, rels: &[Relationship]) -> Result<Vec<Shape>, DeckError> {
    let mut reader = Reader::from_reader(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<PicState> = None;
    let mut shapes = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| DeckError::xml(part, source))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let local = e.name().local_name().as_ref().to_vec();

                if current.is_none() && local == b"pic" && parent_is(&stack, b"spTree") {
                    let state = PicState {
                        depth: stack.len(),
                        ..Default::default()
                    };
                    if is_empty {
                        shapes.push(finish_pic(state, part, rels));
                    } else {
                        current = Some(state);
                    }
                } else if let Some(state) = current.as_mut() {
                    observe(state, &stack, &local, e, part)?;
                }

                if !is_empty {
                    stack.push(local);
                }
            }
            Event::End(_) => {
                stack.pop();
                if current.as_ref().is_some_and(|s| s.depth == stack.len()) {
                    if let Some(state) = current.take() {
                        shapes.push(finish_pic(state, part, rels));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(shapes)
}

/// Record what a descendant element of a `p:pic` tells us.
fn observe(
    state: &mut PicState,
    stack: &[Vec<u8>],
    local: &[u8],
    e: &BytesStart<'_>,
    part: &str,
) -> Result<(), DeckError> {
    // Path below the pic element, e.g. ["nvPicPr", "nvPr"].
    let inner = &stack[state.depth + 1..];
    match local {
        b"cNvPr" if inner.len() == 1 && inner[0] == b"nvPicPr" => {
            for attr in e.attributes().flatten() {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = attr
                    .unescape_value()
                    .map_err(|source| DeckError::xml(part, source))?
                    .into_owned();
                if attr.key.local_name().as_ref() == b"name" {
                    state.name = value.clone();
                }
                state.props.push(key, value);
            }
        }
        b"ph" if inner.len() == 2 && inner[1] == b"nvPr" => state.placeholder = true,
        b"videoFile" | b"audioFile" | b"quickTimeFile" | b"media"
            if inner.len() >= 2 && inner[1] == b"nvPr" =>
        {
            state.media = true
        }
        b"blip" if inner.first().is_some_and(|p| p == b"blipFill") => {
            for attr in e.attributes().flatten() {
                if attr.key.local_name().as_ref() == b"embed" {
                    let value = attr
                        .unescape_value()
                        .map_err(|source| DeckError::xml(part, source))?;
                    state.embed = Some(value.into_owned());
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn finish_pic(state: PicState, part: &str, rels: &[Relationship]) -> Shape {
    let kind = if state.media {
        ShapeKind::Media
    } else if state.placeholder {
        ShapeKind::PlaceholderPicture
    } else {
        ShapeKind::Picture
    };
    let image_part = state
        .embed
        .as_deref()
        .and_then(|id| rels::find(rels, id))
        .filter(|rel| !rel.external)
        .map(|rel| rels::resolve_target(part, &rel.target));
    let alt_text = state.props.get("descr").unwrap_or_default().to_string();

    Shape {
        name: state.name,
        kind,
        image_part,
        alt_text,
        props: state.props,
    }
}

fn parent_is(stack: &[Vec<u8>], local: &[u8]) -> bool {
    stack.last().is_some_and(|p| p == local)
}

/// Rewrite the `p:nvPicPr/p:cNvPr` element of every top-level picture from
/// `shapes`, copying every other event through unchanged.
pub fn rewrite_shapes(xml: &[u8], part: &str, shapes: &[Shape]) -> Result<Vec<u8>, DeckError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(xml.len() + 256)));
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut pic_depth: Option<usize> = None;
    let mut pic_index = 0usize;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| DeckError::xml(part, source))?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let local = e.name().local_name().as_ref().to_vec();
                let mut replacement = None;

                if pic_depth.is_none() && local == b"pic" && parent_is(&stack, b"spTree") {
                    if is_empty {
                        pic_index += 1;
                    } else {
                        pic_depth = Some(stack.len());
                    }
                } else if let Some(depth) = pic_depth {
                    let inner = &stack[depth + 1..];
                    if local == b"cNvPr" && inner.len() == 1 && inner[0] == b"nvPicPr" {
                        if let Some(shape) = shapes.get(pic_index) {
                            replacement = Some(rebuild_cnvpr(e, shape));
                        }
                    }
                }

                match (replacement, is_empty) {
                    (Some(start), true) => writer.write_event(Event::Empty(start))?,
                    (Some(start), false) => writer.write_event(Event::Start(start))?,
                    (None, _) => writer.write_event(event.borrow())?,
                }
                if !is_empty {
                    stack.push(local);
                }
            }
            Event::End(_) => {
                stack.pop();
                if pic_depth == Some(stack.len()) {
                    pic_depth = None;
                    pic_index += 1;
                }
                writer.write_event(event.borrow())?;
            }
            _ => writer.write_event(event.borrow())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner().into_inner())
}

/// Same element name, attributes taken from the shape's property bag with
/// `descr` forced to the shape's alt text.
fn rebuild_cnvpr(original: &BytesStart<'_>, shape: &Shape) -> BytesStart<'static> {
    let qname = String::from_utf8_lossy(original.name().as_ref()).into_owned();
    let mut start = BytesStart::new(qname);
    let mut props = shape.props.clone();
    if !shape.alt_text.is_empty() {
        props.set("descr", shape.alt_text.clone());
    }
    for (key, value) in props.iter() {
        start.push_attribute((key, value));
    }
    start
}
