//! Rich representation of cell results.
//!
//! The [`Represent`] trait lets a value advertise rich renderings for
//! display in the notebook UI. [`encode`] picks one rendering per value:
//!
//! 1. absent values render nothing;
//! 2. a byte view starting with JPEG or PNG magic becomes that image,
//!    whatever else the value offers;
//! 3. otherwise the first capability in [`Capability::PRIORITY`] that the
//!    value provides wins;
//! 4. otherwise the value's plain text form is used.
//!
//! Rendered results are written to an [`OutputChannel`] as JSON, with
//! binary payloads streamed as base64 rather than materialized.

use std::borrow::Cow;
use std::io;

use crate::stream::OutputChannel;

/// Leading bytes of a JPEG file.
pub const JPEG_MAGIC: &[u8] = b"\xff\xd8";

/// Leading bytes of a PNG file.
pub const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Values that can render rich output in the notebook.
///
/// Only [`Represent::repr_text`] is required; every other method returns
/// `None` unless the type opts in.
pub trait Represent {
    /// Plain text form, shown when nothing richer is offered.
    fn repr_text(&self) -> String;

    /// Whether this is the "no value" sentinel.
    fn is_absent(&self) -> bool {
        false
    }

    /// Contiguous bytes backing the value, sniffed for image magic.
    fn byte_view(&self) -> Option<&[u8]> {
        None
    }

    /// A complete mime bundle, preferred over single representations.
    fn repr_mimebundle(&self) -> Option<MimeBundle<'static>> {
        None
    }

    /// HTML representation.
    fn repr_html(&self) -> Option<String> {
        None
    }

    /// Markdown representation.
    fn repr_markdown(&self) -> Option<String> {
        None
    }

    /// SVG representation.
    fn repr_svg(&self) -> Option<String> {
        None
    }

    /// PNG image bytes.
    fn repr_png(&self) -> Option<Vec<u8>> {
        None
    }

    /// JPEG image bytes.
    fn repr_jpeg(&self) -> Option<Vec<u8>> {
        None
    }

    /// LaTeX representation.
    fn repr_latex(&self) -> Option<String> {
        None
    }

    /// JavaScript representation.
    fn repr_javascript(&self) -> Option<String> {
        None
    }
}

/// A rendering capability, tried in [`Capability::PRIORITY`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    MimeBundle,
    Html,
    Markdown,
    Svg,
    Png,
    Jpeg,
    Latex,
    Javascript,
}

impl Capability {
    /// Dispatch order; the first capability a value provides wins.
    pub const PRIORITY: [Capability; 8] = [
        Capability::MimeBundle,
        Capability::Html,
        Capability::Markdown,
        Capability::Svg,
        Capability::Png,
        Capability::Jpeg,
        Capability::Latex,
        Capability::Javascript,
    ];

    /// Mime type of a single-representation capability.
    pub fn mime(self) -> Option<&'static str> {
        match self {
            Capability::MimeBundle => None,
            Capability::Html => Some("text/html"),
            Capability::Markdown => Some("text/markdown"),
            Capability::Svg => Some("image/svg+xml"),
            Capability::Png => Some("image/png"),
            Capability::Jpeg => Some("image/jpeg"),
            Capability::Latex => Some("text/latex"),
            Capability::Javascript => Some("application/javascript"),
        }
    }

    /// Ask `value` for this representation.
    pub fn render<V: Represent + ?Sized>(self, value: &V) -> Option<MimeBundle<'static>> {
        let payload = match self {
            Capability::MimeBundle => return value.repr_mimebundle(),
            Capability::Html => value.repr_html().map(Payload::from),
            Capability::Markdown => value.repr_markdown().map(Payload::from),
            Capability::Svg => value.repr_svg().map(Payload::from),
            Capability::Png => value.repr_png().map(Payload::from),
            Capability::Jpeg => value.repr_jpeg().map(Payload::from),
            Capability::Latex => value.repr_latex().map(Payload::from),
            Capability::Javascript => value.repr_javascript().map(Payload::from),
        }?;
        let mime = self.mime()?;
        Some(MimeBundle::single(mime, payload))
    }
}

/// Content of one mime-bundle entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<'a> {
    /// Inline text, JSON-escaped on the wire.
    Text(String),
    /// Binary data, base64-encoded on the wire.
    Binary(Cow<'a, [u8]>),
}

impl From<String> for Payload<'_> {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<u8>> for Payload<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(Cow::Owned(bytes))
    }
}

/// Ordered mapping from mime type to payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeBundle<'a> {
    entries: Vec<(String, Payload<'a>)>,
}

impl<'a> MimeBundle<'a> {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bundle with one entry.
    pub fn single(mime: impl Into<String>, payload: Payload<'a>) -> Self {
        let mut bundle = Self::new();
        bundle.insert(mime, payload);
        bundle
    }

    /// Set the payload for `mime`, keeping first-insertion order.
    pub fn insert(&mut self, mime: impl Into<String>, payload: Payload<'a>) {
        let mime = mime.into();
        match self.entries.iter_mut().find(|(m, _)| *m == mime) {
            Some(entry) => entry.1 = payload,
            None => self.entries.push((mime, payload)),
        }
    }

    /// Look up the payload for `mime`.
    pub fn get(&self, mime: &str) -> Option<&Payload<'a>> {
        self.entries.iter().find(|(m, _)| m == mime).map(|(_, p)| p)
    }

    /// Iterate entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Payload<'a>)> {
        self.entries.iter().map(|(m, p)| (m.as_str(), p))
    }

    /// Number of mime types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bundle has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the bundle as a JSON object, streaming binary payloads.
    pub fn write_to<C: OutputChannel + ?Sized>(&self, channel: &mut C) -> io::Result<()> {
        channel.send_text("{")?;
        for (i, (mime, payload)) in self.entries.iter().enumerate() {
            if i > 0 {
                channel.send_text(",")?;
            }
            channel.send_text(&serde_json::to_string(mime)?)?;
            channel.send_text(":")?;
            match payload {
                Payload::Text(text) => channel.send_text(&serde_json::to_string(text)?)?,
                Payload::Binary(bytes) => {
                    channel.send_text("\"")?;
                    channel.send_bytes_as_base64(bytes)?;
                    channel.send_text("\"")?;
                }
            }
        }
        channel.send_text("}")
    }
}

/// The rendering of one cell result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<'a> {
    /// Nothing to show.
    Absent,
    /// Plain text form of the value.
    Textual(String),
    /// Mime-tagged representations.
    MimeBundle(MimeBundle<'a>),
}

impl Rendered<'_> {
    /// Whether there is nothing to send.
    pub fn is_absent(&self) -> bool {
        matches!(self, Rendered::Absent)
    }

    /// Write the rendering as one JSON value; absent writes nothing.
    pub fn write_to<C: OutputChannel + ?Sized>(&self, channel: &mut C) -> io::Result<()> {
        match self {
            Rendered::Absent => Ok(()),
            Rendered::Textual(text) => channel.send_text(&serde_json::to_string(text)?),
            Rendered::MimeBundle(bundle) => bundle.write_to(channel),
        }
    }
}

/// Identify an image from its leading bytes.
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(JPEG_MAGIC) {
        Some("image/jpeg")
    } else if bytes.starts_with(PNG_MAGIC) {
        Some("image/png")
    } else {
        None
    }
}

/// Pick the rendering for `value`.
pub fn encode<V: Represent + ?Sized>(value: &V) -> Rendered<'_> {
    if value.is_absent() {
        return Rendered::Absent;
    }

    if let Some(bytes) = value.byte_view() {
        if let Some(mime) = sniff_image(bytes) {
            return Rendered::MimeBundle(MimeBundle::single(
                mime,
                Payload::Binary(Cow::Borrowed(bytes)),
            ));
        }
    }

    Capability::PRIORITY
        .iter()
        .find_map(|capability| capability.render(value))
        .map(Rendered::MimeBundle)
        .unwrap_or_else(|| Rendered::Textual(value.repr_text()))
}

// Implementations for common types

impl Represent for () {
    fn repr_text(&self) -> String {
        String::new()
    }

    fn is_absent(&self) -> bool {
        true
    }
}

impl Represent for str {
    fn repr_text(&self) -> String {
        format!("{:?}", self)
    }
}

impl Represent for String {
    fn repr_text(&self) -> String {
        format!("{:?}", self)
    }
}

impl Represent for i64 {
    fn repr_text(&self) -> String {
        self.to_string()
    }
}

impl Represent for f64 {
    fn repr_text(&self) -> String {
        self.to_string()
    }
}

impl Represent for bool {
    fn repr_text(&self) -> String {
        self.to_string()
    }
}

impl Represent for [u8] {
    fn repr_text(&self) -> String {
        format!("{:?}", self)
    }

    fn byte_view(&self) -> Option<&[u8]> {
        Some(self)
    }
}

impl Represent for Vec<u8> {
    fn repr_text(&self) -> String {
        self.as_slice().repr_text()
    }

    fn byte_view(&self) -> Option<&[u8]> {
        Some(self)
    }
}

impl<T: Represent> Represent for Option<T> {
    fn repr_text(&self) -> String {
        self.as_ref().map(Represent::repr_text).unwrap_or_default()
    }

    fn is_absent(&self) -> bool {
        self.as_ref().is_none_or(Represent::is_absent)
    }

    fn byte_view(&self) -> Option<&[u8]> {
        self.as_ref()?.byte_view()
    }
}
