//! Event-based XML reading for the SpreadsheetML parts of a workbook
//! (`workbook.xml`, `styles.xml`, `sharedStrings.xml`, `sheetN.xml`).

use crate::error::ExporterError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use thiserror::Error;

/// Loops over the events of an [`XmlReader`], ignoring events no arm matches.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown XML entity '&{0};'")]
    EntityError(String),

    #[error("Invalid character reference '&{0};'")]
    CharacterReferenceError(String),
}

/// Streaming XML reader reusing one event buffer.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        // <c r="A1"/> must produce a Start/End pair like <c r="A1"></c>
        config.expand_empty_elements = true;
        config.trim_text(false);

        XmlReader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Reads the next event, `None` at end of document.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, ExporterError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(ExporterError::XmlError(error)),
        }
    }

    /// Collects the text of every `<t>` element until `end_tag` closes.
    ///
    /// Phonetic runs (`<rPh>`) are skipped. When `is_text_content` is set the
    /// element's own text counts too, which is how `<v>` values are read.
    pub(crate) fn read_text(&mut self, end_tag: QName, is_text_content: bool) -> Result<String, ExporterError> {
        const TAG_PHONETIC_TEXT: QName = QName(b"rPh");
        const TAG_TEXT: QName = QName(b"t");

        let mut is_phonetic_text = false;
        let mut is_text = is_text_content;
        let mut text = String::new();
        match_xml_events!(self => {
            Event::End(event) if event.name() == end_tag => break,
            Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
            Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
            Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
            Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = is_text_content,
            Event::Text(event) if is_text && !is_phonetic_text => text.push_str(&event.xml_content()?),
            Event::CData(event) if is_text && !is_phonetic_text => text.push_str(&event.xml_content()?),
            Event::GeneralRef(event) if is_text && !is_phonetic_text => text.push_bytes_ref(&event)?,
        });
        Ok(text)
    }
}

/// Attribute lookup on start tags.
pub(crate) trait XmlNodeHelper<'a> {
    /// Gets the unescaped value of the attribute `name`, ignoring namespace prefixes.
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, ExporterError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, ExporterError> {
        for result in self.attributes() {
            let attribute = result?;
            if attribute.key.local_name().as_ref() == name.as_bytes() {
                return Ok(Some(attribute.unescape_value()?));
            }
        }
        Ok(None)
    }
}

/// Appends entity and character references to text being built.
pub(crate) trait XmlTextContextHelper {
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), ExporterError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), ExporterError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16),
                None => number.parse::<u32>(),
            }
            .map_err(|_| XmlError::CharacterReferenceError(raw.to_string()))?;
            let character = char::from_u32(code)
                .ok_or_else(|| XmlError::CharacterReferenceError(raw.to_string()))?;
            self.push(character);
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::EntityError(raw.to_string()))?;
        }
        Ok(())
    }
}
