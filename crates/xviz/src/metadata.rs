//! Metadata builder

use std::collections::BTreeMap;

use contracts::{
    Category, CoordinateType, PrimitiveType, StreamMetadata, StreamStyle, XvizMessage,
    XvizMetadata, XVIZ_VERSION,
};

#[derive(Debug)]
struct PendingStream {
    name: String,
    category: Option<Category>,
    coordinate: Option<CoordinateType>,
    primitive_type: Option<PrimitiveType>,
    stream_style: Option<StreamStyle>,
}

/// Fluent builder for [`XvizMetadata`]
///
/// Each `stream(name)` opens a declaration; the following calls configure it
/// until the next `stream` or `build`.
#[derive(Debug, Default)]
pub struct XvizMetadataBuilder {
    streams: BTreeMap<String, StreamMetadata>,
    pending: Option<PendingStream>,
}

impl XvizMetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new stream declaration
    pub fn stream(mut self, name: impl Into<String>) -> Self {
        self.commit();
        self.pending = Some(PendingStream {
            name: name.into(),
            category: None,
            coordinate: None,
            primitive_type: None,
            stream_style: None,
        });
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.pending_mut().category = Some(category);
        self
    }

    pub fn coordinate(mut self, coordinate: CoordinateType) -> Self {
        self.pending_mut().coordinate = Some(coordinate);
        self
    }

    pub fn primitive_type(mut self, primitive_type: PrimitiveType) -> Self {
        self.pending_mut().primitive_type = Some(primitive_type);
        self
    }

    pub fn stream_style(mut self, style: StreamStyle) -> Self {
        self.pending_mut().stream_style = Some(style);
        self
    }

    /// Finish the declaration
    ///
    /// Panics in debug builds when a primitive stream lacks a primitive type.
    pub fn build(mut self) -> XvizMetadata {
        self.commit();
        let metadata = XvizMetadata {
            version: XVIZ_VERSION.to_string(),
            streams: self.streams,
        };
        debug_assert!(
            crate::validate_metadata(&metadata).is_ok(),
            "malformed metadata: {:?}",
            crate::validate_metadata(&metadata)
        );
        metadata
    }

    /// Finish the declaration wrapped as a message
    pub fn get_message(self) -> XvizMessage {
        XvizMessage::Metadata(self.build())
    }

    fn pending_mut(&mut self) -> &mut PendingStream {
        debug_assert!(self.pending.is_some(), "stream(name) must be called first");
        self.pending.get_or_insert_with(|| PendingStream {
            name: String::new(),
            category: None,
            coordinate: None,
            primitive_type: None,
            stream_style: None,
        })
    }

    fn commit(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        debug_assert!(
            pending.category.is_some(),
            "stream '{}' declared without a category",
            pending.name
        );
        self.streams.insert(
            pending.name,
            StreamMetadata {
                category: pending.category.unwrap_or(Category::Primitive),
                coordinate: pending.coordinate,
                primitive_type: pending.primitive_type,
                stream_style: pending.stream_style,
            },
        );
    }
}
