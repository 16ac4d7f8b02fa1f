//! Schema checks

use contracts::{Category, XvizMessage, XvizMetadata};

use crate::XvizError;

/// Every primitive stream must name its primitive type
pub fn validate_metadata(metadata: &XvizMetadata) -> Result<(), XvizError> {
    for (name, stream) in &metadata.streams {
        if stream.category == Category::Primitive && stream.primitive_type.is_none() {
            return Err(XvizError::MissingPrimitiveType(name.clone()));
        }
    }
    Ok(())
}

/// Check a message against its metadata
///
/// Poses must go to POSE streams, primitives to PRIMITIVE streams, every
/// stream must be declared and point primitives must pair points with colors.
pub fn validate_message(metadata: &XvizMetadata, message: &XvizMessage) -> Result<(), XvizError> {
    let Some(update) = message.as_state_update() else {
        return Ok(());
    };

    for set in &update.updates {
        for stream in set.poses.keys() {
            expect_category(metadata, stream, Category::Pose)?;
        }
        for (stream, state) in &set.primitives {
            expect_category(metadata, stream, Category::Primitive)?;
            for point in &state.points {
                if !point.is_well_formed() {
                    return Err(XvizError::MalformedPrimitive {
                        stream: stream.clone(),
                        points: point.points.len(),
                        colors: point.colors.len(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn expect_category(
    metadata: &XvizMetadata,
    stream: &str,
    expected: Category,
) -> Result<(), XvizError> {
    let declared = metadata
        .streams
        .get(stream)
        .ok_or_else(|| XvizError::UndeclaredStream(stream.to_string()))?;
    if declared.category != expected {
        return Err(XvizError::CategoryMismatch {
            stream: stream.to_string(),
            declared: format!("{:?}", declared.category),
            used: format!("{expected:?}"),
        });
    }
    Ok(())
}
