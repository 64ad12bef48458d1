use cinegate_core::{CoreError, CoreResult};

/// Lifts sqlx failures into the engine error type
pub trait DbResultExt<T> {
    fn db(self) -> CoreResult<T>;
}

impl<T> DbResultExt<T> for Result<T, sqlx::Error> {
    fn db(self) -> CoreResult<T> {
        self.map_err(CoreError::persistence)
    }
}
