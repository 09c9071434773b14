#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Buffer Error: {0} should have {1} elements but has {2}")]
    BufferSize(&'static str, usize, usize),

    #[error("Validation Error: {0} should be {1}")]
    Validation(String, String),
}
