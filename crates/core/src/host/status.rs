use crate::engine::domain::face_engine::EngineError;

/// Status code returned to the host by every entry point.
///
/// Zero and positive values are outcomes; negative values are errors.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Ok = 0,
    /// Liveness found no face to score.
    NoFace = 1,
    InvalidHandle = -1,
    InferenceFailure = -2,
    ModelLoadFailure = -3,
    /// Image bytes did not match the declared format or size.
    InvalidInput = -4,
    /// No backend factory installed yet.
    NotInitialized = -5,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Status::Ok),
            1 => Some(Status::NoFace),
            -1 => Some(Status::InvalidHandle),
            -2 => Some(Status::InferenceFailure),
            -3 => Some(Status::ModelLoadFailure),
            -4 => Some(Status::InvalidInput),
            -5 => Some(Status::NotInitialized),
            _ => None,
        }
    }

    pub fn is_error(self) -> bool {
        self.code() < 0
    }
}

impl From<&EngineError> for Status {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::ModelLoadFailure { .. } => Status::ModelLoadFailure,
            EngineError::InvalidHandle(_) => Status::InvalidHandle,
            EngineError::InferenceFailure(_) => Status::InferenceFailure,
        }
    }
}
