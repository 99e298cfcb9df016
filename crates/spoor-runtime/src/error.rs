use std::fmt;

use spoor_grid::GridError;
use spoor_senses::DefinitionError;

use crate::registry::SourceHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum SenseError {
    Config(String),
    Grid(GridError),
    Definition(DefinitionError),
    /// The handle was never issued or its source has been removed.
    UnknownSource(SourceHandle),
}

impl fmt::Display for SenseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenseError::Config(msg) => write!(f, "invalid sense config: {}", msg),
            SenseError::Grid(e) => write!(f, "{}", e),
            SenseError::Definition(e) => write!(f, "{}", e),
            SenseError::UnknownSource(h) => {
                write!(f, "unknown sense source {}#{}", h.index(), h.generation())
            }
        }
    }
}

impl std::error::Error for SenseError {}

impl From<GridError> for SenseError {
    fn from(e: GridError) -> Self {
        SenseError::Grid(e)
    }
}

impl From<DefinitionError> for SenseError {
    fn from(e: DefinitionError) -> Self {
        SenseError::Definition(e)
    }
}
