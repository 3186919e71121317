use diglot_sfm::UsfmError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StyError {
    #[error(transparent)]
    Sheet(#[from] UsfmError),
}
