use crate::{
    serial::ChannelError,
    session::{StateError, StorageError},
};

#[cfg(target_os = "espidf")]
use crate::serial::UARTError;

/// Enums the different errors possible when running the replay device
#[derive(Debug)]
pub enum UartReplayError {
    ChannelError(ChannelError),
    StateError(StateError),
    StorageError(StorageError),
    #[cfg(target_os = "espidf")]
    UartError(UARTError),
}

impl From<ChannelError> for UartReplayError {
    fn from(value: ChannelError) -> Self {
        UartReplayError::ChannelError(value)
    }
}

impl From<StateError> for UartReplayError {
    fn from(value: StateError) -> Self {
        UartReplayError::StateError(value)
    }
}

impl From<StorageError> for UartReplayError {
    fn from(value: StorageError) -> Self {
        UartReplayError::StorageError(value)
    }
}

#[cfg(target_os = "espidf")]
impl From<UARTError> for UartReplayError {
    fn from(value: UARTError) -> Self {
        UartReplayError::UartError(value)
    }
}
